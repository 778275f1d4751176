//! Bounded, priority-fair admission control: a concurrent counter that
//! blocks callers in strict arrival order once the connection limit is hit.
//! `tokio::sync::Semaphore` already provides exactly this — FIFO wake order
//! plus cancel-safe `acquire` — standing in for a hand-rolled condition
//! variable.

use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore, TryAcquireError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdmissionFull;

pub struct Admission {
    semaphore: Arc<Semaphore>,
}

impl Admission {
    pub fn new(max_clients: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(max_clients)),
        }
    }

    /// Blocks until a slot is free, taking the head of the FIFO wait queue
    /// when one opens up. Dropping the returned permit (e.g. the future
    /// holding it is cancelled, or the connection disconnects) releases the
    /// slot back to the next waiter.
    pub async fn inc(&self) -> OwnedSemaphorePermit {
        self.semaphore
            .clone()
            .acquire_owned()
            .await
            .expect("admission semaphore is never closed")
    }

    /// Non-blocking variant: fails immediately rather than queueing.
    pub fn try_inc(&self) -> Result<OwnedSemaphorePermit, AdmissionFull> {
        match self.semaphore.clone().try_acquire_owned() {
            Ok(permit) => Ok(permit),
            Err(TryAcquireError::NoPermits) => Err(AdmissionFull),
            Err(TryAcquireError::Closed) => unreachable!("admission semaphore is never closed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn try_inc_fails_when_at_capacity() {
        let admission = Admission::new(1);
        let permit = admission.try_inc().expect("first slot free");
        assert_eq!(admission.try_inc(), Err(AdmissionFull));
        drop(permit);
        assert!(admission.try_inc().is_ok());
    }

    #[tokio::test]
    async fn inc_unblocks_once_a_permit_is_released() {
        let admission = Arc::new(Admission::new(1));
        let first = admission.inc().await;

        let waiter = tokio::spawn({
            let admission = admission.clone();
            async move { admission.inc().await }
        });

        tokio::task::yield_now().await;
        drop(first);

        let second = tokio::time::timeout(std::time::Duration::from_secs(1), waiter)
            .await
            .expect("waiter should resolve once the first permit drops")
            .expect("task should not panic");

        drop(second);
    }
}
