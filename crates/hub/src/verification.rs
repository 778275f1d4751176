//! Pending/reusable verification records. A single record models both
//! sub-states: `pending=true` (challenge outstanding, live connection) and
//! `pending=false` (either a fresh reusable token still attached to its
//! connection, or a disconnected one waiting out `TokenExpiration`).

use crate::connection::ConnId;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Notify;

#[derive(Debug, Clone)]
pub struct Verification {
    pub conn: Option<ConnId>,
    pub username: String,
    pub challenge: Vec<u8>,
    pub pending: bool,
    pub expires_at: Instant,
    /// Notified to cancel the background expiry waiter spawned for a
    /// pending challenge. Reusable tokens that are lazily GC'd on access
    /// don't spawn a waiter and leave this unused, but keep it so
    /// `Verification` has one shape throughout its lifecycle.
    pub cancel: Arc<Notify>,
}

impl Verification {
    pub fn pending(conn: ConnId, username: String, challenge: Vec<u8>, expires_at: Instant) -> Self {
        Self {
            conn: Some(conn),
            username,
            challenge,
            pending: true,
            expires_at,
            cancel: Arc::new(Notify::new()),
        }
    }

    /// True once `expires_at` has passed, for lazy GC on next access.
    pub fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}
