//! The persistence boundary: `QueryUser`, `InsertUser`, `CacheMessage`,
//! `QueryMessages`, `RemoveMessages`, `RemoveKey`, `ChangePermission`,
//! `QueryUsernames`. Out of scope for the Hub's own logic — the relational
//! layer owns its own concurrency — but the Hub is generic over it
//! (`Hub<P: Persistence>`) rather than boxing it as `dyn`, so no
//! `async-trait` shim is needed: native `async fn` in a non-dyn trait is
//! plain stable Rust.

use crate::user::{Permission, PersistentMessage, PersistentUser};
use std::error::Error as StdError;
use std::fmt;
use std::future::Future;

#[derive(Debug)]
pub struct PersistenceError(pub Box<dyn StdError + Send + Sync>);

impl fmt::Display for PersistenceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "persistence error: {}", self.0)
    }
}

impl StdError for PersistenceError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        Some(self.0.as_ref())
    }
}

pub trait Persistence: Send + Sync + 'static {
    /// Looks up a user by username. `None` means no such row exists.
    fn query_user(&self, username: &str) -> impl Future<Output = Option<PersistentUser>> + Send;

    /// Inserts a brand-new user. Fails if the username is already taken.
    fn insert_user(
        &self,
        username: &str,
        public_key_pem: &str,
        permission: Permission,
    ) -> impl Future<Output = Result<(), PersistenceError>> + Send;

    /// Nulls a user's public key slot (`Deregister`), retaining the row (and
    /// any queued messages addressed to it) but forbidding future logins.
    fn remove_key(&self, username: &str) -> impl Future<Output = Result<(), PersistenceError>> + Send;

    fn change_permission(
        &self,
        username: &str,
        permission: Permission,
    ) -> impl Future<Output = Result<(), PersistenceError>> + Send;

    fn query_usernames(&self) -> impl Future<Output = Vec<PersistentUser>> + Send;

    /// Queues a message for an offline destination.
    fn cache_message(
        &self,
        sender: &str,
        destination: &str,
        ciphertext: &[u8],
        timestamp: u64,
    ) -> impl Future<Output = Result<(), PersistenceError>> + Send;

    /// Fetches all queued messages for a destination, oldest first.
    fn query_messages(&self, destination: &str) -> impl Future<Output = Vec<PersistentMessage>> + Send;

    /// Deletes all of a destination's queued messages with
    /// `timestamp <= up_to`, after a successful catch-up delivery.
    fn remove_messages(&self, destination: &str, up_to: u64) -> impl Future<Output = Result<(), PersistenceError>> + Send;
}
