//! A reference, in-process implementation of [`hub::Persistence`], backed by
//! `parking_lot`-guarded tables (the same discipline the Hub itself uses for
//! its in-memory state). Stands in for a real relational layer so the
//! workspace is runnable and testable without wiring up a database.

use hub::persistence::{Persistence, PersistenceError};
use hub::user::{Permission, PersistentMessage, PersistentUser};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Default)]
pub struct MemoryPersistence {
    users: RwLock<HashMap<String, PersistentUser>>,
    messages: RwLock<HashMap<String, Vec<PersistentMessage>>>,
    next_id: AtomicU64,
}

impl MemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }
}

impl Persistence for MemoryPersistence {
    async fn query_user(&self, username: &str) -> Option<PersistentUser> {
        self.users.read().get(username).cloned()
    }

    async fn insert_user(&self, username: &str, public_key_pem: &str, permission: Permission) -> Result<(), PersistenceError> {
        let mut users = self.users.write();
        if users.contains_key(username) {
            return Err(PersistenceError(format!("username {username} already exists").into()));
        }

        users.insert(
            username.to_string(),
            PersistentUser {
                id: self.allocate_id(),
                username: username.to_string(),
                public_key_pem: Some(public_key_pem.to_string()),
                permission,
            },
        );

        Ok(())
    }

    async fn remove_key(&self, username: &str) -> Result<(), PersistenceError> {
        match self.users.write().get_mut(username) {
            Some(row) => {
                row.public_key_pem = None;
                Ok(())
            }
            None => Err(PersistenceError(format!("no such user {username}").into())),
        }
    }

    async fn change_permission(&self, username: &str, permission: Permission) -> Result<(), PersistenceError> {
        match self.users.write().get_mut(username) {
            Some(row) => {
                row.permission = permission;
                Ok(())
            }
            None => Err(PersistenceError(format!("no such user {username}").into())),
        }
    }

    async fn query_usernames(&self) -> Vec<PersistentUser> {
        self.users.read().values().cloned().collect()
    }

    async fn cache_message(&self, sender: &str, destination: &str, ciphertext: &[u8], timestamp: u64) -> Result<(), PersistenceError> {
        self.messages.write().entry(destination.to_string()).or_default().push(PersistentMessage {
            sender: sender.to_string(),
            ciphertext: ciphertext.to_vec(),
            timestamp,
        });

        Ok(())
    }

    async fn query_messages(&self, destination: &str) -> Vec<PersistentMessage> {
        self.messages.read().get(destination).cloned().unwrap_or_default()
    }

    async fn remove_messages(&self, destination: &str, up_to: u64) -> Result<(), PersistenceError> {
        if let Some(queue) = self.messages.write().get_mut(destination) {
            queue.retain(|message| message.timestamp > up_to);
        }

        Ok(())
    }
}
