//! The Hub itself: the process-wide coordinator that owns every piece of
//! shared mutable state. A plain struct of `RwLock`-guarded tables passed by
//! reference to free functions/handlers, rather than scattered
//! process-globals.

use crate::admission::Admission;
use crate::connection::{ConnHandle, ConnId};
use crate::persistence::Persistence;
use crate::tables::Table;
use crate::user::User;
use crate::verification::Verification;
use codec::Hook;
use log::info;
use parking_lot::RwLock;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::Notify;

/// Durations the handshake and connection lifecycle are governed by.
/// Loaded from configuration by the binary crate.
#[derive(Debug, Clone, Copy)]
pub struct HubOptions {
    pub max_clients: usize,
    pub login_timeout: Duration,
    pub read_timeout: Duration,
    pub token_expiration: Duration,
}

impl Default for HubOptions {
    fn default() -> Self {
        Self {
            max_clients: 1024,
            login_timeout: Duration::from_secs(2 * 60),
            read_timeout: Duration::from_secs(10 * 60),
            token_expiration: Duration::from_secs(30 * 60),
        }
    }
}

/// A framed request handed to the Hub by the connection reader. Carries the
/// connection's identity rather than its transport: handlers reach the
/// transport, if they need to write back, through the Hub's connection
/// registry.
pub struct Request {
    pub conn: ConnId,
    pub secure: bool,
    pub command: codec::Command,
}

pub struct Hub<P: Persistence> {
    pub(crate) persistence: P,
    pub(crate) options: HubOptions,
    pub(crate) admission: Admission,

    pub(crate) connections: RwLock<Table<ConnId, ConnHandle>>,
    pub(crate) sessions: RwLock<Table<ConnId, User>>,
    pub(crate) usernames: RwLock<Table<String, ConnId>>,
    pub(crate) verifications: RwLock<Table<String, Verification>>,
    pub(crate) hooks: [RwLock<Table<ConnId, ()>>; 4],
    pub(crate) motd: RwLock<Option<String>>,

    shutdown: Arc<Notify>,
    shutting_down: AtomicBool,
}

impl<P: Persistence> Hub<P> {
    pub fn new(persistence: P, options: HubOptions) -> Arc<Self> {
        Arc::new(Self {
            persistence,
            admission: Admission::new(options.max_clients),
            options,
            connections: RwLock::new(Table::default()),
            sessions: RwLock::new(Table::default()),
            usernames: RwLock::new(Table::default()),
            verifications: RwLock::new(Table::default()),
            hooks: std::array::from_fn(|_| RwLock::new(Table::default())),
            motd: RwLock::new(None),
            shutdown: Arc::new(Notify::new()),
            shutting_down: AtomicBool::new(false),
        })
    }

    pub fn admission(&self) -> &Admission {
        &self.admission
    }

    pub fn options(&self) -> &HubOptions {
        &self.options
    }

    pub fn persistence(&self) -> &P {
        &self.persistence
    }

    /// Registers a freshly-accepted connection before its reader loop starts
    /// pulling commands off it.
    pub fn register_connection(&self, handle: ConnHandle) {
        self.connections.write().insert(handle.id, handle);
    }

    pub(crate) fn hook_index(hook: Hook) -> Option<usize> {
        Hook::CONCRETE.iter().position(|h| *h == hook)
    }

    pub(crate) fn connection(&self, id: ConnId) -> Option<ConnHandle> {
        self.connections.read().get(&id).cloned()
    }

    /// Writes a raw frame to a connection, swallowing failures: writes are
    /// best-effort.
    pub(crate) fn write_to(&self, id: ConnId, frame: Vec<u8>) {
        if let Some(handle) = self.connection(id) {
            handle.send(frame);
        }
    }

    pub(crate) fn reply(&self, conn: ConnId, operation: codec::Operation, id: u16, info: u8, args: &[&[u8]]) {
        match codec::encode(operation as u8, id, info, args) {
            Ok(frame) => self.write_to(conn, frame),
            Err(err) => log::warn!("failed to encode outgoing {operation:?} packet: {err}"),
        }
    }

    pub(crate) fn reply_ok(&self, conn: ConnId, id: u16) {
        self.reply(conn, codec::Operation::Ok, id, codec::INFO_EMPTY, &[]);
    }

    pub(crate) fn reply_err(&self, conn: ConnId, id: u16, err: crate::error::SemanticError) {
        self.reply(conn, codec::Operation::Err, id, err.code() as u8, &[]);
    }

    /// Replies to a framing failure caught by [`crate::connection::read_command`]
    /// with `ERR(<code>, id=offending-packet-id-or-null)`. Public because the
    /// connection reader loop lives in the binary crate, outside the Hub's
    /// own module boundary.
    pub fn reply_framing_error(&self, conn: ConnId, id: Option<u16>, err: codec::FramingError) {
        self.reply(conn, codec::Operation::Err, id.unwrap_or(codec::NULL_ID), err.code() as u8, &[]);
    }

    /// Removes all state tied to a torn-down connection. A non-pending,
    /// secure verification is re-anchored as a disconnected reusable token
    /// rather than destroyed outright.
    pub fn cleanup(&self, id: ConnId) {
        self.connections.write().remove(&id);

        let username = {
            let mut sessions = self.sessions.write();
            sessions.remove(&id).map(|user| user.username)
        };
        if let Some(username) = &username {
            self.usernames.write().remove(username);
        }

        let mut verifications = self.verifications.write();
        let stale: Vec<String> = verifications
            .iter()
            .filter(|(_, v)| v.conn == Some(id))
            .map(|(k, _)| k.clone())
            .collect();

        for username in stale {
            if let Some(mut record) = verifications.remove(&username) {
                if !record.pending && record.conn.is_some() {
                    record.conn = None;
                    record.expires_at = std::time::Instant::now() + self.options.token_expiration;
                    verifications.insert(username, record);
                }
            }
        }

        for hook in self.hooks.iter() {
            hook.write().remove(&id);
        }
    }

    /// Blocks until the shutdown signal fires.
    pub async fn wait(&self) {
        self.shutdown.notified().await;
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::Acquire)
    }

    /// Fires the shutdown signal: closes every live connection (their
    /// reader/writer pairs unwind through [`Hub::cleanup`]), gives them a
    /// moment to flush, then releases anything blocked on [`Hub::wait`].
    pub async fn trigger_shutdown(self: &Arc<Self>) {
        if self.shutting_down.swap(true, Ordering::AcqRel) {
            return;
        }

        info!("hub shutting down, closing {} live connection(s)", self.connections.read().len());
        for handle in self.connections.read().snapshot() {
            handle.close();
        }

        tokio::time::sleep(Duration::from_millis(200)).await;
        self.shutdown.notify_waiters();
    }
}
