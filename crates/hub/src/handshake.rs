//! REG / LOGIN / VERIF / LOGOUT / DEREG: registration, session challenge,
//! challenge-response verification, and account teardown.

use crate::crypto::{encrypt_challenge, generate_challenge, parse_public_key_pem};
use crate::error::SemanticError;
use crate::hub::Hub;
use crate::persistence::Persistence;
use crate::user::{User, is_valid_username};
use crate::verification::Verification;
use codec::{Command, Hook, Operation};
use log::warn;
use std::sync::Arc;
use std::time::Instant;

impl<P: Persistence> Hub<P> {
    pub async fn handle_reg(&self, user: User, command: &Command) {
        let id = command.header.id;
        let username = String::from_utf8_lossy(&command.arguments[0]).into_owned();
        let pem = String::from_utf8_lossy(&command.arguments[1]).into_owned();

        if !is_valid_username(&username) {
            return self.reply_err(user.conn, id, SemanticError::Arguments);
        }
        let Ok(_) = parse_public_key_pem(&pem) else {
            return self.reply_err(user.conn, id, SemanticError::Arguments);
        };

        match self.persistence.query_user(&username).await {
            Some(row) if row.public_key_pem.is_some() => {
                return self.reply_err(user.conn, id, SemanticError::Exists);
            }
            Some(_) => return self.reply_err(user.conn, id, SemanticError::Deregistered),
            None => {}
        }

        match self.persistence.insert_user(&username, &pem, user.permission).await {
            Ok(()) => self.reply_ok(user.conn, id),
            Err(err) => {
                warn!("insert_user({username}) failed: {err}");
                self.reply_err(user.conn, id, SemanticError::Server);
            }
        }
    }

    pub async fn handle_login(self: &Arc<Self>, user: User, command: &Command) {
        let id = command.header.id;
        let min_args = Operation::Login.server_min_args().expect("LOGIN is server-accepted");

        if command.arguments.len() as u8 > min_args {
            self.login_token_reuse(user, id, &command.arguments[1]).await;
        } else {
            self.login_fresh_challenge(user, id).await;
        }
    }

    async fn login_token_reuse(&self, user: User, id: u16, token: &[u8]) {
        if !user.secure {
            return self.reply_err(user.conn, id, SemanticError::Unsecure);
        }

        let mut verifications = self.verifications.write();
        let Some(mut record) = verifications.get(&user.username).cloned() else {
            drop(verifications);
            return self.reply_err(user.conn, id, SemanticError::NotFound);
        };

        if record.pending {
            drop(verifications);
            return self.reply_err(user.conn, id, SemanticError::Invalid);
        }

        if record.is_expired(Instant::now()) {
            verifications.remove(&user.username);
            drop(verifications);
            return self.reply_err(user.conn, id, SemanticError::NotFound);
        }

        if record.challenge != token {
            drop(verifications);
            return self.reply_err(user.conn, id, SemanticError::Handshake);
        }

        record.conn = Some(user.conn);
        verifications.insert(user.username.clone(), record);
        drop(verifications);

        self.publish_session(user.clone());
        self.notify(Hook::NewLogin, None, &[user.username.as_bytes()]);
        self.reply_ok(user.conn, id);
    }

    async fn login_fresh_challenge(self: &Arc<Self>, user: User, id: u16) {
        let Some(public_key) = user.public_key.as_ref() else {
            return self.reply_err(user.conn, id, SemanticError::Corrupted);
        };

        let challenge = generate_challenge();
        let ciphertext = match encrypt_challenge(public_key, &challenge) {
            Ok(bytes) => bytes,
            Err(_) => return self.reply_err(user.conn, id, SemanticError::Server),
        };

        let record = Verification::pending(user.conn, user.username.clone(), challenge, Instant::now() + self.options.login_timeout);
        let cancel = record.cancel.clone();
        self.verifications.write().insert(user.username.clone(), record);

        self.reply(user.conn, Operation::Verif, id, codec::INFO_EMPTY, &[&ciphertext]);

        let hub = self.clone();
        let username = user.username.clone();
        let login_timeout = self.options.login_timeout;
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(login_timeout) => {
                    let mut verifications = hub.verifications.write();
                    if matches!(verifications.get(&username), Some(record) if record.pending) {
                        verifications.remove(&username);
                    }
                }
                _ = cancel.notified() => {}
            }
        });
    }

    pub async fn handle_verif(self: &Arc<Self>, user: User, command: &Command) {
        let id = command.header.id;
        let plaintext = &command.arguments[1];

        let Some(record) = self.verifications.read().get(&user.username).cloned() else {
            return self.reply_err(user.conn, id, SemanticError::Invalid);
        };

        if &record.challenge != plaintext || record.conn != Some(user.conn) {
            record.cancel.notify_one();
            self.verifications.write().remove(&user.username);
            return self.reply_err(user.conn, id, SemanticError::Handshake);
        }

        record.cancel.notify_one();
        self.publish_session(user.clone());
        self.notify(Hook::NewLogin, None, &[user.username.as_bytes()]);

        if user.secure {
            let mut record = record;
            record.pending = false;
            self.verifications.write().insert(user.username.clone(), record);
        } else {
            self.verifications.write().remove(&user.username);
        }

        self.reply_ok(user.conn, id);
    }

    pub async fn handle_logout(&self, user: User, command: &Command) {
        let id = command.header.id;
        self.sessions.write().remove(&user.conn);
        self.usernames.write().remove(&user.username);

        if let Some(record) = self.verifications.write().remove(&user.username) {
            record.cancel.notify_one();
        }

        self.notify(Hook::NewLogout, None, &[user.username.as_bytes()]);
        self.reply_ok(user.conn, id);
    }

    /// `DEREG` nulls the caller's own key, mirroring admin `Deregister`: the
    /// session stays live until its socket dies, rather than being torn down
    /// mid-request.
    pub async fn handle_dereg(&self, user: User, command: &Command) {
        let id = command.header.id;
        match self.persistence.remove_key(&user.username).await {
            Ok(()) => self.reply_ok(user.conn, id),
            Err(err) => {
                warn!("remove_key({}) failed: {err}", user.username);
                self.reply_err(user.conn, id, SemanticError::Server);
            }
        }
    }

    /// Publishes a verified session: both the live-sessions table and the
    /// username index, so the session is observable (and `DupSession`
    /// checks correct) before the caller writes back `OK`.
    pub(crate) fn publish_session(&self, user: User) {
        self.usernames.write().insert(user.username.clone(), user.conn);
        self.sessions.write().insert(user.conn, user);
    }
}
