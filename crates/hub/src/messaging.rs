//! MSG / RECIV: live routing, persistent enqueue, and catch-up.

use crate::error::SemanticError;
use crate::hub::Hub;
use crate::persistence::Persistence;
use crate::user::User;
use codec::{Command, NULL_ID, Operation};
use log::warn;

impl<P: Persistence> Hub<P> {
    pub async fn handle_msg(&self, user: User, command: &Command) {
        let id = command.header.id;
        let destination = String::from_utf8_lossy(&command.arguments[0]).into_owned();
        let timestamp_bytes = &command.arguments[1];
        let ciphertext = &command.arguments[2];

        let Some(timestamp) = std::str::from_utf8(timestamp_bytes).ok().and_then(|s| s.parse::<u64>().ok()) else {
            return self.reply_err(user.conn, id, SemanticError::Arguments);
        };

        if destination == user.username {
            return self.reply_err(user.conn, id, SemanticError::Invalid);
        }

        if let Some(dest_conn) = self.usernames.read().get(&destination).copied() {
            self.reply(dest_conn, Operation::Reciv, NULL_ID, codec::INFO_EMPTY, &[user.username.as_bytes(), timestamp_bytes, ciphertext]);
            return self.reply_ok(user.conn, id);
        }

        if self.persistence.query_user(&destination).await.is_none() {
            return self.reply_err(user.conn, id, SemanticError::NotFound);
        }

        match self.persistence.cache_message(&user.username, &destination, ciphertext, timestamp).await {
            Ok(()) => self.reply_ok(user.conn, id),
            Err(err) => {
                warn!("cache_message({} -> {destination}) failed: {err}", user.username);
                self.reply_err(user.conn, id, SemanticError::Server);
            }
        }
    }

    /// `RECIV` received with no arguments is the client pulling its queued
    /// messages (as opposed to the 3-argument form the server pushes for
    /// live delivery and catch-up, both sharing this op code). Catch-up
    /// packets carry the null id, matching the live-delivery framing: a
    /// single convention for both paths is simpler to implement and to test
    /// against.
    pub async fn handle_reciv(&self, user: User, command: &Command) {
        let id = command.header.id;
        let mut messages = self.persistence.query_messages(&user.username).await;

        if messages.is_empty() {
            return self.reply_err(user.conn, id, SemanticError::Empty);
        }

        messages.sort_by_key(|message| message.timestamp);
        self.reply_ok(user.conn, id);

        let newest = messages.last().map(|m| m.timestamp).unwrap_or(0);
        for message in &messages {
            let timestamp_bytes = message.timestamp.to_string();
            self.reply(
                user.conn,
                Operation::Reciv,
                NULL_ID,
                codec::INFO_EMPTY,
                &[message.sender.as_bytes(), timestamp_bytes.as_bytes(), &message.ciphertext],
            );
        }

        if let Err(err) = self.persistence.remove_messages(&user.username, newest).await {
            warn!("remove_messages({}, {newest}) failed: {err}", user.username);
        }
    }
}
