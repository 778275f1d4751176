//! Event hooks: SUB / UNSUB / notify.

use crate::connection::ConnId;
use crate::error::SemanticError;
use crate::hub::Hub;
use crate::persistence::Persistence;
use crate::user::User;
use codec::{Command, Hook, Operation};

impl<P: Persistence> Hub<P> {
    pub async fn handle_sub(&self, user: User, command: &Command) {
        let id = command.header.id;
        let Ok(hook) = Hook::try_from(command.header.info) else {
            return self.reply_err(user.conn, id, SemanticError::Option);
        };

        if hook == Hook::AllHooks {
            for concrete in Hook::CONCRETE {
                let index = Self::hook_index(concrete).expect("concrete hook has an index");
                self.hooks[index].write().entry(user.conn).or_insert(());
            }
            return self.reply_ok(user.conn, id);
        }

        let Some(index) = Self::hook_index(hook) else {
            return self.reply_err(user.conn, id, SemanticError::Option);
        };

        let mut subscribers = self.hooks[index].write();
        if subscribers.contains_key(&user.conn) {
            drop(subscribers);
            return self.reply_err(user.conn, id, SemanticError::Exists);
        }
        subscribers.insert(user.conn, ());
        drop(subscribers);
        self.reply_ok(user.conn, id);
    }

    pub async fn handle_unsub(&self, user: User, command: &Command) {
        let id = command.header.id;
        let Ok(hook) = Hook::try_from(command.header.info) else {
            return self.reply_err(user.conn, id, SemanticError::Option);
        };

        if hook == Hook::AllHooks {
            for concrete in Hook::CONCRETE {
                let index = Self::hook_index(concrete).expect("concrete hook has an index");
                self.hooks[index].write().remove(&user.conn);
            }
            return self.reply_ok(user.conn, id);
        }

        let Some(index) = Self::hook_index(hook) else {
            return self.reply_err(user.conn, id, SemanticError::Option);
        };

        let mut subscribers = self.hooks[index].write();
        if subscribers.remove(&user.conn).is_none() {
            drop(subscribers);
            return self.reply_err(user.conn, id, SemanticError::NotFound);
        }
        self.reply_ok(user.conn, id);
    }

    /// Builds a `HOOK(info=hook, id=null)` packet and writes it to every
    /// subscriber of `hook` except `exclude`. Best-effort: a dead
    /// subscriber's write is silently dropped.
    pub(crate) fn notify(&self, hook: Hook, exclude: Option<ConnId>, args: &[&[u8]]) {
        let Some(index) = Self::hook_index(hook) else {
            return;
        };

        let Ok(frame) = codec::encode(Operation::Hook as u8, codec::NULL_ID, hook as u8, args) else {
            return;
        };

        let subscribers = self.hooks[index].read().keys().copied().collect::<Vec<_>>();
        for conn in subscribers {
            if Some(conn) != exclude {
                self.write_to(conn, frame.clone());
            }
        }
    }
}
