//! Admin operations: scheduled shutdown, broadcast, force-deregister,
//! promote, disconnect. `Motd` is given the minimal sensible behaviour
//! (stash the message for later retrieval) rather than leaving the subop
//! unreachable.

use crate::error::SemanticError;
use crate::hub::Hub;
use crate::persistence::Persistence;
use crate::user::{Permission, User};
use codec::{AdminSubop, Command, NULL_ID, Operation};
use log::{info, warn};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

impl AdminSubop {
    /// The minimum caller permission each subop enforces: `Shutdown` and
    /// promoting a user to `Admin` (`ChangePerms`) are treated as
    /// owner-only, the rest as admin-or-above.
    fn min_permission(self) -> Permission {
        match self {
            Self::Shutdown | Self::ChangePerms => Permission::Owner,
            Self::Deregister | Self::Broadcast | Self::Disconnect | Self::Motd => Permission::Admin,
        }
    }
}

impl<P: Persistence> Hub<P> {
    pub async fn handle_admin(self: &Arc<Self>, user: User, command: &Command) {
        let id = command.header.id;

        let Ok(subop) = AdminSubop::try_from(command.header.info) else {
            return self.reply_err(user.conn, id, SemanticError::Option);
        };

        if command.arguments.len() as u8 != subop.required_args() {
            return self.reply_err(user.conn, id, SemanticError::Arguments);
        }

        if user.permission < subop.min_permission() {
            return self.reply_err(user.conn, id, SemanticError::Privileges);
        }

        match subop {
            AdminSubop::Shutdown => self.admin_shutdown(user, id, &command.arguments[0]).await,
            AdminSubop::Broadcast => self.admin_broadcast(user, id, &command.arguments[0]),
            AdminSubop::Deregister => self.admin_deregister(user, id, &command.arguments[0]).await,
            AdminSubop::ChangePerms => self.admin_promote(user, id, &command.arguments[0]).await,
            AdminSubop::Disconnect => self.admin_disconnect(user, id, &command.arguments[0]),
            AdminSubop::Motd => self.admin_motd(user, id, &command.arguments[0]),
        }
    }

    async fn admin_shutdown(self: &Arc<Self>, user: User, id: u16, arg: &[u8]) {
        let Some(at) = std::str::from_utf8(arg).ok().and_then(|s| s.parse::<u64>().ok()) else {
            return self.reply_err(user.conn, id, SemanticError::Arguments);
        };

        let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs();
        if at <= now {
            return self.reply_err(user.conn, id, SemanticError::Arguments);
        }

        let timestamp = at.to_string();
        for (conn, _) in self.sessions.read().snapshot_entries() {
            self.reply(conn, Operation::Shtdwn, NULL_ID, codec::INFO_EMPTY, &[timestamp.as_bytes()]);
        }

        self.reply_ok(user.conn, id);

        let hub = self.clone();
        let delay = Duration::from_secs(at - now);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            info!("scheduled shutdown firing");
            hub.trigger_shutdown().await;
        });
    }

    fn admin_broadcast(&self, user: User, id: u16, content: &[u8]) {
        let sender = format!("{} [{}]", user.username, user.permission.as_u8());
        let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs().to_string();

        for (conn, _) in self.sessions.read().snapshot_entries() {
            self.reply(conn, Operation::Reciv, NULL_ID, codec::INFO_EMPTY, &[sender.as_bytes(), now.as_bytes(), content]);
        }

        self.reply_ok(user.conn, id);
    }

    async fn admin_deregister(&self, user: User, id: u16, target_arg: &[u8]) {
        let target = String::from_utf8_lossy(target_arg).into_owned();
        match self.persistence.remove_key(&target).await {
            Ok(()) => self.reply_ok(user.conn, id),
            Err(err) => {
                warn!("admin remove_key({target}) failed: {err}");
                self.reply_err(user.conn, id, SemanticError::Server);
            }
        }
    }

    async fn admin_promote(&self, user: User, id: u16, target_arg: &[u8]) {
        let target = String::from_utf8_lossy(target_arg).into_owned();

        let Some(row) = self.persistence.query_user(&target).await else {
            return self.reply_err(user.conn, id, SemanticError::NotFound);
        };

        if row.permission >= Permission::Admin {
            return self.reply_err(user.conn, id, SemanticError::Invalid);
        }

        match self.persistence.change_permission(&target, Permission::Admin).await {
            Ok(()) => self.reply_ok(user.conn, id),
            Err(err) => {
                warn!("admin change_permission({target}) failed: {err}");
                self.reply_err(user.conn, id, SemanticError::Server);
            }
        }
    }

    fn admin_disconnect(&self, user: User, id: u16, target_arg: &[u8]) {
        let target = String::from_utf8_lossy(target_arg).into_owned();

        let Some(conn) = self.usernames.read().get(&target).copied() else {
            return self.reply_err(user.conn, id, SemanticError::NotFound);
        };

        if let Some(handle) = self.connection(conn) {
            handle.close();
        }

        self.reply_ok(user.conn, id);
    }

    fn admin_motd(&self, user: User, id: u16, text: &[u8]) {
        *self.motd.write() = Some(String::from_utf8_lossy(text).into_owned());
        self.reply_ok(user.conn, id);
    }
}
