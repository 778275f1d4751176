//! The small stateless/read-mostly ops: `KEEP` (heartbeat), `REQ` (peer
//! lookup) and `USRS` (user listing). Spec.md §6 groups these with the rest
//! of the external interface but §4 never gives them their own subsection;
//! they're simple enough not to need one.

use crate::error::SemanticError;
use crate::hub::Hub;
use crate::persistence::Persistence;
use crate::user::User;
use codec::{Command, Operation, UsrsOption};

impl<P: Persistence> Hub<P> {
    pub async fn handle_keep(&self, user: User, command: &Command) {
        self.reply_ok(user.conn, command.header.id);
    }

    pub async fn handle_req(&self, user: User, command: &Command) {
        let id = command.header.id;
        let target = String::from_utf8_lossy(&command.arguments[0]).into_owned();

        let Some(row) = self.persistence.query_user(&target).await else {
            return self.reply_err(user.conn, id, SemanticError::NotFound);
        };

        let Some(pem) = row.public_key_pem else {
            return self.reply_err(user.conn, id, SemanticError::Deregistered);
        };

        let permission = row.permission.as_u8().to_string();
        self.reply(user.conn, Operation::Req, id, codec::INFO_EMPTY, &[target.as_bytes(), pem.as_bytes(), permission.as_bytes()]);
    }

    pub async fn handle_usrs(&self, user: User, command: &Command) {
        let id = command.header.id;
        let info = command.header.info;
        let Ok(option) = UsrsOption::try_from(info) else {
            return self.reply_err(user.conn, id, SemanticError::Option);
        };

        let lines: Vec<String> = match option {
            UsrsOption::AllUsers => self.persistence.query_usernames().await.into_iter().map(|row| row.username).collect(),
            UsrsOption::AllPerms => self
                .persistence
                .query_usernames()
                .await
                .into_iter()
                .map(|row| format!("{}:{}", row.username, row.permission.as_u8()))
                .collect(),
            UsrsOption::Online => self.sessions.read().snapshot().into_iter().map(|u| u.username).collect(),
            UsrsOption::OnlinePerms => self
                .sessions
                .read()
                .snapshot()
                .into_iter()
                .map(|u| format!("{}:{}", u.username, u.permission.as_u8()))
                .collect(),
        };

        let joined = lines.join("\n");
        self.reply(user.conn, Operation::Usrs, id, info, &[joined.as_bytes()]);
    }
}

