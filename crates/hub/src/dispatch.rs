//! The dispatcher: resolves the caller's session, then routes a validated
//! `Request` to its handler by operation code. A plain match on a fieldless
//! enum, rather than any runtime type machinery.

use crate::error::SemanticError;
use crate::hub::{Hub, Request};
use crate::persistence::Persistence;
use codec::Operation;
use log::warn;

impl<P: Persistence> Hub<P> {
    /// Entry point called once per command read off a connection. Commands
    /// on the same connection are dispatched serially by its reader task,
    /// preserving per-connection ordering; cross-connection dispatch runs
    /// concurrently.
    pub async fn dispatch(self: &std::sync::Arc<Self>, request: Request) {
        let Request { conn, secure, command } = request;
        let id = command.header.id;

        // server_check already ran in the connection reader; re-parsing the
        // operation here is cheap and keeps this module independent of that
        // detail.
        let Ok(operation) = Operation::try_from(command.header.operation) else {
            return self.reply_err(conn, id, SemanticError::Invalid);
        };

        let user = match self.resolve(conn, secure, operation, &command.arguments).await {
            Ok(user) => user,
            Err(err) => return self.reply_err(conn, id, err),
        };

        match operation {
            Operation::Keep => self.handle_keep(user, &command).await,
            Operation::Reg => self.handle_reg(user, &command).await,
            Operation::Dereg => self.handle_dereg(user, &command).await,
            Operation::Login => self.handle_login(user, &command).await,
            Operation::Logout => self.handle_logout(user, &command).await,
            Operation::Verif => self.handle_verif(user, &command).await,
            Operation::Req => self.handle_req(user, &command).await,
            Operation::Usrs => self.handle_usrs(user, &command).await,
            Operation::Msg => self.handle_msg(user, &command).await,
            Operation::Reciv => self.handle_reciv(user, &command).await,
            Operation::Admin => self.handle_admin(user, &command).await,
            Operation::Sub => self.handle_sub(user, &command).await,
            Operation::Unsub => self.handle_unsub(user, &command).await,
            // Ok, Err, Shtdwn, Hook, Hello are server-initiated only;
            // `server_min_args` is `None` for all of them, so `ServerCheck`
            // already rejected these before the reader produced a `Command`.
            Operation::Ok | Operation::Err | Operation::Shtdwn | Operation::Hook | Operation::Hello => {
                warn!("dispatch reached for server-only op {operation:?}, ServerCheck should have rejected it");
                self.reply_err(conn, id, SemanticError::Invalid);
            }
        }
    }
}
