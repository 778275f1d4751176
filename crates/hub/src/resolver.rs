//! The session resolver: the login state machine run on every request
//! before dispatch.

use crate::connection::ConnId;
use crate::crypto::parse_public_key_pem;
use crate::error::SemanticError;
use crate::hub::Hub;
use crate::persistence::Persistence;
use crate::user::{Permission, User};
use codec::Operation;

impl<P: Persistence> Hub<P> {
    /// Resolves the `User` a request should be dispatched with, running a
    /// four-state machine: cached session, DB lookup, fresh registration, or
    /// no session. `REG` always resolves to a blank user (conn attached,
    /// nothing else filled in); its handler fills the rest and inserts it.
    pub async fn resolve(
        &self,
        conn: ConnId,
        secure: bool,
        operation: Operation,
        arguments: &[Vec<u8>],
    ) -> Result<User, SemanticError> {
        // 1. Cached: an existing live session, unless this op must traverse
        // the DB/fresh-record path regardless.
        if !matches!(operation, Operation::Reg | Operation::Login | Operation::Verif) {
            if let Some(user) = self.sessions.read().get(&conn).cloned() {
                return Ok(user);
            }
        }

        // 2. DB lookup: only for LOGIN/VERIF.
        if matches!(operation, Operation::Login | Operation::Verif) {
            let username = String::from_utf8_lossy(&arguments[0]).into_owned();

            let Some(row) = self.persistence.query_user(&username).await else {
                return Err(if operation == Operation::Login { SemanticError::NotFound } else { SemanticError::NoSession });
            };

            let Some(pem) = row.public_key_pem.as_deref() else {
                return Err(SemanticError::Deregistered);
            };

            let public_key = parse_public_key_pem(pem).map_err(|_| SemanticError::Corrupted)?;
            let permission = row.permission;

            if operation == Operation::Login && self.usernames.read().contains_key(&username) {
                return Err(SemanticError::DupSession);
            }

            return Ok(User {
                conn,
                secure,
                username,
                permission,
                public_key: Some(public_key),
            });
        }

        // 3. Fresh record: only for REG.
        if operation == Operation::Reg {
            return Ok(User {
                conn,
                secure,
                username: String::new(),
                permission: Permission::User,
                public_key: None,
            });
        }

        // 4. Otherwise, no session and this isn't a handshake op.
        Err(SemanticError::NoSession)
    }
}
