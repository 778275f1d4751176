use crate::connection::ConnId;
use codec::USERNAME_MAX_LEN;
use rsa::RsaPublicKey;

/// A user's permission level. Declaration order matters: `Ord` is derived
/// and admin-subop checks compare against it directly (`perm >= Admin`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Permission {
    User,
    Admin,
    Owner,
}

impl Permission {
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::User),
            1 => Some(Self::Admin),
            2 => Some(Self::Owner),
            _ => None,
        }
    }

    pub const fn as_u8(self) -> u8 {
        match self {
            Self::User => 0,
            Self::Admin => 1,
            Self::Owner => 2,
        }
    }
}

/// Checks the username grammar (`^[0-9a-z]{0,32}$`).
pub fn is_valid_username(name: &str) -> bool {
    name.len() <= USERNAME_MAX_LEN && name.bytes().all(|b| b.is_ascii_digit() || b.is_ascii_lowercase())
}

/// A session-level user: who is speaking on a given connection, and with
/// what rights. Created by the Hub on successful handshake, destroyed on
/// [`crate::hub::Hub::cleanup`]. Owned by whichever handler currently holds
/// it — the reader-per-connection invariant means no two handlers ever touch
/// the same `User` concurrently.
#[derive(Debug, Clone)]
pub struct User {
    pub conn: ConnId,
    pub secure: bool,
    pub username: String,
    pub permission: Permission,
    /// `None` only for the transient blank record the resolver hands REG's
    /// handler before it has parsed and validated the submitted key.
    pub public_key: Option<RsaPublicKey>,
}

/// A row from the persistence layer: `id, username (unique), nullable PEM
/// public key, permission`. A `None` public key means "deregistered but
/// messages retained".
#[derive(Debug, Clone)]
pub struct PersistentUser {
    pub id: u64,
    pub username: String,
    pub public_key_pem: Option<String>,
    pub permission: Permission,
}

/// A message queued for an offline destination. A fully relational backend
/// would key this by `sender-id, destination-id` and join against
/// `PersistentUser::id`, but the `Persistence` boundary exposes usernames
/// directly since that's all the Hub ever needs, sparing it a reverse
/// id-to-username lookup the rest of the trait has no other reason to
/// provide.
#[derive(Debug, Clone)]
pub struct PersistentMessage {
    pub sender: String,
    pub ciphertext: Vec<u8>,
    pub timestamp: u64,
}
