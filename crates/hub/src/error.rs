use codec::ErrorCode;
use std::fmt;

/// Semantic errors: returned to the caller as `ERR(<code>, id=request-id)`.
/// Distinct from [`codec::FramingError`], which governs malformed packets
/// rather than well-formed requests the Hub declines to satisfy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SemanticError {
    NoSession,
    Login,
    Privileges,
    NotFound,
    Exists,
    Empty,
    DupSession,
    Deregistered,
    Unsecure,
    Corrupted,
    Option,
    Invalid,
    Handshake,
    Packet,
    Server,
    Arguments,
}

impl SemanticError {
    pub const fn code(self) -> ErrorCode {
        match self {
            Self::NoSession => ErrorCode::NoSession,
            Self::Login => ErrorCode::Login,
            Self::Privileges => ErrorCode::Privileges,
            Self::NotFound => ErrorCode::NotFound,
            Self::Exists => ErrorCode::Exists,
            Self::Empty => ErrorCode::Empty,
            Self::DupSession => ErrorCode::DupSession,
            Self::Deregistered => ErrorCode::Deregistered,
            Self::Unsecure => ErrorCode::Unsecure,
            Self::Corrupted => ErrorCode::Corrupted,
            Self::Option => ErrorCode::Option,
            Self::Invalid => ErrorCode::Invalid,
            Self::Handshake => ErrorCode::Handshake,
            Self::Packet => ErrorCode::Packet,
            Self::Server => ErrorCode::Server,
            Self::Arguments => ErrorCode::Arguments,
        }
    }
}

impl fmt::Display for SemanticError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl std::error::Error for SemanticError {}
