//! Protocol lookup tables: operation codes, error codes, admin subops,
//! event hooks, and the per-operation argument-count/direction minima.

use num_enum::{IntoPrimitive, TryFromPrimitive};

pub const PROTOCOL_VERSION: u8 = 1;
pub const HEADER_LEN: usize = 8;
pub const SEPARATOR: [u8; 2] = [b'\r', b'\n'];
pub const MAX_ARGS: usize = 15;
pub const MAX_ARG_LEN: usize = 2047;
pub const MAX_PAYLOAD_LEN: usize = 16383;
pub const MAX_ID: u16 = 1023;
pub const NULL_ID: u16 = 0;
pub const INFO_EMPTY: u8 = 0xFF;
pub const USERNAME_MAX_LEN: usize = 32;

/// Operation codes carried in the packet header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum Operation {
    Ok = 0x01,
    Err = 0x02,
    Keep = 0x03,
    Reg = 0x04,
    Dereg = 0x05,
    Login = 0x06,
    Logout = 0x07,
    Verif = 0x08,
    Req = 0x09,
    Usrs = 0x0A,
    Msg = 0x0B,
    Reciv = 0x0C,
    Shtdwn = 0x0D,
    Admin = 0x0E,
    Sub = 0x0F,
    Unsub = 0x10,
    Hook = 0x11,
    Hello = 0x12,
}

impl Operation {
    /// The minimum argument count the server accepts for this op, or `None`
    /// if the server never accepts this op inbound (it is server-initiated
    /// only).
    pub const fn server_min_args(self) -> Option<u8> {
        use Operation::*;
        match self {
            Ok | Err | Shtdwn | Hook | Hello => None,
            Keep | Dereg | Logout | Usrs | Admin | Sub | Unsub | Reciv => Some(0),
            Login => Some(1),
            Req => Some(1),
            Reg | Verif => Some(2),
            Msg => Some(3),
        }
    }

    /// The minimum argument count a client must accept for this op, or
    /// `None` if the client never receives this op (it is client-initiated
    /// only, i.e. the server never sends it).
    pub const fn client_min_args(self) -> Option<u8> {
        use Operation::*;
        match self {
            Keep | Reg | Dereg | Login | Logout | Msg | Admin | Sub | Unsub => None,
            Ok | Err | Shtdwn | Hook => Some(0),
            Verif => Some(1),
            Hello => Some(1),
            Usrs => Some(1),
            Req => Some(3),
            Reciv => Some(3),
        }
    }

    /// Whether a packet carrying this op may use the null id (0). Per the
    /// protocol, the null id is reserved for server-initiated packets.
    pub const fn allows_null_id(self) -> bool {
        matches!(
            self,
            Operation::Shtdwn | Operation::Reciv | Operation::Hook | Operation::Hello | Operation::Err
        )
    }

    /// Whether the info byte carries semantic meaning for this op that must
    /// not be left at the "empty" sentinel.
    pub const fn requires_info(self) -> bool {
        matches!(
            self,
            Operation::Usrs | Operation::Admin | Operation::Err | Operation::Sub | Operation::Unsub
        )
    }
}

/// The info byte of an `ERR` packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum ErrorCode {
    Undefined = 0x00,
    Invalid = 0x01,
    NotFound = 0x02,
    Version = 0x03,
    Handshake = 0x04,
    Arguments = 0x05,
    MaxSize = 0x06,
    Header = 0x07,
    NoSession = 0x08,
    Login = 0x09,
    Connection = 0x0A,
    Empty = 0x0B,
    Packet = 0x0C,
    Privileges = 0x0D,
    Server = 0x0E,
    Idle = 0x0F,
    Exists = 0x10,
    Deregistered = 0x11,
    DupSession = 0x12,
    Unsecure = 0x13,
    Corrupted = 0x14,
    Option = 0x15,
    Disconnected = 0x16,
}

/// The info byte of an `ADMIN` packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum AdminSubop {
    Shutdown = 0x00,
    Deregister = 0x01,
    Broadcast = 0x02,
    ChangePerms = 0x03,
    Disconnect = 0x04,
    Motd = 0x05,
}

impl AdminSubop {
    /// Number of arguments the subop requires after the `ADMIN` header.
    pub const fn required_args(self) -> u8 {
        match self {
            Self::Shutdown => 1,
            Self::Deregister => 1,
            Self::Broadcast => 1,
            Self::ChangePerms => 1,
            Self::Disconnect => 1,
            Self::Motd => 1,
        }
    }
}

/// The info byte of a `SUB`/`UNSUB`/`HOOK` packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum Hook {
    AllHooks = 0x00,
    NewLogin = 0x01,
    NewLogout = 0x02,
    DupSession = 0x03,
    PermsChange = 0x04,
}

impl Hook {
    pub const CONCRETE: [Hook; 4] = [Hook::NewLogin, Hook::NewLogout, Hook::DupSession, Hook::PermsChange];
}

/// The info byte of a `USRS` packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum UsrsOption {
    AllUsers = 0x00,
    Online = 0x01,
    AllPerms = 0x02,
    OnlinePerms = 0x03,
}
