//! Wire framing for the chatd binary protocol.
//!
//! A packet is a fixed 8-byte bit-packed header, a 2-byte CRLF separator,
//! and then `argument_count` length-implicit arguments each terminated by
//! CRLF. See [`header`] for the header layout and [`packet`] for the
//! encode/decode entry points.

pub mod error;
pub mod header;
pub mod packet;
pub mod tables;

pub use error::FramingError;
pub use header::Header;
pub use packet::{Command, client_check, decode_header, decode_payload, encode, server_check};
pub use tables::*;
