use crate::error::FramingError;
use crate::tables::{HEADER_LEN, PROTOCOL_VERSION, SEPARATOR};

/// The fixed 8-byte, bit-packed packet header.
///
/// ```text
/// version(4) | op(8) | info(8) | arg_count(4) | total_length(14) | id(10) | reserved(16)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub version: u8,
    pub operation: u8,
    pub info: u8,
    pub argument_count: u8,
    pub total_length: u16,
    pub id: u16,
    pub reserved: u16,
}

impl Header {
    /// Builds a header for a reply or request. `total_length` and
    /// `argument_count` should already reflect the encoded arguments; use
    /// [`crate::packet::encode`] rather than calling this directly.
    pub fn new(operation: u8, id: u16, info: u8, argument_count: u8, total_length: u16) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            operation,
            info,
            argument_count,
            total_length,
            id,
            reserved: 0,
        }
    }

    pub fn encode(&self) -> [u8; HEADER_LEN] {
        let packed: u64 = (self.version as u64 & 0xF) << 60
            | (self.operation as u64) << 52
            | (self.info as u64) << 44
            | (self.argument_count as u64 & 0xF) << 40
            | (self.total_length as u64 & 0x3FFF) << 26
            | (self.id as u64 & 0x3FF) << 16
            | (self.reserved as u64);

        packed.to_be_bytes()[0..HEADER_LEN].try_into().unwrap()
    }

    /// Decodes the 8-byte header plus its trailing CRLF separator from a
    /// 10-byte buffer. Does not validate direction-specific invariants
    /// (argument minima, null-id rules, info sentinel) — that is
    /// [`crate::packet::server_check`]'s job.
    pub fn decode(bytes: &[u8]) -> Result<Self, FramingError> {
        if bytes.len() < HEADER_LEN + SEPARATOR.len() {
            return Err(FramingError::Header);
        }

        if bytes[HEADER_LEN..HEADER_LEN + SEPARATOR.len()] != SEPARATOR {
            return Err(FramingError::Header);
        }

        let mut buf = [0u8; 8];
        buf.copy_from_slice(&bytes[..HEADER_LEN]);
        let packed = u64::from_be_bytes(buf);

        let version = ((packed >> 60) & 0xF) as u8;
        let operation = ((packed >> 52) & 0xFF) as u8;
        let info = ((packed >> 44) & 0xFF) as u8;
        let argument_count = ((packed >> 40) & 0xF) as u8;
        let total_length = ((packed >> 26) & 0x3FFF) as u16;
        let id = ((packed >> 16) & 0x3FF) as u16;
        let reserved = (packed & 0xFFFF) as u16;

        if version != PROTOCOL_VERSION {
            return Err(FramingError::Version);
        }

        Ok(Self {
            version,
            operation,
            info,
            argument_count,
            total_length,
            id,
            reserved,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_all_fields() {
        let header = Header::new(0x0B, 517, 0x00, 3, 42);
        let mut bytes = header.encode().to_vec();
        bytes.extend_from_slice(&SEPARATOR);
        let decoded = Header::decode(&bytes).unwrap();
        assert_eq!(decoded, header);
    }

    #[test]
    fn rejects_bad_version() {
        let mut header = Header::new(0x0B, 1, 0x00, 0, 0);
        header.version = 7;
        let mut bytes = header.encode().to_vec();
        // Overwrite the top nibble directly since encode() clamps to the real field.
        bytes[0] = (7 << 4) | (bytes[0] & 0x0F);
        bytes.extend_from_slice(&SEPARATOR);
        assert_eq!(Header::decode(&bytes), Err(FramingError::Version));
    }

    #[test]
    fn rejects_missing_separator() {
        let header = Header::new(0x01, 1, 0x00, 0, 0);
        let mut bytes = header.encode().to_vec();
        bytes.extend_from_slice(b"XX");
        assert_eq!(Header::decode(&bytes), Err(FramingError::Header));
    }
}
