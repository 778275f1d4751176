use crate::error::FramingError;
use crate::header::Header;
use crate::tables::{HEADER_LEN, MAX_ARGS, MAX_ARG_LEN, MAX_ID, MAX_PAYLOAD_LEN, NULL_ID, Operation, SEPARATOR};

/// A fully parsed, validated packet: the header plus its ordered arguments.
///
/// Invariant: `arguments.len() == header.argument_count as usize` and the
/// sum of `(arg.len() + 2)` over `arguments` equals `header.total_length`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub header: Header,
    pub arguments: Vec<Vec<u8>>,
}

/// Encodes a packet: 8-byte header, CRLF separator, then each argument
/// followed by its own CRLF.
pub fn encode(operation: u8, id: u16, info: u8, args: &[&[u8]]) -> Result<Vec<u8>, FramingError> {
    if args.len() > MAX_ARGS {
        return Err(FramingError::Arguments);
    }

    if id > MAX_ID {
        return Err(FramingError::Arguments);
    }

    let mut total_length: usize = 0;
    for arg in args {
        if arg.len() > MAX_ARG_LEN {
            return Err(FramingError::MaxSize);
        }
        total_length += arg.len() + SEPARATOR.len();
    }

    if total_length > MAX_PAYLOAD_LEN {
        return Err(FramingError::MaxSize);
    }

    let header = Header::new(operation, id, info, args.len() as u8, total_length as u16);

    let mut out = Vec::with_capacity(HEADER_LEN + SEPARATOR.len() + total_length);
    out.extend_from_slice(&header.encode());
    out.extend_from_slice(&SEPARATOR);
    for arg in args {
        out.extend_from_slice(arg);
        out.extend_from_slice(&SEPARATOR);
    }

    Ok(out)
}

/// Decodes just the header (plus its CRLF separator) from the first 10
/// bytes of a packet. The caller is expected to then read exactly
/// `header.total_length` further bytes and pass them to [`decode_payload`].
pub fn decode_header(bytes: &[u8]) -> Result<Header, FramingError> {
    Header::decode(bytes)
}

/// Decodes the payload arguments given the header that preceded them.
/// `bytes` must be exactly `header.total_length` bytes.
pub fn decode_payload(bytes: &[u8], header: &Header) -> Result<Vec<Vec<u8>>, FramingError> {
    if bytes.len() != header.total_length as usize {
        return Err(FramingError::MaxSize);
    }

    let mut arguments = Vec::with_capacity(header.argument_count as usize);
    let mut rest = bytes;

    while !rest.is_empty() {
        let pos = rest
            .windows(SEPARATOR.len())
            .position(|w| w == SEPARATOR)
            .ok_or(FramingError::Arguments)?;

        let (arg, tail) = rest.split_at(pos);
        if arg.len() > MAX_ARG_LEN {
            return Err(FramingError::MaxSize);
        }

        arguments.push(arg.to_vec());
        rest = &tail[SEPARATOR.len()..];
    }

    if arguments.len() != header.argument_count as usize {
        return Err(FramingError::Arguments);
    }

    let recomputed: usize = arguments.iter().map(|a| a.len() + SEPARATOR.len()).sum();
    if recomputed != header.total_length as usize {
        return Err(FramingError::MaxSize);
    }

    Ok(arguments)
}

/// Server-direction header validation (§4.2 `ServerCheck`): version
/// already checked by [`Header::decode`]; here we check that the op is one
/// the server accepts inbound, that ops requiring a meaningful info byte
/// don't carry the empty sentinel, that the id is non-null, and that the
/// argument count meets the op's server minimum.
pub fn server_check(header: &Header) -> Result<Operation, FramingError> {
    let operation = Operation::try_from(header.operation).map_err(|_| FramingError::Header)?;

    let min_args = operation.server_min_args().ok_or(FramingError::Header)?;

    if operation.requires_info() && header.info == crate::tables::INFO_EMPTY {
        return Err(FramingError::Header);
    }

    if header.id == NULL_ID {
        return Err(FramingError::Header);
    }

    if header.argument_count < min_args {
        return Err(FramingError::Arguments);
    }

    Ok(operation)
}

/// Client-direction header validation: the mirror of [`server_check`], used
/// by clients (and by tests asserting the server only emits well-formed
/// packets) to validate packets received from the server.
pub fn client_check(header: &Header) -> Result<Operation, FramingError> {
    let operation = Operation::try_from(header.operation).map_err(|_| FramingError::Header)?;

    let min_args = operation.client_min_args().ok_or(FramingError::Header)?;

    if header.id == NULL_ID && !operation.allows_null_id() {
        return Err(FramingError::Header);
    }

    if header.argument_count < min_args {
        return Err(FramingError::Arguments);
    }

    Ok(operation)
}
