//! The per-connection identity and outbound handle, plus the blocking
//! two-step read loop. A [`ConnId`] stands in for "the connection handle" as
//! a first-class, hashable identity, since a live socket can't be keyed into
//! a table directly.

use codec::{Command, FramingError, HEADER_LEN, SEPARATOR, decode_header, decode_payload, server_check};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::{Notify, mpsc};
use tokio::time::timeout;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnId(u64);

impl ConnId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// A handle the Hub and its handlers use to reach a connection from any
/// task: an outbox for frames to be written, and a close signal for the
/// owning reader/writer pair to tear down (used by admin `Disconnect` and by
/// shutdown).
#[derive(Clone)]
pub struct ConnHandle {
    pub id: ConnId,
    pub secure: bool,
    outbox: mpsc::UnboundedSender<Vec<u8>>,
    close: Arc<Notify>,
}

impl ConnHandle {
    pub fn new(secure: bool) -> (Self, mpsc::UnboundedReceiver<Vec<u8>>, Arc<Notify>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let close = Arc::new(Notify::new());
        (
            Self {
                id: ConnId::next(),
                secure,
                outbox: tx,
                close: close.clone(),
            },
            rx,
            close,
        )
    }

    /// Queues a frame for the connection's writer task. Best-effort: a
    /// closed outbox (the connection already tore down) is swallowed, not
    /// propagated.
    pub fn send(&self, frame: Vec<u8>) -> bool {
        self.outbox.send(frame).is_ok()
    }

    /// Signals the owning reader/writer pair to close. Idempotent.
    pub fn close(&self) {
        self.close.notify_one();
    }
}

/// The result of one blocking read cycle on a connection's transport.
#[derive(Debug)]
pub enum ReadOutcome {
    Command(Command),
    /// Read deadline exceeded (`ReadTimeout`); the reader should exit.
    Idle,
    /// Any other I/O failure; the reader should exit.
    Connection,
    /// The packet was malformed or failed `ServerCheck`. `id` is the
    /// offending packet's id when known, for the `ERR` reply.
    Framing(FramingError, Option<u16>),
}

/// Reads exactly one packet: header + CRLF, then exactly `total_length`
/// payload bytes — a two-step blocking read. `ServerCheck` runs on the
/// header before the payload is interpreted, but the payload bytes are
/// always drained first so a rejected packet doesn't desynchronise the byte
/// stream for the next one.
pub async fn read_command<R: AsyncRead + Unpin>(reader: &mut R, read_timeout: Duration) -> ReadOutcome {
    let mut header_bytes = [0u8; HEADER_LEN + SEPARATOR.len()];
    match timeout(read_timeout, reader.read_exact(&mut header_bytes)).await {
        Err(_) => return ReadOutcome::Idle,
        Ok(Err(_)) => return ReadOutcome::Connection,
        Ok(Ok(_)) => {}
    }

    let header = match decode_header(&header_bytes) {
        Ok(header) => header,
        Err(err) => return ReadOutcome::Framing(err, None),
    };

    let check = server_check(&header);

    let mut payload = vec![0u8; header.total_length as usize];
    match timeout(read_timeout, reader.read_exact(&mut payload)).await {
        Err(_) => return ReadOutcome::Idle,
        Ok(Err(_)) => return ReadOutcome::Connection,
        Ok(Ok(_)) => {}
    }

    if let Err(err) = check {
        return ReadOutcome::Framing(err, Some(header.id));
    }

    match decode_payload(&payload, &header) {
        Ok(arguments) => ReadOutcome::Command(Command { header, arguments }),
        Err(err) => ReadOutcome::Framing(err, Some(header.id)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use codec::Operation;
    use std::time::Duration;
    use tokio::io::AsyncWriteExt;

    const TIMEOUT: Duration = Duration::from_secs(1);

    #[test]
    fn conn_ids_are_distinct() {
        let (a, ..) = ConnHandle::new(false);
        let (b, ..) = ConnHandle::new(false);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn send_after_receiver_dropped_is_best_effort() {
        let (handle, rx, _close) = ConnHandle::new(false);
        drop(rx);
        assert!(!handle.send(b"frame".to_vec()));
    }

    #[tokio::test]
    async fn reads_a_well_formed_command() {
        let (mut client, mut server) = tokio::io::duplex(256);
        let frame = codec::encode(Operation::Msg as u8, 3, codec::INFO_EMPTY, &[b"bob", b"ciphertext"]).unwrap();

        client.write_all(&frame).await.unwrap();

        match read_command(&mut server, TIMEOUT).await {
            ReadOutcome::Command(command) => {
                assert_eq!(command.header.operation, Operation::Msg as u8);
                assert_eq!(command.arguments, vec![b"bob".to_vec(), b"ciphertext".to_vec()]);
            }
            _ => panic!("expected a decoded command"),
        }
    }

    #[tokio::test]
    async fn reports_idle_on_read_timeout() {
        let (_client, mut server) = tokio::io::duplex(256);
        match read_command(&mut server, Duration::from_millis(20)).await {
            ReadOutcome::Idle => {}
            _ => panic!("expected Idle on a timed-out read"),
        }
    }

    #[tokio::test]
    async fn reports_connection_on_early_eof() {
        let (client, mut server) = tokio::io::duplex(256);
        drop(client);
        match read_command(&mut server, TIMEOUT).await {
            ReadOutcome::Connection => {}
            _ => panic!("expected Connection on early EOF"),
        }
    }

    #[tokio::test]
    async fn payload_is_drained_even_when_server_check_fails() {
        let (mut client, mut server) = tokio::io::duplex(256);
        // KEEP with a null id fails ServerCheck, but the payload must still
        // be fully drained so the next packet on the wire stays aligned.
        let bad = codec::encode(Operation::Keep as u8, 0, codec::INFO_EMPTY, &[]).unwrap();
        let good = codec::encode(Operation::Keep as u8, 9, codec::INFO_EMPTY, &[]).unwrap();

        client.write_all(&bad).await.unwrap();
        client.write_all(&good).await.unwrap();

        match read_command(&mut server, TIMEOUT).await {
            ReadOutcome::Framing(_, Some(id)) => assert_eq!(id, 0),
            other => panic!("expected a framing error, got a different outcome: {other:?}"),
        }

        match read_command(&mut server, TIMEOUT).await {
            ReadOutcome::Command(command) => assert_eq!(command.header.id, 9),
            _ => panic!("expected the following packet to decode cleanly"),
        }
    }
}
