use crate::config::Config;
use crate::persistence::MemoryPersistence;

use std::sync::Arc;

use hub::connection::{ConnHandle, read_command};
use hub::{Hub, Request};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// Starts the TCP accept loop and spawns one reader/writer task pair per
/// connection.
///
/// TLS termination is an external collaborator; this reference listener
/// accepts plain TCP and always reports `secure=false`. A deployment that
/// terminates TLS in front of `chatd` (or wraps the accepted socket before
/// calling this function) is expected to flip that.
pub async fn run(config: Arc<Config>, hub: Arc<Hub<MemoryPersistence>>) -> anyhow::Result<()> {
    let listener = TcpListener::bind(config.server.listen).await?;
    log::info!("chatd listening: addr={}", config.server.listen);

    loop {
        let (socket, addr) = tokio::select! {
            accepted = listener.accept() => accepted?,
            _ = hub.wait() => break,
        };

        let permit = hub.admission().inc().await;

        if let Err(err) = socket.set_nodelay(true) {
            log::warn!("tcp socket set nodelay failed: addr={addr}, err={err}");
        }

        let hub = hub.clone();
        let read_timeout = hub.options().read_timeout;
        let (mut reader, mut writer) = socket.into_split();
        let (handle, mut outbox, close) = ConnHandle::new(false);
        let conn = handle.id;
        hub.register_connection(handle);

        // Drains frames the Hub (or this connection's own reader) queues
        // for this socket.
        tokio::spawn(async move {
            while let Some(frame) = outbox.recv().await {
                if writer.write_all(&frame).await.is_err() {
                    break;
                }
            }
            let _ = writer.shutdown().await;
        });

        tokio::spawn(async move {
            let _permit = permit;

            log::info!("connection accepted: addr={addr}");

            loop {
                let outcome = tokio::select! {
                    outcome = read_command(&mut reader, read_timeout) => outcome,
                    _ = close.notified() => break,
                };

                match outcome {
                    hub::connection::ReadOutcome::Command(command) => {
                        hub.dispatch(Request { conn, secure: false, command }).await;
                    }
                    hub::connection::ReadOutcome::Framing(err, id) => {
                        hub.reply_framing_error(conn, id, err);
                    }
                    hub::connection::ReadOutcome::Idle => {
                        log::info!("connection idle, closing: addr={addr}");
                        break;
                    }
                    hub::connection::ReadOutcome::Connection => break,
                }
            }

            hub.cleanup(conn);
            log::info!("connection closed: addr={addr}");
        });
    }

    Ok(())
}
