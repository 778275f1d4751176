//! End-to-end scenarios driven straight through `Hub::dispatch`, the same
//! entry point the accept loop in `src/server.rs` calls per frame. Each
//! connection is represented by the `(ConnHandle, outbox receiver)` pair the
//! Hub itself hands out; there's no real socket, so a scenario's assertions
//! read the outbox exactly the way a client would read its stream.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use chatd::persistence::MemoryPersistence;
use hub::connection::{ConnHandle, ConnId};
use hub::persistence::Persistence;
use hub::{Hub, HubOptions, Request};
use rsa::RsaPrivateKey;
use rsa::{Oaep, RsaPublicKey};
use sha2::Sha256;
use tokio::sync::mpsc::UnboundedReceiver;

fn options() -> HubOptions {
    HubOptions {
        max_clients: 16,
        login_timeout: Duration::from_secs(30),
        read_timeout: Duration::from_secs(60),
        token_expiration: Duration::from_secs(60),
    }
}

fn new_hub() -> Arc<Hub<MemoryPersistence>> {
    Hub::new(MemoryPersistence::new(), options())
}

fn new_conn(hub: &Arc<Hub<MemoryPersistence>>, secure: bool) -> (ConnId, UnboundedReceiver<Vec<u8>>) {
    let (handle, rx, _close) = ConnHandle::new(secure);
    let id = handle.id;
    hub.register_connection(handle);
    (id, rx)
}

async fn send(hub: &Arc<Hub<MemoryPersistence>>, conn: ConnId, secure: bool, op: codec::Operation, id: u16, info: u8, args: &[&[u8]]) {
    let frame = codec::encode(op as u8, id, info, args).unwrap();
    let header = codec::decode_header(&frame[..codec::HEADER_LEN + codec::SEPARATOR.len()]).unwrap();
    let payload = &frame[codec::HEADER_LEN + codec::SEPARATOR.len()..];
    let arguments = codec::decode_payload(payload, &header).unwrap();
    hub.dispatch(Request {
        conn,
        secure,
        command: codec::Command { header, arguments },
    })
    .await;
}

/// Reads the next frame off an outbox and decodes it, panicking if none
/// arrives within a second (these are all in-process async calls, so a
/// hang means a handler deadlocked or forgot to reply).
async fn recv(rx: &mut UnboundedReceiver<Vec<u8>>) -> (codec::Header, Vec<Vec<u8>>) {
    let frame = tokio::time::timeout(Duration::from_secs(1), rx.recv())
        .await
        .expect("a reply should arrive promptly")
        .expect("outbox should not be closed");

    let header = codec::decode_header(&frame[..codec::HEADER_LEN + codec::SEPARATOR.len()]).unwrap();
    let payload = &frame[codec::HEADER_LEN + codec::SEPARATOR.len()..];
    let arguments = codec::decode_payload(payload, &header).unwrap();
    (header, arguments)
}

fn assert_ok(header: &codec::Header, id: u16) {
    assert_eq!(header.operation, codec::Operation::Ok as u8);
    assert_eq!(header.id, id);
}

fn assert_err(header: &codec::Header, id: u16, code: codec::ErrorCode) {
    assert_eq!(header.operation, codec::Operation::Err as u8);
    assert_eq!(header.id, id);
    assert_eq!(header.info, code as u8);
}

struct Identity {
    private: RsaPrivateKey,
    public_pem: String,
}

fn new_identity() -> Identity {
    let private = RsaPrivateKey::new(&mut rand::rng(), 1024).expect("key generation");
    let public = RsaPublicKey::from(&private);
    let public_pem = hub::crypto::public_key_to_pem(&public).expect("encode pem");
    Identity { private, public_pem }
}

/// Drives REG, then LOGIN/VERIF, for a fresh identity on one connection.
/// Returns the conn/outbox plus the decrypted challenge, so a caller that
/// wants to exercise reusable-token LOGIN doesn't need to reach into the
/// Hub's private verification table.
async fn register_and_login(
    hub: &Arc<Hub<MemoryPersistence>>,
    username: &str,
    identity: &Identity,
    secure: bool,
) -> (ConnId, UnboundedReceiver<Vec<u8>>, Vec<u8>) {
    let (conn, mut rx) = new_conn(hub, secure);

    send(hub, conn, secure, codec::Operation::Reg, 1, codec::INFO_EMPTY, &[username.as_bytes(), identity.public_pem.as_bytes()]).await;
    assert_ok(&recv(&mut rx).await.0, 1);

    send(hub, conn, secure, codec::Operation::Login, 2, codec::INFO_EMPTY, &[username.as_bytes()]).await;
    let (header, args) = recv(&mut rx).await;
    assert_eq!(header.operation, codec::Operation::Verif as u8);
    let challenge = identity.private.decrypt(Oaep::new::<Sha256>(), &args[0]).expect("decrypt challenge");

    send(hub, conn, secure, codec::Operation::Verif, 3, codec::INFO_EMPTY, &[username.as_bytes(), &challenge]).await;
    assert_ok(&recv(&mut rx).await.0, 3);

    (conn, rx, challenge)
}

#[tokio::test]
async fn register_login_verify_logout() {
    let hub = new_hub();
    let identity = new_identity();
    let (conn, mut rx, _challenge) = register_and_login(&hub, "alice", &identity, false).await;

    send(&hub, conn, false, codec::Operation::Logout, 4, codec::INFO_EMPTY, &[]).await;
    assert_ok(&recv(&mut rx).await.0, 4);

    // The cached session is gone: a non-handshake op on the same connection
    // now has nothing to resolve against.
    send(&hub, conn, false, codec::Operation::Keep, 5, codec::INFO_EMPTY, &[]).await;
    assert_err(&recv(&mut rx).await.0, 5, codec::ErrorCode::NoSession);
}

#[tokio::test]
async fn token_reuse_requires_a_secure_transport() {
    let hub = new_hub();
    let identity = new_identity();
    let (conn, _rx, challenge) = register_and_login(&hub, "alice", &identity, true).await;

    // Simulate the original connection dropping: its reusable token is
    // re-anchored rather than discarded, and the username is no longer
    // "online" so a later LOGIN isn't rejected as a duplicate.
    hub.cleanup(conn);

    // A fresh connection, over an insecure transport, may not redeem the
    // token left behind by the first login.
    let (insecure_conn, mut insecure_rx) = new_conn(&hub, false);
    send(&hub, insecure_conn, false, codec::Operation::Login, 1, codec::INFO_EMPTY, &[b"alice", &challenge]).await;
    assert_err(&recv(&mut insecure_rx).await.0, 1, codec::ErrorCode::Unsecure);

    // The same token, over a secure transport, succeeds without a fresh
    // challenge round-trip.
    let (secure_conn, mut secure_rx) = new_conn(&hub, true);
    send(&hub, secure_conn, true, codec::Operation::Login, 2, codec::INFO_EMPTY, &[b"alice", &challenge]).await;
    assert_ok(&recv(&mut secure_rx).await.0, 2);
}

#[tokio::test]
async fn live_message_routes_directly_to_the_recipient() {
    let hub = new_hub();
    let alice_id = new_identity();
    let bob_id = new_identity();

    let (alice, mut alice_rx, _) = register_and_login(&hub, "alice", &alice_id, false).await;
    let (_bob, mut bob_rx, _) = register_and_login(&hub, "bob", &bob_id, false).await;

    send(&hub, alice, false, codec::Operation::Msg, 9, codec::INFO_EMPTY, &[b"bob", b"1700000000", b"ciphertext"]).await;

    assert_ok(&recv(&mut alice_rx).await.0, 9);

    let (header, args) = recv(&mut bob_rx).await;
    assert_eq!(header.operation, codec::Operation::Reciv as u8);
    assert_eq!(header.id, codec::NULL_ID);
    assert_eq!(args, vec![b"alice".to_vec(), b"1700000000".to_vec(), b"ciphertext".to_vec()]);
}

#[tokio::test]
async fn offline_message_is_queued_and_delivered_on_catch_up() {
    let hub = new_hub();
    let alice_id = new_identity();
    let bob_id = new_identity();

    let (alice, mut alice_rx, _) = register_and_login(&hub, "alice", &alice_id, false).await;

    // Bob registers but never logs in, so he has no live session while the
    // message arrives.
    let (bob_reg_conn, mut bob_reg_rx) = new_conn(&hub, false);
    send(&hub, bob_reg_conn, false, codec::Operation::Reg, 1, codec::INFO_EMPTY, &[b"bob", bob_id.public_pem.as_bytes()]).await;
    assert_ok(&recv(&mut bob_reg_rx).await.0, 1);

    send(&hub, alice, false, codec::Operation::Msg, 2, codec::INFO_EMPTY, &[b"bob", b"1700000001", b"offline-ciphertext"]).await;
    assert_ok(&recv(&mut alice_rx).await.0, 2);

    let (bob, mut bob_rx, _) = register_and_login(&hub, "bob", &bob_id, false).await;

    send(&hub, bob, false, codec::Operation::Reciv, 7, codec::INFO_EMPTY, &[]).await;
    assert_ok(&recv(&mut bob_rx).await.0, 7);

    let (catchup_header, catchup_args) = recv(&mut bob_rx).await;
    assert_eq!(catchup_header.operation, codec::Operation::Reciv as u8);
    assert_eq!(catchup_args, vec![b"alice".to_vec(), b"1700000001".to_vec(), b"offline-ciphertext".to_vec()]);

    // A second pull finds nothing left to deliver.
    send(&hub, bob, false, codec::Operation::Reciv, 8, codec::INFO_EMPTY, &[]).await;
    assert_err(&recv(&mut bob_rx).await.0, 8, codec::ErrorCode::Empty);
}

#[tokio::test]
async fn second_login_for_an_online_user_is_rejected_as_a_duplicate_session() {
    let hub = new_hub();
    let identity = new_identity();
    let (_conn, _rx, _challenge) = register_and_login(&hub, "alice", &identity, false).await;

    let (conn2, mut rx2) = new_conn(&hub, false);
    send(&hub, conn2, false, codec::Operation::Login, 1, codec::INFO_EMPTY, &[b"alice"]).await;
    assert_err(&recv(&mut rx2).await.0, 1, codec::ErrorCode::DupSession);
}

#[tokio::test]
async fn admin_shutdown_broadcasts_the_timestamp_to_every_live_session() {
    let hub = new_hub();
    let owner_identity = new_identity();
    let user_identity = new_identity();

    // Seed the owner account directly through persistence so it starts at
    // Owner rather than the default User permission REG would give it.
    hub.persistence()
        .insert_user("root", &owner_identity.public_pem, hub::user::Permission::Owner)
        .await
        .expect("seed owner account");

    let (owner, mut owner_rx) = new_conn(&hub, false);
    send(&hub, owner, false, codec::Operation::Login, 1, codec::INFO_EMPTY, &[b"root"]).await;
    let (header, args) = recv(&mut owner_rx).await;
    assert_eq!(header.operation, codec::Operation::Verif as u8);
    let challenge = owner_identity.private.decrypt(Oaep::new::<Sha256>(), &args[0]).expect("decrypt challenge");
    send(&hub, owner, false, codec::Operation::Verif, 2, codec::INFO_EMPTY, &[b"root", &challenge]).await;
    assert_ok(&recv(&mut owner_rx).await.0, 2);

    let (_user, mut user_rx, _) = register_and_login(&hub, "alice", &user_identity, false).await;

    let future = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_secs() + 3600;
    let timestamp = future.to_string();

    send(&hub, owner, false, codec::Operation::Admin, 3, codec::AdminSubop::Shutdown as u8, &[timestamp.as_bytes()]).await;

    let (shtdwn_header, shtdwn_args) = recv(&mut owner_rx).await;
    assert_eq!(shtdwn_header.operation, codec::Operation::Shtdwn as u8);
    assert_eq!(shtdwn_args, vec![timestamp.clone().into_bytes()]);

    let (shtdwn_header2, shtdwn_args2) = recv(&mut user_rx).await;
    assert_eq!(shtdwn_header2.operation, codec::Operation::Shtdwn as u8);
    assert_eq!(shtdwn_args2, vec![timestamp.into_bytes()]);

    assert_ok(&recv(&mut owner_rx).await.0, 3);
    assert!(!hub.is_shutting_down());
}

#[tokio::test]
async fn non_owner_cannot_shut_down_the_server() {
    let hub = new_hub();
    let identity = new_identity();
    let (conn, mut rx, _challenge) = register_and_login(&hub, "alice", &identity, false).await;

    let future = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_secs() + 3600;
    send(&hub, conn, false, codec::Operation::Admin, 5, codec::AdminSubop::Shutdown as u8, &[future.to_string().as_bytes()]).await;

    assert_err(&recv(&mut rx).await.0, 5, codec::ErrorCode::Privileges);
}

#[tokio::test]
async fn duplicate_hook_subscription_is_rejected() {
    let hub = new_hub();
    let identity = new_identity();
    let (conn, mut rx, _challenge) = register_and_login(&hub, "alice", &identity, false).await;

    send(&hub, conn, false, codec::Operation::Sub, 4, codec::Hook::NewLogin as u8, &[]).await;
    assert_ok(&recv(&mut rx).await.0, 4);

    send(&hub, conn, false, codec::Operation::Sub, 5, codec::Hook::NewLogin as u8, &[]).await;
    assert_err(&recv(&mut rx).await.0, 5, codec::ErrorCode::Exists);
}

#[tokio::test]
async fn trigger_shutdown_closes_connections_and_releases_wait() {
    let hub = new_hub();
    let identity = new_identity();
    let (_conn, _rx, _challenge) = register_and_login(&hub, "alice", &identity, false).await;

    let hub2 = hub.clone();
    let waiter = tokio::spawn(async move {
        hub2.wait().await;
    });

    hub.trigger_shutdown().await;

    tokio::time::timeout(Duration::from_secs(1), waiter).await.expect("wait() should resolve after shutdown").expect("task should not panic");
    assert!(hub.is_shutting_down());
}
