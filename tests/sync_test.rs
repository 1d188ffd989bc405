use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};

use contact_sync::client::{SyncClient, SyncError};
use contact_sync::common::codec::XorCodec;
use contact_sync::common::config::{Framing, WireConfig};
use contact_sync::common::connection::Connection;
use contact_sync::common::messages::Reply;
use contact_sync::contacts::{Contact, ContactBook, ContactStore};
use contact_sync::server::{ContactServer, StoreMode};

fn contact(name: &str, phone: &str) -> Contact {
    Contact::new(name, phone, format!("{}@example.com", name.to_lowercase())).unwrap()
}

fn remote_seed() -> ContactBook {
    ContactBook::from_contacts([contact("Alice", "555-0100"), contact("Bob", "555-0101")])
}

async fn start_server(seed: ContactBook, wire: WireConfig) -> (ContactServer, String) {
    let mut server = ContactServer::new("127.0.0.1:0".parse().unwrap())
        .with_seed(seed)
        .with_wire(wire);
    let addr = server.start().await.unwrap();
    (server, addr.to_string())
}

#[tokio::test]
async fn test_sync_replaces_local_store_wholesale() {
    let (mut server, addr) = start_server(remote_seed(), WireConfig::default()).await;

    let mut local = ContactBook::from_contacts([
        contact("Carol", "1"),
        contact("Dave", "2"),
        contact("Alice", "old-number"),
    ]);

    let client = SyncClient::new(&WireConfig::default()).unwrap();
    let count = client.sync_contacts(&addr, &mut local).await.unwrap();

    assert_eq!(count, 2);
    assert_eq!(local, remote_seed());

    server.stop().await;
}

#[tokio::test]
async fn test_sync_with_empty_remote_clears_local() {
    let (mut server, addr) = start_server(ContactBook::new(), WireConfig::default()).await;

    let mut local = ContactBook::from_contacts([contact("Carol", "1")]);
    let client = SyncClient::new(&WireConfig::default()).unwrap();
    assert_eq!(client.sync_contacts(&addr, &mut local).await.unwrap(), 0);
    assert!(local.is_empty());

    server.stop().await;
}

#[tokio::test]
async fn test_sync_over_legacy_framing() {
    let wire = WireConfig {
        framing: Framing::Legacy,
        ..WireConfig::default()
    };
    let (mut server, addr) = start_server(remote_seed(), wire.clone()).await;

    let mut local = ContactBook::new();
    let client = SyncClient::new(&wire).unwrap();
    client.sync_contacts(&addr, &mut local).await.unwrap();
    assert_eq!(local, remote_seed());

    server.stop().await;
}

#[tokio::test]
async fn test_sync_with_custom_key() {
    let wire = WireConfig {
        key: "another shared secret".to_string(),
        ..WireConfig::default()
    };
    let (mut server, addr) = start_server(remote_seed(), wire.clone()).await;

    let mut local = ContactBook::new();
    SyncClient::new(&wire)
        .unwrap()
        .sync_contacts(&addr, &mut local)
        .await
        .unwrap();
    assert_eq!(local.len(), 2);

    server.stop().await;
}

#[tokio::test]
async fn test_mismatched_key_fails_without_touching_local() {
    let (mut server, addr) = start_server(remote_seed(), WireConfig::default()).await;

    let wrong = WireConfig {
        key: "wrong".to_string(),
        ..WireConfig::default()
    };
    let mut local = ContactBook::from_contacts([contact("Carol", "1")]);
    let before = local.clone();

    let result = SyncClient::new(&wrong)
        .unwrap()
        .sync_contacts(&addr, &mut local)
        .await;

    assert!(result.is_err());
    assert_eq!(local, before);

    server.stop().await;
}

#[tokio::test]
async fn test_connect_failure_leaves_local_untouched() {
    // Grab a free port, then release it so nothing listens there
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let mut local = ContactBook::from_contacts([contact("Carol", "1")]);
    let before = local.clone();

    let client = SyncClient::new(&WireConfig::default()).unwrap();
    assert!(client
        .sync_contacts(&addr.to_string(), &mut local)
        .await
        .is_err());
    assert_eq!(local, before);
}

/// Peer that answers every message with `reply` and then hangs up.
async fn spawn_fake_server(reply: &'static str) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (socket, _) = listener.accept().await.unwrap();
        let mut conn = Connection::new(socket, XorCodec::default(), Framing::Framed);
        if conn.read_message().await.unwrap().is_some() {
            conn.write_message(reply).await.unwrap();
        }
    });
    addr
}

#[tokio::test]
async fn test_unexpected_handshake_reply_aborts_sync() {
    let addr = spawn_fake_server("NOT_READY").await;

    let mut local = ContactBook::from_contacts([contact("Carol", "1")]);
    let before = local.clone();

    let err = SyncClient::new(&WireConfig::default())
        .unwrap()
        .sync_contacts(&addr.to_string(), &mut local)
        .await
        .unwrap_err();

    assert!(matches!(
        err.downcast_ref::<SyncError>(),
        Some(SyncError::UnexpectedReply { request: "SYNC:", .. })
    ));
    assert_eq!(local, before);
}

#[tokio::test]
async fn test_peer_hanging_up_after_handshake_aborts_sync() {
    // Answers SYNC: correctly, then closes before GET_CONTACTS is answered
    let addr = spawn_fake_server("SYNC_READY").await;

    let mut local = ContactBook::from_contacts([contact("Carol", "1")]);
    let before = local.clone();

    // Depending on timing this surfaces as a closed stream or a reset
    let result = SyncClient::new(&WireConfig::default())
        .unwrap()
        .sync_contacts(&addr.to_string(), &mut local)
        .await;

    assert!(result.is_err());
    assert_eq!(local, before);
}

#[tokio::test]
async fn test_listing_too_large_aborts_sync() {
    let seed = ContactBook::from_contacts((0..700).map(|i| {
        Contact::new(
            format!("{:0>49}", i),
            "5".repeat(19),
            format!("{:e>49}", i),
        )
        .unwrap()
    }));
    let (mut server, addr) = start_server(seed, WireConfig::default()).await;

    let mut local = ContactBook::from_contacts([contact("Carol", "1")]);
    let before = local.clone();

    let err = SyncClient::new(&WireConfig::default())
        .unwrap()
        .sync_contacts(&addr, &mut local)
        .await
        .unwrap_err();

    assert!(matches!(
        err.downcast_ref::<SyncError>(),
        Some(SyncError::UnexpectedReply { request: "GET_CONTACTS", .. })
    ));
    assert_eq!(local, before);

    server.stop().await;
}

#[tokio::test]
async fn test_added_contact_is_private_to_its_session() {
    let (mut server, addr) = start_server(remote_seed(), WireConfig::default()).await;
    let client = SyncClient::new(&WireConfig::default()).unwrap();

    let reply = client
        .add_contact(&addr, &contact("Carol", "555-0102"))
        .await
        .unwrap();
    assert_eq!(reply, Reply::ContactAdded("Carol".to_string()));

    // The add happened on a connection that has since closed
    let remote = client.fetch_contacts(&addr).await.unwrap();
    assert_eq!(remote, remote_seed().enumerate());

    server.stop().await;
}

#[tokio::test]
async fn test_shared_store_keeps_additions_across_sessions() {
    let mut server = ContactServer::new("127.0.0.1:0".parse().unwrap())
        .with_seed(remote_seed())
        .with_store_mode(StoreMode::Shared);
    let addr = server.start().await.unwrap().to_string();
    let client = SyncClient::new(&WireConfig::default()).unwrap();

    client
        .add_contact(&addr, &contact("Carol", "555-0102"))
        .await
        .unwrap();

    let mut local = ContactBook::new();
    assert_eq!(client.sync_contacts(&addr, &mut local).await.unwrap(), 3);
    assert!(local.find_by_name("Carol").is_some());

    let final_book = server.stop().await.unwrap();
    assert_eq!(final_book, local);
}

#[tokio::test]
async fn test_add_contact_rejects_unsendable_contact() {
    let client = SyncClient::new(&WireConfig::default()).unwrap();
    let bad = Contact {
        name: "Eve|Mallory".to_string(),
        phone: "1".to_string(),
        email: "eve@example.com".to_string(),
    };

    // Validation fails before any connection is attempted
    let err = client.add_contact("127.0.0.1:1", &bad).await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<SyncError>(),
        Some(SyncError::InvalidContact(_))
    ));
}

#[tokio::test]
async fn test_raw_command_round_trip() {
    let (mut server, addr) = start_server(ContactBook::new(), WireConfig::default()).await;
    let client = SyncClient::new(&WireConfig::default()).unwrap();

    assert_eq!(
        client.send_command(&addr, "HELLO").await.unwrap(),
        "Unknown command"
    );
    assert_eq!(
        client.send_command(&addr, "ADD_CONTACT:bad").await.unwrap(),
        "Invalid contact format"
    );

    server.stop().await;
}

#[tokio::test]
async fn test_sync_opens_and_closes_one_connection() {
    let (mut server, addr) = start_server(remote_seed(), WireConfig::default()).await;
    let client = SyncClient::new(&WireConfig::default()).unwrap();

    let mut local = ContactBook::new();
    client.sync_contacts(&addr, &mut local).await.unwrap();

    // The session notices the close and unregisters shortly after
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while server.connection_count() > 0 && tokio::time::Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(server.connection_count(), 0);

    // Still accepting afterwards
    assert!(TcpStream::connect(&addr).await.is_ok());

    server.stop().await;
}
