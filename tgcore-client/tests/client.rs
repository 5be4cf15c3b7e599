//! `Client` wiring between storage and session.

mod common;

use std::sync::Arc;

use tgcore_client::storage::{MemoryStorage, PeerRecord, PeerType, SessionData};
use tgcore_client::{Client, InvocationError, Storage, StorageError};
use tgcore_tl::{enums, types};

#[tokio::test]
async fn missing_auth_key_is_reported() {
    let (connector, _dc) = common::mock_dc();
    let storage = Arc::new(MemoryStorage::new());
    let err = Client::start(common::config(connector), storage).await.err().unwrap();
    assert!(matches!(err, InvocationError::Storage(StorageError::NotAuthorized)));
}

#[tokio::test]
async fn start_records_the_session_and_resolves_peers() {
    let (connector, mut dc) = common::mock_dc();
    let storage = Arc::new(MemoryStorage::new());
    storage
        .save(&SessionData {
            dc_id: 2,
            auth_key: Some(common::auth_key()),
            user_id: Some(42),
            is_bot: Some(true),
            ..SessionData::default()
        })
        .unwrap();
    storage
        .update_peers(&[PeerRecord {
            id: 1001,
            access_hash: 77,
            peer_type: PeerType::User,
            username: Some("Someone".into()),
            phone_number: Some("15550100".into()),
        }])
        .unwrap();

    let server = tokio::spawn(async move {
        let mut conn = dc.accept().await;
        conn.handshake().await;
        (dc, conn)
    });
    let client = Client::start(common::config(connector), storage.clone()).await.unwrap();
    let (_dc, conn) = server.await.unwrap();

    let data = storage.load().unwrap();
    assert_eq!(data.api_id, Some(1));
    assert!(data.date > 0);

    let user = enums::InputPeer::User(types::InputPeerUser { user_id: 1001, access_hash: 77 });
    assert_eq!(client.resolve_peer(1001).unwrap(), user);
    assert_eq!(client.resolve_username("@someone").unwrap(), user);
    assert_eq!(client.resolve_phone_number("15550100").unwrap(), user);
    assert_eq!(
        client.resolve_peer(-300).unwrap(),
        enums::InputPeer::Chat(types::InputPeerChat { chat_id: 300 })
    );
    assert!(matches!(
        client.resolve_peer(-1_000_000_000_300),
        Err(InvocationError::Storage(StorageError::PeerNotFound(_)))
    ));

    let exported = client.export_session_string().unwrap();
    let imported = MemoryStorage::from_session_string(&exported).unwrap().load().unwrap();
    assert_eq!(imported.auth_key, Some(common::auth_key()));
    assert_eq!(imported.api_id, Some(1));

    client.stop().await.unwrap();
    drop(conn);
}
