//! End-to-end session behaviour against a scripted DC.

mod common;

use std::collections::HashMap;
use std::time::Duration;

use common::{Echo, SALT};
use tgcore_client::{InvocationError, InvokeOptions, SessionState, StopReason};
use tgcore_tl::Serializable;
use tokio::time::Instant;

fn nonce_bytes(nonce: i64) -> Vec<u8> {
    nonce.to_le_bytes().to_vec()
}

#[tokio::test]
async fn handshake_then_call() {
    let (connector, dc) = common::mock_dc();
    let (session, _dc, mut conn) = common::started(common::config(connector), dc).await;
    assert_eq!(session.state(), SessionState::Running);
    assert_eq!(session.server_config().map(|c| c.this_dc), Some(2));

    let server = tokio::spawn(async move {
        let req = conn.next_request().await.unwrap();
        assert_eq!(req.salt, SALT);
        let nonce = req.echo_nonce().unwrap();
        conn.reply(req.msg_id, nonce_bytes(nonce)).await;
        conn
    });
    let answer = session.invoke(&Echo { nonce: 77 }).await.unwrap();
    assert_eq!(answer.0, nonce_bytes(77));

    let conn = server.await.unwrap();
    session.stop().await;
    drop(conn);
    assert_eq!(session.state(), SessionState::Stopped(StopReason::Shutdown));
    assert!(matches!(session.invoke(&Echo { nonce: 1 }).await, Err(InvocationError::Dropped)));
}

#[tokio::test]
async fn bad_server_salt_is_resent_once_with_the_new_salt() {
    const NEW_SALT: i64 = 0x0bad_5a17;

    let (connector, dc) = common::mock_dc();
    let (session, _dc, mut conn) = common::started(common::config(connector), dc).await;

    let server = tokio::spawn(async move {
        let first = conn.next_request().await.unwrap();
        conn.bad_server_salt(&first, NEW_SALT).await;
        let second = conn.next_request().await.unwrap();
        conn.reply(second.msg_id, nonce_bytes(second.echo_nonce().unwrap())).await;
        (conn, first, second)
    });
    let answer = session.invoke(&Echo { nonce: 5 }).await.unwrap();
    assert_eq!(answer.0, nonce_bytes(5));

    let (conn, first, second) = server.await.unwrap();
    assert_eq!(first.salt, SALT);
    assert_eq!(second.salt, NEW_SALT);
    assert_eq!(first.body, second.body);
    assert!(second.msg_id > first.msg_id);

    session.stop().await;
    drop(conn);
}

#[tokio::test(start_paused = true)]
async fn short_flood_waits_are_slept_through() {
    let (connector, dc) = common::mock_dc();
    let (session, _dc, mut conn) = common::started(common::config(connector), dc).await;

    let server = tokio::spawn(async move {
        let req = conn.next_request().await.unwrap();
        conn.reply_error(req.msg_id, 420, "FLOOD_WAIT_17").await;
        let req = conn.next_request().await.unwrap();
        conn.reply(req.msg_id, nonce_bytes(req.echo_nonce().unwrap())).await;

        let req = conn.next_request().await.unwrap();
        conn.reply_error(req.msg_id, 420, "FLOOD_WAIT_120").await;
        conn
    });

    let options = InvokeOptions { sleep_threshold: Some(Duration::from_secs(30)), ..InvokeOptions::default() };
    let started = Instant::now();
    let answer = session.invoke_with(&Echo { nonce: 9 }, &options).await.unwrap();
    assert_eq!(answer.0, nonce_bytes(9));
    assert!(started.elapsed() >= Duration::from_secs(17));

    let err = session.invoke_with(&Echo { nonce: 10 }, &options).await.unwrap_err();
    assert_eq!(err.flood_wait_seconds(), Some(120));
    assert!(err.is("FLOOD_WAIT"));

    let conn = server.await.unwrap();
    session.stop().await;
    drop(conn);
}

#[tokio::test]
async fn rpc_errors_reach_the_caller() {
    let (connector, dc) = common::mock_dc();
    let (session, _dc, mut conn) =
        common::started(common::config_without_retries(connector), dc).await;

    let server = tokio::spawn(async move {
        let req = conn.next_request().await.unwrap();
        conn.reply_error(req.msg_id, 400, "PEER_ID_INVALID").await;
        conn
    });
    match session.invoke(&Echo { nonce: 1 }).await {
        Err(InvocationError::Rpc(e)) => {
            assert_eq!(e.code, 400);
            assert_eq!(e.name, "PEER_ID_INVALID");
            assert!(e.description().is_some());
        }
        other => panic!("unexpected {other:?}"),
    }

    let conn = server.await.unwrap();
    session.stop().await;
    drop(conn);
}

#[tokio::test(start_paused = true)]
async fn unanswered_calls_time_out() {
    let (connector, dc) = common::mock_dc();
    let (session, _dc, mut conn) =
        common::started(common::config_without_retries(connector), dc).await;

    let server = tokio::spawn(async move {
        let req = conn.next_request().await.unwrap();
        assert!(req.echo_nonce().is_some());
        // Keep serving pings so the connection stays up.
        while conn.next_request().await.is_some() {}
    });
    let options = InvokeOptions { timeout: Duration::from_secs(2), ..InvokeOptions::default() };
    let err = session.invoke_with(&Echo { nonce: 3 }, &options).await.unwrap_err();
    assert!(matches!(err, InvocationError::Timeout));
    assert_eq!(session.state(), SessionState::Running);

    session.stop().await;
    server.await.unwrap();
}

#[tokio::test]
async fn reconnect_resubmits_every_outstanding_call_once() {
    let (connector, dc) = common::mock_dc();
    let (session, mut dc, mut conn) = common::started(common::config(connector), dc).await;

    let calls: Vec<_> = (0..5)
        .map(|nonce| {
            let session = session.clone();
            tokio::spawn(async move { session.invoke(&Echo { nonce }).await })
        })
        .collect();

    let mut swallowed = 0;
    while swallowed < 5 {
        let req = conn.next_request().await.unwrap();
        if req.echo_nonce().is_some() {
            swallowed += 1;
        }
    }
    drop(conn);

    let mut conn = dc.accept().await;
    conn.handshake().await;
    let mut answered: HashMap<i64, u32> = HashMap::new();
    while answered.len() < 5 {
        let req = conn.next_request().await.unwrap();
        let nonce = req.echo_nonce().unwrap();
        *answered.entry(nonce).or_default() += 1;
        conn.reply(req.msg_id, nonce_bytes(nonce)).await;
    }

    for (nonce, call) in calls.into_iter().enumerate() {
        let answer = call.await.unwrap().unwrap();
        assert_eq!(answer.0, nonce_bytes(nonce as i64));
    }
    assert!(answered.values().all(|n| *n == 1));
    assert_eq!(session.state(), SessionState::Running);

    session.stop().await;
    drop(conn);
}

#[tokio::test]
async fn non_idempotent_calls_are_not_replayed() {
    let (connector, dc) = common::mock_dc();
    let (session, mut dc, mut conn) = common::started(common::config(connector), dc).await;

    let pending = {
        let session = session.clone();
        tokio::spawn(async move {
            session.invoke_with(&Echo { nonce: 1 }, &InvokeOptions::non_idempotent()).await
        })
    };
    let req = conn.next_request().await.unwrap();
    assert_eq!(req.echo_nonce(), Some(1));
    drop(conn);

    let err = pending.await.unwrap().unwrap_err();
    assert!(matches!(err, InvocationError::Transport(_)));

    let mut conn = dc.accept().await;
    conn.handshake().await;
    let server = tokio::spawn(async move {
        let req = conn.next_request().await.unwrap();
        conn.reply(req.msg_id, nonce_bytes(req.echo_nonce().unwrap())).await;
        (conn, req)
    });
    session.invoke(&Echo { nonce: 2 }).await.unwrap();
    let (conn, req) = server.await.unwrap();
    assert_eq!(req.echo_nonce(), Some(2));

    session.stop().await;
    drop(conn);
}

#[tokio::test]
async fn server_code_stops_the_session() {
    let (connector, dc) = common::mock_dc();
    let (session, _dc, mut conn) = common::started(common::config(connector), dc).await;

    let server = tokio::spawn(async move {
        conn.next_request().await.unwrap();
        conn.send_code(-404).await;
        conn
    });
    let err = session.invoke(&Echo { nonce: 1 }).await.unwrap_err();
    assert!(matches!(err, InvocationError::ServerCode(-404)));
    assert_eq!(session.state(), SessionState::Stopped(StopReason::ServerCode(-404)));

    let conn = server.await.unwrap();
    session.stop().await;
    drop(conn);
}

#[tokio::test]
async fn duplicated_auth_key_is_terminal() {
    let (connector, dc) = common::mock_dc();
    let (session, _dc, mut conn) = common::started(common::config(connector), dc).await;

    let server = tokio::spawn(async move {
        let req = conn.next_request().await.unwrap();
        conn.reply_error(req.msg_id, 406, "AUTH_KEY_DUPLICATED").await;
        conn
    });
    let err = session.invoke(&Echo { nonce: 1 }).await.unwrap_err();
    assert!(matches!(err, InvocationError::AuthKeyDuplicated));

    let mut states = session.state_changes();
    let state = *states.wait_for(|s| matches!(s, SessionState::Stopped(_))).await.unwrap();
    assert_eq!(state, SessionState::Stopped(StopReason::AuthKeyDuplicated));

    let conn = server.await.unwrap();
    session.stop().await;
    drop(conn);
}

#[tokio::test]
async fn pushed_messages_become_updates() {
    let (connector, dc) = common::mock_dc();
    let (session, _dc, mut conn) = common::started(common::config(connector), dc).await;
    let mut updates = session.updates().unwrap();
    assert!(session.updates().is_none());

    // `updatesTooLong#e317af7e`, outside the session vocabulary.
    let pushed = 0xe317af7eu32.to_bytes();
    conn.send(&pushed).await;

    let update = updates.next().await.unwrap();
    assert_eq!(update.body, pushed);
    assert_eq!(update.constructor_id(), Some(0xe317af7e));

    session.stop().await;
    drop(conn);
}
