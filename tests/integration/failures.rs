use srs_client::MAX_DECODE_ERRORS;
use srs_core::version::CLIENT_VERSION;
use srs_session::ClientEvent;

use crate::*;

// ══════════════════════════════════════════════════════════════════════════════
//  Transport failures
// ══════════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn refused_connection_reports_error() -> Result<()> {
    // Bind, note the port, and close it again so nothing is listening.
    let addr = MockServer::bind().await?.addr();
    let mut h = harness(fast_options());

    h.client.try_connect(addr)?;
    assert_eq!(h.connect_result().await?, (false, true));
    assert_eq!(h.client.phase(), srs_session::ConnectionPhase::Idle);
    Ok(())
}

#[tokio::test]
async fn connect_attempt_is_bounded() -> Result<()> {
    let Some((listener, _held)) = saturated_listener().await? else {
        eprintln!("SKIP: could not fill a listen backlog on this host");
        return Ok(());
    };
    let mut options = fast_options();
    options.connect_timeout = Duration::from_millis(300);
    let mut h = harness(options);

    let started = tokio::time::Instant::now();
    h.client.try_connect(listener.local_addr()?.to_string())?;
    assert_eq!(h.connect_result().await?, (false, true));
    assert!(started.elapsed() >= Duration::from_millis(250));
    assert_eq!(h.client.phase(), srs_session::ConnectionPhase::Idle);

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(h.events.try_recv().is_none());
    Ok(())
}

#[tokio::test]
async fn disconnect_while_connecting() -> Result<()> {
    let Some((listener, _held)) = saturated_listener().await? else {
        eprintln!("SKIP: could not fill a listen backlog on this host");
        return Ok(());
    };
    let mut options = fast_options();
    options.connect_timeout = Duration::from_secs(30);
    let mut h = harness(options);

    let task = h.client.try_connect(listener.local_addr()?.to_string())?;
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(h.client.phase(), srs_session::ConnectionPhase::Connecting);

    h.client.disconnect().await;
    assert_eq!(h.connect_result().await?, (false, false));
    assert_eq!(h.client.phase(), srs_session::ConnectionPhase::Idle);
    tokio::time::timeout(WAIT, task).await??;

    assert!(h.events.try_recv().is_none());
    assert_eq!(h.radio.lifecycle.starts.load(std::sync::atomic::Ordering::SeqCst), 0);
    Ok(())
}

#[tokio::test]
async fn server_closing_is_a_clean_disconnect() -> Result<()> {
    let server = MockServer::bind().await?;
    let mut h = harness(fast_options());
    let conn = h.connect(&server, vec![peer("a")]).await?;

    drop(conn);
    assert_eq!(h.connect_result().await?, (false, false));
    assert!(h.client.registry().is_empty());
    Ok(())
}

// ══════════════════════════════════════════════════════════════════════════════
//  Protocol failures
// ══════════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn garbage_stream_disconnects_after_budget() -> Result<()> {
    let server = MockServer::bind().await?;
    let mut h = harness(fast_options());
    let mut conn = h.connect(&server, vec![]).await?;

    for _ in 0..MAX_DECODE_ERRORS - 1 {
        conn.send_raw("this is not json\n").await?;
    }
    // A good message in between resets the count.
    conn.send(&NetworkMessage::new(MessageKind::Ping)).await?;
    for _ in 0..MAX_DECODE_ERRORS - 1 {
        conn.send_raw("{\"MsgType\":\n").await?;
    }
    conn.send(&NetworkMessage::with_client(MessageKind::Update, peer("alive")))
        .await?;
    let registry = h.client.registry().clone();
    wait_for(|| registry.contains("alive")).await?;

    for _ in 0..MAX_DECODE_ERRORS {
        conn.send_raw("\u{1}\u{2}\u{3}\n").await?;
    }
    let notice = h
        .wait_event(|e| matches!(e, ClientEvent::Incompatible { .. }))
        .await?;
    assert_eq!(
        notice,
        ClientEvent::Incompatible {
            server_version: "unknown".into(),
            client_version: CLIENT_VERSION.into(),
        }
    );
    assert_eq!(h.connect_result().await?, (false, false));
    conn.expect_closed().await?;
    Ok(())
}

#[tokio::test]
async fn old_server_is_rejected() -> Result<()> {
    let server = MockServer::bind().await?;
    let mut options = fast_options();
    options.minimum_version = ProtocolVersion::parse("2.0.0")?;
    let mut h = harness(options);

    h.client.try_connect(server.addr())?;
    let mut conn = server.accept().await?;
    conn.handshake("1.0.0", vec![peer("a"), peer("b")]).await?;

    assert_eq!(h.connect_result().await?, (true, false));
    let notice = h.next_event().await?;
    assert_eq!(
        notice,
        ClientEvent::Incompatible {
            server_version: "1.0.0".into(),
            client_version: CLIENT_VERSION.into(),
        }
    );
    assert_eq!(h.connect_result().await?, (false, false));
    assert!(h.client.registry().is_empty());
    conn.expect_closed().await?;
    Ok(())
}

#[tokio::test]
async fn unversioned_server_is_dropped_silently() -> Result<()> {
    let server = MockServer::bind().await?;
    let mut h = harness(fast_options());

    h.client.try_connect(server.addr())?;
    let mut conn = server.accept().await?;
    conn.recv_kind(MessageKind::Sync).await?;
    conn.send(&sync_reply(None, vec![peer("a")])).await?;

    assert_eq!(h.connect_result().await?, (true, false));
    assert_eq!(h.next_event().await?, ClientEvent::ConnectResult {
        success: false,
        had_error: false,
        address: server.addr(),
    });
    Ok(())
}

#[tokio::test]
async fn version_mismatch_notice_disconnects() -> Result<()> {
    let server = MockServer::bind().await?;
    let mut h = harness(fast_options());
    let mut conn = h.connect(&server, vec![]).await?;

    let mut mismatch = NetworkMessage::new(MessageKind::VersionMismatch);
    mismatch.version = Some("2.1.0.0".into());
    conn.send(&mismatch).await?;

    let notice = h
        .wait_event(|e| matches!(e, ClientEvent::Incompatible { .. }))
        .await?;
    assert!(matches!(notice, ClientEvent::Incompatible { server_version, .. } if server_version == "2.1.0.0"));
    assert_eq!(h.connect_result().await?, (false, false));
    Ok(())
}

// ══════════════════════════════════════════════════════════════════════════════
//  Idle timeout
// ══════════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn silent_session_times_out() -> Result<()> {
    let server = MockServer::bind().await?;
    let mut options = fast_options();
    options.idle_timeout = Duration::from_millis(200);
    let mut h = harness(options);
    let mut conn = h.connect(&server, vec![]).await?;

    let started = tokio::time::Instant::now();
    assert_eq!(h.connect_result().await?, (false, false));
    assert!(started.elapsed() >= Duration::from_millis(50));
    conn.expect_closed().await?;
    Ok(())
}

#[tokio::test]
async fn outbound_traffic_resets_idle_clock() -> Result<()> {
    let server = MockServer::bind().await?;
    let mut options = fast_options();
    options.idle_timeout = Duration::from_millis(300);
    let mut h = harness(options);
    let mut conn = h.connect(&server, vec![]).await?;

    for _ in 0..8 {
        tokio::time::sleep(Duration::from_millis(100)).await;
        h.client.send_coalition_update().await?;
        conn.recv_kind(MessageKind::Update).await?;
    }
    assert_eq!(h.client.phase(), srs_session::ConnectionPhase::Connected);

    // Inbound traffic alone does not count as activity.
    for _ in 0..8 {
        if h.client.phase() != srs_session::ConnectionPhase::Connected {
            break;
        }
        // The client may already be gone.
        let _ = conn.send(&NetworkMessage::new(MessageKind::Ping)).await;
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    assert_eq!(h.connect_result().await?, (false, false));
    Ok(())
}
