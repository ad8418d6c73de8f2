use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;

use interviewer_channel::types::{CandidateMessage, SystemState};
use interviewer_channel::{ChannelError, ChannelEvent, Config, connect};

async fn bind() -> (TcpListener, Config) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let config = Config::builder()
        .with_base_url(&format!("ws://{}", listener.local_addr().unwrap()))
        .build();
    (listener, config)
}

#[tokio::test]
async fn greeting_and_submission_round_trip() {
    let (listener, config) = bind().await;

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        ws.send(Message::Text(
            r#"{"interviewer_response":"Welcome! Say hello when ready.","system_state":"GREETING","avatar_state":"smiling","tts_enabled":false}"#.into(),
        ))
        .await
        .unwrap();

        let frame = ws.next().await.unwrap().unwrap();
        assert_eq!(frame.into_text().unwrap(), r#"{"text":"hello"}"#);

        ws.send(Message::Close(None)).await.unwrap();
    });

    let mut client = connect(config).await.unwrap();
    let mut events = client.events().unwrap();

    match events.recv().await.unwrap() {
        ChannelEvent::Message(msg) => {
            assert_eq!(msg.interviewer_response, "Welcome! Say hello when ready.");
            assert_eq!(msg.system_state, SystemState::Greeting);
        }
        other => panic!("expected greeting, got {:?}", other),
    }

    client.send(CandidateMessage::new("hello")).await.unwrap();

    match events.recv().await.unwrap() {
        ChannelEvent::Closed { graceful } => assert!(graceful),
        other => panic!("expected close, got {:?}", other),
    }

    let stats = client.stats();
    assert_eq!(stats.messages_sent(), 1);
    assert_eq!(stats.messages_received(), 1);

    server.await.unwrap();
}

#[tokio::test]
async fn malformed_payloads_are_dropped_not_fatal() {
    let (listener, config) = bind().await;

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        ws.send(Message::Text("definitely not json".into()))
            .await
            .unwrap();
        ws.send(Message::Text(r#"{"interviewer_response":7}"#.into()))
            .await
            .unwrap();
        ws.send(Message::Text(
            r#"{"interviewer_response":"still alive","system_state":"TECHNICAL"}"#.into(),
        ))
        .await
        .unwrap();
        ws.send(Message::Close(None)).await.unwrap();
    });

    let mut client = connect(config).await.unwrap();
    let mut events = client.events().unwrap();

    match events.recv().await.unwrap() {
        ChannelEvent::Message(msg) => {
            assert_eq!(msg.interviewer_response, "still alive");
            assert_eq!(msg.system_state, SystemState::Technical);
        }
        other => panic!("expected message, got {:?}", other),
    }

    let stats = client.stats();
    assert_eq!(stats.malformed_dropped(), 2);
    assert_eq!(stats.messages_received(), 1);

    server.await.unwrap();
}

#[tokio::test]
async fn stalled_handshake_times_out() {
    let (listener, config) = bind().await;
    let config = Config::builder()
        .with_base_url(config.base_url())
        .with_handshake_timeout(Duration::from_millis(200))
        .build();

    // Accept the TCP connection but never complete the WebSocket upgrade.
    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        tokio::time::sleep(Duration::from_secs(2)).await;
        drop(stream);
    });

    let err = connect(config).await.unwrap_err();
    assert!(matches!(err, ChannelError::HandshakeTimeout));
    server.abort();
}

#[tokio::test]
async fn drop_before_upgrade_is_pre_handshake_close() {
    let (listener, config) = bind().await;

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        drop(stream);
    });

    let err = connect(config).await.unwrap_err();
    assert!(matches!(err, ChannelError::PreHandshakeClose(_)));
    server.await.unwrap();
}

#[tokio::test]
async fn abrupt_server_drop_reports_ungraceful_close() {
    let (listener, config) = bind().await;

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        drop(ws);
    });

    let mut client = connect(config).await.unwrap();
    let mut events = client.events().unwrap();

    match events.recv().await.unwrap() {
        ChannelEvent::Closed { graceful } => assert!(!graceful),
        other => panic!("expected close, got {:?}", other),
    }

    server.await.unwrap();
}

#[tokio::test]
async fn send_after_close_fails_fast() {
    let (listener, config) = bind().await;

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        while let Some(Ok(frame)) = ws.next().await {
            if frame.is_close() {
                break;
            }
        }
    });

    let mut client = connect(config).await.unwrap();
    client.close().await;

    let err = client
        .send(CandidateMessage::new("too late"))
        .await
        .unwrap_err();
    assert!(matches!(err, ChannelError::SendWhileDisconnected));

    server.await.unwrap();
}
