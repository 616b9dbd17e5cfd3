use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use discord_checkin::bot::commands::CommandHandler;
use discord_checkin::bot::dispatcher::CommandRequest;
use discord_checkin::bot::handlers::EventHandler;
use discord_checkin::bot::reply::Reply;
use discord_checkin::bot::rest::RestClient;
use discord_checkin::config::ReconnectConfig;
use discord_checkin::gateway::{GatewayClient, GatewayError};
use futures::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::{WebSocketStream, accept_async};

type Ws = WebSocketStream<TcpStream>;

const STEP: Duration = Duration::from_secs(5);

struct Recorder(mpsc::UnboundedSender<CommandRequest>);

#[async_trait]
impl CommandHandler for Recorder {
    async fn handle(&self, request: &CommandRequest) -> Option<Reply> {
        let _ = self.0.send(request.clone());
        None
    }
}

fn client(addr: SocketAddr) -> (GatewayClient, mpsc::UnboundedReceiver<CommandRequest>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let rest = RestClient::new(reqwest::Client::new(), "http://127.0.0.1:1", "tok");
    let handler = EventHandler::new(Arc::new(Recorder(tx)), rest);
    let reconnect = ReconnectConfig {
        max_attempts: 5,
        backoff_base_ms: 10,
        backoff_max_ms: 50,
    };
    let client = GatewayClient::new(
        "tok",
        513,
        format!("ws://{}/?v=10&encoding=json", addr),
        &reconnect,
        Arc::new(handler),
    );
    (client, rx)
}

async fn accept(listener: &TcpListener) -> Ws {
    let (tcp, _) = timeout(STEP, listener.accept()).await.unwrap().unwrap();
    accept_async(tcp).await.unwrap()
}

async fn send(ws: &mut Ws, frame: Value) {
    ws.send(Message::Text(frame.to_string().into())).await.unwrap();
}

async fn hello(ws: &mut Ws, interval_ms: u64) {
    send(ws, json!({"op": 10, "d": {"heartbeat_interval": interval_ms}})).await;
}

async fn next_frame(ws: &mut Ws) -> Value {
    loop {
        let message = timeout(STEP, ws.next()).await.unwrap().unwrap().unwrap();
        if let Message::Text(text) = message {
            return serde_json::from_str(text.as_str()).unwrap();
        }
    }
}

/// Next frame with opcode `op`; heartbeats on the way are acknowledged.
async fn expect_op(ws: &mut Ws, op: u64) -> Value {
    loop {
        let frame = next_frame(ws).await;
        if frame["op"] == op {
            return frame;
        }
        if frame["op"] == 1 {
            send(ws, json!({"op": 11})).await;
        }
    }
}

/// Reads until the client's close frame and returns its code.
async fn close_code(ws: &mut Ws) -> u16 {
    loop {
        match timeout(STEP, ws.next()).await.unwrap() {
            Some(Ok(Message::Close(Some(frame)))) => return u16::from(frame.code),
            Some(Ok(_)) => continue,
            other => panic!("connection ended without a close frame: {:?}", other),
        }
    }
}

async fn ready(ws: &mut Ws, addr: SocketAddr) {
    send(
        ws,
        json!({
            "op": 0, "s": 1, "t": "READY",
            "d": {
                "session_id": "sess-1",
                "resume_gateway_url": format!("ws://{}", addr),
                "user": {"id": "bot", "username": "checkin-bot", "bot": true},
                "guilds": [{"id": "g1", "unavailable": true}]
            }
        }),
    )
    .await;
}

#[tokio::test]
async fn identify_dispatch_heartbeat_and_resume() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (mut client, mut requests) = client(addr);
    let run = tokio::spawn(async move { client.run().await });

    let mut ws = accept(&listener).await;
    hello(&mut ws, 100).await;

    let identify = expect_op(&mut ws, 2).await;
    assert_eq!(identify["d"]["token"], "tok");
    assert_eq!(identify["d"]["intents"], 513);

    ready(&mut ws, addr).await;
    send(
        &mut ws,
        json!({
            "op": 0, "s": 2, "t": "MESSAGE_CREATE",
            "d": {
                "channel_id": "c1",
                "content": "!PING",
                "author": {"id": "u1", "username": "alice"}
            }
        }),
    )
    .await;

    let request = timeout(STEP, requests.recv()).await.unwrap().unwrap();
    assert_eq!(request.command_name, "ping");
    assert_eq!(request.user_id, "u1");

    // heartbeats carry the latest sequence once it has been seen
    loop {
        let beat = expect_op(&mut ws, 1).await;
        send(&mut ws, json!({"op": 11})).await;
        if beat["d"] == 2 {
            break;
        }
        assert!(beat["d"] == 1 || beat["d"].is_null());
    }

    send(&mut ws, json!({"op": 7, "d": null})).await;
    assert_eq!(close_code(&mut ws).await, 4000);

    let mut ws = accept(&listener).await;
    hello(&mut ws, 100).await;
    let resume = expect_op(&mut ws, 6).await;
    assert_eq!(resume["d"]["token"], "tok");
    assert_eq!(resume["d"]["session_id"], "sess-1");
    assert_eq!(resume["d"]["seq"], 2);

    run.abort();
}

#[tokio::test]
async fn unacknowledged_heartbeat_forces_resume() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (mut client, _requests) = client(addr);
    let run = tokio::spawn(async move { client.run().await });

    let mut ws = accept(&listener).await;
    hello(&mut ws, 50).await;
    expect_op(&mut ws, 2).await;
    ready(&mut ws, addr).await;

    // never ack: the second beat finds the first still pending
    let beat = next_frame(&mut ws).await;
    assert_eq!(beat["op"], 1);
    assert_eq!(close_code(&mut ws).await, 4000);

    let mut ws = accept(&listener).await;
    hello(&mut ws, 50).await;
    let resume = expect_op(&mut ws, 6).await;
    assert_eq!(resume["d"]["session_id"], "sess-1");
    assert_eq!(resume["d"]["seq"], 1);

    run.abort();
}

#[tokio::test]
async fn authentication_failure_is_fatal() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (mut client, _requests) = client(addr);
    let run = tokio::spawn(async move { client.run().await });

    let mut ws = accept(&listener).await;
    hello(&mut ws, 41_250).await;
    expect_op(&mut ws, 2).await;
    ws.send(Message::Close(Some(CloseFrame {
        code: CloseCode::from(4004),
        reason: "Authentication failed.".into(),
    })))
    .await
    .unwrap();

    let result = timeout(STEP, run).await.unwrap().unwrap();
    assert!(matches!(result, Err(GatewayError::AuthenticationFailed)));
}
