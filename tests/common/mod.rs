//! Mock BiDi remote end.
//!
//! A scripted WebSocket server standing in for a browser: answers the
//! session commands the client issues, records every frame it receives,
//! and lets tests inject event frames or drop the connection.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::{accept_async, tungstenite::Message};

/// Installs a test log subscriber; later calls are no-ops.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Mock BiDi server accepting a single connection.
pub struct MockBiDiServer {
    url: String,
    received: Arc<Mutex<Vec<Value>>>,
    inject_tx: mpsc::UnboundedSender<String>,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl MockBiDiServer {
    /// Starts the server on a random localhost port.
    pub async fn start() -> anyhow::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let url = format!("ws://{addr}");

        let received = Arc::new(Mutex::new(Vec::new()));
        let (inject_tx, inject_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let received_clone = Arc::clone(&received);
        tokio::spawn(async move {
            if let Ok((stream, _peer)) = listener.accept().await {
                Self::handle_connection(stream, received_clone, inject_rx, shutdown_rx).await;
            }
        });

        Ok(Self {
            url,
            received,
            inject_tx,
            shutdown_tx: Some(shutdown_tx),
        })
    }

    /// The `ws://` endpoint URL to dial.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Every frame received so far, in arrival order.
    pub fn received(&self) -> Vec<Value> {
        self.received.lock().expect("received lock").clone()
    }

    /// Received frames whose `method` matches.
    pub fn received_with_method(&self, method: &str) -> Vec<Value> {
        self.received()
            .into_iter()
            .filter(|frame| frame.get("method").and_then(Value::as_str) == Some(method))
            .collect()
    }

    /// Injects an event frame.
    pub fn emit_event(&self, method: &str, params: Value) {
        let frame = json!({ "type": "event", "method": method, "params": params });
        self.emit_raw(frame.to_string());
    }

    /// Injects an arbitrary raw frame.
    pub fn emit_raw(&self, text: String) {
        self.inject_tx.send(text).expect("connection task alive");
    }

    /// Drops the connection without a close handshake.
    pub fn drop_connection(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }

    async fn handle_connection(
        stream: TcpStream,
        received: Arc<Mutex<Vec<Value>>>,
        mut inject_rx: mpsc::UnboundedReceiver<String>,
        mut shutdown_rx: oneshot::Receiver<()>,
    ) {
        let Ok(ws_stream) = accept_async(stream).await else {
            return;
        };
        let (mut ws_sender, mut ws_receiver) = ws_stream.split();

        loop {
            tokio::select! {
                message = ws_receiver.next() => {
                    match message {
                        Some(Ok(Message::Text(text))) => {
                            let Ok(request) = serde_json::from_str::<Value>(&text) else {
                                continue;
                            };

                            received.lock().expect("received lock").push(request.clone());

                            if let Some(response) = Self::respond(&request)
                                && ws_sender
                                    .send(Message::Text(response.to_string().into()))
                                    .await
                                    .is_err()
                            {
                                break;
                            }
                        }
                        Some(Ok(Message::Close(_))) | None => break,
                        Some(Err(_)) => break,
                        _ => {}
                    }
                }

                injected = inject_rx.recv() => {
                    match injected {
                        Some(text) => {
                            if ws_sender.send(Message::Text(text.into())).await.is_err() {
                                break;
                            }
                        }
                        None => break,
                    }
                }

                _ = &mut shutdown_rx => {
                    // Drop without a close handshake; the client sees the
                    // stream end.
                    break;
                }
            }
        }
    }

    /// Scripted response for a command frame. `None` means stay silent.
    fn respond(request: &Value) -> Option<Value> {
        let id = request.get("id")?;
        let method = request.get("method").and_then(Value::as_str)?;

        fn success(id: &Value, result: Value) -> Value {
            json!({ "id": id, "type": "success", "result": result })
        }

        match method {
            "session.new" => Some(success(id, json!({
                "sessionId": "mock-session",
                "capabilities": {
                    "browserName": "mockbrowser",
                    "browserVersion": "1.0",
                    "acceptInsecureCerts": false,
                    "setWindowRect": false,
                    "userAgent": "Mock/1.0"
                }
            }))),

            "session.status" => Some(success(id, json!({ "ready": true, "message": "ok" }))),

            "session.subscribe" => Some(success(
                id,
                json!({ "subscription": format!("sub-{id}") }),
            )),

            "session.unsubscribe" | "session.end" => Some(success(id, json!({}))),

            "test.echo" => Some(success(
                id,
                request.get("params").cloned().unwrap_or_else(|| json!({})),
            )),

            // Never answered; used for timeout and connection-drop tests.
            "test.blackhole" => None,

            "test.fail" => Some(json!({
                "id": id,
                "type": "error",
                "error": "invalid argument",
                "message": "rejected by mock"
            })),

            _ => Some(json!({
                "id": id,
                "type": "error",
                "error": "unknown command",
                "message": format!("unknown command: {method}")
            })),
        }
    }
}
