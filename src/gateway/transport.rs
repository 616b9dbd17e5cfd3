//! WebSocket transport.
//!
//! The socket is split into a reader task and a writer task. The connection
//! loop talks to both through channels, so sending a frame never waits on a
//! read and vice versa.

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tracing::{debug, trace};

use super::error::GatewayError;

const CHANNEL_CAPACITY: usize = 256;
const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

/// Close code reported when the peer closed without a close frame.
pub const NO_STATUS: u16 = 1005;
/// Close code reported when the stream ended without any close handshake.
pub const ABNORMAL_CLOSURE: u16 = 1006;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Message(String),
    Closed { code: u16, reason: String },
    Error(String),
}

pub struct Connection {
    outbound: mpsc::Sender<Message>,
    events: mpsc::Receiver<TransportEvent>,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

impl Connection {
    pub async fn connect(url: &str) -> Result<Self, GatewayError> {
        let (stream, _response) = connect_async(url)
            .await
            .map_err(|e| GatewayError::Connection(e.to_string()))?;
        let (mut sink, mut source) = stream.split();

        let (outbound, mut outbound_rx) = mpsc::channel::<Message>(CHANNEL_CAPACITY);
        let (events_tx, events) = mpsc::channel::<TransportEvent>(CHANNEL_CAPACITY);

        let writer = tokio::spawn(async move {
            while let Some(message) = outbound_rx.recv().await {
                let closing = matches!(message, Message::Close(_));
                if let Err(e) = sink.send(message).await {
                    debug!(error = %e, "WebSocket write failed");
                    break;
                }
                if closing {
                    break;
                }
            }
            let _ = sink.close().await;
        });

        let reader = tokio::spawn(async move {
            while let Some(next) = source.next().await {
                let event = match next {
                    Ok(Message::Text(text)) => TransportEvent::Message(text.as_str().to_owned()),
                    Ok(Message::Close(frame)) => match frame {
                        Some(frame) => TransportEvent::Closed {
                            code: u16::from(frame.code),
                            reason: frame.reason.as_str().to_owned(),
                        },
                        None => TransportEvent::Closed {
                            code: NO_STATUS,
                            reason: String::new(),
                        },
                    },
                    Ok(other) => {
                        trace!(?other, "Ignoring non-text WebSocket message");
                        continue;
                    }
                    Err(e) => TransportEvent::Error(e.to_string()),
                };

                let terminal = !matches!(event, TransportEvent::Message(_));
                if events_tx.send(event).await.is_err() || terminal {
                    return;
                }
            }

            let _ = events_tx
                .send(TransportEvent::Closed {
                    code: ABNORMAL_CLOSURE,
                    reason: "stream ended".into(),
                })
                .await;
        });

        Ok(Self {
            outbound,
            events,
            reader,
            writer,
        })
    }

    pub async fn send(&self, text: String) -> Result<(), GatewayError> {
        self.outbound
            .send(Message::Text(text.into()))
            .await
            .map_err(|_| GatewayError::Send)
    }

    /// Next inbound event. `None` once the reader has stopped.
    pub async fn next_event(&mut self) -> Option<TransportEvent> {
        self.events.recv().await
    }

    /// Next event if one is already queued.
    pub fn try_next_event(&mut self) -> Option<TransportEvent> {
        self.events.try_recv().ok()
    }

    pub fn queued_events(&self) -> usize {
        self.events.len()
    }

    /// Sends a close frame and gives the writer a moment to flush it.
    pub async fn close(&mut self, code: u16) {
        let frame = CloseFrame {
            code: CloseCode::from(code),
            reason: String::new().into(),
        };
        let _ = self.outbound.send(Message::Close(Some(frame))).await;

        if tokio::time::timeout(CLOSE_TIMEOUT, &mut self.writer).await.is_err() {
            debug!("Close frame not flushed in time");
            self.writer.abort();
        }
        self.reader.abort();
    }
}

#[cfg(test)]
impl Connection {
    /// A connection backed by plain channels instead of a socket.
    pub(crate) fn from_channels(
        outbound: mpsc::Sender<Message>,
        events: mpsc::Receiver<TransportEvent>,
    ) -> Self {
        Self {
            outbound,
            events,
            reader: tokio::spawn(async {}),
            writer: tokio::spawn(async {}),
        }
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.reader.abort();
        self.writer.abort();
    }
}
