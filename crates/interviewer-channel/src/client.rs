use std::sync::{Arc, Mutex};

use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::Message;

use interviewer_types::{CandidateMessage, InterviewerMessage};

use crate::error::ChannelError;

pub mod config;
mod consts;
mod stats;

pub use consts::{DEFAULT_CAPACITY, HANDSHAKE_TIMEOUT};
pub use stats::Stats;

/// Outbound lane commands consumed by the send task.
enum Outbound {
    Message(CandidateMessage),
    Shutdown,
}

type OutboundTx = tokio::sync::mpsc::Sender<Outbound>;
type EventTx = tokio::sync::broadcast::Sender<ChannelEvent>;
pub type EventRx = tokio::sync::broadcast::Receiver<ChannelEvent>;

/// Events published by the receive task. Malformed frames never surface
/// here; they are dropped with a logged diagnostic and counted.
#[derive(Debug, Clone)]
pub enum ChannelEvent {
    Message(InterviewerMessage),
    Closed { graceful: bool },
}

#[derive(Debug)]
pub struct Connection {
    pub(crate) send_handle: tokio::task::JoinHandle<()>,
    pub(crate) recv_handle: tokio::task::JoinHandle<()>,
}

/// Session channel client. Owns the single WebSocket connection to the
/// interview backend; at most one channel is ever open per client.
#[derive(Debug)]
pub struct Client {
    capacity: usize,
    config: config::Config,
    c_tx: Option<OutboundTx>,
    s_tx: Option<EventTx>,
    // Subscribed before the receive task spawns, so the first consumer
    // cannot miss an event that arrives right after the handshake.
    first_rx: Option<EventRx>,
    stats: Arc<Mutex<Stats>>,
    connection: Option<Connection>,
}

impl Client {
    fn new(capacity: usize, config: config::Config) -> Self {
        Self {
            capacity,
            config,
            c_tx: None,
            s_tx: None,
            first_rx: None,
            stats: Arc::new(Mutex::new(Stats::new())),
            connection: None,
        }
    }

    async fn connect(&mut self) -> Result<(), ChannelError> {
        if self.c_tx.is_some() {
            return Err(ChannelError::AlreadyConnected);
        }

        let url = self.config.session_url();
        tracing::debug!("opening session channel: {}", url);

        let handshake = tokio_tungstenite::connect_async(url.as_str());
        let (ws_stream, _) = match tokio::time::timeout(self.config.handshake_timeout(), handshake)
            .await
        {
            Err(_) => {
                tracing::error!(
                    "handshake did not complete within {:?}, closing channel",
                    self.config.handshake_timeout()
                );
                return Err(ChannelError::HandshakeTimeout);
            }
            Ok(Err(e)) => {
                tracing::error!("channel closed before handshake completed: {}", e);
                return Err(ChannelError::PreHandshakeClose(e.to_string()));
            }
            Ok(Ok(stream)) => stream,
        };

        let (mut write, mut read) = ws_stream.split();

        let (c_tx, mut c_rx) = tokio::sync::mpsc::channel(self.capacity);
        let (s_tx, first_rx) = tokio::sync::broadcast::channel(self.capacity);

        self.c_tx = Some(c_tx.clone());
        self.s_tx = Some(s_tx.clone());
        self.first_rx = Some(first_rx);

        let send_handle = tokio::spawn(async move {
            while let Some(outbound) = c_rx.recv().await {
                match outbound {
                    Outbound::Message(message) => match serde_json::to_string(&message) {
                        Ok(text) => {
                            if let Err(e) = write.send(Message::Text(text)).await {
                                tracing::error!("failed to send message: {}", e);
                            }
                        }
                        Err(e) => {
                            tracing::error!("failed to serialize message: {}", e);
                        }
                    },
                    Outbound::Shutdown => {
                        if let Err(e) = write.send(Message::Close(None)).await {
                            tracing::debug!("failed to send close frame: {}", e);
                        }
                        break;
                    }
                }
            }
        });

        let stats = self.stats.clone();
        let recv_handle = tokio::spawn(async move {
            let mut graceful = false;
            while let Some(message) = read.next().await {
                let message = match message {
                    Err(e) => {
                        tracing::error!("failed to read message: {}", e);
                        break;
                    }
                    Ok(message) => message,
                };
                match message {
                    Message::Text(text) => {
                        match serde_json::from_str::<InterviewerMessage>(&text) {
                            Ok(payload) => {
                                if let Ok(mut stats_guard) = stats.lock() {
                                    stats_guard.record_received();
                                }
                                if let Err(e) = s_tx.send(ChannelEvent::Message(payload)) {
                                    tracing::error!("failed to publish channel event: {}", e);
                                }
                            }
                            Err(e) => {
                                if let Ok(mut stats_guard) = stats.lock() {
                                    stats_guard.record_malformed();
                                }
                                tracing::error!(
                                    "dropping malformed payload: {}, text=> {:?}",
                                    e,
                                    text
                                );
                            }
                        }
                    }
                    Message::Binary(bin) => {
                        tracing::warn!("unexpected binary message: {} bytes", bin.len());
                    }
                    Message::Close(reason) => {
                        tracing::info!("connection closed: {:?}", reason);
                        graceful = true;
                        break;
                    }
                    _ => {}
                }
            }

            if let Err(e) = s_tx.send(ChannelEvent::Closed { graceful }) {
                tracing::debug!("no subscriber for close event: {}", e);
            }
        });

        self.connection = Some(Connection {
            send_handle,
            recv_handle,
        });
        Ok(())
    }

    /// Subscribe to inbound channel events. The first subscription receives
    /// every event since the handshake; later ones start from "now".
    pub fn events(&mut self) -> Result<EventRx, ChannelError> {
        if let Some(rx) = self.first_rx.take() {
            return Ok(rx);
        }
        match self.s_tx {
            Some(ref tx) => Ok(tx.subscribe()),
            None => Err(ChannelError::SendWhileDisconnected),
        }
    }

    pub fn stats(&self) -> Stats {
        self.stats
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }

    /// Send one candidate message. Sending while disconnected is a
    /// programming error and fails fast rather than being dropped.
    pub async fn send(&self, message: CandidateMessage) -> Result<(), ChannelError> {
        match self.c_tx {
            Some(ref tx) => {
                tx.send(Outbound::Message(message))
                    .await
                    .map_err(|_| ChannelError::SendWhileDisconnected)?;
                if let Ok(mut stats_guard) = self.stats.lock() {
                    stats_guard.record_sent();
                }
                Ok(())
            }
            None => {
                tracing::error!("send attempted while channel is disconnected");
                Err(ChannelError::SendWhileDisconnected)
            }
        }
    }

    /// Push a close frame through the outbound lane and tear it down.
    /// Subsequent sends fail fast with `SendWhileDisconnected`.
    pub async fn close(&mut self) {
        if let Some(tx) = self.c_tx.take() {
            if tx.send(Outbound::Shutdown).await.is_err() {
                tracing::debug!("send task already gone during close");
            }
        }
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        if let Some(connection) = self.connection.take() {
            connection.send_handle.abort();
            connection.recv_handle.abort();
        }
    }
}

pub async fn connect_with_config(
    capacity: usize,
    config: config::Config,
) -> Result<Client, ChannelError> {
    let mut client = Client::new(capacity, config);
    client.connect().await?;
    Ok(client)
}

pub async fn connect(config: config::Config) -> Result<Client, ChannelError> {
    connect_with_config(DEFAULT_CAPACITY, config).await
}
