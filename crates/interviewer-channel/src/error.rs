#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("session channel handshake timed out")]
    HandshakeTimeout,
    #[error("session channel closed before handshake completed: {0}")]
    PreHandshakeClose(String),
    #[error("message sent while the session channel is disconnected")]
    SendWhileDisconnected,
    #[error("session channel is already connected")]
    AlreadyConnected,
}
