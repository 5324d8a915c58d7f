use thiserror::Error;

/// Reason surfaced to the peer when the server closes a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// Ordinary shutdown or peer-requested close.
    Normal,
    /// The transport layer reported an error on this connection.
    TransportError,
    /// The session failed the liveness check.
    NotReliable,
}

impl CloseReason {
    pub fn description(self) -> &'static str {
        match self {
            CloseReason::Normal => "normal closure",
            CloseReason::TransportError => "server transport error",
            CloseReason::NotReliable => "session not reliable",
        }
    }
}

/// Writing to a connection failed; the offending session should be torn
/// down, never the fan-out in progress.
#[derive(Debug, Error)]
#[error("connection send failed: {0}")]
pub struct SendError(pub String);

/// One live duplex message channel.
///
/// The relay core only consumes this contract. The WebSocket route layer
/// adapts a session actor address to it; tests supply in-memory mocks.
/// Implementations must serialize writes to the same connection (the actix
/// adapter gets this from the actor mailbox) and must make every method
/// non-blocking: a send enqueues, it never waits on I/O.
pub trait ConnectionHandle: Send + Sync {
    /// Queue a text frame for delivery.
    fn send_text(&self, frame: String) -> Result<(), SendError>;

    /// Queue a binary frame for delivery.
    fn send_binary(&self, payload: Vec<u8>) -> Result<(), SendError>;

    /// Queue a liveness probe (WebSocket ping).
    fn send_probe(&self) -> Result<(), SendError>;

    /// Whether the underlying channel still accepts writes. A handle
    /// resolved from a registry snapshot may have closed since; callers
    /// re-check before use.
    fn is_open(&self) -> bool;

    /// Ask the transport to close with the given reason. Best effort: a
    /// failed close never aborts the caller's teardown.
    fn close(&self, reason: CloseReason);
}
