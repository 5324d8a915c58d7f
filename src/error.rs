use thiserror::Error;

/// Process-level failures. Relay-level failures (room lookup, send errors)
/// live next to the components that produce them and are always recovered
/// locally; only startup problems surface here.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("server start failure: {0}")]
    StartServer(String),
}
