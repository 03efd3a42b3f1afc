use thiserror::Error;

/// Errors surfaced outside the message path. Bad payloads and unknown topics
/// never end up here; they are absorbed by the sample window.
#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("config error: {0}")]
    Config(String),

    #[error("broker error: {0}")]
    Broker(String),

    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
}

pub type Result<T, E = MonitorError> = std::result::Result<T, E>;
