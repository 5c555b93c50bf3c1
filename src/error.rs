// src/error.rs
use std::io;
use thiserror::Error;

/// Failures of a single remote-console session.
#[derive(Debug, Error)]
pub enum RconError {
    #[error("invalid rcon configuration: {0}")]
    Configuration(String),

    #[error("rcon connection failed: {0}")]
    Connection(String),

    #[error("rcon timed out: {0}")]
    Timeout(String),

    #[error("malformed rcon frame: {0}")]
    Protocol(String),
}

impl RconError {
    /// Classifies a socket error raised while talking to `endpoint`.
    pub fn from_io(endpoint: &str, err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut => {
                RconError::Timeout(format!("{}: {}", endpoint, err))
            }
            io::ErrorKind::InvalidData | io::ErrorKind::UnexpectedEof => {
                RconError::Protocol(format!("{}: {}", endpoint, err))
            }
            _ => RconError::Connection(format!("{}: {}", endpoint, err)),
        }
    }
}

#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("upstream request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("upstream answered with status {0}")]
    Status(u16),

    #[error("upstream listing did not end within {0} pages")]
    TooManyPages(u32),
}

#[derive(Debug, Error)]
pub enum RefreshError {
    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    #[error("failed to encode server list: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("a refresh is already running")]
    Busy,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to access {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("invalid rcon target file: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid CONFIG_JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("server '{0}' not found")]
    UnknownServer(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_timeouts_map_to_timeout() {
        let err = RconError::from_io("host:1", io::Error::from(io::ErrorKind::WouldBlock));
        assert!(matches!(err, RconError::Timeout(_)));
        let err = RconError::from_io("host:1", io::Error::from(io::ErrorKind::TimedOut));
        assert!(matches!(err, RconError::Timeout(_)));
    }

    #[test]
    fn truncated_frame_maps_to_protocol() {
        let err = RconError::from_io("host:1", io::Error::from(io::ErrorKind::UnexpectedEof));
        assert!(matches!(err, RconError::Protocol(_)));
    }

    #[test]
    fn refused_maps_to_connection() {
        let err = RconError::from_io("host:1", io::Error::from(io::ErrorKind::ConnectionRefused));
        assert!(matches!(err, RconError::Connection(_)));
    }
}
