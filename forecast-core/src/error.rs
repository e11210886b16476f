use std::path::PathBuf;

use thiserror::Error;

/// Errors produced by the forecast digest pipeline.
#[derive(Debug, Error)]
pub enum DigestError {
    /// A required setting is missing or out of range.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The request never produced a response (connect, timeout, body read).
    #[error("Request to {url} failed")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The server answered with a non-success status.
    #[error("Request to {url} failed with status {status}: {body}")]
    HttpStatus {
        url: String,
        status: reqwest::StatusCode,
        body: String,
    },

    /// The forecast payload does not line up with what was requested.
    #[error("Unexpected forecast data: {0}")]
    DataShape(String),

    #[error("Failed to parse {what} JSON")]
    Decode {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("I/O error on {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Failed to serialize configuration to TOML")]
    ConfigSerialize(#[from] toml::ser::Error),
}

impl DigestError {
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_) | Self::ConfigParse { .. })
    }

    /// Transport failures and error statuses both count as network errors.
    pub fn is_network(&self) -> bool {
        matches!(self, Self::Transport { .. } | Self::HttpStatus { .. })
    }

    /// Malformed success bodies are treated the same as shape mismatches.
    pub fn is_data_shape(&self) -> bool {
        matches!(self, Self::DataShape(_) | Self::Decode { .. })
    }

    pub fn status(&self) -> Option<reqwest::StatusCode> {
        match self {
            Self::HttpStatus { status, .. } => Some(*status),
            Self::Transport { source, .. } => source.status(),
            _ => None,
        }
    }
}

pub type Result<T, E = DigestError> = std::result::Result<T, E>;

pub(crate) fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    if body.len() > MAX {
        let mut end = MAX;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &body[..end])
    } else {
        body.to_string()
    }
}
