use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {path}: {source}")]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid seed file {path}: {source}")]
    Seed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid provider url `{url}`: {reason}")]
    ProviderUrl { url: String, reason: &'static str },

    /// Invalid record type definition.
    #[error("model {model}: {message}")]
    Model { model: String, message: String },

    #[error(transparent)]
    Store(#[from] remoting_store::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
