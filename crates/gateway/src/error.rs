use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// The transport body is neither a call envelope, a batch, nor a form
    /// submission.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// A handler failed while the server runs in debug mode.
    #[error("{action}.{method} failed: {message}")]
    Handler {
        action: String,
        method: String,
        message: String,
    },

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
