use http::StatusCode;
use thiserror::Error;

/// Error taxonomy for the translation and streaming pipeline.
///
/// Cache failures are deliberately absent: the attachment cache degrades to
/// a miss and is never allowed to fail a request (see `crate::cache`).
#[derive(Debug, Error)]
pub enum Chat2PoeError {
    /// No usable content survived translation. User-caused.
    #[error("messages list (derived from 'input') cannot be empty")]
    EmptyMessageList,

    /// Malformed inline image reference. User-caused.
    #[error("invalid image data url format: {0}")]
    InvalidImageEncoding(String),

    /// The request body does not fit either accepted input shape.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The upload collaborator failed. Environment-caused.
    #[error("image upload failed: {0}")]
    UploadFailed(String),

    /// The upstream bot call failed, possibly mid-stream.
    #[error("provider error: {0}")]
    Provider(String),

    /// No API key could be extracted from the request headers.
    #[error("API key required")]
    MissingCredentials,
}

impl Chat2PoeError {
    /// HTTP status equivalent for error responses produced before any
    /// streaming has begun. Mid-stream failures never reach this mapping;
    /// they are folded into the event stream instead (see `crate::service`).
    pub fn status_code(&self) -> StatusCode {
        match self {
            Chat2PoeError::EmptyMessageList
            | Chat2PoeError::InvalidImageEncoding(_)
            | Chat2PoeError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Chat2PoeError::UploadFailed(_) | Chat2PoeError::Provider(_) => StatusCode::BAD_GATEWAY,
            Chat2PoeError::MissingCredentials => StatusCode::UNAUTHORIZED,
        }
    }
}
