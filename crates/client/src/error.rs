use thiserror::Error;

/// Errors that can occur when communicating with a model training service.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid base URL: {0}")]
    InvalidBaseUrl(String),
    #[error("url error: {0}")]
    Url(#[from] url::ParseError),
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server error (status {status}, code {code}): {message}")]
    Server {
        status: u16,
        code: String,
        message: String,
    },
}

impl ClientError {
    pub(crate) fn server(
        status: u16,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        ClientError::Server {
            status,
            code: code.into(),
            message: message.into(),
        }
    }
}
