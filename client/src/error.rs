use thiserror::Error;
use zkbalance_common::protocol::{ErrorBody, ErrorCode};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("stored item failed authentication")]
    Decrypt,

    #[error("corrupt storage entry: {0}")]
    Corrupt(String),

    #[error("storage lock poisoned")]
    Poisoned,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Client-side failure classes. Only [`ClientError::Auth`] touches stored credentials.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("request rejected as a replay: {0}")]
    Replay(String),

    #[error("verification failed: {0}")]
    Verifier(String),

    #[error("proof generation failed: {0}")]
    Prover(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ClientError {
    /// Classify a non-success gate response.
    pub fn from_response(status: u16, body: Option<ErrorBody>) -> Self {
        if status == 401 || status == 403 {
            let msg = body.map(|b| b.error).unwrap_or_else(|| "unauthorized".to_string());
            return ClientError::Auth(msg);
        }

        match body {
            Some(ErrorBody { error, code }) => match code {
                ErrorCode::Auth => ClientError::Auth(error),
                ErrorCode::Replay => ClientError::Replay(error),
                ErrorCode::Validation | ErrorCode::MalformedSignal => ClientError::Validation(error),
                ErrorCode::Verifier | ErrorCode::Internal => ClientError::Verifier(error),
            },
            None if status >= 500 => ClientError::Verifier(format!("server returned {status}")),
            None => ClientError::Validation(format!("server returned {status}")),
        }
    }

    pub fn is_auth(&self) -> bool {
        matches!(self, ClientError::Auth(_))
    }
}
