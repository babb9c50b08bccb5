use std::time::Duration;

use logwatch_notify::NotifyError;
use logwatch_rules::QueryError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("store returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed store response: {0}")]
    Malformed(String),

    #[error("invalid store url: {0}")]
    InvalidUrl(String),

    #[error("store not reachable after {attempts} attempts: {last_error}")]
    Unreachable { attempts: u32, last_error: String },
}

impl StorageError {
    /// Map onto the query adapter's error model.
    pub fn into_query_error(self, timeout: Duration) -> QueryError {
        match self {
            StorageError::Http(e) if e.is_timeout() => QueryError::QueryTimeout(timeout),
            StorageError::Http(e) => QueryError::StoreUnavailable(e.to_string()),
            StorageError::Status { status, body } if status >= 500 => {
                QueryError::StoreUnavailable(format!("status {status}: {body}"))
            }
            StorageError::Status { status, body } => QueryError::Rejected {
                status,
                reason: body,
            },
            StorageError::Malformed(msg) => QueryError::MalformedResponse(msg),
            other => QueryError::StoreUnavailable(other.to_string()),
        }
    }
}

impl From<StorageError> for NotifyError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Http(e) => NotifyError::Http(e),
            StorageError::Status { status, body } => NotifyError::Status { status, body },
            other => NotifyError::Store(other.to_string()),
        }
    }
}
