use thiserror::Error;

/// Failure talking to the ERP.
///
/// For reads these are never surfaced to end users: the enricher degrades the
/// view instead. For transfer posting they abort the approval.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ErpError {
    #[error("not found in ERP: {0}")]
    NotFound(String),

    #[error("ERP request timed out")]
    Timeout,

    #[error("ERP login failed: {0}")]
    Unauthorized(String),

    #[error("ERP rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("ERP transport error: {0}")]
    Transport(String),

    #[error("unexpected ERP payload: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for ErpError {
    fn from(value: reqwest::Error) -> Self {
        if value.is_timeout() {
            ErpError::Timeout
        } else if value.is_decode() {
            ErpError::Decode(value.to_string())
        } else {
            ErpError::Transport(value.to_string())
        }
    }
}
