use thiserror::Error;

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Bridge capability not available: {0}")]
    NotAvailable(String),

    #[error("Bridge operation failed: {0}")]
    OperationFailed(String),

    #[error("Network unreachable: {0}")]
    Unreachable(String),

    #[error("Remote server returned HTTP {status}: {message}")]
    HttpStatus { status: u16, message: String },

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BridgeError {
    /// Whether the failure came from the network path rather than the host.
    pub fn is_connectivity(&self) -> bool {
        matches!(
            self,
            BridgeError::Unreachable(_) | BridgeError::HttpStatus { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;
