//! Error types for the Jellyfin provider

use bridge_traits::error::BridgeError;
use thiserror::Error;

/// Jellyfin provider errors
#[derive(Error, Debug)]
pub enum JellyfinError {
    /// Server base URL could not be parsed
    #[error("Invalid server URL '{url}': {message}")]
    InvalidBaseUrl { url: String, message: String },

    /// API request returned a non-success status
    #[error("Jellyfin API error (status {status_code}): {message}")]
    ApiError { status_code: u16, message: String },

    /// Item does not exist for this user
    #[error("Item not found: {item_id}")]
    ItemNotFound { item_id: String },

    /// Failed to parse API response
    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    /// Bridge error
    #[error(transparent)]
    BridgeError(#[from] BridgeError),
}

/// Result type for Jellyfin operations
pub type Result<T> = std::result::Result<T, JellyfinError>;

impl From<JellyfinError> for BridgeError {
    fn from(error: JellyfinError) -> Self {
        match error {
            JellyfinError::ApiError {
                status_code,
                message,
            } => BridgeError::HttpStatus {
                status: status_code,
                message,
            },
            JellyfinError::ItemNotFound { item_id } => BridgeError::HttpStatus {
                status: 404,
                message: format!("Item not found: {}", item_id),
            },
            JellyfinError::InvalidBaseUrl { .. } | JellyfinError::ParseError(_) => {
                BridgeError::OperationFailed(error.to_string())
            }
            JellyfinError::BridgeError(e) => e,
        }
    }
}
