//! Feed Error Types

use thiserror::Error;

/// Errors while retrieving a snapshot from the alert feed
#[derive(Debug, Error)]
pub enum FeedError {
    /// Connection or transport level failure
    #[error("Transport error: {0}")]
    Transport(String),

    /// Feed did not answer within the request timeout
    #[error("Timeout waiting for alert feed after {0}ms")]
    Timeout(u64),

    /// Feed answered with a non-success status
    #[error("Feed returned HTTP status {0}")]
    Status(u16),

    /// HTTP client could not be constructed
    #[error("Invalid fetcher configuration: {0}")]
    InvalidConfig(String),
}
