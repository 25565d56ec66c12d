/// Error types for the messaging engine
use crate::messenger_types::{MessageId, UserId};
use sled::transaction::{ConflictableTransactionError, TransactionError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MessagingError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("User not found: {0}")]
    UserNotFound(UserId),

    #[error("Message not found: {0}")]
    MessageNotFound(MessageId),

    #[error("Contact not found: {owner} -> {contact}")]
    ContactNotFound { owner: UserId, contact: UserId },

    #[error("Contact already exists: {owner} -> {contact}")]
    DuplicateContact { owner: UserId, contact: UserId },

    /// Raised by host authorizers; the engine assumes callers are already authorized
    #[error("Permission denied: {0}")]
    PermissionDenied(String),
}

pub type Result<T> = std::result::Result<T, MessagingError>;

impl From<TransactionError<MessagingError>> for MessagingError {
    fn from(e: TransactionError<MessagingError>) -> Self {
        match e {
            TransactionError::Abort(inner) => inner,
            TransactionError::Storage(e) => MessagingError::Storage(format!("transaction: {}", e)),
        }
    }
}

/// Abort the surrounding sled transaction with a domain error
pub(crate) fn abort<E: Into<MessagingError>>(e: E) -> ConflictableTransactionError<MessagingError> {
    ConflictableTransactionError::Abort(e.into())
}
