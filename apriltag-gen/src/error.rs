//! Error types for tag rendering.

use thiserror::Error;

/// Errors raised by the rendering engine.
///
/// Every variant is a deterministic validation failure: the same arguments
/// always produce the same error, and no partial artifact is returned.
#[derive(Debug, Error)]
pub enum TagError {
    #[error("tag id {id} is not in the tag36h11 family (valid ids are 0-{max})")]
    UnknownTagId { id: u32, max: u32 },

    #[error("invalid size: {reason}")]
    InvalidSize { reason: String },

    #[error("invalid layout: {reason}")]
    InvalidLayout { reason: String },

    #[error("failed to encode {format}: {message}")]
    Encode { format: &'static str, message: String },
}

impl TagError {
    pub(crate) fn invalid_size(reason: impl Into<String>) -> Self {
        TagError::InvalidSize { reason: reason.into() }
    }

    pub(crate) fn invalid_layout(reason: impl Into<String>) -> Self {
        TagError::InvalidLayout { reason: reason.into() }
    }
}

pub type Result<T> = std::result::Result<T, TagError>;
