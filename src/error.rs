//! Error types for linkfield library

use crate::element::ElementType;
use crate::field::FieldId;
use thiserror::Error;

/// Result type alias for linkfield operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for linkfield library
#[derive(Error, Debug)]
pub enum Error {
    // -------------------------------------------------------------------------
    // Serialization Errors
    // -------------------------------------------------------------------------
    #[error("Failed to serialize data: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Invalid stored link value: {0}")]
    InvalidLinkValue(String),

    // -------------------------------------------------------------------------
    // Link Type Errors
    // -------------------------------------------------------------------------
    #[error("Link type '{0}' is not registered")]
    UnknownLinkType(String),

    #[error("Link type '{handle}' expects a {expected} target, got {actual}")]
    TargetKindMismatch {
        handle: String,
        expected: String,
        actual: String,
    },

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Field {0} not found")]
    FieldNotFound(FieldId),

    #[error("Invalid configuration for field {field}: {reason}")]
    InvalidFieldConfig { field: FieldId, reason: String },

    #[error("Failed to read field configuration: {0}")]
    ConfigSource(String),

    // -------------------------------------------------------------------------
    // Element Store Errors
    // -------------------------------------------------------------------------
    #[error("Element store query for '{element_type}' failed: {reason}")]
    ElementStore {
        element_type: ElementType,
        reason: String,
    },

    // -------------------------------------------------------------------------
    // Cache Errors
    // -------------------------------------------------------------------------
    #[error("Invalid cache strategy: {0}")]
    InvalidCacheStrategy(String),
}

impl Error {
    /// Check if this is a "not found" type error
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::FieldNotFound(_) | Error::UnknownLinkType(_))
    }

    /// Check if this error comes from the configuration layer.
    ///
    /// These are the errors surfaced to the authoring context; the render path
    /// never returns them for individual links.
    #[must_use]
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            Error::Config(_)
                | Error::InvalidLinkValue(_)
                | Error::UnknownLinkType(_)
                | Error::TargetKindMismatch { .. }
                | Error::FieldNotFound(_)
                | Error::InvalidFieldConfig { .. }
                | Error::ConfigSource(_)
                | Error::InvalidCacheStrategy(_)
        )
    }
}
