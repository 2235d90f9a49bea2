use thiserror::Error;

use crate::types::EntityRef;

/// Top-level error type for mapping, compiling and reconciling object graphs.
#[derive(Error, Debug)]
pub enum MappingError {
    #[error("Schema error: type {type_name} is not registered")]
    Schema { type_name: String },

    #[error("Schema error: field {field} expects {expected}, found {found}")]
    TargetMismatch {
        field: String,
        expected: String,
        found: String,
    },

    #[error("Unknown entity reference: {0}")]
    UnknownEntity(EntityRef),

    #[error("Reconciliation error: correlation id {correlation} was not sent in batch {batch}")]
    Reconciliation { batch: usize, correlation: i64 },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl MappingError {
    /// Schema failures exclude a single entity from a traversal; everything
    /// else is reported to the caller.
    pub fn is_schema(&self) -> bool {
        matches!(
            self,
            Self::Schema { .. } | Self::TargetMismatch { .. } | Self::UnknownEntity(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, MappingError>;
