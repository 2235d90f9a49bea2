//! graphsync-core: Shared types, schema registry, and statement model for graphsync.
//!
//! This crate provides the foundational types used across all graphsync crates:
//! - The object graph arena (entities, property values, stable entity references)
//! - The static schema registry mapping domain types to labels and relationships
//! - Relationship facts and the closed set of change variants
//! - The statement model and the pluggable statement factory seam
//! - Configuration and common error types

pub mod change;
pub mod config;
pub mod error;
pub mod schema;
pub mod statement;
pub mod types;

pub use change::{Change, ChangeSet, Diagnostic, LiveRelationship, MappedRelationship, Presence};
pub use config::{MapperConfig, StatementForm};
pub use error::{MappingError, Result};
pub use schema::{Direction, EntityDescriptor, RelationshipField, SchemaRegistry};
pub use statement::{
    BatchDescriptor, BatchKey, BatchRow, OperationKind, ResultShape, Statement, StatementFactory,
};
pub use types::{Entity, EntityRef, NodeId, NodeKey, ObjectGraph, PropertyMap, Value};
