//! graphsync-mapper: change tracking and statement compilation.
//!
//! A save runs through four stages:
//! 1. [`GraphMapper`] diffs an object graph against the [`MappingContext`]
//!    and produces a change-set
//! 2. [`Compiler::compile`] groups the change-set into a [`SavePlan`]
//! 3. [`Compiler::statements`] renders each operation kind through a
//!    pluggable statement factory; results are fed back with
//!    [`SavePlan::accept`]
//! 4. [`SavePlan::reconcile`] applies the confirmed effects to the object
//!    graph and the mapping context
//!
//! Executing statements is left to the caller (see `graphsync-cypher`).

pub mod compiler;
pub mod context;
mod facts;
pub mod mapper;
pub mod memo;
pub mod plan;

pub use compiler::{CompiledStatement, Compiler};
pub use context::MappingContext;
pub use mapper::GraphMapper;
pub use plan::{Batch, Endpoint, PlannedRow, ReconcileSummary, Resolution, SavePlan};
