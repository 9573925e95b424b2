//! Topology rule engine
//!
//! Validates one or two feature layers against named topology rules and
//! returns located violations. Candidate lookup goes through an R-tree over
//! feature bounding boxes; exact predicates come from `geo`.
//!
//! # Submodules
//! - `types` - Features, working-set entries and violation records
//! - `geometry` - Predicates, set operations and extent clipping over `geo`
//! - `layer` - Feature store trait and in-memory store
//! - `sqlite` - SQLite-backed feature store
//! - `index` - R-tree over feature bounding boxes
//! - `context` - Per-run working sets, index cache, cancellation and progress
//! - `config` - Checker settings
//! - `error` - Store and engine errors
//! - `rules` - Rule catalog and descriptors
//! - `checks` - Single-layer checks
//! - `gaps` - Gap detection
//! - `coverage` - Two-layer checks
//! - `engine` - Rule dispatch

mod types;
mod geometry;
mod layer;
mod sqlite;
mod index;
mod context;
mod config;
mod error;
mod rules;
mod checks;
mod gaps;
mod coverage;
mod engine;

// Re-export public types
pub use types::{
    Feature, FeatureId, FeatureLayer, FeatureRefReport, GeometryKind,
    TopologyViolation, ViolationKind, ViolationReport,
};
pub use layer::{Layer, MemoryLayer};
pub use sqlite::SqliteLayer;
pub use index::FeatureIndex;
pub use context::{CancellationToken, ProgressFn, RunContext};
pub use config::CheckerConfig;
pub use error::{EngineError, StoreError};
pub use rules::{CheckFn, Rule, RuleDescriptor, RuleRegistry};
pub use geometry::Extent;

// Re-export the engine entry points
pub use engine::{TopologyEngine, ValidationScope};
