//! Topology checking for vector feature layers
//!
//! See [`topology`] for the rule engine. Typical use:
//!
//! ```ignore
//! let roads = MemoryLayer::from_wkt("roads", GeometryKind::Line, &["LINESTRING(0 0, 5 5)"])?;
//! let mut engine = TopologyEngine::default();
//! let scope = ValidationScope::WholeLayer;
//! let dangles = engine.run_test("must not have dangles", Some(&roads), None, scope);
//! ```

pub mod topology;

pub use topology::{
    CheckerConfig, Feature, GeometryKind, Layer, MemoryLayer, SqliteLayer, TopologyEngine,
    TopologyViolation, ValidationScope, ViolationKind,
};
