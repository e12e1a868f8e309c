//! Shared types and models for the Mill Roll Tracking Platform
//!
//! This crate contains the domain records of the production batch and fabric
//! roll lifecycle together with the pure rules that govern them: identifier
//! formats, roll partitioning, wastage arithmetic and the status transition
//! tables. Nothing in here performs I/O.

pub mod identifiers;
pub mod lifecycle;
pub mod models;
pub mod types;
pub mod validation;

pub use identifiers::*;
pub use lifecycle::*;
pub use models::*;
pub use types::*;
pub use validation::*;
