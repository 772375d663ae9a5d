//! Magpie Core - Domain model for OSINT collection and correlation
//!
//! This crate provides the foundational value types:
//! - Investigation targets with entry-point validation
//! - Raw entities as reported by individual sources
//! - Deduplicated entities with aggregated confidence
//! - Typed relationships and the collection-run aggregate

pub mod entity;
pub mod normalize;
pub mod relation;
pub mod run;
pub mod target;

pub use entity::*;
pub use normalize::*;
pub use relation::*;
pub use run::*;
pub use target::*;

/// Confidence assumed when a source reports none
pub const DEFAULT_CONFIDENCE: f64 = 0.5;

/// Minimum confidence score
pub const MIN_CONFIDENCE: f64 = 0.0;

/// Maximum confidence score
pub const MAX_CONFIDENCE: f64 = 1.0;
