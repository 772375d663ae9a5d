//! Magpie Correlate - deterministic correlation and graph projection
//!
//! Everything in this crate is pure with respect to I/O:
//! - [`engine::correlate`] folds raw per-source results into deduplicated,
//!   confidence-aggregated entities and typed relationships
//! - [`graph::project`] renders a run as the visualization payload
//! - [`sink`] defines the storage and search-index collaborator contracts
//!   and the export drivers that apply a run to them idempotently

pub mod engine;
pub mod graph;
pub mod sink;

pub use engine::{correlate, Correlated};
pub use graph::{project, GraphEdge, GraphMetadata, GraphNode, GraphPayload};
pub use sink::{
    document_entities, export_run, DocumentSink, EntityDocument, GraphSink, MemoryGraphSink,
    SinkError, StoredNode,
};
