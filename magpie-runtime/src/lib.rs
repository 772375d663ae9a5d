//! Magpie Runtime - supervised collection tasks and the orchestrator
//!
//! `runner` turns one adapter invocation into exactly one result under a
//! wall-clock budget with retry semantics; `orchestrator` fans a target
//! out across its requested modules concurrently and assembles the
//! completed `CollectionRun`.

pub mod orchestrator;
pub mod runner;

pub use orchestrator::{CollectError, Orchestrator, OrchestratorConfig};
pub use runner::{run_collection_task, RetryPolicy};
