//! Per-source results and the collection-run aggregate
//!
//! A `RawSourceResult` is written exactly once by its owning task and
//! read-only thereafter. The `CollectionRun` is assembled single-writer by
//! the orchestrator after every task reaches a terminal state; ownership
//! then passes to the caller.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entity::{Entity, RawEntity};
use crate::relation::Relationship;
use crate::target::Target;

/// Terminal state of one module invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceStatus {
    /// The module returned entities (possibly zero)
    Ok,
    /// The task deadline elapsed before an attempt completed
    Timeout,
    /// Every attempt failed
    Error,
    /// The module was requested but no adapter is registered
    Skipped,
}

impl SourceStatus {
    pub fn is_ok(&self) -> bool {
        matches!(self, SourceStatus::Ok)
    }
}

/// Everything one module produced for one run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawSourceResult {
    /// Module identifier
    pub module: String,
    /// Terminal state
    pub status: SourceStatus,
    /// Entities as received, un-deduplicated
    pub entities: Vec<RawEntity>,
    /// Present iff status != ok
    pub error_detail: Option<String>,
    /// Wall time of the supervised invocation, retries included
    pub duration: Duration,
}

impl RawSourceResult {
    pub fn ok(module: &str, entities: Vec<RawEntity>, duration: Duration) -> Self {
        Self {
            module: module.to_string(),
            status: SourceStatus::Ok,
            entities,
            error_detail: None,
            duration,
        }
    }

    pub fn error(module: &str, detail: &str, duration: Duration) -> Self {
        Self {
            module: module.to_string(),
            status: SourceStatus::Error,
            entities: Vec::new(),
            error_detail: Some(detail.to_string()),
            duration,
        }
    }

    pub fn timeout(module: &str, detail: &str, duration: Duration) -> Self {
        Self {
            module: module.to_string(),
            status: SourceStatus::Timeout,
            entities: Vec::new(),
            error_detail: Some(detail.to_string()),
            duration,
        }
    }

    pub fn skipped(module: &str) -> Self {
        Self {
            module: module.to_string(),
            status: SourceStatus::Skipped,
            entities: Vec::new(),
            error_detail: Some(format!("no adapter registered for module '{}'", module)),
            duration: Duration::ZERO,
        }
    }
}

/// Aggregate root for one orchestration invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionRun {
    /// Run identifier
    pub id: Uuid,
    /// The investigated target
    pub target: Target,
    /// Exactly one result per requested module, sorted by module id
    pub raw_results: Vec<RawSourceResult>,
    /// Deduplicated entities, sorted by `(kind, canonical_value)`
    pub entities: Vec<Entity>,
    /// Inferred edges, sorted by canonical triple
    pub relationships: Vec<Relationship>,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    /// True iff any module did not return ok
    pub partial_failure: bool,
}

impl CollectionRun {
    /// Modules that completed successfully, sorted.
    pub fn sources_ok(&self) -> Vec<&str> {
        self.raw_results
            .iter()
            .filter(|r| r.status.is_ok())
            .map(|r| r.module.as_str())
            .collect()
    }

    /// Terminal status of one requested module.
    pub fn status_of(&self, module: &str) -> Option<SourceStatus> {
        self.raw_results
            .iter()
            .find(|r| r.module == module)
            .map(|r| r.status)
    }

    /// Look up a merged entity by id.
    pub fn entity(&self, id: &str) -> Option<&Entity> {
        self.entities.iter().find(|e| e.id == id)
    }
}
