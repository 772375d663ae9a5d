//! The orchestrator - concurrent fan-out over requested modules
//!
//! One collection run launches one supervised task per resolvable module
//! and waits for all of them; per-module failures stay inside their own
//! results. The only run-level failures are a target that requests no
//! modules and a registry that resolves none of the requested ones.
//!
//! Determinism of the output does not come from task ordering (there is
//! none) but from the correlation engine's canonical fold and from
//! sorting the results by module id before assembly.

use std::time::Duration;

use chrono::Utc;
use futures::stream::{self, StreamExt};
use serde::Deserialize;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{info, warn};
use uuid::Uuid;

use magpie_core::{CollectionRun, RawSourceResult, Target};
use magpie_correlate::correlate;
use magpie_sources::AdapterRegistry;

use crate::runner::{run_collection_task, RetryPolicy};

/// Run-level failures. Individual module failures never surface here.
#[derive(Debug, Error)]
pub enum CollectError {
    #[error("target requests no modules")]
    NoModulesRequested,

    #[error("none of the requested modules has a registered adapter: {0:?}")]
    NoAdapters(Vec<String>),
}

/// Timing and concurrency knobs for one orchestrator
#[derive(Debug, Clone, Deserialize)]
pub struct OrchestratorConfig {
    /// Hard wall-clock bound for the whole run, seconds
    #[serde(default = "default_global_deadline_secs")]
    pub global_deadline_secs: u64,
    /// Budget for a single module task, seconds
    #[serde(default = "default_per_module_timeout_secs")]
    pub per_module_timeout_secs: u64,
    /// Module tasks allowed to run concurrently (0 = unbounded)
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
    /// Retry behavior shared by every module task
    #[serde(default)]
    pub retry: RetryPolicy,
}

fn default_global_deadline_secs() -> u64 {
    300
}

fn default_per_module_timeout_secs() -> u64 {
    60
}

fn default_max_concurrent() -> usize {
    4
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            global_deadline_secs: default_global_deadline_secs(),
            per_module_timeout_secs: default_per_module_timeout_secs(),
            max_concurrent: default_max_concurrent(),
            retry: RetryPolicy::default(),
        }
    }
}

/// Fans a target out to its requested modules and assembles the run
pub struct Orchestrator {
    registry: AdapterRegistry,
    config: OrchestratorConfig,
}

impl Orchestrator {
    pub fn new(registry: AdapterRegistry, config: OrchestratorConfig) -> Self {
        Self { registry, config }
    }

    /// Run collection for the target and correlate the results into one run.
    ///
    /// Exactly one `RawSourceResult` comes back per requested module:
    /// unresolvable modules as `Skipped`, modules cut off by the global
    /// deadline as `Timeout`, the rest as whatever their task produced.
    pub async fn collect_intelligence(
        &self,
        target: Target,
    ) -> Result<CollectionRun, CollectError> {
        if target.modules.is_empty() {
            return Err(CollectError::NoModulesRequested);
        }

        let started_at = Utc::now();
        let run_id = Uuid::new_v4();

        let mut skipped: Vec<RawSourceResult> = Vec::new();
        let mut tasks = Vec::new();
        for module in &target.modules {
            match self.registry.get(module) {
                Some(adapter) => tasks.push((module.clone(), adapter)),
                None => {
                    warn!(%module, "requested module has no adapter, skipping");
                    skipped.push(RawSourceResult::skipped(module));
                }
            }
        }
        if tasks.is_empty() {
            return Err(CollectError::NoAdapters(
                target.modules.iter().cloned().collect(),
            ));
        }

        info!(
            run = %run_id,
            target = %target.value,
            kind = %target.kind,
            launched = tasks.len(),
            skipped = skipped.len(),
            "collection starting"
        );

        let global_deadline =
            Instant::now() + Duration::from_secs(self.config.global_deadline_secs);
        let per_module = Duration::from_secs(self.config.per_module_timeout_secs);
        let limit = match self.config.max_concurrent {
            0 => tasks.len().max(1),
            n => n,
        };

        let target_ref = &target;
        let mut raw_results: Vec<RawSourceResult> = stream::iter(tasks)
            .map(|(module, adapter)| {
                let retry = self.config.retry.clone();
                async move {
                    // Budget is computed when the task actually starts, so
                    // queued tasks cannot outlive the global deadline
                    let remaining = global_deadline.saturating_duration_since(Instant::now());
                    if remaining.is_zero() {
                        warn!(%module, "global deadline reached before the module started");
                        return RawSourceResult::timeout(
                            &module,
                            "global deadline reached before the module started",
                            Duration::ZERO,
                        );
                    }
                    run_collection_task(adapter, target_ref, per_module.min(remaining), &retry)
                        .await
                }
            })
            .buffer_unordered(limit)
            .collect()
            .await;

        raw_results.extend(skipped);
        raw_results.sort_by(|a, b| a.module.cmp(&b.module));

        let partial_failure = raw_results.iter().any(|r| !r.status.is_ok());
        let correlated = correlate(&target, &raw_results);
        let completed_at = Utc::now();

        info!(
            run = %run_id,
            entities = correlated.entities.len(),
            relationships = correlated.relationships.len(),
            partial_failure,
            "collection complete"
        );

        Ok(CollectionRun {
            id: run_id,
            target,
            raw_results,
            entities: correlated.entities,
            relationships: correlated.relationships,
            started_at,
            completed_at,
            partial_failure,
        })
    }
}
