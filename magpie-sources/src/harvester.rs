//! TheHarvester adapter - subprocess invocation with JSON report parsing
//!
//! TheHarvester is a CLI tool, not a service. Each fetch runs the binary
//! against the target domain with a temporary report path, parses the
//! JSON report it writes, and removes the report files afterwards.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;
use tracing::{debug, info, warn};
use uuid::Uuid;

use magpie_core::{normalize, EntityKind, RawEntity, Target, TargetKind};

use crate::{SourceAdapter, SourceError};

pub const MODULE: &str = "harvester";

/// Configuration for theHarvester CLI
#[derive(Debug, Clone, Deserialize)]
pub struct HarvesterConfig {
    /// Binary name or path
    #[serde(default = "default_binary")]
    pub binary: String,
    /// Data sources passed via -b, comma-joined
    #[serde(default = "default_data_sources")]
    pub data_sources: Vec<String>,
    /// Wall-clock budget for one invocation in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_binary() -> String {
    "theHarvester".to_string()
}

fn default_data_sources() -> Vec<String> {
    vec![
        "bing".to_string(),
        "duckduckgo".to_string(),
        "crtsh".to_string(),
    ]
}

fn default_timeout_secs() -> u64 {
    120
}

impl Default for HarvesterConfig {
    fn default() -> Self {
        Self {
            binary: default_binary(),
            data_sources: default_data_sources(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Adapter that shells out to theHarvester
pub struct HarvesterAdapter {
    config: HarvesterConfig,
}

impl HarvesterAdapter {
    pub fn new(config: HarvesterConfig) -> Result<Self, SourceError> {
        if config.data_sources.is_empty() {
            return Err(SourceError::Config(
                "harvester adapter has no data sources configured".to_string(),
            ));
        }
        Ok(Self { config })
    }

    /// The domain theHarvester should be pointed at, if the target has one
    fn harvest_domain(target: &Target) -> Option<String> {
        match target.kind {
            TargetKind::Domain => Some(target.value.clone()),
            TargetKind::Email => normalize::email_domain(&target.value).map(str::to_string),
            TargetKind::Ip | TargetKind::Person => None,
        }
    }

    async fn run_tool(&self, domain: &str, report_stem: &Path) -> Result<(), SourceError> {
        let sources = self.config.data_sources.join(",");
        debug!(domain, sources = %sources, "invoking theHarvester");

        let invocation = Command::new(&self.config.binary)
            .arg("-d")
            .arg(domain)
            .arg("-b")
            .arg(&sources)
            .arg("-f")
            .arg(report_stem)
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();

        let output = tokio::time::timeout(
            Duration::from_secs(self.config.timeout_secs),
            invocation,
        )
        .await
        .map_err(|_| SourceError::Timeout(self.config.timeout_secs))?
        .map_err(|e| SourceError::Tool(format!("failed to spawn {}: {}", self.config.binary, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(SourceError::Tool(format!(
                "theHarvester exited with {}: {}",
                output.status,
                stderr.chars().take(200).collect::<String>()
            )));
        }
        Ok(())
    }

    async fn read_report(&self, report_stem: &Path) -> Result<HarvesterReport, SourceError> {
        let json_path = report_stem.with_extension("json");
        let body = tokio::fs::read_to_string(&json_path)
            .await
            .map_err(|e| SourceError::Tool(format!("report {} unreadable: {}", json_path.display(), e)))?;
        serde_json::from_str(&body)
            .map_err(|e| SourceError::Parse(format!("harvester report: {}", e)))
    }

    /// Remove the report files the tool writes next to the stem
    async fn cleanup(report_stem: &Path) {
        for ext in ["json", "xml"] {
            let path = report_stem.with_extension(ext);
            if let Err(e) = tokio::fs::remove_file(&path).await {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!(path = %path.display(), error = %e, "failed to remove report file");
                }
            }
        }
    }
}

#[async_trait]
impl SourceAdapter for HarvesterAdapter {
    fn module(&self) -> &str {
        MODULE
    }

    async fn fetch(&self, target: &Target) -> Result<Vec<RawEntity>, SourceError> {
        let domain = match Self::harvest_domain(target) {
            Some(domain) => domain,
            None => {
                debug!(target = %target.value, "theHarvester has no surface for this target kind");
                return Ok(Vec::new());
            }
        };

        let report_stem =
            std::env::temp_dir().join(format!("magpie-harvester-{}", Uuid::new_v4()));

        let result = self.run_tool(&domain, &report_stem).await;
        let report = match result {
            Ok(()) => self.read_report(&report_stem).await,
            Err(e) => Err(e),
        };
        Self::cleanup(&report_stem).await;

        let entities = report_to_entities(report?);
        info!(
            target = %target.value,
            count = entities.len(),
            "theHarvester collection complete"
        );
        Ok(entities)
    }
}

/// Flatten a report into raw entities.
///
/// Host lines may carry a resolved address as "hostname:ip"; both halves
/// become entities when present.
fn report_to_entities(report: HarvesterReport) -> Vec<RawEntity> {
    let mut entities = Vec::new();

    for email in &report.emails {
        let email = email.trim();
        if email.is_empty() {
            continue;
        }
        entities.push(RawEntity::new(EntityKind::Email, email, MODULE).with_confidence(0.8));
    }

    for host_line in &report.hosts {
        let (host, resolved) = match host_line.split_once(':') {
            Some((host, rest)) => (host.trim(), Some(rest.trim())),
            None => (host_line.trim(), None),
        };
        if !host.is_empty() {
            entities.push(RawEntity::new(EntityKind::Domain, host, MODULE).with_confidence(0.7));
        }
        if let Some(resolved) = resolved.filter(|r| !r.is_empty()) {
            for addr in resolved.split(',').map(str::trim).filter(|a| !a.is_empty()) {
                entities.push(
                    RawEntity::new(EntityKind::Ip, addr, MODULE)
                        .with_confidence(0.7)
                        .with_attribute("dns_name", host),
                );
            }
        }
    }

    for ip in &report.ips {
        let ip = ip.trim();
        if ip.is_empty() {
            continue;
        }
        entities.push(RawEntity::new(EntityKind::Ip, ip, MODULE).with_confidence(0.7));
    }

    entities
}

// theHarvester JSON report shape
#[derive(Debug, Default, Deserialize)]
struct HarvesterReport {
    #[serde(default)]
    hosts: Vec<String>,
    #[serde(default)]
    emails: Vec<String>,
    #[serde(default)]
    ips: Vec<String>,
}
