//! SpiderFoot adapter - scan lifecycle over the SpiderFoot HTTP API
//!
//! SpiderFoot scans are asynchronous on the server side, so a single
//! fetch drives the full lifecycle: start a scan, poll its status until
//! it finishes, then pull the accumulated events and translate them
//! into raw entities.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use magpie_core::{EntityKind, RawEntity, Target, DEFAULT_CONFIDENCE};

use crate::{http, SourceAdapter, SourceError};

pub const MODULE: &str = "spiderfoot";

/// Scan states reported by the server that mean "stop polling"
const TERMINAL_FAILURES: &[&str] = &["ERROR-FAILED", "ABORTED", "ABORT-REQUESTED"];

/// Configuration for the SpiderFoot HTTP API
#[derive(Debug, Clone, Deserialize)]
pub struct SpiderFootConfig {
    /// Base URL of the SpiderFoot server
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Per-request HTTP timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Delay between scan status polls in milliseconds
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Maximum status polls before giving up on a scan
    #[serde(default = "default_max_polls")]
    pub max_polls: u32,
    /// SpiderFoot module groups to enable per scan
    #[serde(default = "default_scan_modules")]
    pub scan_modules: Vec<String>,
}

fn default_base_url() -> String {
    "http://127.0.0.1:5001".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_poll_interval_ms() -> u64 {
    2000
}

fn default_max_polls() -> u32 {
    30
}

fn default_scan_modules() -> Vec<String> {
    vec![
        "dns".to_string(),
        "whois".to_string(),
        "social".to_string(),
        "leaks".to_string(),
    ]
}

impl Default for SpiderFootConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
            poll_interval_ms: default_poll_interval_ms(),
            max_polls: default_max_polls(),
            scan_modules: default_scan_modules(),
        }
    }
}

/// Adapter for a SpiderFoot server instance
pub struct SpiderFootAdapter {
    config: SpiderFootConfig,
    client: Client,
}

impl SpiderFootAdapter {
    pub fn new(config: SpiderFootConfig) -> Result<Self, SourceError> {
        let client = http::build_client(Duration::from_secs(config.timeout_secs))?;
        Ok(Self { config, client })
    }

    /// Kick off a scan and return the server-assigned scan id
    async fn start_scan(&self, target: &Target) -> Result<String, SourceError> {
        let url = format!("{}/startscan", self.config.base_url.trim_end_matches('/'));
        let request = StartScanRequest {
            scan_name: format!("magpie-{}", target.value),
            scan_target: target.value.clone(),
            module_list: self.config.scan_modules.join(","),
        };

        let response = self.client.post(&url).json(&request).send().await?;
        let response = http::ensure_success(response).await?;
        let started: StartScanResponse = response
            .json()
            .await
            .map_err(|e| SourceError::Parse(format!("startscan response: {}", e)))?;

        debug!(scan_id = %started.id, target = %target.value, "SpiderFoot scan started");
        Ok(started.id)
    }

    /// Poll scan status until the scan finishes or the poll budget runs out
    async fn await_scan(&self, scan_id: &str) -> Result<(), SourceError> {
        let url = format!(
            "{}/scanstatus?id={}",
            self.config.base_url.trim_end_matches('/'),
            urlencoding::encode(scan_id)
        );

        for poll in 0..self.config.max_polls {
            let response = self.client.get(&url).send().await?;
            let response = http::ensure_success(response).await?;
            let status: ScanStatusResponse = response
                .json()
                .await
                .map_err(|e| SourceError::Parse(format!("scanstatus response: {}", e)))?;

            if status.status == "FINISHED" {
                debug!(scan_id, polls = poll + 1, "SpiderFoot scan finished");
                return Ok(());
            }
            if TERMINAL_FAILURES.contains(&status.status.as_str()) {
                return Err(SourceError::Tool(format!(
                    "scan {} ended in state {}",
                    scan_id, status.status
                )));
            }

            tokio::time::sleep(Duration::from_millis(self.config.poll_interval_ms)).await;
        }

        let budget_secs =
            self.config.max_polls as u64 * self.config.poll_interval_ms / 1000;
        warn!(scan_id, "SpiderFoot scan still running after poll budget");
        Err(SourceError::Timeout(budget_secs))
    }

    /// Fetch all events the finished scan produced
    async fn scan_events(&self, scan_id: &str) -> Result<Vec<ScanEvent>, SourceError> {
        let url = format!(
            "{}/scaneventresults?id={}",
            self.config.base_url.trim_end_matches('/'),
            urlencoding::encode(scan_id)
        );

        let response = self.client.get(&url).send().await?;
        let response = http::ensure_success(response).await?;
        response
            .json()
            .await
            .map_err(|e| SourceError::Parse(format!("scaneventresults response: {}", e)))
    }
}

#[async_trait]
impl SourceAdapter for SpiderFootAdapter {
    fn module(&self) -> &str {
        MODULE
    }

    async fn fetch(&self, target: &Target) -> Result<Vec<RawEntity>, SourceError> {
        let scan_id = self.start_scan(target).await?;
        self.await_scan(&scan_id).await?;
        let events = self.scan_events(&scan_id).await?;

        let entities = events_to_entities(events);
        info!(
            target = %target.value,
            count = entities.len(),
            "SpiderFoot collection complete"
        );
        Ok(entities)
    }
}

/// Translate SpiderFoot events into raw entities.
///
/// Event types follow SpiderFoot's own taxonomy; anything unrecognized
/// is kept as `Other` rather than dropped, so downstream consumers can
/// still see it in the run record.
fn events_to_entities(events: Vec<ScanEvent>) -> Vec<RawEntity> {
    events
        .into_iter()
        .filter(|event| !event.data.trim().is_empty())
        .map(|event| {
            let kind = kind_for_event_type(&event.event_type);
            let confidence = event
                .confidence
                .map(|c| f64::from(c.min(100)) / 100.0)
                .unwrap_or(DEFAULT_CONFIDENCE);

            RawEntity::new(kind, event.data.trim(), MODULE)
                .with_confidence(confidence)
                .with_attribute("event_type", &event.event_type)
                .with_attribute("scanner_module", &event.module)
        })
        .collect()
}

fn kind_for_event_type(event_type: &str) -> EntityKind {
    match event_type {
        "EMAILADDR" | "EMAILADDR_GENERIC" => EntityKind::Email,
        "IP_ADDRESS" | "IPV6_ADDRESS" | "AFFILIATE_IPADDR" => EntityKind::Ip,
        "INTERNET_NAME" | "DOMAIN_NAME" | "AFFILIATE_INTERNET_NAME" | "SIMILARDOMAIN"
        | "CO_HOSTED_SITE" => EntityKind::Domain,
        "HUMAN_NAME" => EntityKind::Person,
        "COMPANY_NAME" => EntityKind::Organization,
        _ => EntityKind::Other,
    }
}

#[derive(Debug, Serialize)]
struct StartScanRequest {
    #[serde(rename = "scanname")]
    scan_name: String,
    #[serde(rename = "scantarget")]
    scan_target: String,
    #[serde(rename = "modulelist")]
    module_list: String,
}

#[derive(Debug, Deserialize)]
struct StartScanResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct ScanStatusResponse {
    status: String,
}

#[derive(Debug, Deserialize)]
struct ScanEvent {
    #[serde(rename = "type")]
    event_type: String,
    data: String,
    #[serde(default)]
    module: String,
    #[serde(default)]
    confidence: Option<u8>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_type_mapping() {
        assert_eq!(kind_for_event_type("EMAILADDR"), EntityKind::Email);
        assert_eq!(kind_for_event_type("IP_ADDRESS"), EntityKind::Ip);
        assert_eq!(kind_for_event_type("INTERNET_NAME"), EntityKind::Domain);
        assert_eq!(kind_for_event_type("HUMAN_NAME"), EntityKind::Person);
        assert_eq!(kind_for_event_type("COMPANY_NAME"), EntityKind::Organization);
        assert_eq!(kind_for_event_type("RAW_RIR_DATA"), EntityKind::Other);
    }

    #[test]
    fn test_events_to_entities() {
        let payload = r#"[
            {"type": "EMAILADDR", "data": "admin@example.com", "module": "sfp_email", "confidence": 80},
            {"type": "IP_ADDRESS", "data": "93.184.216.34", "module": "sfp_dnsresolve", "confidence": 100},
            {"type": "SOCIAL_MEDIA", "data": "twitter.com/example", "module": "sfp_social"},
            {"type": "EMAILADDR", "data": "   ", "module": "sfp_email"}
        ]"#;
        let events: Vec<ScanEvent> = serde_json::from_str(payload).unwrap();
        let entities = events_to_entities(events);

        assert_eq!(entities.len(), 3);
        assert_eq!(entities[0].kind, EntityKind::Email);
        assert_eq!(entities[0].value, "admin@example.com");
        assert!((entities[0].confidence - 0.8).abs() < 1e-9);
        assert_eq!(entities[0].source_module, "spiderfoot");
        assert_eq!(
            entities[0].attributes.get("event_type"),
            Some(&"EMAILADDR".to_string())
        );

        assert!((entities[1].confidence - 1.0).abs() < 1e-9);

        // No confidence in the event falls back to the default
        assert_eq!(entities[2].kind, EntityKind::Other);
        assert!((entities[2].confidence - DEFAULT_CONFIDENCE).abs() < 1e-9);
    }

    #[test]
    fn test_confidence_over_100_is_capped() {
        let events = vec![ScanEvent {
            event_type: "IP_ADDRESS".to_string(),
            data: "10.0.0.1".to_string(),
            module: "sfp_test".to_string(),
            confidence: Some(250),
        }];
        let entities = events_to_entities(events);
        assert!((entities[0].confidence - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_default_config() {
        let config = SpiderFootConfig::default();
        assert_eq!(config.base_url, "http://127.0.0.1:5001");
        assert!(config.scan_modules.contains(&"dns".to_string()));
    }
}
