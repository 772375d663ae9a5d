//! Recon-ng adapter - drives recon-web's REST API
//!
//! A fetch runs each configured recon-ng module against the target inside
//! a dedicated workspace, then reads the hosts and contacts tables the
//! modules populated. Module runs are best-effort; table reads are not.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info, warn};

use magpie_core::{EntityKind, RawEntity, Target};

use crate::{http, SourceAdapter, SourceError};

pub const MODULE: &str = "recon_ng";

/// Configuration for the recon-web REST API
#[derive(Debug, Clone, Deserialize)]
pub struct ReconNgConfig {
    /// Base URL of the recon-web server
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Workspace that scopes module runs and result tables
    #[serde(default = "default_workspace")]
    pub workspace: String,
    /// Recon-ng module paths to run per target
    #[serde(default = "default_modules")]
    pub modules: Vec<String>,
    /// Per-request HTTP timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_base_url() -> String {
    "http://127.0.0.1:5000".to_string()
}

fn default_workspace() -> String {
    "magpie".to_string()
}

fn default_modules() -> Vec<String> {
    vec![
        "recon/domains-hosts/hackertarget".to_string(),
        "recon/domains-contacts/whois_pocs".to_string(),
    ]
}

fn default_timeout_secs() -> u64 {
    60
}

impl Default for ReconNgConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            workspace: default_workspace(),
            modules: default_modules(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Adapter for a recon-web server instance
pub struct ReconNgAdapter {
    config: ReconNgConfig,
    client: Client,
}

impl ReconNgAdapter {
    pub fn new(config: ReconNgConfig) -> Result<Self, SourceError> {
        if config.modules.is_empty() {
            return Err(SourceError::Config(
                "recon-ng adapter has no modules configured".to_string(),
            ));
        }
        let client = http::build_client(Duration::from_secs(config.timeout_secs))?;
        Ok(Self { config, client })
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}/api{}", self.config.base_url.trim_end_matches('/'), path)
    }

    /// Create the workspace if it does not exist yet. The server answers
    /// with a conflict for an existing workspace, which is fine.
    async fn ensure_workspace(&self) -> Result<(), SourceError> {
        let response = self
            .client
            .post(self.api_url("/workspaces"))
            .json(&json!({ "name": self.config.workspace }))
            .send()
            .await?;

        if !response.status().is_success() && response.status().as_u16() != 409 {
            debug!(
                workspace = %self.config.workspace,
                status = %response.status(),
                "workspace creation not acknowledged, assuming it exists"
            );
        }
        Ok(())
    }

    /// Run one recon-ng module with the target as its SOURCE option
    async fn run_module(&self, module: &str, target: &Target) -> Result<(), SourceError> {
        let path = format!(
            "/workspaces/{}/modules/{}",
            urlencoding::encode(&self.config.workspace),
            urlencoding::encode(module)
        );
        let response = self
            .client
            .post(self.api_url(&path))
            .json(&json!({ "options": { "SOURCE": target.value } }))
            .send()
            .await?;
        http::ensure_success(response).await?;
        Ok(())
    }

    async fn read_table<T: serde::de::DeserializeOwned>(
        &self,
        table: &str,
    ) -> Result<Vec<T>, SourceError> {
        let path = format!(
            "/workspaces/{}/tables/{}",
            urlencoding::encode(&self.config.workspace),
            table
        );
        let response = self.client.get(self.api_url(&path)).send().await?;
        let response = http::ensure_success(response).await?;
        let table_data: TableResponse<T> = response
            .json()
            .await
            .map_err(|e| SourceError::Parse(format!("{} table: {}", table, e)))?;
        Ok(table_data.rows)
    }
}

#[async_trait]
impl SourceAdapter for ReconNgAdapter {
    fn module(&self) -> &str {
        MODULE
    }

    async fn fetch(&self, target: &Target) -> Result<Vec<RawEntity>, SourceError> {
        self.ensure_workspace().await?;

        let mut succeeded = 0usize;
        for module in &self.config.modules {
            match self.run_module(module, target).await {
                Ok(()) => {
                    debug!(%module, target = %target.value, "recon-ng module finished");
                    succeeded += 1;
                }
                Err(e) => {
                    warn!(%module, error = %e, "recon-ng module run failed");
                }
            }
        }
        if succeeded == 0 {
            return Err(SourceError::Tool(format!(
                "all {} recon-ng module runs failed",
                self.config.modules.len()
            )));
        }

        let hosts: Vec<HostRow> = self.read_table("hosts").await?;
        let contacts: Vec<ContactRow> = self.read_table("contacts").await?;

        let entities = rows_to_entities(hosts, contacts);
        info!(
            target = %target.value,
            count = entities.len(),
            "recon-ng collection complete"
        );
        Ok(entities)
    }
}

fn rows_to_entities(hosts: Vec<HostRow>, contacts: Vec<ContactRow>) -> Vec<RawEntity> {
    let mut entities = Vec::new();

    for row in hosts {
        let recon_module = row.module.unwrap_or_default();
        if let Some(host) = row.host.as_deref().filter(|h| !h.trim().is_empty()) {
            let mut entity =
                RawEntity::new(EntityKind::Domain, host, MODULE).with_confidence(0.7);
            if !recon_module.is_empty() {
                entity = entity.with_attribute("recon_module", &recon_module);
            }
            entities.push(entity);
        }
        if let Some(ip) = row.ip_address.as_deref().filter(|v| !v.trim().is_empty()) {
            let mut entity = RawEntity::new(EntityKind::Ip, ip, MODULE).with_confidence(0.7);
            if let Some(host) = row.host.as_deref().filter(|h| !h.trim().is_empty()) {
                entity = entity.with_attribute("dns_name", host);
            }
            if let Some(country) = row.country.as_deref().filter(|v| !v.trim().is_empty()) {
                entity = entity.with_attribute("country", country);
            }
            entities.push(entity);
        }
    }

    for row in contacts {
        if let Some(email) = row.email.as_deref().filter(|v| !v.trim().is_empty()) {
            let mut entity =
                RawEntity::new(EntityKind::Email, email, MODULE).with_confidence(0.8);
            if let Some(title) = row.title.as_deref().filter(|v| !v.trim().is_empty()) {
                entity = entity.with_attribute("title", title);
            }
            entities.push(entity);
        }

        let name = [row.first_name.as_deref(), row.last_name.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        if !name.is_empty() {
            let mut entity =
                RawEntity::new(EntityKind::Person, &name, MODULE).with_confidence(0.6);
            if let Some(title) = row.title.as_deref().filter(|v| !v.trim().is_empty()) {
                entity = entity.with_attribute("title", title);
            }
            entities.push(entity);
        }
    }

    entities
}

// recon-web API response types
#[derive(Debug, Deserialize)]
struct TableResponse<T> {
    #[serde(default)]
    rows: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct HostRow {
    #[serde(default)]
    host: Option<String>,
    #[serde(default)]
    ip_address: Option<String>,
    #[serde(default)]
    country: Option<String>,
    #[serde(default)]
    module: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ContactRow {
    #[serde(default)]
    first_name: Option<String>,
    #[serde(default)]
    last_name: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    title: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rows_to_entities() {
        let hosts_payload = r#"{"rows": [
            {"host": "www.example.com", "ip_address": "93.184.216.34", "country": "US", "module": "hackertarget"},
            {"host": "mail.example.com", "ip_address": null, "module": "hackertarget"},
            {"host": null, "ip_address": "10.1.2.3"}
        ]}"#;
        let contacts_payload = r#"{"rows": [
            {"first_name": "Jane", "last_name": "Doe", "email": "jane.doe@example.com", "title": "Sysadmin"},
            {"first_name": null, "last_name": null, "email": "abuse@example.com", "title": null}
        ]}"#;

        let hosts: TableResponse<HostRow> = serde_json::from_str(hosts_payload).unwrap();
        let contacts: TableResponse<ContactRow> =
            serde_json::from_str(contacts_payload).unwrap();
        let entities = rows_to_entities(hosts.rows, contacts.rows);

        let domains: Vec<_> = entities
            .iter()
            .filter(|e| e.kind == EntityKind::Domain)
            .collect();
        let ips: Vec<_> = entities.iter().filter(|e| e.kind == EntityKind::Ip).collect();
        let emails: Vec<_> = entities
            .iter()
            .filter(|e| e.kind == EntityKind::Email)
            .collect();
        let people: Vec<_> = entities
            .iter()
            .filter(|e| e.kind == EntityKind::Person)
            .collect();

        assert_eq!(domains.len(), 2);
        assert_eq!(ips.len(), 2);
        assert_eq!(emails.len(), 2);
        assert_eq!(people.len(), 1);
        assert_eq!(people[0].value, "Jane Doe");
        assert_eq!(
            ips[0].attributes.get("dns_name"),
            Some(&"www.example.com".to_string())
        );
        assert!(entities.iter().all(|e| e.source_module == "recon_ng"));
    }

    #[test]
    fn test_empty_module_list_rejected() {
        let config = ReconNgConfig {
            modules: vec![],
            ..ReconNgConfig::default()
        };
        assert!(matches!(
            ReconNgAdapter::new(config),
            Err(SourceError::Config(_))
        ));
    }
}
