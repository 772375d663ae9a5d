//! Shodan adapter - REST lookups against api.shodan.io
//!
//! IP targets resolve through the host endpoint; domain targets combine
//! the DNS inventory endpoint with a hostname search. Other target kinds
//! have no Shodan surface and yield nothing.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info};

use magpie_core::{EntityKind, RawEntity, Target, TargetKind};

use crate::{http, SourceAdapter, SourceError};

pub const MODULE: &str = "shodan";

/// Configuration for the Shodan REST API
#[derive(Debug, Clone, Deserialize)]
pub struct ShodanConfig {
    /// API key; falls back to the SHODAN_API_KEY environment variable
    #[serde(default = "default_api_key")]
    pub api_key: Option<String>,
    /// Base URL, overridable for self-hosted mirrors and tests
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Per-request HTTP timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Maximum search matches to convert into entities
    #[serde(default = "default_max_results")]
    pub max_results: usize,
}

fn default_api_key() -> Option<String> {
    std::env::var("SHODAN_API_KEY").ok()
}

fn default_base_url() -> String {
    "https://api.shodan.io".to_string()
}

fn default_timeout_secs() -> u64 {
    20
}

fn default_max_results() -> usize {
    25
}

impl Default for ShodanConfig {
    fn default() -> Self {
        Self {
            api_key: default_api_key(),
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
            max_results: default_max_results(),
        }
    }
}

/// Adapter for the Shodan REST API
pub struct ShodanAdapter {
    config: ShodanConfig,
    api_key: String,
    client: Client,
}

impl ShodanAdapter {
    pub fn new(config: ShodanConfig) -> Result<Self, SourceError> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| SourceError::Config("no Shodan API key configured".to_string()))?;
        let client = http::build_client(Duration::from_secs(config.timeout_secs))?;
        Ok(Self {
            config,
            api_key,
            client,
        })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path_and_query: &str,
    ) -> Result<T, SourceError> {
        let separator = if path_and_query.contains('?') { '&' } else { '?' };
        let url = format!(
            "{}{}{}key={}",
            self.config.base_url.trim_end_matches('/'),
            path_and_query,
            separator,
            self.api_key
        );

        let response = self.client.get(&url).send().await?;
        let response = http::ensure_success(response).await?;
        response
            .json()
            .await
            .map_err(|e| SourceError::Parse(format!("shodan response: {}", e)))
    }

    /// Host record for a single IP
    async fn lookup_host(&self, ip: &str) -> Result<Vec<RawEntity>, SourceError> {
        let host: ShodanHost = self
            .get_json(&format!("/shodan/host/{}", urlencoding::encode(ip)))
            .await?;
        Ok(host_to_entities(host))
    }

    /// DNS inventory plus hostname search for a domain
    async fn lookup_domain(&self, domain: &str) -> Result<Vec<RawEntity>, SourceError> {
        let dns: ShodanDomain = self
            .get_json(&format!("/dns/domain/{}", urlencoding::encode(domain)))
            .await?;
        let mut entities = domain_to_entities(domain, dns);

        let query = format!("hostname:{}", domain);
        let search: ShodanSearch = self
            .get_json(&format!(
                "/shodan/host/search?query={}",
                urlencoding::encode(&query)
            ))
            .await?;
        entities.extend(search_to_entities(search, self.config.max_results));

        Ok(entities)
    }
}

#[async_trait]
impl SourceAdapter for ShodanAdapter {
    fn module(&self) -> &str {
        MODULE
    }

    async fn fetch(&self, target: &Target) -> Result<Vec<RawEntity>, SourceError> {
        let entities = match target.kind {
            TargetKind::Ip => self.lookup_host(&target.value).await?,
            TargetKind::Domain => self.lookup_domain(&target.value).await?,
            TargetKind::Email | TargetKind::Person => {
                debug!(target = %target.value, "Shodan has no surface for this target kind");
                Vec::new()
            }
        };

        info!(
            target = %target.value,
            count = entities.len(),
            "Shodan collection complete"
        );
        Ok(entities)
    }
}

fn host_to_entities(host: ShodanHost) -> Vec<RawEntity> {
    let mut entities = Vec::new();

    let ports = host
        .ports
        .iter()
        .map(|p| p.to_string())
        .collect::<Vec<_>>()
        .join(",");

    let mut ip_entity =
        RawEntity::new(EntityKind::Ip, &host.ip_str, MODULE).with_confidence(0.9);
    if let Some(org) = &host.org {
        ip_entity = ip_entity.with_attribute("org", org);
    }
    if let Some(asn) = &host.asn {
        ip_entity = ip_entity.with_attribute("asn", asn);
    }
    if let Some(country) = &host.country_name {
        ip_entity = ip_entity.with_attribute("country", country);
    }
    if let Some(city) = &host.city {
        ip_entity = ip_entity.with_attribute("city", city);
    }
    if !ports.is_empty() {
        ip_entity = ip_entity.with_attribute("open_ports", &ports);
    }
    entities.push(ip_entity);

    for hostname in &host.hostnames {
        entities.push(
            RawEntity::new(EntityKind::Domain, hostname, MODULE)
                .with_confidence(0.7)
                .with_attribute("resolved_ip", &host.ip_str),
        );
    }

    entities
}

fn domain_to_entities(domain: &str, dns: ShodanDomain) -> Vec<RawEntity> {
    let mut entities = Vec::new();

    for subdomain in &dns.subdomains {
        if subdomain.trim().is_empty() {
            continue;
        }
        entities.push(
            RawEntity::new(
                EntityKind::Domain,
                &format!("{}.{}", subdomain, domain),
                MODULE,
            )
            .with_confidence(0.7)
            .with_attribute("discovered_via", "dns_inventory"),
        );
    }

    for record in &dns.data {
        if record.record_type == "A" || record.record_type == "AAAA" {
            let hostname = if record.subdomain.is_empty() {
                domain.to_string()
            } else {
                format!("{}.{}", record.subdomain, domain)
            };
            entities.push(
                RawEntity::new(EntityKind::Ip, &record.value, MODULE)
                    .with_confidence(0.7)
                    .with_attribute("dns_name", &hostname),
            );
        }
    }

    entities
}

fn search_to_entities(search: ShodanSearch, max_results: usize) -> Vec<RawEntity> {
    search
        .matches
        .into_iter()
        .take(max_results)
        .map(|m| {
            let mut entity =
                RawEntity::new(EntityKind::Ip, &m.ip_str, MODULE).with_confidence(0.6);
            if let Some(org) = &m.org {
                entity = entity.with_attribute("org", org);
            }
            if !m.hostnames.is_empty() {
                entity = entity.with_attribute("hostnames", &m.hostnames.join(","));
            }
            entity
        })
        .collect()
}

// Shodan API response types
#[derive(Debug, Deserialize)]
struct ShodanHost {
    ip_str: String,
    #[serde(default)]
    hostnames: Vec<String>,
    #[serde(default)]
    ports: Vec<u16>,
    #[serde(default)]
    org: Option<String>,
    #[serde(default)]
    asn: Option<String>,
    #[serde(default)]
    country_name: Option<String>,
    #[serde(default)]
    city: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ShodanDomain {
    #[serde(default)]
    subdomains: Vec<String>,
    #[serde(default)]
    data: Vec<ShodanDnsRecord>,
}

#[derive(Debug, Deserialize)]
struct ShodanDnsRecord {
    #[serde(default)]
    subdomain: String,
    #[serde(rename = "type")]
    record_type: String,
    value: String,
}

#[derive(Debug, Deserialize)]
struct ShodanSearch {
    #[serde(default)]
    matches: Vec<ShodanSearchMatch>,
}

#[derive(Debug, Deserialize)]
struct ShodanSearchMatch {
    ip_str: String,
    #[serde(default)]
    org: Option<String>,
    #[serde(default)]
    hostnames: Vec<String>,
}
