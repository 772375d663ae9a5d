//! Declarative source configuration
//!
//! Which adapters exist, and how each is tuned, is decided entirely by
//! configuration. A section that is absent simply leaves that adapter
//! unregistered; the orchestrator will report requests for it as skipped.

use std::sync::Arc;

use serde::Deserialize;
use tracing::info;

use crate::{
    AdapterRegistry, HarvesterAdapter, HarvesterConfig, ReconNgAdapter, ReconNgConfig,
    ShodanAdapter, ShodanConfig, SourceError, SpiderFootAdapter, SpiderFootConfig,
};

/// Top-level `[sources]` configuration block
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SourcesConfig {
    pub spiderfoot: Option<SpiderFootConfig>,
    pub shodan: Option<ShodanConfig>,
    pub recon_ng: Option<ReconNgConfig>,
    pub harvester: Option<HarvesterConfig>,
}

impl SourcesConfig {
    /// Enable every adapter with its defaults. Shodan still requires a
    /// key from the environment to construct.
    pub fn all_defaults() -> Self {
        Self {
            spiderfoot: Some(SpiderFootConfig::default()),
            shodan: Some(ShodanConfig::default()),
            recon_ng: Some(ReconNgConfig::default()),
            harvester: Some(HarvesterConfig::default()),
        }
    }

    /// Construct adapters for every configured section.
    ///
    /// Misconfiguration of any enabled section is an error rather than a
    /// silent skip, so a typoed key surfaces at startup instead of as an
    /// empty collection later.
    pub fn build_registry(&self) -> Result<AdapterRegistry, SourceError> {
        let mut registry = AdapterRegistry::new();

        if let Some(config) = &self.spiderfoot {
            registry.register(Arc::new(SpiderFootAdapter::new(config.clone())?));
        }
        if let Some(config) = &self.shodan {
            registry.register(Arc::new(ShodanAdapter::new(config.clone())?));
        }
        if let Some(config) = &self.recon_ng {
            registry.register(Arc::new(ReconNgAdapter::new(config.clone())?));
        }
        if let Some(config) = &self.harvester {
            registry.register(Arc::new(HarvesterAdapter::new(config.clone())?));
        }

        info!(modules = ?registry.modules(), "source registry built");
        Ok(registry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_builds_empty_registry() {
        let config = SourcesConfig::default();
        let registry = config.build_registry().unwrap();
        assert!(registry.is_empty());
    }

    #[test]
    fn test_toml_sections_enable_adapters() {
        let raw = r#"
            [harvester]
            binary = "/opt/theHarvester/theHarvester.py"
            data_sources = ["bing"]

            [recon_ng]
            workspace = "case-42"

            [spiderfoot]
            base_url = "http://scanner.internal:5001"
            max_polls = 5
        "#;
        let config: SourcesConfig = toml::from_str(raw).unwrap();
        let registry = config.build_registry().unwrap();

        assert_eq!(
            registry.modules(),
            vec!["harvester", "recon_ng", "spiderfoot"]
        );
        assert_eq!(config.recon_ng.unwrap().workspace, "case-42");
        assert_eq!(config.spiderfoot.unwrap().max_polls, 5);
    }

    #[test]
    fn test_sparse_section_gets_field_defaults() {
        let raw = r#"
            [harvester]
            timeout_secs = 30
        "#;
        let config: SourcesConfig = toml::from_str(raw).unwrap();
        let harvester = config.harvester.unwrap();
        assert_eq!(harvester.timeout_secs, 30);
        assert_eq!(harvester.binary, "theHarvester");
        assert!(!harvester.data_sources.is_empty());
    }

    #[test]
    fn test_misconfigured_section_is_an_error() {
        let config = SourcesConfig {
            harvester: Some(HarvesterConfig {
                data_sources: vec![],
                ..HarvesterConfig::default()
            }),
            ..SourcesConfig::default()
        };
        assert!(config.build_registry().is_err());
    }
}
