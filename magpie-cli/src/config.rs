//! CLI configuration file handling
//!
//! One TOML file drives both halves of a run: `[orchestrator]` tunes
//! timing and concurrency, `[sources.*]` decides which adapters exist.
//! Without a file the CLI falls back to built-in defaults, with Shodan
//! enabled only when a key is present in the environment.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::debug;

use magpie_runtime::OrchestratorConfig;
use magpie_sources::SourcesConfig;

#[derive(Debug, Clone, Deserialize)]
pub struct MagpieConfig {
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
    #[serde(default = "default_sources")]
    pub sources: SourcesConfig,
}

impl Default for MagpieConfig {
    fn default() -> Self {
        Self {
            orchestrator: OrchestratorConfig::default(),
            sources: default_sources(),
        }
    }
}

fn default_sources() -> SourcesConfig {
    let mut sources = SourcesConfig::all_defaults();
    // No key, no Shodan. Leaving the section in would fail adapter
    // construction before the run even starts.
    if sources
        .shodan
        .as_ref()
        .and_then(|s| s.api_key.as_ref())
        .is_none()
    {
        sources.shodan = None;
    }
    sources
}

impl MagpieConfig {
    /// Load from a TOML file, or fall back to defaults when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path)
                    .with_context(|| format!("reading config file {}", path.display()))?;
                let config: MagpieConfig = toml::from_str(&raw)
                    .with_context(|| format!("parsing config file {}", path.display()))?;
                Ok(config)
            }
            None => {
                debug!("no config file given, using built-in defaults");
                Ok(Self::default())
            }
        }
    }
}
