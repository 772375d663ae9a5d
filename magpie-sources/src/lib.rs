//! Magpie Sources - adapters for external intelligence tools
//!
//! Every supported tool sits behind the [`SourceAdapter`] trait:
//! - **SpiderFoot**: asynchronous scans over its HTTP API (start, poll, collect)
//! - **Shodan**: REST host and DNS lookups
//! - **Recon-ng**: module runs and table reads via the recon-web REST API
//! - **TheHarvester**: subprocess invocation with JSON report parsing
//!
//! Adapters absorb all tool-specific shape at this boundary and emit the
//! uniform `RawEntity` projection; nothing downstream branches on which
//! source produced a value.

pub mod adapter;
pub mod config;
pub mod harvester;
pub mod http;
pub mod recon_ng;
pub mod registry;
pub mod shodan;
pub mod spiderfoot;

pub use adapter::{SourceAdapter, SourceError};
pub use config::SourcesConfig;
pub use harvester::{HarvesterAdapter, HarvesterConfig};
pub use recon_ng::{ReconNgAdapter, ReconNgConfig};
pub use registry::AdapterRegistry;
pub use shodan::{ShodanAdapter, ShodanConfig};
pub use spiderfoot::{SpiderFootAdapter, SpiderFootConfig};
