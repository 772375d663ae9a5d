//! Investigation targets and entry-point validation
//!
//! A `Target` is validated at construction; the orchestrator and
//! correlation engine never re-check it. Validation is deliberately
//! shallow - "syntactically plausible", not "resolvable".

use std::collections::BTreeSet;
use std::fmt;
use std::net::IpAddr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::entity::{hash16, EntityKind};
use crate::normalize::canonical_value;

/// What kind of thing is being investigated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetKind {
    Domain,
    Ip,
    Email,
    Person,
}

impl TargetKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetKind::Domain => "domain",
            TargetKind::Ip => "ip",
            TargetKind::Email => "email",
            TargetKind::Person => "person",
        }
    }
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<TargetKind> for EntityKind {
    fn from(kind: TargetKind) -> Self {
        match kind {
            TargetKind::Domain => EntityKind::Domain,
            TargetKind::Ip => EntityKind::Ip,
            TargetKind::Email => EntityKind::Email,
            TargetKind::Person => EntityKind::Person,
        }
    }
}

/// Rejected before orchestration starts
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("target value is empty")]
    Empty,

    #[error("not a plausible {kind} value: {value}")]
    Implausible { kind: TargetKind, value: String },
}

static DOMAIN_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:[a-z0-9](?:[a-z0-9-]{0,61}[a-z0-9])?\.)+[a-z]{2,}$").unwrap()
});

static EMAIL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z0-9._%+-]+@[a-z0-9.-]+\.[a-z]{2,}$").unwrap()
});

static PERSON_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\p{L}[\p{L} .'\-]{1,100}$").unwrap());

/// The subject of one investigation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Target {
    /// Target category
    pub kind: TargetKind,
    /// Canonical target value (trimmed, case-folded where appropriate)
    pub value: String,
    /// Requested module identifiers (unique, order irrelevant)
    pub modules: BTreeSet<String>,
}

impl Target {
    /// Validate and normalize a raw target value.
    pub fn new(kind: TargetKind, raw_value: &str) -> Result<Self, ValidationError> {
        let value = canonical_value(kind.into(), raw_value);
        if value.is_empty() {
            if raw_value.trim().is_empty() {
                return Err(ValidationError::Empty);
            }
            // Normalization rejected it (e.g. unparseable IP)
            return Err(ValidationError::Implausible {
                kind,
                value: raw_value.trim().to_string(),
            });
        }

        let plausible = match kind {
            TargetKind::Domain => DOMAIN_REGEX.is_match(&value),
            TargetKind::Ip => value.parse::<IpAddr>().is_ok(),
            TargetKind::Email => EMAIL_REGEX.is_match(&value),
            TargetKind::Person => PERSON_REGEX.is_match(&value),
        };

        if !plausible {
            return Err(ValidationError::Implausible { kind, value });
        }

        Ok(Self {
            kind,
            value,
            modules: BTreeSet::new(),
        })
    }

    pub fn with_module(mut self, module: &str) -> Self {
        self.modules.insert(module.to_string());
        self
    }

    pub fn with_modules<I, S>(mut self, modules: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.modules.extend(modules.into_iter().map(Into::into));
        self
    }

    /// Identifier of the synthetic target node in the output graph.
    ///
    /// Prefixed so a source re-reporting the target's own value yields a
    /// distinct entity node rather than colliding with the query node.
    pub fn node_id(&self) -> String {
        hash16(&format!("target:{}:{}", self.kind.as_str(), self.value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::entity_id;

    #[test]
    fn test_domain_target_case_folds() {
        let target = Target::new(TargetKind::Domain, " Example.COM ").unwrap();
        assert_eq!(target.value, "example.com");
    }

    #[test]
    fn test_rejects_empty() {
        assert!(matches!(
            Target::new(TargetKind::Domain, "   "),
            Err(ValidationError::Empty)
        ));
    }

    #[test]
    fn test_rejects_implausible_values() {
        assert!(Target::new(TargetKind::Domain, "not a domain!").is_err());
        assert!(Target::new(TargetKind::Ip, "999.1.2.3").is_err());
        assert!(Target::new(TargetKind::Email, "missing-at.example.com").is_err());
        assert!(Target::new(TargetKind::Person, "4").is_err());
    }

    #[test]
    fn test_accepts_plausible_values() {
        assert!(Target::new(TargetKind::Domain, "sub.example.co.uk").is_ok());
        assert!(Target::new(TargetKind::Ip, "2001:db8::1").is_ok());
        assert!(Target::new(TargetKind::Email, "Admin@Example.com").is_ok());
        assert!(Target::new(TargetKind::Person, "Ada Lovelace").is_ok());
    }

    #[test]
    fn test_modules_deduplicate() {
        let target = Target::new(TargetKind::Domain, "example.com")
            .unwrap()
            .with_module("shodan")
            .with_module("shodan")
            .with_modules(["spiderfoot", "harvester"]);
        assert_eq!(target.modules.len(), 3);
    }

    #[test]
    fn test_node_id_distinct_from_entity_id() {
        let target = Target::new(TargetKind::Domain, "example.com").unwrap();
        let node = target.node_id();
        assert_eq!(node.len(), 16);
        assert_ne!(node, entity_id(EntityKind::Domain, "example.com"));

        // Stable across constructions
        let again = Target::new(TargetKind::Domain, "EXAMPLE.com").unwrap();
        assert_eq!(node, again.node_id());
    }
}
