//! Raw and correlated entity types
//!
//! `RawEntity` is the uniform projection every source adapter produces at
//! its boundary - the core never sees source-specific response shapes.
//! `Entity` is the deduplicated record the rest of the system operates on:
//! one per distinct `(kind, canonical_value)` pair, with confidence
//! aggregated across corroborating sources.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::{DEFAULT_CONFIDENCE, MAX_CONFIDENCE, MIN_CONFIDENCE};

/// Categories of extracted entities
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// Domain name
    Domain,
    /// IPv4 or IPv6 address
    Ip,
    /// Email address
    Email,
    /// Person name
    Person,
    /// Organization or company name
    Organization,
    /// Anything a source reports that fits no other category
    Other,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Domain => "domain",
            EntityKind::Ip => "ip",
            EntityKind::Email => "email",
            EntityKind::Person => "person",
            EntityKind::Organization => "organization",
            EntityKind::Other => "other",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An entity exactly as one source reported it, un-deduplicated
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawEntity {
    /// Raw string as extracted
    pub value: String,
    /// Category of the value
    pub kind: EntityKind,
    /// Source-reported confidence (0.0 - 1.0)
    #[serde(default = "default_confidence")]
    pub confidence: f64,
    /// Module that reported this entity
    pub source_module: String,
    /// Source-specific metadata (geolocation, ASN, ports, ...)
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

fn default_confidence() -> f64 {
    DEFAULT_CONFIDENCE
}

impl RawEntity {
    pub fn new(kind: EntityKind, value: &str, source_module: &str) -> Self {
        Self {
            value: value.to_string(),
            kind,
            confidence: DEFAULT_CONFIDENCE,
            source_module: source_module.to_string(),
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence.clamp(MIN_CONFIDENCE, MAX_CONFIDENCE);
        self
    }

    pub fn with_attribute(mut self, key: &str, value: &str) -> Self {
        self.attributes.insert(key.to_string(), value.to_string());
        self
    }
}

/// An attribute value on a merged entity: single, or a list when sources
/// disagreed on the same key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    One(String),
    Many(Vec<String>),
}

impl AttrValue {
    /// Record another observation of this key. Identical values are
    /// ignored; a new value turns the entry into (or extends) a list.
    pub fn push(&mut self, value: &str) {
        match self {
            AttrValue::One(existing) => {
                if existing != value {
                    let first = existing.clone();
                    *self = AttrValue::Many(vec![first, value.to_string()]);
                }
            }
            AttrValue::Many(values) => {
                if !values.iter().any(|v| v == value) {
                    values.push(value.to_string());
                }
            }
        }
    }
}

/// A deduplicated, confidence-aggregated entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    /// Stable identifier derived from `(kind, canonical_value)`
    pub id: String,
    /// Category of the value
    pub kind: EntityKind,
    /// Normalized form used for dedup and display
    pub canonical_value: String,
    /// Aggregated confidence (0.0 - 1.0)
    pub confidence: f64,
    /// Modules that reported this entity
    pub contributing_sources: BTreeSet<String>,
    /// Merged source metadata
    pub attributes: BTreeMap<String, AttrValue>,
}

impl Entity {
    /// Create an entity from its first raw occurrence.
    pub fn from_raw(canonical_value: String, raw: &RawEntity) -> Self {
        let id = entity_id(raw.kind, &canonical_value);
        let mut contributing_sources = BTreeSet::new();
        contributing_sources.insert(raw.source_module.clone());

        let attributes = raw
            .attributes
            .iter()
            .map(|(k, v)| (k.clone(), AttrValue::One(v.clone())))
            .collect();

        Self {
            id,
            kind: raw.kind,
            canonical_value,
            confidence: raw.confidence.clamp(MIN_CONFIDENCE, MAX_CONFIDENCE),
            contributing_sources,
            attributes,
        }
    }

    /// Merge a later occurrence of the same logical entity.
    ///
    /// Confidence aggregates probabilistically, sources accumulate, and
    /// conflicting attribute values collect into lists.
    pub fn absorb(&mut self, raw: &RawEntity) {
        self.confidence = combine_confidence(self.confidence, raw.confidence);
        self.contributing_sources.insert(raw.source_module.clone());

        for (key, value) in &raw.attributes {
            self.attributes
                .entry(key.clone())
                .and_modify(|existing| existing.push(value))
                .or_insert_with(|| AttrValue::One(value.clone()));
        }
    }
}

/// Combine confidences from independent corroborating sources.
///
/// `1 - (1-a)(1-b)`: monotonically non-decreasing, capped below 1.0, and a
/// low-confidence corroboration never lowers an established score.
pub fn combine_confidence(existing: f64, incoming: f64) -> f64 {
    let a = existing.clamp(MIN_CONFIDENCE, MAX_CONFIDENCE);
    let b = incoming.clamp(MIN_CONFIDENCE, MAX_CONFIDENCE);
    1.0 - (1.0 - a) * (1.0 - b)
}

/// Stable entity identifier: same `(kind, canonical_value)` always yields
/// the same id, across runs and processes.
pub fn entity_id(kind: EntityKind, canonical_value: &str) -> String {
    hash16(&format!("{}:{}", kind.as_str(), canonical_value))
}

/// First 16 hex chars of a SHA-256 digest.
pub(crate) fn hash16(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    format!("{:x}", hasher.finalize())[..16].to_string()
}
