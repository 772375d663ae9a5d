//! Typed relationships between correlated entities
//!
//! Edges are undirected in meaning but stored with a canonical
//! `(from_id, to_id)` ordering - lexicographically smaller id first - so a
//! reversed duplicate can never exist.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Why two nodes are connected
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum RelationKind {
    /// Entity was produced by a collection run against the target
    DiscoveredFromTarget,
    /// Both entities were reported together by one module
    CoOccursWith,
    /// An email address belongs to a domain
    SameDomainAs,
    /// A domain contains a subdomain
    Contains,
}

impl RelationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationKind::DiscoveredFromTarget => "discovered_from_target",
            RelationKind::CoOccursWith => "co_occurs_with",
            RelationKind::SameDomainAs => "same_domain_as",
            RelationKind::Contains => "contains",
        }
    }
}

impl fmt::Display for RelationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An inferred edge between two nodes of the entity graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    pub from_id: String,
    pub to_id: String,
    pub kind: RelationKind,
    /// Strength of the inference (0.0 - 1.0)
    pub weight: f64,
}

impl Relationship {
    /// Build an edge with canonical endpoint ordering.
    pub fn new(a: &str, b: &str, kind: RelationKind, weight: f64) -> Self {
        let (from_id, to_id) = if a <= b { (a, b) } else { (b, a) };
        Self {
            from_id: from_id.to_string(),
            to_id: to_id.to_string(),
            kind,
            weight,
        }
    }

    /// Dedup key for the canonical triple.
    pub fn key(&self) -> (String, String, RelationKind) {
        (self.from_id.clone(), self.to_id.clone(), self.kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_ordering() {
        let forward = Relationship::new("aaa", "bbb", RelationKind::CoOccursWith, 0.5);
        let reversed = Relationship::new("bbb", "aaa", RelationKind::CoOccursWith, 0.5);
        assert_eq!(forward, reversed);
        assert_eq!(forward.from_id, "aaa");
        assert_eq!(forward.to_id, "bbb");
    }

    #[test]
    fn test_kind_labels() {
        assert_eq!(RelationKind::SameDomainAs.as_str(), "same_domain_as");
        assert_eq!(
            RelationKind::DiscoveredFromTarget.to_string(),
            "discovered_from_target"
        );
    }
}
