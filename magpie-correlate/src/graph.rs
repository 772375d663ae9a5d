//! Projection of a collection run into the visualization payload
//!
//! The payload shape is consumed by an external dashboard and is part of
//! the public contract: nodes carry `id/label/type/source/confidence/size`,
//! edges carry `from/to/label`, and metadata summarizes the run. Field
//! names and null-ness are therefore pinned by tests.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use magpie_core::CollectionRun;

/// Rendered size of the central target node
pub const TARGET_NODE_SIZE: u32 = 20;

/// Rendered size of every entity node
pub const ENTITY_NODE_SIZE: u32 = 10;

/// The complete visualization document for one run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphPayload {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
    pub metadata: GraphMetadata,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: String,
    pub label: String,
    /// "target" for the query node, the entity kind otherwise
    #[serde(rename = "type")]
    pub node_type: String,
    /// Comma-joined contributing modules; null on the target node
    pub source: Option<String>,
    /// Aggregated confidence; null on the target node
    pub confidence: Option<f64>,
    pub size: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphEdge {
    #[serde(rename = "from")]
    pub from_id: String,
    #[serde(rename = "to")]
    pub to_id: String,
    pub label: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphMetadata {
    pub total_entities: usize,
    /// Modules that completed successfully, sorted
    pub sources: Vec<String>,
    pub generated_at: DateTime<Utc>,
}

/// Project a completed run into the payload. Pure; the run is not mutated,
/// and projecting twice yields identical documents.
pub fn project(run: &CollectionRun) -> GraphPayload {
    let mut nodes = Vec::with_capacity(run.entities.len() + 1);
    nodes.push(GraphNode {
        id: run.target.node_id(),
        label: run.target.value.clone(),
        node_type: "target".to_string(),
        source: None,
        confidence: None,
        size: TARGET_NODE_SIZE,
    });

    for entity in &run.entities {
        let sources = entity
            .contributing_sources
            .iter()
            .cloned()
            .collect::<Vec<_>>()
            .join(",");
        nodes.push(GraphNode {
            id: entity.id.clone(),
            label: entity.canonical_value.clone(),
            node_type: entity.kind.as_str().to_string(),
            source: Some(sources),
            confidence: Some(entity.confidence),
            size: ENTITY_NODE_SIZE,
        });
    }

    let edges = run
        .relationships
        .iter()
        .map(|relationship| GraphEdge {
            from_id: relationship.from_id.clone(),
            to_id: relationship.to_id.clone(),
            label: relationship.kind.as_str().to_string(),
        })
        .collect();

    let metadata = GraphMetadata {
        total_entities: run.entities.len(),
        sources: run.sources_ok().into_iter().map(String::from).collect(),
        generated_at: run.completed_at,
    };

    GraphPayload {
        nodes,
        edges,
        metadata,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::correlate;
    use magpie_core::{EntityKind, RawEntity, RawSourceResult, Target, TargetKind};
    use std::time::Duration;
    use uuid::Uuid;

    fn sample_run() -> CollectionRun {
        let target = Target::new(TargetKind::Domain, "example.com")
            .unwrap()
            .with_modules(["shodan", "harvester"]);

        let raw_results = vec![
            RawSourceResult::ok(
                "harvester",
                vec![RawEntity::new(EntityKind::Email, "admin@example.com", "harvester")
                    .with_confidence(0.9)],
                Duration::from_millis(40),
            ),
            RawSourceResult::ok(
                "shodan",
                vec![RawEntity::new(EntityKind::Ip, "93.184.216.34", "shodan")
                    .with_confidence(0.6)],
                Duration::from_millis(80),
            ),
        ];

        let correlated = correlate(&target, &raw_results);
        let now = Utc::now();
        CollectionRun {
            id: Uuid::new_v4(),
            target,
            raw_results,
            entities: correlated.entities,
            relationships: correlated.relationships,
            started_at: now,
            completed_at: now,
            partial_failure: false,
        }
    }

    #[test]
    fn test_projection_shape() {
        let run = sample_run();
        let payload = project(&run);

        assert_eq!(payload.nodes.len(), 3);
        assert_eq!(payload.metadata.total_entities, 2);
        assert_eq!(payload.metadata.sources, vec!["harvester", "shodan"]);

        let target_node = &payload.nodes[0];
        assert_eq!(target_node.node_type, "target");
        assert_eq!(target_node.label, "example.com");
        assert_eq!(target_node.size, TARGET_NODE_SIZE);
        assert!(target_node.source.is_none());
        assert!(target_node.confidence.is_none());

        for node in &payload.nodes[1..] {
            assert_eq!(node.size, ENTITY_NODE_SIZE);
            assert!(node.source.is_some());
            assert!(node.confidence.is_some());
        }
    }

    #[test]
    fn test_json_field_names() {
        let run = sample_run();
        let value = serde_json::to_value(project(&run)).unwrap();

        let node = &value["nodes"][0];
        for key in ["id", "label", "type", "source", "confidence", "size"] {
            assert!(node.get(key).is_some(), "node missing key {}", key);
        }
        assert!(node["source"].is_null());
        assert!(node["confidence"].is_null());

        let edge = &value["edges"][0];
        for key in ["from", "to", "label"] {
            assert!(edge.get(key).is_some(), "edge missing key {}", key);
        }

        let metadata = &value["metadata"];
        for key in ["total_entities", "sources", "generated_at"] {
            assert!(metadata.get(key).is_some(), "metadata missing key {}", key);
        }
    }

    #[test]
    fn test_edge_labels_are_snake_case() {
        let run = sample_run();
        let payload = project(&run);
        assert!(payload
            .edges
            .iter()
            .any(|e| e.label == "discovered_from_target"));
        assert!(payload.edges.iter().any(|e| e.label == "same_domain_as"));
    }
}
