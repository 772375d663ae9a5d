//! Storage and search-index collaborator contracts
//!
//! The engine persists nothing itself. Embedders hand implementations of
//! these traits to the export drivers. Node ids and canonical edge triples
//! are stable across runs, so re-applying the same run upserts onto the
//! same records instead of duplicating them.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use magpie_core::{AttrValue, CollectionRun, Entity, RelationKind};

/// Failure surfaced by a sink implementation
#[derive(Debug, Error)]
#[error("sink failure: {0}")]
pub struct SinkError(String);

impl SinkError {
    pub fn new(detail: impl Into<String>) -> Self {
        Self(detail.into())
    }
}

/// Graph storage contract. Nodes are keyed by id, edges by the canonical
/// `(from, to, kind)` triple.
#[async_trait]
pub trait GraphSink {
    async fn upsert_node(
        &mut self,
        id: &str,
        node_type: &str,
        label: &str,
        attributes: &BTreeMap<String, AttrValue>,
    ) -> Result<(), SinkError>;

    async fn upsert_edge(
        &mut self,
        from_id: &str,
        to_id: &str,
        kind: RelationKind,
        weight: f64,
    ) -> Result<(), SinkError>;
}

/// Search-index contract: one flattened document per merged entity
#[async_trait]
pub trait DocumentSink {
    async fn index_entity(&mut self, document: EntityDocument) -> Result<(), SinkError>;
}

/// Flattened entity record for full-text indexing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityDocument {
    pub id: String,
    pub kind: String,
    pub canonical_value: String,
    pub confidence: f64,
    pub contributing_sources: Vec<String>,
    pub attributes: BTreeMap<String, AttrValue>,
}

impl From<&Entity> for EntityDocument {
    fn from(entity: &Entity) -> Self {
        Self {
            id: entity.id.clone(),
            kind: entity.kind.as_str().to_string(),
            canonical_value: entity.canonical_value.clone(),
            confidence: entity.confidence,
            contributing_sources: entity.contributing_sources.iter().cloned().collect(),
            attributes: entity.attributes.clone(),
        }
    }
}

/// Apply a completed run to graph storage: the target node, one node per
/// entity, one edge per relationship.
pub async fn export_run<S: GraphSink + Send>(
    run: &CollectionRun,
    sink: &mut S,
) -> Result<(), SinkError> {
    let no_attributes = BTreeMap::new();
    sink.upsert_node(
        &run.target.node_id(),
        "target",
        &run.target.value,
        &no_attributes,
    )
    .await?;

    for entity in &run.entities {
        sink.upsert_node(
            &entity.id,
            entity.kind.as_str(),
            &entity.canonical_value,
            &entity.attributes,
        )
        .await?;
    }

    for relationship in &run.relationships {
        sink.upsert_edge(
            &relationship.from_id,
            &relationship.to_id,
            relationship.kind,
            relationship.weight,
        )
        .await?;
    }

    Ok(())
}

/// Flatten a run's entities into index documents, in entity order.
pub fn document_entities(run: &CollectionRun) -> Vec<EntityDocument> {
    run.entities.iter().map(EntityDocument::from).collect()
}

/// A node as held by [`MemoryGraphSink`]
#[derive(Debug, Clone, PartialEq)]
pub struct StoredNode {
    pub node_type: String,
    pub label: String,
    pub attributes: BTreeMap<String, AttrValue>,
}

/// In-memory graph sink for tests and embedders that need no database
#[derive(Debug, Default)]
pub struct MemoryGraphSink {
    pub nodes: BTreeMap<String, StoredNode>,
    pub edges: BTreeMap<(String, String, RelationKind), f64>,
}

impl MemoryGraphSink {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl GraphSink for MemoryGraphSink {
    async fn upsert_node(
        &mut self,
        id: &str,
        node_type: &str,
        label: &str,
        attributes: &BTreeMap<String, AttrValue>,
    ) -> Result<(), SinkError> {
        self.nodes.insert(
            id.to_string(),
            StoredNode {
                node_type: node_type.to_string(),
                label: label.to_string(),
                attributes: attributes.clone(),
            },
        );
        Ok(())
    }

    async fn upsert_edge(
        &mut self,
        from_id: &str,
        to_id: &str,
        kind: RelationKind,
        weight: f64,
    ) -> Result<(), SinkError> {
        self.edges
            .insert((from_id.to_string(), to_id.to_string(), kind), weight);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::correlate;
    use chrono::Utc;
    use magpie_core::{EntityKind, RawEntity, RawSourceResult, Target, TargetKind};
    use std::time::Duration;
    use uuid::Uuid;

    fn sample_run() -> CollectionRun {
        let target = Target::new(TargetKind::Domain, "example.com")
            .unwrap()
            .with_modules(["shodan"]);
        let raw_results = vec![RawSourceResult::ok(
            "shodan",
            vec![
                RawEntity::new(EntityKind::Ip, "93.184.216.34", "shodan")
                    .with_confidence(0.6)
                    .with_attribute("asn", "AS15133"),
                RawEntity::new(EntityKind::Domain, "www.example.com", "shodan")
                    .with_confidence(0.7),
            ],
            Duration::from_millis(25),
        )];

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

    #[tokio::test]
    async fn test_export_populates_sink() {
        let run = sample_run();
        let mut sink = MemoryGraphSink::new();
        export_run(&run, &mut sink).await.unwrap();

        // Target node plus two entities
        assert_eq!(sink.nodes.len(), 3);
        assert_eq!(sink.edges.len(), run.relationships.len());

        let target_node = sink.nodes.get(&run.target.node_id()).unwrap();
        assert_eq!(target_node.node_type, "target");
        assert_eq!(target_node.label, "example.com");
    }

    #[tokio::test]
    async fn test_export_is_idempotent() {
        let run = sample_run();
        let mut sink = MemoryGraphSink::new();

        export_run(&run, &mut sink).await.unwrap();
        let nodes_after_first = sink.nodes.clone();
        let edges_after_first = sink.edges.clone();

        export_run(&run, &mut sink).await.unwrap();
        assert_eq!(sink.nodes, nodes_after_first);
        assert_eq!(sink.edges, edges_after_first);
    }

    #[test]
    fn test_document_flattening() {
        let run = sample_run();
        let documents = document_entities(&run);

        assert_eq!(documents.len(), 2);
        let ip_document = documents
            .iter()
            .find(|d| d.canonical_value == "93.184.216.34")
            .unwrap();
        assert_eq!(ip_document.kind, "ip");
        assert_eq!(ip_document.contributing_sources, vec!["shodan"]);
        assert!(ip_document.attributes.contains_key("asn"));

        // Documents serialize flat
        let value = serde_json::to_value(ip_document).unwrap();
        assert_eq!(value["kind"], "ip");
        assert_eq!(value["attributes"]["asn"], "AS15133");
    }
}
