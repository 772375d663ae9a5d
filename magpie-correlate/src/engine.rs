//! The correlation engine - dedup, confidence aggregation, edge inference
//!
//! `correlate` is a pure function with no I/O and no clock. Raw
//! entities are folded in a canonical order rather than arrival order, so
//! identical inputs yield identical output no matter how the concurrent
//! collection interleaved. That property is what makes the orchestrator's
//! unordered fan-out safe.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

use tracing::debug;

use magpie_core::{
    canonical_value, email_domain, entity_id, is_subdomain_of, Entity, EntityKind, RawEntity,
    RawSourceResult, RelationKind, Relationship, Target, TargetKind, MAX_CONFIDENCE,
    MIN_CONFIDENCE,
};

/// Everything the engine derives from one run's raw results
#[derive(Debug, Clone, Default)]
pub struct Correlated {
    /// One per distinct `(kind, canonical_value)`, sorted by that key
    pub entities: Vec<Entity>,
    /// Unique canonical triples, sorted by `(from_id, to_id, kind)`
    pub relationships: Vec<Relationship>,
}

/// Correlate the raw per-source results of one run.
///
/// Only `Ok` results contribute; failed, timed-out, and skipped modules
/// are represented in the run record but add nothing to the graph.
pub fn correlate(target: &Target, raw_results: &[RawSourceResult]) -> Correlated {
    let entities = merge_entities(raw_results);
    let relationships = infer_relationships(target, &entities, raw_results);

    debug!(
        entities = entities.len(),
        relationships = relationships.len(),
        "correlation complete"
    );

    Correlated {
        entities,
        relationships,
    }
}

/// Normalize and deduplicate raw entities into merged records.
fn merge_entities(raw_results: &[RawSourceResult]) -> Vec<Entity> {
    // Fold in (module, value, kind) order, not arrival order
    let mut raws: Vec<&RawEntity> = raw_results
        .iter()
        .filter(|result| result.status.is_ok())
        .flat_map(|result| result.entities.iter())
        .collect();
    raws.sort_by(|a, b| {
        (a.source_module.as_str(), a.value.as_str(), a.kind)
            .cmp(&(b.source_module.as_str(), b.value.as_str(), b.kind))
    });

    let mut merged: BTreeMap<(EntityKind, String), Entity> = BTreeMap::new();
    for raw in raws {
        let canonical = canonical_value(raw.kind, &raw.value);
        if canonical.is_empty() {
            debug!(
                value = %raw.value,
                module = %raw.source_module,
                "dropping entity with no canonical form"
            );
            continue;
        }

        match merged.entry((raw.kind, canonical.clone())) {
            Entry::Occupied(mut entry) => entry.get_mut().absorb(raw),
            Entry::Vacant(entry) => {
                entry.insert(Entity::from_raw(canonical, raw));
            }
        }
    }

    // BTreeMap iteration order is exactly the output contract
    merged.into_values().collect()
}

fn infer_relationships(
    target: &Target,
    entities: &[Entity],
    raw_results: &[RawSourceResult],
) -> Vec<Relationship> {
    let target_node = target.node_id();
    let mut edges: BTreeMap<(String, String, RelationKind), f64> = BTreeMap::new();

    // Every merged entity hangs off the target node
    for entity in entities {
        add_edge(
            &mut edges,
            Relationship::new(
                &target_node,
                &entity.id,
                RelationKind::DiscoveredFromTarget,
                entity.confidence,
            ),
        );
    }

    // Domain participants: merged domain entities, plus the target itself
    // when the investigation is about a domain
    let mut domains: Vec<(&str, &str, f64)> = entities
        .iter()
        .filter(|e| e.kind == EntityKind::Domain)
        .map(|e| (e.id.as_str(), e.canonical_value.as_str(), e.confidence))
        .collect();
    if target.kind == TargetKind::Domain {
        domains.push((target_node.as_str(), target.value.as_str(), MAX_CONFIDENCE));
    }

    for email in entities.iter().filter(|e| e.kind == EntityKind::Email) {
        let Some(mail_domain) = email_domain(&email.canonical_value) else {
            continue;
        };
        for (domain_id, domain_value, domain_confidence) in &domains {
            if *domain_value == mail_domain {
                add_edge(
                    &mut edges,
                    Relationship::new(
                        &email.id,
                        domain_id,
                        RelationKind::SameDomainAs,
                        email.confidence.min(*domain_confidence),
                    ),
                );
            }
        }
    }

    for (child_id, child_value, child_confidence) in &domains {
        for (parent_id, parent_value, parent_confidence) in &domains {
            if is_subdomain_of(child_value, parent_value) {
                add_edge(
                    &mut edges,
                    Relationship::new(
                        child_id,
                        parent_id,
                        RelationKind::Contains,
                        child_confidence.min(*parent_confidence),
                    ),
                );
            }
        }
    }

    // Co-occurrence is a per-source observation, so it is weighted by the
    // raw confidences a module reported, not by the merged scores
    for result in raw_results.iter().filter(|r| r.status.is_ok()) {
        let mut participants: BTreeMap<String, f64> = BTreeMap::new();
        for raw in &result.entities {
            let canonical = canonical_value(raw.kind, &raw.value);
            if canonical.is_empty() {
                continue;
            }
            let id = entity_id(raw.kind, &canonical);
            let confidence = raw.confidence.clamp(MIN_CONFIDENCE, MAX_CONFIDENCE);
            participants
                .entry(id)
                .and_modify(|c| *c = c.max(confidence))
                .or_insert(confidence);
        }

        let participants: Vec<(&String, &f64)> = participants.iter().collect();
        for i in 0..participants.len() {
            for j in (i + 1)..participants.len() {
                let (a_id, a_confidence) = participants[i];
                let (b_id, b_confidence) = participants[j];
                add_edge(
                    &mut edges,
                    Relationship::new(
                        a_id,
                        b_id,
                        RelationKind::CoOccursWith,
                        a_confidence.min(*b_confidence),
                    ),
                );
            }
        }
    }

    edges
        .into_iter()
        .map(|((from_id, to_id, kind), weight)| Relationship {
            from_id,
            to_id,
            kind,
            weight,
        })
        .collect()
}

/// Record an edge, collapsing duplicate triples onto the maximum weight.
/// Max is commutative, so the collapse is order-independent.
fn add_edge(edges: &mut BTreeMap<(String, String, RelationKind), f64>, edge: Relationship) {
    if edge.from_id == edge.to_id {
        return;
    }
    let weight = edge.weight;
    edges
        .entry(edge.key())
        .and_modify(|w| *w = w.max(weight))
        .or_insert(weight);
}
