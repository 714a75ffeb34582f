use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::Display;
use tracing::{debug, info};
use uuid::Uuid;

use super::config::BudgetUnit;
use super::fusion::{EvidenceItem, EvidenceSource, MergedProvenance};
use crate::core::models::EntityRef;
use crate::core::outcome::Condition;


#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ContextStatus {
    Complete,
    Partial,
    NoEvidenceFound,
}


#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextItem {
    pub rank: usize,
    pub line: String,
    pub size: usize,
    pub evidence: EvidenceItem,
}


#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedItem {
    pub rank: usize,
    pub reference: String,
    pub size: usize,
}


/// What the included evidence rests on.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Manifest {
    pub entities: Vec<String>,
    pub edge_types: Vec<String>,
    pub documents: Vec<String>,
    pub paths: Vec<String>,
    pub merged: Vec<MergedProvenance>,
    pub skipped: Vec<SkippedItem>,
}

impl Manifest {
    fn from_items(items: &[ContextItem], skipped: Vec<SkippedItem>) -> Self {
        let mut entities = BTreeSet::new();
        let mut edge_types = BTreeSet::new();
        let mut documents = BTreeSet::new();
        let mut paths = Vec::new();
        let mut merged = Vec::new();

        for item in items {
            match &item.evidence.source {
                EvidenceSource::Path(path) => {
                    entities.extend(path.entity_names().into_iter().map(str::to_string));
                    edge_types.extend(path.edge_types().map(ToString::to_string));
                    paths.push(path.to_string());
                }
                EvidenceSource::Snippet(hit) => {
                    documents.insert(hit.document_id.clone());
                    entities.extend(hit.mentions.iter().cloned());
                }
            }
            merged.extend(item.evidence.merged.iter().cloned());
        }

        Self {
            entities: entities.into_iter().collect(),
            edge_types: edge_types.into_iter().collect(),
            documents: documents.into_iter().collect(),
            paths,
            merged,
            skipped,
        }
    }
}


#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalContext {
    pub retrieval_id: String,
    pub query: String,
    pub generated_at: DateTime<Utc>,
    pub entities: Vec<EntityRef>,
    pub items: Vec<ContextItem>,
    pub budget: usize,
    pub used: usize,
    pub unit: BudgetUnit,
    pub manifest: Manifest,
    pub status: ContextStatus,
    pub conditions: BTreeSet<Condition>,
}

impl RetrievalContext {
    pub fn empty(query: impl Into<String>, budget: usize, unit: BudgetUnit) -> Self {
        Self {
            retrieval_id: Uuid::new_v4().to_string(),
            query: query.into(),
            generated_at: Utc::now(),
            entities: Vec::new(),
            items: Vec::new(),
            budget,
            used: 0,
            unit,
            manifest: Manifest::default(),
            status: ContextStatus::NoEvidenceFound,
            conditions: BTreeSet::new(),
        }
    }

    pub fn has(&self, condition: Condition) -> bool {
        self.conditions.contains(&condition)
    }

    pub fn entity_not_found(&self) -> bool {
        self.has(Condition::EntityNotFound)
    }

    pub fn graph_unavailable(&self) -> bool {
        self.has(Condition::GraphUnavailable)
    }

    pub fn vector_unavailable(&self) -> bool {
        self.has(Condition::VectorUnavailable)
    }

    pub fn budget_exceeded(&self) -> bool {
        self.has(Condition::BudgetExceeded)
    }

    pub fn timed_out(&self) -> bool {
        self.has(Condition::Timeout)
    }

    pub fn no_evidence_found(&self) -> bool {
        self.status == ContextStatus::NoEvidenceFound
    }

    pub fn remaining(&self) -> usize {
        self.budget.saturating_sub(self.used)
    }

    pub fn add_conditions(&mut self, conditions: impl IntoIterator<Item = Condition>) {
        self.conditions.extend(conditions);
    }

    /// Recomputes `status` from the included items and the raised conditions.
    pub fn finalize_status(&mut self) {
        if self.items.is_empty() && self.manifest.skipped.is_empty() {
            self.conditions.insert(Condition::NoEvidenceFound);
            self.status = ContextStatus::NoEvidenceFound;
            return;
        }
        self.conditions.remove(&Condition::NoEvidenceFound);
        self.status = if self.conditions.iter().any(Condition::is_source_loss) {
            ContextStatus::Partial
        } else {
            ContextStatus::Complete
        };
    }

    /// The included lines, in rank order.
    pub fn render(&self) -> String {
        self.items
            .iter()
            .map(|item| item.line.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Included evidence grouped under headings: documents, the distinct
    /// relationships the paths walk, then the paths. Empty groups are left out.
    /// Headings are not counted against the budget.
    pub fn render_sections(&self) -> String {
        let mut documents = Vec::new();
        let mut relationships = Vec::new();
        let mut seen = BTreeSet::new();
        let mut paths = Vec::new();

        for item in &self.items {
            match &item.evidence.source {
                EvidenceSource::Snippet(hit) => {
                    documents.push(format!("{}. [doc:{}] {}", documents.len() + 1, hit.document_id, hit.text.trim()));
                }
                EvidenceSource::Path(path) => {
                    for hop in &path.hops {
                        let edge = &hop.edge;
                        let line = format!("{} -[{}]-> {}", edge.source, edge.edge_type, edge.target);
                        if seen.insert(line.clone()) {
                            relationships.push(line);
                        }
                    }
                    paths.push(format!("- {}", path));
                }
            }
        }

        let mut sections = Vec::new();
        for (heading, lines) in [
            ("## Relevant Documents", documents),
            ("## Knowledge Graph Relationships", relationships),
            ("## Graph Paths", paths),
        ] {
            if !lines.is_empty() {
                sections.push(format!("{}\n{}", heading, lines.join("\n")));
            }
        }
        sections.join("\n\n")
    }
}


pub struct ContextAssembler {
    unit: BudgetUnit,
}

impl ContextAssembler {
    pub fn new(unit: BudgetUnit) -> Self {
        Self { unit }
    }

    pub fn unit(&self) -> BudgetUnit {
        self.unit
    }

    /// Greedy fill in rank order. An item that does not fit is skipped whole and
    /// scanning goes on with the next one.
    pub fn assemble(&self, evidence: Vec<EvidenceItem>, budget: usize) -> RetrievalContext {
        let mut context = RetrievalContext::empty("", budget, self.unit);
        let mut skipped = Vec::new();

        for (rank, evidence) in evidence.into_iter().enumerate() {
            let line = evidence.render_line();
            let size = self.unit.measure(&format!("{}\n", line));

            if size > context.remaining() {
                debug!("Skipping rank {} ({} > {} remaining)", rank, size, context.remaining());
                skipped.push(SkippedItem {
                    rank,
                    reference: evidence.reference(),
                    size,
                });
                continue;
            }

            context.used += size;
            context.items.push(ContextItem {
                rank,
                line,
                size,
                evidence,
            });
        }

        if !skipped.is_empty() {
            context.conditions.insert(Condition::BudgetExceeded);
        }
        context.manifest = Manifest::from_items(&context.items, skipped);
        context.finalize_status();

        info!(
            "Assembled context: {} items, {}/{} {:?} used, {} skipped",
            context.items.len(),
            context.used,
            budget,
            self.unit,
            context.manifest.skipped.len()
        );
        context
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    use crate::core::models::{Direction, Edge, EdgeType, Entity, EntityType, Hop, Path, VectorHit};
    use crate::retrieval::fusion::Provenance;

    fn snippet(doc: &str, text: &str, score: f64) -> EvidenceItem {
        EvidenceItem {
            provenance: Provenance::Vector,
            source: EvidenceSource::Snippet(VectorHit {
                chunk_id: "0".into(),
                document_id: doc.into(),
                text: text.into(),
                score,
                span: None,
                mentions: vec!["Singapore".into()],
            }),
            score,
            normalized_score: score,
            source_score: score,
            hop_count: 0,
            discovery: 0,
            linked: Vec::new(),
            merged: Vec::new(),
        }
    }

    fn graph_item() -> EvidenceItem {
        let techflow = Entity::new("TechFlow Inc.", EntityType::Company);
        let singapore = Entity::new("Singapore", EntityType::Location);
        let path = Path {
            seed: techflow.name.clone(),
            hops: vec![Hop {
                from: techflow.clone(),
                edge: Edge::new(&techflow.name, EdgeType::OperatesAt, &singapore.name),
                to: singapore,
                direction: Direction::Outgoing,
            }],
            score: 0.42,
            discovery: 0,
        };
        EvidenceItem {
            provenance: Provenance::Graph,
            source: EvidenceSource::Path(path),
            score: 0.9,
            normalized_score: 1.0,
            source_score: 0.42,
            hop_count: 1,
            discovery: 0,
            linked: Vec::new(),
            merged: vec![MergedProvenance {
                provenance: Provenance::Graph,
                reference: "Singapore <-[OPERATES_AT]- TechFlow Inc.".into(),
                score: 0.9,
            }],
        }
    }

    #[test]
    fn test_oversized_item_skipped_not_truncated() {
        let evidence = vec![
            snippet("a", &"x".repeat(40), 0.9),
            snippet("b", &"y".repeat(200), 0.8),
            snippet("c", &"z".repeat(20), 0.7),
        ];
        let context = ContextAssembler::new(BudgetUnit::Chars).assemble(evidence, 100);

        assert_eq!(context.items.len(), 2);
        assert_eq!(context.items[0].line, format!("[doc:a] {}", "x".repeat(40)));
        assert_eq!(context.items[1].rank, 2);
        assert_eq!(context.used, 49 + 29);
        assert!(context.budget_exceeded());
        assert_eq!(context.manifest.skipped.len(), 1);
        assert_eq!(context.manifest.skipped[0].reference, "b#0");
        assert_eq!(context.status, ContextStatus::Complete);
    }

    #[test]
    fn test_manifest_lists_sources() {
        let evidence = vec![graph_item(), snippet("reuters-17", "Port strike continues.", 0.5)];
        let context = ContextAssembler::new(BudgetUnit::Tokens).assemble(evidence, 1000);

        assert_eq!(context.manifest.entities, vec!["Singapore".to_string(), "TechFlow Inc.".to_string()]);
        assert_eq!(context.manifest.edge_types, vec!["OPERATES_AT".to_string()]);
        assert_eq!(context.manifest.documents, vec!["reuters-17".to_string()]);
        assert_eq!(context.manifest.paths, vec!["TechFlow Inc. -[OPERATES_AT]-> Singapore".to_string()]);
        assert_eq!(context.manifest.merged.len(), 1);
        assert_eq!(
            context.render(),
            "[graph] TechFlow Inc. -[OPERATES_AT]-> Singapore\n[doc:reuters-17] Port strike continues."
        );
        let line_len = "[graph] TechFlow Inc. -[OPERATES_AT]-> Singapore\n".chars().count();
        assert_eq!(context.items[0].size, line_len.div_ceil(4));
    }

    #[test]
    fn test_render_sections_groups_by_source() {
        let evidence = vec![
            graph_item(),
            snippet("reuters-17", "  Port strike continues. ", 0.5),
            snippet("ft-3", "Chip buyers look elsewhere.", 0.4),
        ];
        let context = ContextAssembler::new(BudgetUnit::Chars).assemble(evidence, 1000);

        assert_eq!(
            context.render_sections(),
            "## Relevant Documents\n\
             1. [doc:reuters-17] Port strike continues.\n\
             2. [doc:ft-3] Chip buyers look elsewhere.\n\
             \n\
             ## Knowledge Graph Relationships\n\
             TechFlow Inc. -[OPERATES_AT]-> Singapore\n\
             \n\
             ## Graph Paths\n\
             - TechFlow Inc. -[OPERATES_AT]-> Singapore"
        );

        let documents_only =
            ContextAssembler::new(BudgetUnit::Chars).assemble(vec![snippet("ft-3", "Chips.", 0.4)], 1000);
        assert_eq!(documents_only.render_sections(), "## Relevant Documents\n1. [doc:ft-3] Chips.");
    }

    #[test]
    fn test_empty_evidence_is_no_evidence_found() {
        let context = ContextAssembler::new(BudgetUnit::Chars).assemble(Vec::new(), 100);
        assert!(context.no_evidence_found());
        assert!(context.has(Condition::NoEvidenceFound));
        assert_eq!(context.render(), "");
        assert_eq!(context.render_sections(), "");
        assert!(!context.retrieval_id.is_empty());
    }

    #[test]
    fn test_status_partial_on_source_loss() {
        let mut context = ContextAssembler::new(BudgetUnit::Chars).assemble(vec![graph_item()], 500);
        context.add_conditions([Condition::VectorUnavailable, Condition::Timeout]);
        context.finalize_status();
        assert_eq!(context.status, ContextStatus::Partial);
        assert!(context.vector_unavailable());
        assert!(context.timed_out());
        assert!(!context.graph_unavailable());
    }

    #[test]
    fn test_context_serializes() {
        let context = ContextAssembler::new(BudgetUnit::Chars).assemble(vec![graph_item()], 500);
        let json = serde_json::to_value(&context).unwrap();
        assert_eq!(json["status"], "complete");
        assert_eq!(json["unit"], "chars");
        assert_eq!(json["items"][0]["evidence"]["source"]["kind"], "path");
    }

    proptest! {
        #[test]
        fn prop_assembly_never_exceeds_budget(
            lengths in proptest::collection::vec(0usize..120, 0..25),
            budget in 0usize..600,
            tokens in any::<bool>(),
        ) {
            let unit = if tokens { BudgetUnit::Tokens } else { BudgetUnit::Chars };
            let evidence: Vec<EvidenceItem> = lengths
                .iter()
                .enumerate()
                .map(|(i, &n)| snippet(&format!("d{}", i), &"w".repeat(n), 0.5))
                .collect();
            let sizes: Vec<usize> = evidence
                .iter()
                .map(|e| unit.measure(&format!("{}\n", e.render_line())))
                .collect();

            let context = ContextAssembler::new(unit).assemble(evidence, budget);
            prop_assert!(context.used <= budget);
            prop_assert_eq!(context.used, context.items.iter().map(|i| i.size).sum::<usize>());

            let mut remaining = budget;
            let mut included = context.items.iter().map(|i| i.rank).peekable();
            for (rank, &size) in sizes.iter().enumerate() {
                if included.peek() == Some(&rank) {
                    prop_assert!(size <= remaining);
                    remaining -= size;
                    included.next();
                } else {
                    prop_assert!(size > remaining);
                }
            }
            prop_assert_eq!(context.budget_exceeded(), !context.manifest.skipped.is_empty());
        }
    }
}
