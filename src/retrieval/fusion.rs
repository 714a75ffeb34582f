use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use strum::Display;
use tracing::debug;

use super::config::FusionConfig;
use super::scoring::{combine, min_max_normalize};
use crate::core::models::{Path, VectorHit};
use crate::utils::{contains_phrase, normalize_name};


#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Provenance {
    Graph,
    Vector,
}


#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum EvidenceSource {
    Path(Path),
    Snippet(VectorHit),
}


/// A duplicate that was collapsed into a surviving item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergedProvenance {
    pub provenance: Provenance,
    pub reference: String,
    pub score: f64,
}


#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceItem {
    pub provenance: Provenance,
    pub source: EvidenceSource,
    /// Unified score used for ranking.
    pub score: f64,
    /// Min-max normalized score within its own source.
    pub normalized_score: f64,
    pub source_score: f64,
    pub hop_count: usize,
    pub discovery: usize,
    /// References of cross-source counterparts this item was linked to.
    #[serde(default)]
    pub linked: Vec<String>,
    #[serde(default)]
    pub merged: Vec<MergedProvenance>,
}

impl EvidenceItem {
    pub fn reference(&self) -> String {
        match &self.source {
            EvidenceSource::Path(path) => path.to_string(),
            EvidenceSource::Snippet(hit) => hit.reference(),
        }
    }

    pub fn render_line(&self) -> String {
        match &self.source {
            EvidenceSource::Path(path) => format!("[graph] {}", path),
            EvidenceSource::Snippet(hit) => format!("[doc:{}] {}", hit.document_id, hit.text.trim()),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        match &self.source {
            EvidenceSource::Path(path) => Some(path),
            EvidenceSource::Snippet(_) => None,
        }
    }

    pub fn hit(&self) -> Option<&VectorHit> {
        match &self.source {
            EvidenceSource::Snippet(hit) => Some(hit),
            EvidenceSource::Path(_) => None,
        }
    }

    pub fn is_linked(&self) -> bool {
        !self.linked.is_empty()
    }

    fn as_merged(&self) -> MergedProvenance {
        MergedProvenance {
            provenance: self.provenance,
            reference: self.reference(),
            score: self.score,
        }
    }
}


struct Candidate {
    item: EvidenceItem,
    text_digest: Option<Vec<u8>>,
}

impl Candidate {
    fn duplicates(&self, other: &Candidate) -> bool {
        match (&self.item.source, &other.item.source) {
            (EvidenceSource::Path(a), EvidenceSource::Path(b)) => a.terminal_set() == b.terminal_set(),
            (EvidenceSource::Snippet(a), EvidenceSource::Snippet(b)) => {
                if a.document_id != b.document_id {
                    return false;
                }
                match (a.span, b.span) {
                    (Some(sa), Some(sb)) => sa.overlaps(&sb),
                    _ => self.text_digest.is_some() && self.text_digest == other.text_digest,
                }
            }
            _ => false,
        }
    }
}

/// Keeps the best of a duplicate group (highest score, earliest on ties) and
/// records the others as merged provenance.
fn collapse(mut winner: Candidate, others: Vec<Candidate>) -> Candidate {
    let mut losers = Vec::with_capacity(others.len());
    for mut other in others {
        let better = other
            .item
            .score
            .total_cmp(&winner.item.score)
            .then_with(|| winner.item.discovery.cmp(&other.item.discovery))
            .is_gt();
        if better {
            std::mem::swap(&mut winner, &mut other);
        }
        losers.push(other);
    }
    losers.sort_by_key(|c| c.item.discovery);
    for mut loser in losers {
        winner.item.merged.push(loser.item.as_merged());
        winner.item.merged.append(&mut loser.item.merged);
    }
    winner
}

fn text_digest(text: &str) -> Vec<u8> {
    Sha256::digest(normalize_name(text).as_bytes()).to_vec()
}


struct HitMentions {
    text: String,
    mentions: BTreeSet<String>,
}

impl HitMentions {
    fn new(hit: &VectorHit) -> Self {
        Self {
            text: normalize_name(&hit.text),
            mentions: hit.mentions.iter().map(|m| normalize_name(m)).collect(),
        }
    }

    fn mentions(&self, normalized_entity: &str) -> bool {
        self.mentions.contains(normalized_entity) || contains_phrase(&self.text, normalized_entity)
    }
}


pub struct EvidenceFusion {
    config: FusionConfig,
}

impl EvidenceFusion {
    pub fn new(config: FusionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &FusionConfig {
        &self.config
    }

    /// Merges graph paths and vector hits into one ranked, deduplicated list.
    pub fn fuse(&self, paths: &[Path], hits: &[VectorHit]) -> Vec<EvidenceItem> {
        let path_norm = min_max_normalize(&paths.iter().map(|p| p.score).collect::<Vec<_>>());
        let hit_norm = min_max_normalize(&hits.iter().map(|h| h.score).collect::<Vec<_>>());

        let hit_mentions: Vec<HitMentions> = hits.iter().map(HitMentions::new).collect();
        let links: Vec<Vec<usize>> = paths
            .iter()
            .map(|path| {
                let entities: Vec<String> = path
                    .entity_names()
                    .into_iter()
                    .skip(1)
                    .map(normalize_name)
                    .filter(|name| !name.is_empty())
                    .collect();
                hit_mentions
                    .iter()
                    .enumerate()
                    .filter(|(_, hit)| entities.iter().any(|e| hit.mentions(e)))
                    .map(|(j, _)| j)
                    .collect()
            })
            .collect();

        let mut candidates = Vec::with_capacity(paths.len() + hits.len());

        for (i, path) in paths.iter().enumerate() {
            let linked = &links[i];
            let score = match linked.iter().map(|&j| hit_norm[j]).reduce(f64::max) {
                Some(best_hit) => combine(self.config.alpha, path_norm[i], best_hit),
                None => self.config.graph_weight * path_norm[i],
            };
            candidates.push(Candidate {
                item: EvidenceItem {
                    provenance: Provenance::Graph,
                    source: EvidenceSource::Path(path.clone()),
                    score,
                    normalized_score: path_norm[i],
                    source_score: path.score,
                    hop_count: path.len(),
                    discovery: i,
                    linked: linked.iter().map(|&j| hits[j].reference()).collect(),
                    merged: Vec::new(),
                },
                text_digest: None,
            });
        }

        for (j, hit) in hits.iter().enumerate() {
            let linked_paths: Vec<usize> = (0..paths.len()).filter(|&i| links[i].contains(&j)).collect();
            let score = match linked_paths.iter().map(|&i| path_norm[i]).reduce(f64::max) {
                Some(best_path) => combine(self.config.alpha, best_path, hit_norm[j]),
                None => self.config.vector_weight * hit_norm[j],
            };
            candidates.push(Candidate {
                item: EvidenceItem {
                    provenance: Provenance::Vector,
                    source: EvidenceSource::Snippet(hit.clone()),
                    score,
                    normalized_score: hit_norm[j],
                    source_score: hit.score,
                    hop_count: 0,
                    discovery: paths.len() + j,
                    linked: linked_paths.iter().map(|&i| paths[i].to_string()).collect(),
                    merged: Vec::new(),
                },
                text_digest: hit.span.is_none().then(|| text_digest(&hit.text)),
            });
        }

        let total = candidates.len();
        let mut survivors: Vec<Candidate> = Vec::with_capacity(total);
        for candidate in candidates {
            let dups: Vec<usize> = survivors
                .iter()
                .enumerate()
                .filter(|(_, kept)| kept.duplicates(&candidate))
                .map(|(idx, _)| idx)
                .collect();
            let Some(&slot) = dups.first() else {
                survivors.push(candidate);
                continue;
            };
            // A candidate can bridge several survivors (chained spans); all of them collapse.
            let others: Vec<Candidate> = dups.iter().rev().map(|&idx| survivors.remove(idx)).collect();
            survivors.insert(slot, collapse(candidate, others));
        }

        let mut items: Vec<EvidenceItem> = survivors.into_iter().map(|c| c.item).collect();
        items.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.hop_count.cmp(&b.hop_count))
                .then_with(|| a.discovery.cmp(&b.discovery))
        });
        items.truncate(self.config.max_evidence);

        debug!(
            "Fusion: {} paths + {} hits -> {} candidates -> {} items",
            paths.len(),
            hits.len(),
            total,
            items.len()
        );
        items
    }
}
