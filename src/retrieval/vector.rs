use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, warn};

use super::bounded;
use super::config::VectorConfig;
use super::scoring::clamp_unit;
use crate::core::models::VectorHit;
use crate::core::outcome::{BranchOutcome, Condition};
use crate::db::VectorIndex;


pub struct VectorSearch {
    index: Arc<dyn VectorIndex>,
    config: VectorConfig,
    timeout: Duration,
}

impl VectorSearch {
    pub fn new(index: Arc<dyn VectorIndex>, config: VectorConfig, timeout: Duration) -> Self {
        Self { index, config, timeout }
    }

    pub fn config(&self) -> &VectorConfig {
        &self.config
    }

    /// Query text with recognized entity names appended, when entity context is enabled.
    pub fn with_entity_context(&self, query: &str, entity_names: &[&str]) -> String {
        if !self.config.include_entity_context || entity_names.is_empty() {
            return query.to_string();
        }
        format!("{} {}", query.trim_end(), entity_names.join(" "))
    }

    pub async fn search(&self, query: &str, top_k: usize) -> BranchOutcome<Vec<VectorHit>> {
        self.search_until(query, top_k, None).await
    }

    pub async fn search_until(
        &self,
        query: &str,
        top_k: usize,
        deadline: Option<Instant>,
    ) -> BranchOutcome<Vec<VectorHit>> {
        if top_k == 0 {
            return BranchOutcome::Complete(Vec::new());
        }

        let mut hits = match bounded(self.index.query(query, top_k), self.timeout, deadline).await {
            Some(Ok(hits)) => hits,
            Some(Err(e)) => {
                warn!("Vector index failed: {}", e);
                return BranchOutcome::unavailable(Condition::VectorUnavailable, false, e.to_string());
            }
            None => {
                warn!("Vector index timed out after {:?}", self.timeout);
                return BranchOutcome::unavailable(Condition::VectorUnavailable, true, "vector query timed out");
            }
        };

        for hit in &mut hits {
            hit.score = clamp_unit(hit.score);
        }
        // stable: ties keep index order
        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(top_k);

        debug!("Vector search returned {} hits for '{}'", hits.len(), crate::safe_truncate(query, 60));
        BranchOutcome::Complete(hits)
    }
}
