use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{FuturesUnordered, StreamExt};
use lazy_static::lazy_static;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::{bounded, cutoff};
use super::config::RecognizerConfig;
use crate::core::cache::{CacheStats, TtlCache};
use crate::core::models::EntityRef;
use crate::core::outcome::{BranchOutcome, Condition};
use crate::db::NameIndex;
use crate::llm::MentionExtractor;
use crate::utils::normalize_name;


lazy_static! {
    static ref STOPWORDS: HashSet<&'static str> = [
        "a", "an", "the", "of", "in", "on", "at", "to", "for", "by", "with", "from", "and", "or",
        "is", "are", "was", "were", "be", "been", "will", "would", "could", "should", "can", "does",
        "do", "did", "how", "what", "which", "who", "whom", "whose", "why", "when", "where", "if",
        "it", "its", "this", "that", "these", "those", "our", "their", "my", "any", "all", "via",
    ]
    .into_iter()
    .collect();
}


/// Normalized word n-grams of `query`, longest window `max_ngram`. Single stopwords are dropped.
pub fn candidate_forms(query: &str, max_ngram: usize) -> BTreeSet<String> {
    let tokens: Vec<&str> = query.split_whitespace().map(strip_possessive).collect();
    let mut forms = BTreeSet::new();

    for n in 1..=max_ngram.min(tokens.len()) {
        for window in tokens.windows(n) {
            let form = normalize_name(&window.join(" "));
            if form.is_empty() || (n == 1 && STOPWORDS.contains(form.as_str())) {
                continue;
            }
            forms.insert(form);
        }
    }
    forms
}

fn strip_possessive(token: &str) -> &str {
    let trimmed = token.trim_end_matches(|c: char| !c.is_alphanumeric() && c != '\'' && c != '\u{2019}');
    trimmed
        .strip_suffix("'s")
        .or_else(|| trimmed.strip_suffix("\u{2019}s"))
        .or_else(|| trimmed.strip_suffix('\''))
        .unwrap_or(trimmed)
}


pub struct EntityRecognizer {
    names: Arc<dyn NameIndex>,
    extractor: Option<Arc<dyn MentionExtractor>>,
    cache: TtlCache<Vec<EntityRef>>,
    config: RecognizerConfig,
    lookup_timeout: Duration,
}

impl EntityRecognizer {
    pub fn new(names: Arc<dyn NameIndex>, config: RecognizerConfig, lookup_timeout: Duration) -> Self {
        Self {
            names,
            extractor: None,
            cache: TtlCache::new(config.cache_size, config.cache_ttl_secs),
            config,
            lookup_timeout,
        }
    }

    pub fn with_extractor(mut self, extractor: Arc<dyn MentionExtractor>) -> Self {
        self.extractor = Some(extractor);
        self
    }

    pub async fn recognize(&self, query: &str) -> BranchOutcome<BTreeSet<EntityRef>> {
        self.recognize_until(query, None).await
    }

    pub async fn recognize_until(
        &self,
        query: &str,
        deadline: Option<Instant>,
    ) -> BranchOutcome<BTreeSet<EntityRef>> {
        let mut candidates = candidate_forms(query, self.config.max_ngram);
        let mut timed_out = false;

        if let Some(extractor) = self.extractor.as_ref().filter(|_| self.config.use_extractor) {
            match bounded(extractor.extract(query), self.lookup_timeout, deadline).await {
                Some(Ok(mentions)) => {
                    candidates.extend(mentions.iter().map(|m| normalize_name(m)).filter(|m| !m.is_empty()));
                }
                Some(Err(e)) => warn!("Mention extraction failed: {}", e),
                None => {
                    warn!("Mention extraction timed out");
                    timed_out = true;
                }
            }
        }

        let mut entities = BTreeSet::new();
        let mut pending = Vec::new();
        for candidate in &candidates {
            match self.cache.get(candidate) {
                Some(refs) => entities.extend(refs),
                None => pending.push(candidate.as_str()),
            }
        }

        debug!(
            "Recognizer: {} candidates, {} cached, {} to look up",
            candidates.len(),
            candidates.len() - pending.len(),
            pending.len()
        );

        // Lookups share one cutoff; whatever resolved before it is kept.
        let mut failures = 0usize;
        if !pending.is_empty() {
            let until = cutoff(self.lookup_timeout, deadline);
            let mut lookups: FuturesUnordered<_> = pending
                .iter()
                .map(|&form| async move { (form, self.names.lookup(form).await) })
                .collect();
            let mut resolved = 0usize;

            loop {
                match tokio::time::timeout_at(until, lookups.next()).await {
                    Ok(Some((form, Ok(refs)))) => {
                        resolved += 1;
                        self.cache.put(form, refs.clone());
                        entities.extend(refs);
                    }
                    Ok(Some((form, Err(e)))) => {
                        warn!("Name lookup failed for '{}': {}", form, e);
                        failures += 1;
                    }
                    Ok(None) => break,
                    Err(_) => {
                        warn!(
                            "Name lookup timed out after {:?}, {} of {} resolved",
                            self.lookup_timeout,
                            resolved,
                            pending.len()
                        );
                        timed_out = true;
                        break;
                    }
                }
            }
        }

        let mut conditions = Vec::new();
        if entities.is_empty() {
            conditions.push(Condition::EntityNotFound);
        }
        if timed_out {
            conditions.push(Condition::Timeout);
        }

        if conditions.is_empty() && failures == 0 {
            info!("Recognized {} entities in '{}'", entities.len(), crate::safe_truncate(query, 60));
            return BranchOutcome::Complete(entities);
        }

        let reason = match (failures, timed_out) {
            (0, false) => "no known entity named in query".to_string(),
            (0, true) => "entity lookup timed out".to_string(),
            (n, _) => format!("{} name lookups failed", n),
        };
        info!("Entity recognition degraded ({}): {} entities", reason, entities.len());
        BranchOutcome::degraded(entities, conditions, reason)
    }

    /// Drops cached lookups. `None` clears everything.
    pub fn invalidate(&self, surface: Option<&str>) {
        match surface {
            Some(s) => self.cache.invalidate(&normalize_name(s)),
            None => self.cache.clear(),
        }
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }
}
