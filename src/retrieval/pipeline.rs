use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{info, warn};

use super::config::RetrievalConfig;
use super::context::{ContextAssembler, RetrievalContext};
use super::fusion::EvidenceFusion;
use super::recognizer::EntityRecognizer;
use super::traversal::GraphTraversalEngine;
use super::vector::VectorSearch;
use crate::core::error::{AtlasError, Result};
use crate::core::models::{Path, VectorHit};
use crate::core::outcome::{BranchOutcome, Condition};
use crate::db::{GraphService, NameIndex, VectorIndex};
use crate::llm::MentionExtractor;


/// Query in, bounded context out. Graph and vector branches run concurrently;
/// a failing branch shows up as a condition on the context, never as an error.
pub struct HybridRetriever {
    recognizer: EntityRecognizer,
    traversal: GraphTraversalEngine,
    vectors: VectorSearch,
    fusion: EvidenceFusion,
    assembler: ContextAssembler,
    config: RetrievalConfig,
}

impl HybridRetriever {
    pub fn new(
        graph: Arc<dyn GraphService>,
        vectors: Arc<dyn VectorIndex>,
        names: Arc<dyn NameIndex>,
        config: RetrievalConfig,
    ) -> Result<Self> {
        config.validate()?;

        let timeouts = &config.timeouts;
        info!(
            "HybridRetriever ready (max_hops={}, fan_out_cap={}, top_k={}, alpha={}, budget={})",
            config.traversal.max_hops,
            config.traversal.fan_out_cap,
            config.vector.top_k,
            config.fusion.alpha,
            config.assembly.budget
        );

        Ok(Self {
            recognizer: EntityRecognizer::new(names, config.recognizer.clone(), timeouts.lookup()),
            traversal: GraphTraversalEngine::new(graph, config.traversal.clone(), timeouts.graph()),
            vectors: VectorSearch::new(vectors, config.vector.clone(), timeouts.vector()),
            fusion: EvidenceFusion::new(config.fusion.clone()),
            assembler: ContextAssembler::new(config.assembly.unit),
            config,
        })
    }

    pub fn with_extractor(mut self, extractor: Arc<dyn MentionExtractor>) -> Self {
        self.recognizer = self.recognizer.with_extractor(extractor);
        self
    }

    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    pub fn recognizer(&self) -> &EntityRecognizer {
        &self.recognizer
    }

    pub async fn retrieve(&self, query: &str) -> Result<RetrievalContext> {
        self.run(query, None, true).await
    }

    /// Like `retrieve`, with every external call cut off at `deadline` from now.
    pub async fn retrieve_with_deadline(&self, query: &str, deadline: Duration) -> Result<RetrievalContext> {
        self.run(query, Some(Instant::now() + deadline), true).await
    }

    /// Checks graph health first and skips the graph branch when it is down.
    pub async fn retrieve_with_fallback(&self, query: &str) -> Result<RetrievalContext> {
        let graph_up = self.traversal.health_check().await;
        if !graph_up {
            warn!("Graph service unhealthy, falling back to vector-only retrieval");
        }
        self.run(query, None, graph_up).await
    }

    async fn run(&self, query: &str, deadline: Option<Instant>, use_graph: bool) -> Result<RetrievalContext> {
        let query = query.trim();
        if query.is_empty() {
            return Err(AtlasError::Validation("query must not be empty".into()));
        }
        info!("Retrieving context for '{}'", crate::safe_truncate(query, 80));

        let (entities, mut conditions) = self.recognizer.recognize_until(query, deadline).await.into_parts();
        let seeds: Vec<String> = entities.iter().map(|e| e.name.clone()).collect();
        let names: Vec<&str> = seeds.iter().map(String::as_str).collect();
        let vector_query = self.vectors.with_entity_context(query, &names);

        let whitelist = self.config.traversal.edge_whitelist.as_ref();
        let graph_branch = async {
            if !use_graph {
                return BranchOutcome::unavailable(Condition::GraphUnavailable, false, "graph health check failed");
            }
            self.traversal
                .traverse_until(&seeds, self.config.traversal.max_hops, whitelist, deadline)
                .await
        };
        let vector_branch = self
            .vectors
            .search_until(&vector_query, self.config.vector.top_k, deadline);

        let (graph, vector): (BranchOutcome<Vec<Path>>, BranchOutcome<Vec<VectorHit>>) =
            tokio::join!(graph_branch, vector_branch);

        for (branch, reason) in [("graph", graph.reason()), ("vector", vector.reason())] {
            if let Some(reason) = reason {
                warn!("{} branch degraded: {}", branch, reason);
            }
        }

        let (paths, graph_conditions) = graph.into_parts();
        let (hits, vector_conditions) = vector.into_parts();
        conditions.extend(graph_conditions);
        conditions.extend(vector_conditions);

        let evidence = self.fusion.fuse(&paths, &hits);
        let mut context = self.assembler.assemble(evidence, self.config.assembly.budget);
        context.query = query.to_string();
        context.entities = entities.into_iter().collect();
        context.add_conditions(conditions);
        context.finalize_status();

        let flags: BTreeSet<String> = context.conditions.iter().map(ToString::to_string).collect();
        info!(
            "Retrieval {} finished: status={}, {} items, {} paths, {} hits, flags={:?}",
            context.retrieval_id,
            context.status,
            context.items.len(),
            paths.len(),
            hits.len(),
            flags
        );
        Ok(context)
    }
}
