use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::debug;

use super::{GraphService, NameIndex, ServiceError, VectorIndex};
use crate::core::error::{AtlasError, Result};
use crate::core::models::{Edge, EdgeType, Entity, EntityRef, TextSpan, Triple, VectorHit};
use crate::llm::Embedder;
use crate::retrieval::scoring::cosine_similarity;
use crate::utils::normalize_name;


/// Graph and name index held in process memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryGraph {
    entities: BTreeMap<String, Entity>,
    edges: Vec<Edge>,
    names: BTreeMap<String, BTreeSet<String>>,
}

impl InMemoryGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces an entity, indexing its name and aliases.
    pub fn add_entity(&mut self, entity: Entity) {
        if let Some(previous) = self.entities.remove(&entity.name) {
            for key in Self::surface_keys(&previous) {
                if let Some(owners) = self.names.get_mut(&key) {
                    owners.remove(&previous.name);
                    if owners.is_empty() {
                        self.names.remove(&key);
                    }
                }
            }
        }

        for key in Self::surface_keys(&entity) {
            self.names.entry(key).or_default().insert(entity.name.clone());
        }
        self.entities.insert(entity.name.clone(), entity);
    }

    pub fn add_edge(&mut self, edge: Edge) -> Result<()> {
        for endpoint in [&edge.source, &edge.target] {
            if !self.entities.contains_key(endpoint) {
                return Err(AtlasError::Validation(format!(
                    "edge {} references unknown entity {}",
                    edge.edge_type, endpoint
                )));
            }
        }
        self.edges.push(edge);
        Ok(())
    }

    pub fn with_entity(mut self, entity: Entity) -> Self {
        self.add_entity(entity);
        self
    }

    pub fn with_edge(mut self, edge: Edge) -> Result<Self> {
        self.add_edge(edge)?;
        Ok(self)
    }

    pub fn entity(&self, name: &str) -> Option<&Entity> {
        self.entities.get(name)
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    fn surface_keys(entity: &Entity) -> BTreeSet<String> {
        std::iter::once(&entity.name)
            .chain(entity.aliases.iter())
            .map(|surface| normalize_name(surface))
            .filter(|key| !key.is_empty())
            .collect()
    }

    fn triple(&self, edge: &Edge) -> Option<Triple> {
        Some(Triple {
            source: self.entities.get(&edge.source)?.clone(),
            edge: edge.clone(),
            target: self.entities.get(&edge.target)?.clone(),
        })
    }
}

#[async_trait]
impl GraphService for InMemoryGraph {
    async fn neighborhood(
        &self,
        seeds: &[String],
        edge_filter: Option<&BTreeSet<EdgeType>>,
        max_hops: usize,
    ) -> std::result::Result<Vec<Triple>, ServiceError> {
        let mut visited: BTreeSet<&str> = seeds
            .iter()
            .map(String::as_str)
            .filter(|seed| self.entities.contains_key(*seed))
            .collect();
        let mut frontier = visited.clone();
        let mut included = vec![false; self.edges.len()];

        for _ in 0..max_hops {
            if frontier.is_empty() {
                break;
            }
            let mut next = BTreeSet::new();

            for (idx, edge) in self.edges.iter().enumerate() {
                if edge_filter.is_some_and(|filter| !filter.contains(&edge.edge_type)) {
                    continue;
                }
                let touches_source = frontier.contains(edge.source.as_str());
                let touches_target = frontier.contains(edge.target.as_str());
                if !touches_source && !touches_target {
                    continue;
                }
                included[idx] = true;
                for endpoint in [edge.source.as_str(), edge.target.as_str()] {
                    if visited.insert(endpoint) {
                        next.insert(endpoint);
                    }
                }
            }

            frontier = next;
        }

        let triples: Vec<Triple> = self
            .edges
            .iter()
            .zip(included)
            .filter(|(_, keep)| *keep)
            .filter_map(|(edge, _)| self.triple(edge))
            .collect();
        debug!("In-memory neighborhood: {} seeds -> {} triples", seeds.len(), triples.len());
        Ok(triples)
    }

    async fn health_check(&self) -> std::result::Result<(), ServiceError> {
        Ok(())
    }
}

#[async_trait]
impl NameIndex for InMemoryGraph {
    async fn lookup(&self, normalized: &str) -> std::result::Result<Vec<EntityRef>, ServiceError> {
        Ok(self
            .names
            .get(normalized)
            .into_iter()
            .flatten()
            .filter_map(|name| self.entities.get(name))
            .map(Entity::to_ref)
            .collect())
    }
}


#[derive(Debug, Clone, PartialEq)]
pub struct DocumentChunk {
    pub chunk_id: String,
    pub document_id: String,
    pub text: String,
    pub span: Option<TextSpan>,
    pub mentions: Vec<String>,
}

impl DocumentChunk {
    pub fn new(document_id: impl Into<String>, chunk_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            chunk_id: chunk_id.into(),
            document_id: document_id.into(),
            text: text.into(),
            span: None,
            mentions: Vec::new(),
        }
    }

    pub fn with_span(mut self, start: usize, end: usize) -> Self {
        self.span = Some(TextSpan::new(start, end));
        self
    }

    pub fn with_mention(mut self, entity_name: impl Into<String>) -> Self {
        self.mentions.push(entity_name.into());
        self
    }
}

struct IndexedChunk {
    chunk: DocumentChunk,
    embedding: Vec<f32>,
}


/// Brute-force cosine index over chunks embedded at insertion time.
pub struct InMemoryVectorIndex {
    embedder: Arc<dyn Embedder>,
    chunks: RwLock<Vec<IndexedChunk>>,
}

impl InMemoryVectorIndex {
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self {
            embedder,
            chunks: RwLock::new(Vec::new()),
        }
    }

    pub async fn add_chunk(&self, chunk: DocumentChunk) -> std::result::Result<(), ServiceError> {
        let embedding = self.embedder.embed(&chunk.text).await?;
        self.chunks.write().push(IndexedChunk { chunk, embedding });
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.chunks.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.read().is_empty()
    }
}

#[async_trait]
impl VectorIndex for InMemoryVectorIndex {
    async fn query(&self, text: &str, top_k: usize) -> std::result::Result<Vec<VectorHit>, ServiceError> {
        if top_k == 0 {
            return Ok(Vec::new());
        }
        let query_vector = self.embedder.embed(text).await?;

        let chunks = self.chunks.read();
        let mut scored: Vec<(f64, &IndexedChunk)> = chunks
            .iter()
            .map(|indexed| (cosine_similarity(&query_vector, &indexed.embedding), indexed))
            .collect();
        // stable: equal scores keep insertion order
        scored.sort_by(|a, b| b.0.total_cmp(&a.0));
        scored.truncate(top_k);

        Ok(scored
            .into_iter()
            .map(|(score, indexed)| VectorHit {
                chunk_id: indexed.chunk.chunk_id.clone(),
                document_id: indexed.chunk.document_id.clone(),
                text: indexed.chunk.text.clone(),
                score,
                span: indexed.chunk.span,
                mentions: indexed.chunk.mentions.clone(),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::EntityType;
    use crate::llm::HashingEmbedder;

    fn chain_graph() -> InMemoryGraph {
        InMemoryGraph::new()
            .with_entity(Entity::new("A", EntityType::Company))
            .with_entity(Entity::new("B", EntityType::Product))
            .with_entity(Entity::new("C", EntityType::Location))
            .with_entity(Entity::new("D", EntityType::Company))
            .with_edge(Edge::new("A", EdgeType::Manufactures, "B"))
            .and_then(|g| g.with_edge(Edge::new("C", EdgeType::LocatedIn, "B")))
            .and_then(|g| g.with_edge(Edge::new("C", EdgeType::Supplies, "D")))
            .unwrap()
    }

    #[test]
    fn test_edge_to_unknown_entity_rejected() {
        let mut graph = InMemoryGraph::new().with_entity(Entity::new("A", EntityType::Company));
        let err = graph.add_edge(Edge::new("A", EdgeType::Supplies, "Nowhere")).unwrap_err();
        assert!(matches!(err, AtlasError::Validation(_)));
        assert_eq!(graph.edge_count(), 0);
    }

    #[tokio::test]
    async fn test_neighborhood_respects_hops_and_direction_free() {
        let graph = chain_graph();

        let one = graph.neighborhood(&["B".to_string()], None, 1).await.unwrap();
        assert_eq!(one.len(), 2);

        let two = graph.neighborhood(&["B".to_string()], None, 2).await.unwrap();
        assert_eq!(two.len(), 3);
        assert_eq!(two[2].edge.edge_type, EdgeType::Supplies);
    }

    #[tokio::test]
    async fn test_neighborhood_edge_filter() {
        let graph = chain_graph();
        let filter: BTreeSet<EdgeType> = [EdgeType::Manufactures, EdgeType::Supplies].into_iter().collect();
        let triples = graph.neighborhood(&["B".to_string()], Some(&filter), 3).await.unwrap();
        assert_eq!(triples.len(), 1);
        assert_eq!(triples[0].source.name, "A");
    }

    #[tokio::test]
    async fn test_unknown_seed_yields_nothing() {
        let graph = chain_graph();
        assert!(graph.neighborhood(&["Z".to_string()], None, 3).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_name_lookup_by_alias_and_reindex() {
        let mut graph = InMemoryGraph::new()
            .with_entity(Entity::new("São Paulo Hub", EntityType::LogisticsNode).with_alias("SP Hub"));

        let found = graph.lookup("sao paulo hub").await.unwrap();
        assert_eq!(found, vec![EntityRef::new("São Paulo Hub", EntityType::LogisticsNode)]);
        assert_eq!(graph.lookup("sp hub").await.unwrap().len(), 1);

        graph.add_entity(Entity::new("São Paulo Hub", EntityType::LogisticsNode));
        assert!(graph.lookup("sp hub").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_vector_query_orders_and_limits() {
        let index = InMemoryVectorIndex::new(Arc::new(HashingEmbedder::default()));
        index
            .add_chunk(DocumentChunk::new("d1", "c1", "port strike halts container traffic"))
            .await
            .unwrap();
        index
            .add_chunk(DocumentChunk::new("d2", "c1", "chip fabrication yields improve"))
            .await
            .unwrap();
        assert_eq!(index.len(), 2);

        let hits = index.query("port strike", 1).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].document_id, "d1");
        assert!((0.0..=1.0).contains(&hits[0].score));

        assert!(index.query("port strike", 0).await.unwrap().is_empty());
    }
}
