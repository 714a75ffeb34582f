use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::client::{HelixClient, HelixClientError};
use super::{GraphService, NameIndex, ServiceError, VectorIndex};
use crate::core::models::{Edge, EdgeType, Entity, EntityRef, EntityType, Scalar, TextSpan, Triple, VectorHit};
use crate::llm::Embedder;


#[derive(Debug, Deserialize)]
struct WireEntity {
    name: String,
    entity_type: String,
    #[serde(default)]
    attributes: BTreeMap<String, Scalar>,
    #[serde(default)]
    aliases: Vec<String>,
}

impl WireEntity {
    fn into_entity(self) -> Option<Entity> {
        let entity_type = match self.entity_type.parse::<EntityType>() {
            Ok(t) => t,
            Err(_) => {
                warn!("Skipping entity {} with unknown type {}", self.name, self.entity_type);
                return None;
            }
        };
        Some(Entity {
            name: self.name,
            entity_type,
            attributes: self.attributes,
            aliases: self.aliases,
        })
    }
}

#[derive(Debug, Deserialize)]
struct WireTriple {
    source: WireEntity,
    edge_type: String,
    #[serde(default)]
    properties: BTreeMap<String, Scalar>,
    target: WireEntity,
}

impl WireTriple {
    fn into_triple(self) -> Option<Triple> {
        let source = self.source.into_entity()?;
        let target = self.target.into_entity()?;
        let edge = Edge {
            source: source.name.clone(),
            target: target.name.clone(),
            edge_type: EdgeType::from(self.edge_type),
            properties: self.properties,
        };
        Some(Triple { source, edge, target })
    }
}

#[derive(Debug, Deserialize, Default)]
struct NeighborhoodResponse {
    #[serde(default)]
    triples: Vec<WireTriple>,
}

#[derive(Serialize)]
struct NeighborhoodParams<'a> {
    seeds: &'a [String],
    edge_types: Vec<&'a str>,
    max_hops: usize,
}


pub struct HelixGraphService {
    client: Arc<HelixClient>,
}

impl HelixGraphService {
    pub fn new(client: Arc<HelixClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl GraphService for HelixGraphService {
    async fn neighborhood(
        &self,
        seeds: &[String],
        edge_filter: Option<&BTreeSet<EdgeType>>,
        max_hops: usize,
    ) -> Result<Vec<Triple>, ServiceError> {
        let params = NeighborhoodParams {
            seeds,
            // empty means every type
            edge_types: edge_filter
                .map(|filter| filter.iter().map(EdgeType::as_str).collect())
                .unwrap_or_default(),
            max_hops,
        };

        let response: NeighborhoodResponse = match self.client.execute_query("getNeighborhood", &params).await {
            Ok(r) => r,
            Err(HelixClientError::Query(msg)) if msg.contains("not found") => {
                debug!("No neighborhood for seeds {:?}", seeds);
                NeighborhoodResponse::default()
            }
            Err(e) => return Err(e.into()),
        };

        let triples: Vec<Triple> = response
            .triples
            .into_iter()
            .filter_map(WireTriple::into_triple)
            .collect();
        debug!("getNeighborhood returned {} triples", triples.len());
        Ok(triples)
    }

    async fn health_check(&self) -> Result<(), ServiceError> {
        self.client.health_check().await.map_err(ServiceError::from)
    }
}


#[derive(Debug, Deserialize)]
struct WireChunk {
    chunk_id: String,
    document_id: String,
    #[serde(alias = "content")]
    text: String,
    #[serde(default)]
    score: Option<f64>,
    #[serde(default)]
    distance: Option<f64>,
    #[serde(default)]
    span_start: Option<usize>,
    #[serde(default)]
    span_end: Option<usize>,
    #[serde(default)]
    mentions: Vec<String>,
}

impl WireChunk {
    fn into_hit(self) -> VectorHit {
        // cosine distance lies in [0, 2]
        let score = self
            .score
            .or_else(|| self.distance.map(|d| 1.0 - d / 2.0))
            .unwrap_or(0.0)
            .clamp(0.0, 1.0);
        let span = match (self.span_start, self.span_end) {
            (Some(start), Some(end)) if start < end => Some(TextSpan::new(start, end)),
            _ => None,
        };
        VectorHit {
            chunk_id: self.chunk_id,
            document_id: self.document_id,
            text: self.text,
            score,
            span,
            mentions: self.mentions,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
struct ChunkSearchResponse {
    #[serde(default)]
    chunks: Vec<WireChunk>,
}


pub struct HelixVectorIndex {
    client: Arc<HelixClient>,
    embedder: Arc<dyn Embedder>,
}

impl HelixVectorIndex {
    pub fn new(client: Arc<HelixClient>, embedder: Arc<dyn Embedder>) -> Self {
        Self { client, embedder }
    }
}

#[async_trait]
impl VectorIndex for HelixVectorIndex {
    async fn query(&self, text: &str, top_k: usize) -> Result<Vec<VectorHit>, ServiceError> {
        let query_vector = self.embedder.embed(text).await?;

        let params = serde_json::json!({
            "query_vector": query_vector,
            "limit": top_k,
        });

        let response: ChunkSearchResponse = self.client.execute_query("searchChunks", &params).await?;
        Ok(response.chunks.into_iter().map(WireChunk::into_hit).collect())
    }
}


#[derive(Debug, Deserialize, Default)]
struct NameLookupResponse {
    #[serde(default)]
    entities: Vec<WireEntity>,
}


pub struct HelixNameIndex {
    client: Arc<HelixClient>,
}

impl HelixNameIndex {
    pub fn new(client: Arc<HelixClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl NameIndex for HelixNameIndex {
    async fn lookup(&self, normalized: &str) -> Result<Vec<EntityRef>, ServiceError> {
        let params = serde_json::json!({ "name": normalized });

        let response: NameLookupResponse = match self.client.execute_query("lookupEntityName", &params).await {
            Ok(r) => r,
            Err(HelixClientError::Query(msg)) if msg.contains("not found") || msg.contains("No value") => {
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };

        Ok(response
            .entities
            .into_iter()
            .filter_map(WireEntity::into_entity)
            .map(|entity| entity.to_ref())
            .collect())
    }
}
