

pub mod client;
pub mod helix;
pub mod memory;

use std::collections::BTreeSet;

use async_trait::async_trait;
use thiserror::Error;

use crate::core::models::{EdgeType, EntityRef, Triple, VectorHit};
use crate::llm::EmbeddingError;

pub use client::{HelixClient, HelixClientError};
pub use helix::{HelixGraphService, HelixNameIndex, HelixVectorIndex};
pub use memory::{DocumentChunk, InMemoryGraph, InMemoryVectorIndex};


#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Service unreachable: {0}")]
    Unreachable(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Embedding failed: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl From<HelixClientError> for ServiceError {
    fn from(err: HelixClientError) -> Self {
        if err.is_unreachable() {
            Self::Unreachable(err.to_string())
        } else {
            Self::Query(err.to_string())
        }
    }
}


/// Knowledge graph access. Returns raw triples; path expansion happens locally.
#[async_trait]
pub trait GraphService: Send + Sync {
    /// Triples reachable from `seeds` within `max_hops`, ignoring edge direction.
    async fn neighborhood(
        &self,
        seeds: &[String],
        edge_filter: Option<&BTreeSet<EdgeType>>,
        max_hops: usize,
    ) -> Result<Vec<Triple>, ServiceError>;

    async fn health_check(&self) -> Result<(), ServiceError>;
}


#[async_trait]
pub trait VectorIndex: Send + Sync {
    async fn query(&self, text: &str, top_k: usize) -> Result<Vec<VectorHit>, ServiceError>;
}


#[async_trait]
pub trait NameIndex: Send + Sync {
    /// Entities whose name or alias normalizes to `normalized`.
    async fn lookup(&self, normalized: &str) -> Result<Vec<EntityRef>, ServiceError>;
}
