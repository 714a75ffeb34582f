#![allow(dead_code)]

pub mod core;
pub mod db;
pub mod llm;
pub mod retrieval;
pub mod utils;

pub use utils::{safe_truncate, safe_truncate_ellipsis};


pub use crate::core::config::AtlasConfig;
pub use crate::core::error::{AtlasError, Result};
pub use crate::core::models::{Edge, EdgeType, Entity, EntityRef, EntityType, Path, VectorHit};
pub use crate::core::outcome::{BranchOutcome, Condition};
pub use crate::core::search_modes::RetrievalMode;
pub use db::{GraphService, HelixClient, HelixClientError, NameIndex, ServiceError, VectorIndex};
pub use llm::{Embedder, MentionExtractor};
pub use retrieval::{ContextStatus, EvidenceItem, HybridRetriever, RetrievalConfig, RetrievalContext};


pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";


pub const DEFAULT_EMBEDDING_MODEL: &str = "nomic-embed-text";


pub const DEFAULT_LLM_MODEL: &str = "llama3.1:8b";


pub const DEFAULT_HELIX_PORT: u16 = 6969;


pub const DEFAULT_CACHE_SIZE: usize = 1000;


pub const DEFAULT_CACHE_TTL: u64 = 300;
