

pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod outcome;
pub mod search_modes;

pub use cache::{CacheStats, TtlCache};
pub use config::{AtlasConfig, HelixSettings, OllamaSettings};
pub use error::{AtlasError, Result};
pub use search_modes::RetrievalMode;


pub use models::{
    Direction, Edge, EdgeType, Entity, EntityRef, EntityType,
    Hop, Path, Scalar, TextSpan, Triple, VectorHit,
};


pub use outcome::{BranchOutcome, Condition};
