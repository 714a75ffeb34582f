

pub mod config;
pub mod context;
pub mod fusion;
pub mod pipeline;
pub mod recognizer;
pub mod scoring;
pub mod traversal;
pub mod vector;

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;

pub use config::{
    AssemblyConfig, BudgetUnit, EdgePolicy, FusionConfig, RecognizerConfig, RetrievalConfig,
    TimeoutConfig, TraversalConfig, TraversalDirection, VectorConfig,
};
pub use context::{ContextAssembler, ContextItem, ContextStatus, Manifest, RetrievalContext};
pub use fusion::{EvidenceFusion, EvidenceItem, EvidenceSource, MergedProvenance, Provenance};
pub use pipeline::HybridRetriever;
pub use recognizer::EntityRecognizer;
pub use traversal::{expand_paths, GraphTraversalEngine};
pub use vector::VectorSearch;


/// Runs `fut` under its own budget, cut short by `deadline` when that comes first.
/// `None` means the time ran out.
pub(crate) async fn bounded<F: Future>(fut: F, budget: Duration, deadline: Option<Instant>) -> Option<F::Output> {
    tokio::time::timeout_at(cutoff(budget, deadline), fut).await.ok()
}

/// The earlier of `now + budget` and `deadline`.
pub(crate) fn cutoff(budget: Duration, deadline: Option<Instant>) -> Instant {
    let own = Instant::now() + budget;
    deadline.map_or(own, |d| d.min(own))
}
