

pub mod embeddings;
pub mod extractor;

pub use embeddings::{Embedder, EmbeddingError, HashingEmbedder, OllamaEmbedder};
pub use extractor::{parse_mentions, ExtractionError, MentionExtractor, OllamaMentionExtractor};
