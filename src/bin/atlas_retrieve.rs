use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use atlas::core::AtlasConfig;
use atlas::db::{HelixClient, HelixGraphService, HelixNameIndex, HelixVectorIndex};
use atlas::llm::{OllamaEmbedder, OllamaMentionExtractor};
use atlas::{HybridRetriever, RetrievalMode};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let mut mode = None;
    let mut words = Vec::new();
    for arg in std::env::args().skip(1) {
        match arg.strip_prefix("--mode=") {
            Some(name) => mode = Some(RetrievalMode::parse(name)),
            None => words.push(arg),
        }
    }

    // The preset is the base layer; file and ATLAS__ overrides still apply on top.
    let config_path = std::env::var_os("ATLAS_CONFIG").map(PathBuf::from);
    let config = match mode {
        Some(mode) => AtlasConfig::load_with_mode(config_path.as_deref(), mode)?,
        None => AtlasConfig::load(config_path.as_deref())?,
    };

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(format!("warn,atlas={}", config.log_level)))?;
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    if let Some(mode) = mode {
        info!("Using {:?} retrieval: {}", mode, mode.description());
    }
    let query = words.join(" ");
    if query.trim().is_empty() {
        anyhow::bail!("usage: atlas-retrieve [--mode=focused|balanced|deep] <question>");
    }

    let ollama = &config.ollama;
    let recognizer = &config.retrieval.recognizer;
    let embedder = Arc::new(OllamaEmbedder::new(
        &ollama.base_url,
        &ollama.embedding_model,
        Duration::from_secs(ollama.timeout_secs),
        recognizer.cache_size,
        recognizer.cache_ttl_secs,
    )?);

    let client = Arc::new(HelixClient::new(&config.helix));
    let mut retriever = HybridRetriever::new(
        Arc::new(HelixGraphService::new(client.clone())),
        Arc::new(HelixVectorIndex::new(client.clone(), embedder)),
        Arc::new(HelixNameIndex::new(client)),
        config.retrieval.clone(),
    )?;

    if recognizer.use_extractor {
        let extractor = OllamaMentionExtractor::new(
            &ollama.base_url,
            &ollama.model,
            ollama.temperature,
            Duration::from_secs(ollama.timeout_secs),
        )?;
        retriever = retriever.with_extractor(Arc::new(extractor));
    }

    let context = retriever.retrieve_with_fallback(&query).await?;
    println!("{}", serde_json::to_string_pretty(&context)?);
    Ok(())
}
