

use std::path::Path;

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use url::Url;

use super::error::{AtlasError, Result};
use super::search_modes::RetrievalMode;
use crate::retrieval::config::RetrievalConfig;


#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HelixSettings {
    pub host: String,
    pub port: u16,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

impl Default for HelixSettings {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: crate::DEFAULT_HELIX_PORT,
            timeout_secs: 30,
            max_retries: 3,
        }
    }
}

impl HelixSettings {
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}


#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OllamaSettings {
    pub base_url: String,
    pub model: String,
    pub embedding_model: String,
    pub temperature: f64,
    pub timeout_secs: u64,
}

impl Default for OllamaSettings {
    fn default() -> Self {
        Self {
            base_url: crate::DEFAULT_OLLAMA_URL.to_string(),
            model: crate::DEFAULT_LLM_MODEL.to_string(),
            embedding_model: crate::DEFAULT_EMBEDDING_MODEL.to_string(),
            temperature: 0.0,
            timeout_secs: 60,
        }
    }
}


#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AtlasConfig {
    pub log_level: String,
    pub debug: bool,
    pub helix: HelixSettings,
    pub ollama: OllamaSettings,
    pub retrieval: RetrievalConfig,
}

impl Default for AtlasConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            debug: false,
            helix: HelixSettings::default(),
            ollama: OllamaSettings::default(),
            retrieval: RetrievalConfig::default(),
        }
    }
}

impl AtlasConfig {
    /// Layers built-in defaults, an optional TOML file and `ATLAS__*` variables.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::layered(Self::default(), path)
    }

    /// Like `load`, with `mode`'s retrieval preset as the base layer, so file
    /// and environment settings still override individual preset values.
    pub fn load_with_mode(path: Option<&Path>, mode: RetrievalMode) -> Result<Self> {
        let base = Self {
            retrieval: mode.config(),
            ..Self::default()
        };
        Self::layered(base, path)
    }

    fn layered(base: Self, path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&base)?);

        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(false));
        }

        let config: Self = builder
            .add_source(
                Environment::with_prefix("ATLAS")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    pub fn from_env() -> Result<Self> {
        Self::load(None)
    }

    pub fn validate(&self) -> Result<()> {
        let ollama = Url::parse(&self.ollama.base_url).map_err(|e| {
            AtlasError::Config(format!("invalid ollama.base_url '{}': {}", self.ollama.base_url, e))
        })?;
        if !matches!(ollama.scheme(), "http" | "https") {
            return Err(AtlasError::Config(format!(
                "ollama.base_url must be http(s), got '{}'",
                ollama.scheme()
            )));
        }

        Url::parse(&self.helix.base_url()).map_err(|e| {
            AtlasError::Config(format!("invalid helix host '{}': {}", self.helix.host, e))
        })?;

        if self.helix.port == 0 {
            return Err(AtlasError::Config("helix.port must be non-zero".into()));
        }

        self.retrieval.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = AtlasConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.helix.base_url(), "http://localhost:6969");
        assert_eq!(config.retrieval.traversal.max_hops, 3);
    }

    #[test]
    fn test_bad_ollama_url_rejected() {
        let mut config = AtlasConfig::default();
        config.ollama.base_url = "not a url".into();
        assert!(matches!(config.validate(), Err(AtlasError::Config(_))));

        config.ollama.base_url = "ftp://models.local".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_toml_file() {
        let path = std::env::temp_dir().join(format!("atlas-config-{}.toml", uuid::Uuid::new_v4()));
        {
            let mut file = std::fs::File::create(&path).unwrap();
            writeln!(
                file,
                r#"
log_level = "debug"

[helix]
port = 7000

[retrieval.traversal]
max_hops = 2
fan_out_cap = 4

[retrieval.fusion]
alpha = 0.75
"#
            )
            .unwrap();
        }

        let config = AtlasConfig::load(Some(&path)).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(config.log_level, "debug");
        assert_eq!(config.helix.port, 7000);
        assert_eq!(config.retrieval.traversal.max_hops, 2);
        assert_eq!(config.retrieval.traversal.fan_out_cap, 4);
        assert!((config.retrieval.fusion.alpha - 0.75).abs() < f64::EPSILON);
        assert_eq!(config.retrieval.vector.top_k, 5);
    }

    #[test]
    fn test_mode_preset_sits_under_file_overrides() {
        let path = std::env::temp_dir().join(format!("atlas-config-{}.toml", uuid::Uuid::new_v4()));
        std::fs::write(&path, "[retrieval.traversal]\nmax_hops = 2\n").unwrap();

        let config = AtlasConfig::load_with_mode(Some(&path), RetrievalMode::Deep).unwrap();
        std::fs::remove_file(&path).ok();

        let deep = RetrievalMode::Deep.config();
        assert_eq!(config.retrieval.traversal.max_hops, 2);
        assert_eq!(config.retrieval.traversal.fan_out_cap, deep.traversal.fan_out_cap);
        assert_eq!(config.retrieval.vector.top_k, deep.vector.top_k);
        assert_eq!(config.retrieval.assembly.budget, deep.assembly.budget);
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let path = std::env::temp_dir().join("atlas-config-does-not-exist.toml");
        let config = AtlasConfig::load(Some(&path)).unwrap();
        assert_eq!(config.helix.port, crate::DEFAULT_HELIX_PORT);
    }
}
