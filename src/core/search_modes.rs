use serde::{Deserialize, Serialize};

use crate::retrieval::config::{RetrievalConfig, TraversalConfig};


#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum RetrievalMode {
    /// Short, risk-propagation paths and a small context.
    Focused,
    #[default]
    Balanced,
    /// Wide neighbourhood, more evidence, larger context.
    Deep,
}

impl RetrievalMode {
    #[must_use]
    pub fn config(&self) -> RetrievalConfig {
        let mut config = RetrievalConfig::default();
        match self {
            Self::Focused => {
                config.traversal.max_hops = 2;
                config.traversal.fan_out_cap = 4;
                config.traversal.edge_whitelist = Some(TraversalConfig::risk_propagation_whitelist());
                config.vector.top_k = 3;
                config.fusion.alpha = 0.7;
                config.fusion.max_evidence = 10;
                config.assembly.budget = 2000;
            }
            Self::Balanced => {}
            Self::Deep => {
                config.traversal.max_hops = 4;
                config.traversal.fan_out_cap = 12;
                config.traversal.max_paths_per_seed = 512;
                config.vector.top_k = 10;
                config.vector.include_entity_context = true;
                config.fusion.alpha = 0.5;
                config.fusion.max_evidence = 40;
                config.assembly.budget = 8000;
                config.timeouts.graph_ms = 10_000;
            }
        }
        config
    }

    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::Focused => "2 hops over risk-propagation edges, top 3 documents",
            Self::Balanced => "3 hops over all edges, top 5 documents",
            Self::Deep => "4 hops with wide fan-out, top 10 entity-aware documents",
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "focused" => Self::Focused,
            "balanced" => Self::Balanced,
            "deep" => Self::Deep,
            _ => Self::Balanced,
        }
    }
}

impl From<&str> for RetrievalMode {
    fn from(s: &str) -> Self {
        Self::parse(s)
    }
}

impl From<String> for RetrievalMode {
    fn from(s: String) -> Self {
        Self::parse(&s)
    }
}
