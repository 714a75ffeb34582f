

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::error::{AtlasError, Result};
use crate::core::models::{Edge, EdgeType, Entity};


#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TraversalDirection {
    Outgoing,
    Incoming,
    #[default]
    Both,
}

impl TraversalDirection {
    pub fn allows_outgoing(&self) -> bool {
        matches!(self, Self::Outgoing | Self::Both)
    }

    pub fn allows_incoming(&self) -> bool {
        matches!(self, Self::Incoming | Self::Both)
    }
}


#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BudgetUnit {
    #[default]
    Chars,
    Tokens,
}

impl BudgetUnit {
    pub fn measure(&self, text: &str) -> usize {
        let chars = text.chars().count();
        match self {
            Self::Chars => chars,
            Self::Tokens => chars.div_ceil(4),
        }
    }
}


/// Static edge ranking used both for fan-out selection and for hop weights.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EdgePolicy {
    pub priorities: Vec<EdgeType>,
    pub weights: BTreeMap<EdgeType, f64>,
    pub default_weight: f64,
    pub risk_event_weight: f64,
    pub prioritize_risk_events: bool,
}

impl Default for EdgePolicy {
    fn default() -> Self {
        let weights = [
            (EdgeType::Affects, 1.0),
            (EdgeType::DependsOn, 0.9),
            (EdgeType::Manufactures, 0.9),
            (EdgeType::Supplies, 0.85),
            (EdgeType::StoredIn, 0.8),
            (EdgeType::ShipsVia, 0.8),
            (EdgeType::OperatesAt, 0.6),
            (EdgeType::LocatedIn, 0.4),
        ];

        Self {
            priorities: weights.iter().map(|(edge_type, _)| edge_type.clone()).collect(),
            weights: weights.into_iter().collect(),
            default_weight: 0.2,
            risk_event_weight: 1.0,
            prioritize_risk_events: true,
        }
    }
}

impl EdgePolicy {
    /// Position in the priority list; unlisted types rank after every listed one.
    pub fn rank(&self, edge_type: &EdgeType) -> usize {
        self.priorities
            .iter()
            .position(|candidate| candidate == edge_type)
            .unwrap_or(self.priorities.len())
    }

    pub fn base_weight(&self, edge_type: &EdgeType) -> f64 {
        self.weights
            .get(edge_type)
            .copied()
            .unwrap_or(self.default_weight)
    }

    /// Weight of one edge. Edges emitted by a RiskEvent never weigh less than `risk_event_weight`.
    pub fn weight(&self, edge: &Edge, source: &Entity) -> f64 {
        let base = self.base_weight(&edge.edge_type);
        if source.is_risk_event() {
            base.max(self.risk_event_weight)
        } else {
            base
        }
    }
}


#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecognizerConfig {
    pub max_ngram: usize,
    pub cache_size: usize,
    pub cache_ttl_secs: u64,
    pub use_extractor: bool,
}

impl Default for RecognizerConfig {
    fn default() -> Self {
        Self {
            max_ngram: 5,
            cache_size: crate::DEFAULT_CACHE_SIZE,
            cache_ttl_secs: crate::DEFAULT_CACHE_TTL,
            use_extractor: true,
        }
    }
}


#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TraversalConfig {
    pub max_hops: usize,
    pub fan_out_cap: usize,
    pub decay: f64,
    pub direction: TraversalDirection,
    pub edge_whitelist: Option<BTreeSet<EdgeType>>,
    pub max_paths_per_seed: usize,
    pub edge_policy: EdgePolicy,
}

impl Default for TraversalConfig {
    fn default() -> Self {
        Self {
            max_hops: 3,
            fan_out_cap: 8,
            decay: 0.7,
            direction: TraversalDirection::Both,
            edge_whitelist: None,
            max_paths_per_seed: 256,
            edge_policy: EdgePolicy::default(),
        }
    }
}

impl TraversalConfig {
    pub fn risk_propagation_whitelist() -> BTreeSet<EdgeType> {
        [
            EdgeType::Affects,
            EdgeType::DependsOn,
            EdgeType::Manufactures,
            EdgeType::StoredIn,
            EdgeType::ShipsVia,
        ]
        .into_iter()
        .collect()
    }
}


#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorConfig {
    pub top_k: usize,
    pub include_entity_context: bool,
}

impl Default for VectorConfig {
    fn default() -> Self {
        Self {
            top_k: 5,
            include_entity_context: false,
        }
    }
}


#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FusionConfig {
    pub alpha: f64,
    pub graph_weight: f64,
    pub vector_weight: f64,
    pub max_evidence: usize,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            alpha: 0.6,
            graph_weight: 0.8,
            vector_weight: 0.7,
            max_evidence: 20,
        }
    }
}


#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssemblyConfig {
    pub budget: usize,
    pub unit: BudgetUnit,
}

impl Default for AssemblyConfig {
    fn default() -> Self {
        Self {
            budget: 4000,
            unit: BudgetUnit::Chars,
        }
    }
}


#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    pub lookup_ms: u64,
    pub graph_ms: u64,
    pub vector_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            lookup_ms: 2_000,
            graph_ms: 5_000,
            vector_ms: 5_000,
        }
    }
}

impl TimeoutConfig {
    pub fn lookup(&self) -> Duration {
        Duration::from_millis(self.lookup_ms)
    }

    pub fn graph(&self) -> Duration {
        Duration::from_millis(self.graph_ms)
    }

    pub fn vector(&self) -> Duration {
        Duration::from_millis(self.vector_ms)
    }
}


#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct RetrievalConfig {
    pub recognizer: RecognizerConfig,
    pub traversal: TraversalConfig,
    pub vector: VectorConfig,
    pub fusion: FusionConfig,
    pub assembly: AssemblyConfig,
    pub timeouts: TimeoutConfig,
}

impl RetrievalConfig {
    pub fn validate(&self) -> Result<()> {
        let fusion = &self.fusion;
        if !(0.0..=1.0).contains(&fusion.alpha) {
            return Err(AtlasError::Validation(format!(
                "fusion.alpha must be within [0, 1], got {}",
                fusion.alpha
            )));
        }
        for (name, weight) in [("graph_weight", fusion.graph_weight), ("vector_weight", fusion.vector_weight)] {
            if !(0.0..=1.0).contains(&weight) {
                return Err(AtlasError::Validation(format!(
                    "fusion.{} must be within [0, 1], got {}",
                    name, weight
                )));
            }
        }
        if fusion.max_evidence == 0 {
            return Err(AtlasError::Validation("fusion.max_evidence must be positive".into()));
        }

        let traversal = &self.traversal;
        if !(traversal.decay > 0.0 && traversal.decay <= 1.0) {
            return Err(AtlasError::Validation(format!(
                "traversal.decay must be within (0, 1], got {}",
                traversal.decay
            )));
        }
        if traversal.fan_out_cap == 0 || traversal.max_paths_per_seed == 0 {
            return Err(AtlasError::Validation(
                "traversal.fan_out_cap and traversal.max_paths_per_seed must be positive".into(),
            ));
        }
        let policy = &traversal.edge_policy;
        let weights_in_range = policy
            .weights
            .values()
            .chain([&policy.default_weight, &policy.risk_event_weight])
            .all(|w| (0.0..=1.0).contains(w));
        if !weights_in_range {
            return Err(AtlasError::Validation("edge weights must be within [0, 1]".into()));
        }

        if self.recognizer.max_ngram == 0 {
            return Err(AtlasError::Validation("recognizer.max_ngram must be positive".into()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::EntityType;

    #[test]
    fn test_defaults_validate() {
        assert!(RetrievalConfig::default().validate().is_ok());
    }

    #[test]
    fn test_invalid_alpha_rejected() {
        let mut config = RetrievalConfig::default();
        config.fusion.alpha = 1.5;
        assert!(matches!(config.validate(), Err(AtlasError::Validation(_))));
    }

    #[test]
    fn test_invalid_decay_rejected() {
        let mut config = RetrievalConfig::default();
        config.traversal.decay = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_policy_rank_and_weight() {
        let policy = EdgePolicy::default();
        assert_eq!(policy.rank(&EdgeType::Affects), 0);
        assert!(policy.rank(&EdgeType::DependsOn) < policy.rank(&EdgeType::OperatesAt));
        assert_eq!(policy.rank(&EdgeType::from("PARTNERS_WITH")), policy.priorities.len());

        let company = Entity::new("TechFlow Inc.", EntityType::Company);
        let strike = Entity::new("Singapore Port Strike", EntityType::RiskEvent);
        let edge = Edge::new("x", EdgeType::LocatedIn, "y");
        assert!((policy.weight(&edge, &company) - 0.4).abs() < 1e-9);
        assert!((policy.weight(&edge, &strike) - 1.0).abs() < 1e-9);
        let custom = Edge::new("x", EdgeType::from("REPORTS_ON"), "y");
        assert!((policy.weight(&custom, &company) - 0.2).abs() < 1e-9);
    }

    #[test]
    fn test_budget_unit_measure() {
        assert_eq!(BudgetUnit::Chars.measure("abcdef"), 6);
        assert_eq!(BudgetUnit::Tokens.measure("abcdef"), 2);
        assert_eq!(BudgetUnit::Tokens.measure(""), 0);
    }

    #[test]
    fn test_partial_config_deserializes_with_defaults() {
        let config: RetrievalConfig = serde_json::from_value(serde_json::json!({
            "traversal": { "max_hops": 2, "edge_whitelist": ["affects", "DEPENDS_ON"] },
            "fusion": { "alpha": 0.5 }
        }))
        .unwrap();

        assert_eq!(config.traversal.max_hops, 2);
        assert_eq!(config.traversal.fan_out_cap, 8);
        let whitelist = config.traversal.edge_whitelist.unwrap();
        assert!(whitelist.contains(&EdgeType::Affects));
        assert!(whitelist.contains(&EdgeType::DependsOn));
        assert!((config.fusion.alpha - 0.5).abs() < f64::EPSILON);
        assert_eq!(config.vector.top_k, 5);
    }
}
