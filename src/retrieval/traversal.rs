use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::bounded;
use super::config::TraversalConfig;
use super::scoring::hop_score;
use crate::core::models::{Direction, Edge, EdgeType, Entity, Hop, Path, Triple};
use crate::core::outcome::{BranchOutcome, Condition};
use crate::db::GraphService;


struct Adjacent<'a> {
    order: usize,
    edge: &'a Edge,
    from: &'a Entity,
    to: &'a Entity,
    direction: Direction,
    weight: f64,
    touches_risk: bool,
}

struct Partial<'a> {
    steps: Vec<&'a Adjacent<'a>>,
    score: f64,
}

impl Partial<'_> {
    fn current<'b>(&'b self, seed: &'b str) -> &'b str {
        self.steps.last().map_or(seed, |step| step.to.name.as_str())
    }

    fn visits(&self, seed: &str, name: &str) -> bool {
        seed == name || self.steps.iter().any(|step| step.to.name == name)
    }
}


fn build_adjacency<'a>(
    triples: &'a [Triple],
    whitelist: Option<&BTreeSet<EdgeType>>,
    config: &TraversalConfig,
) -> BTreeMap<&'a str, Vec<Adjacent<'a>>> {
    let policy = &config.edge_policy;
    let mut adjacency: BTreeMap<&str, Vec<Adjacent<'a>>> = BTreeMap::new();

    for (order, triple) in triples.iter().enumerate() {
        if whitelist.is_some_and(|allowed| !allowed.contains(&triple.edge.edge_type)) {
            continue;
        }
        if triple.source.name == triple.target.name {
            continue;
        }

        let weight = policy.weight(&triple.edge, &triple.source);
        let touches_risk = triple.source.is_risk_event() || triple.target.is_risk_event();

        if config.direction.allows_outgoing() {
            adjacency.entry(triple.source.name.as_str()).or_default().push(Adjacent {
                order,
                edge: &triple.edge,
                from: &triple.source,
                to: &triple.target,
                direction: Direction::Outgoing,
                weight,
                touches_risk,
            });
        }
        if config.direction.allows_incoming() {
            adjacency.entry(triple.target.name.as_str()).or_default().push(Adjacent {
                order,
                edge: &triple.edge,
                from: &triple.target,
                to: &triple.source,
                direction: Direction::Incoming,
                weight,
                touches_risk,
            });
        }
    }

    for candidates in adjacency.values_mut() {
        candidates.sort_by(|a, b| {
            let risk = if policy.prioritize_risk_events {
                b.touches_risk.cmp(&a.touches_risk)
            } else {
                Ordering::Equal
            };
            risk.then_with(|| policy.rank(&a.edge.edge_type).cmp(&policy.rank(&b.edge.edge_type)))
                .then_with(|| b.weight.total_cmp(&a.weight))
                .then_with(|| a.order.cmp(&b.order))
        });
    }

    adjacency
}


/// Expands scored, acyclic paths from each seed over already-fetched triples.
///
/// Breadth-first with an explicit frontier. Each node expansion keeps at most
/// `fan_out_cap` candidate edges in priority order; an edge leading back into the
/// path is discarded. Every partial walk of length 1..=`max_hops` is returned,
/// numbered in discovery order across all seeds.
pub fn expand_paths(
    triples: &[Triple],
    seeds: &[String],
    max_hops: usize,
    whitelist: Option<&BTreeSet<EdgeType>>,
    config: &TraversalConfig,
) -> Vec<Path> {
    let adjacency = build_adjacency(triples, whitelist, config);
    let mut paths = Vec::new();

    for seed in seeds {
        if max_hops == 0 || !adjacency.contains_key(seed.as_str()) {
            continue;
        }

        let mut produced = 0usize;
        let mut frontier = VecDeque::from([Partial {
            steps: Vec::new(),
            score: 1.0,
        }]);

        'seed: while let Some(partial) = frontier.pop_front() {
            let node = partial.current(seed);
            let Some(candidates) = adjacency.get(node) else {
                continue;
            };

            let expansions = candidates
                .iter()
                .filter(|candidate| !partial.visits(seed, &candidate.to.name))
                .take(config.fan_out_cap);

            for candidate in expansions {
                let mut steps = partial.steps.clone();
                steps.push(candidate);
                let score = partial.score * hop_score(config.decay, candidate.weight);

                paths.push(Path {
                    seed: seed.clone(),
                    hops: steps
                        .iter()
                        .map(|step| Hop {
                            from: step.from.clone(),
                            edge: step.edge.clone(),
                            to: step.to.clone(),
                            direction: step.direction,
                        })
                        .collect(),
                    score,
                    discovery: paths.len(),
                });

                produced += 1;
                if produced >= config.max_paths_per_seed {
                    debug!("Seed {} reached the path limit ({})", seed, config.max_paths_per_seed);
                    break 'seed;
                }

                if steps.len() < max_hops {
                    frontier.push_back(Partial { steps, score });
                }
            }
        }
    }

    paths
}


pub struct GraphTraversalEngine {
    graph: Arc<dyn GraphService>,
    config: TraversalConfig,
    timeout: Duration,
}

impl GraphTraversalEngine {
    pub fn new(graph: Arc<dyn GraphService>, config: TraversalConfig, timeout: Duration) -> Self {
        Self { graph, config, timeout }
    }

    pub fn config(&self) -> &TraversalConfig {
        &self.config
    }

    pub async fn traverse(
        &self,
        seeds: &[String],
        max_hops: usize,
        whitelist: Option<&BTreeSet<EdgeType>>,
    ) -> BranchOutcome<Vec<Path>> {
        self.traverse_until(seeds, max_hops, whitelist, None).await
    }

    pub async fn traverse_until(
        &self,
        seeds: &[String],
        max_hops: usize,
        whitelist: Option<&BTreeSet<EdgeType>>,
        deadline: Option<Instant>,
    ) -> BranchOutcome<Vec<Path>> {
        if seeds.is_empty() || max_hops == 0 {
            return BranchOutcome::Complete(Vec::new());
        }

        let fetch = self.graph.neighborhood(seeds, whitelist, max_hops);
        let triples = match bounded(fetch, self.timeout, deadline).await {
            Some(Ok(triples)) => triples,
            Some(Err(e)) => {
                warn!("Graph service failed: {}", e);
                return BranchOutcome::unavailable(Condition::GraphUnavailable, false, e.to_string());
            }
            None => {
                warn!("Graph service timed out after {:?}", self.timeout);
                return BranchOutcome::unavailable(Condition::GraphUnavailable, true, "graph query timed out");
            }
        };

        let paths = expand_paths(&triples, seeds, max_hops, whitelist, &self.config);
        info!(
            "Traversal: {} seeds, {} triples -> {} paths (max_hops={})",
            seeds.len(),
            triples.len(),
            paths.len(),
            max_hops
        );
        BranchOutcome::Complete(paths)
    }

    pub async fn health_check(&self) -> bool {
        match self.graph.health_check().await {
            Ok(()) => true,
            Err(e) => {
                warn!("Graph health check failed: {}", e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use proptest::prelude::*;

    use crate::core::models::EntityType;
    use crate::db::{InMemoryGraph, ServiceError};
    use crate::retrieval::config::TraversalDirection;

    const STRIKE: &str = "Singapore Port Strike";
    const TECHFLOW: &str = "TechFlow Inc.";

    fn supply_graph() -> InMemoryGraph {
        InMemoryGraph::new()
            .with_entity(Entity::new(STRIKE, EntityType::RiskEvent))
            .with_entity(Entity::new("Singapore", EntityType::Location))
            .with_entity(Entity::new(TECHFLOW, EntityType::Company))
            .with_entity(Entity::new("FlowChips", EntityType::Product))
            .with_entity(Entity::new("GlobalTech", EntityType::Company))
            .with_entity(Entity::new("Straits Daily", EntityType::Company))
            .with_edge(Edge::new(STRIKE, EdgeType::Affects, "Singapore"))
            .and_then(|g| g.with_edge(Edge::new(TECHFLOW, EdgeType::OperatesAt, "Singapore")))
            .and_then(|g| g.with_edge(Edge::new(TECHFLOW, EdgeType::Manufactures, "FlowChips")))
            .and_then(|g| g.with_edge(Edge::new("GlobalTech", EdgeType::DependsOn, "FlowChips")))
            .and_then(|g| g.with_edge(Edge::new("Straits Daily", EdgeType::from("REPORTS_ON"), STRIKE)))
            .unwrap()
    }

    fn engine(graph: InMemoryGraph) -> GraphTraversalEngine {
        GraphTraversalEngine::new(Arc::new(graph), TraversalConfig::default(), Duration::from_secs(1))
    }

    fn scenario_whitelist() -> BTreeSet<EdgeType> {
        let mut whitelist = TraversalConfig::risk_propagation_whitelist();
        whitelist.insert(EdgeType::OperatesAt);
        whitelist
    }

    struct DownGraph;

    #[async_trait]
    impl GraphService for DownGraph {
        async fn neighborhood(
            &self,
            _seeds: &[String],
            _edge_filter: Option<&BTreeSet<EdgeType>>,
            _max_hops: usize,
        ) -> Result<Vec<Triple>, ServiceError> {
            Err(ServiceError::Unreachable("connection refused".into()))
        }

        async fn health_check(&self) -> Result<(), ServiceError> {
            Err(ServiceError::Unreachable("connection refused".into()))
        }
    }

    struct StalledGraph;

    #[async_trait]
    impl GraphService for StalledGraph {
        async fn neighborhood(
            &self,
            _seeds: &[String],
            _edge_filter: Option<&BTreeSet<EdgeType>>,
            _max_hops: usize,
        ) -> Result<Vec<Triple>, ServiceError> {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok(Vec::new())
        }

        async fn health_check(&self) -> Result<(), ServiceError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_techflow_seed_surfaces_strike_and_globaltech() {
        let whitelist = scenario_whitelist();
        let outcome = engine(supply_graph())
            .traverse(&[TECHFLOW.to_string()], 3, Some(&whitelist))
            .await;
        let paths = outcome.value().unwrap();

        let to_strike = paths.iter().find(|p| p.terminal().is_some_and(|e| e.name == STRIKE)).unwrap();
        assert_eq!(to_strike.len(), 2);
        assert_eq!(to_strike.to_string(), "TechFlow Inc. -[OPERATES_AT]-> Singapore <-[AFFECTS]- Singapore Port Strike");

        let to_globaltech = paths
            .iter()
            .find(|p| p.terminal().is_some_and(|e| e.name == "GlobalTech"))
            .unwrap();
        assert_eq!(to_globaltech.len(), 2);
        assert!(paths.iter().all(|p| p.len() <= 3));
        assert!(paths.iter().all(|p| !p.contains("Straits Daily")));
    }

    #[tokio::test]
    async fn test_three_hop_risk_path_outscores_weak_single_hop() {
        let outcome = engine(supply_graph()).traverse(&[STRIKE.to_string()], 3, None).await;
        let paths = outcome.value().unwrap();

        let long = paths
            .iter()
            .find(|p| p.len() == 3 && p.terminal().is_some_and(|e| e.name == "FlowChips"))
            .unwrap();
        let weak = paths
            .iter()
            .find(|p| p.len() == 1 && p.terminal().is_some_and(|e| e.name == "Straits Daily"))
            .unwrap();

        assert!((long.score - 0.7 * 0.42 * 0.63).abs() < 1e-9);
        assert!((weak.score - 0.14).abs() < 1e-9);
        assert!(long.score > weak.score);
    }

    #[tokio::test]
    async fn test_fan_out_cap_keeps_priority_edges() {
        let mut graph = InMemoryGraph::new().with_entity(Entity::new("Hub", EntityType::LogisticsNode));
        for (name, edge_type) in [
            ("L1", EdgeType::LocatedIn),
            ("O1", EdgeType::OperatesAt),
            ("D1", EdgeType::DependsOn),
            ("A1", EdgeType::Affects),
        ] {
            graph.add_entity(Entity::new(name, EntityType::Company));
            graph.add_edge(Edge::new(name, edge_type, "Hub")).unwrap();
        }
        graph.add_entity(Entity::new("Flood", EntityType::RiskEvent));
        graph.add_edge(Edge::new("Flood", EdgeType::LocatedIn, "Hub")).unwrap();

        let triples = graph.neighborhood(&["Hub".to_string()], None, 1).await.unwrap();
        let config = TraversalConfig {
            fan_out_cap: 2,
            ..Default::default()
        };
        let paths = expand_paths(&triples, &["Hub".to_string()], 1, None, &config);

        let reached: Vec<&str> = paths.iter().filter_map(|p| p.terminal()).map(|e| e.name.as_str()).collect();
        assert_eq!(reached, vec!["Flood", "A1"]);
    }

    #[tokio::test]
    async fn test_outgoing_only_direction() {
        let graph = supply_graph();
        let triples = graph.neighborhood(&[TECHFLOW.to_string()], None, 3).await.unwrap();
        let config = TraversalConfig {
            direction: TraversalDirection::Outgoing,
            ..Default::default()
        };
        let paths = expand_paths(&triples, &[TECHFLOW.to_string()], 3, None, &config);
        assert_eq!(paths.len(), 2);
        assert!(paths.iter().all(|p| p.hops.iter().all(|h| h.direction == Direction::Outgoing)));
    }

    #[tokio::test]
    async fn test_max_paths_per_seed() {
        let graph = supply_graph();
        let triples = graph.neighborhood(&[STRIKE.to_string()], None, 3).await.unwrap();
        let config = TraversalConfig {
            max_paths_per_seed: 2,
            ..Default::default()
        };
        let paths = expand_paths(&triples, &[STRIKE.to_string(), TECHFLOW.to_string()], 3, None, &config);
        assert_eq!(paths.iter().filter(|p| p.seed == STRIKE).count(), 2);
        assert_eq!(paths.iter().filter(|p| p.seed == TECHFLOW).count(), 2);
        assert!(paths.iter().enumerate().all(|(i, p)| p.discovery == i));
    }

    #[tokio::test]
    async fn test_unreachable_graph_is_unavailable() {
        let engine = GraphTraversalEngine::new(Arc::new(DownGraph), TraversalConfig::default(), Duration::from_secs(1));
        let outcome = engine.traverse(&[TECHFLOW.to_string()], 3, None).await;
        assert!(outcome.is_unavailable());
        assert_eq!(outcome.conditions(), &[Condition::GraphUnavailable]);
        assert!(!engine.health_check().await);
    }

    #[tokio::test]
    async fn test_stalled_graph_times_out() {
        let engine = GraphTraversalEngine::new(Arc::new(StalledGraph), TraversalConfig::default(), Duration::from_millis(20));
        let outcome = engine.traverse(&[TECHFLOW.to_string()], 3, None).await;
        assert_eq!(outcome.conditions(), &[Condition::GraphUnavailable, Condition::Timeout]);
    }

    #[tokio::test]
    async fn test_no_seeds_skips_service() {
        let engine = GraphTraversalEngine::new(Arc::new(DownGraph), TraversalConfig::default(), Duration::from_secs(1));
        assert!(engine.traverse(&[], 3, None).await.is_complete());
    }

    const EDGE_TYPES: [EdgeType; 4] = [EdgeType::Affects, EdgeType::DependsOn, EdgeType::OperatesAt, EdgeType::LocatedIn];

    fn random_triples(nodes: usize, edges: &[(usize, usize, usize)]) -> Vec<Triple> {
        let entity = |i: usize| {
            let entity_type = if i == 0 { EntityType::RiskEvent } else { EntityType::Company };
            Entity::new(format!("N{}", i), entity_type)
        };
        edges
            .iter()
            .map(|&(s, t, k)| {
                let (s, t) = (s % nodes, t % nodes);
                Triple {
                    source: entity(s),
                    edge: Edge::new(format!("N{}", s), EDGE_TYPES[k % EDGE_TYPES.len()].clone(), format!("N{}", t)),
                    target: entity(t),
                }
            })
            .collect()
    }

    proptest! {
        #[test]
        fn prop_paths_are_acyclic_and_bounded(
            nodes in 2usize..8,
            edges in proptest::collection::vec((0usize..8, 0usize..8, 0usize..4), 0..24),
            max_hops in 1usize..5,
            fan_out_cap in 1usize..6,
        ) {
            let triples = random_triples(nodes, &edges);
            let config = TraversalConfig { fan_out_cap, ..Default::default() };
            let seeds = vec!["N0".to_string(), "N1".to_string()];
            let paths = expand_paths(&triples, &seeds, max_hops, None, &config);

            for path in &paths {
                prop_assert!(!path.is_empty());
                prop_assert!(path.len() <= max_hops);

                let names = path.entity_names();
                let unique: BTreeSet<&str> = names.iter().copied().collect();
                prop_assert_eq!(unique.len(), names.len());

                prop_assert_eq!(path.hops[0].from.name.as_str(), path.seed.as_str());
                for pair in path.hops.windows(2) {
                    prop_assert_eq!(&pair[0].to.name, &pair[1].from.name);
                }
                prop_assert!(path.score > 0.0 && path.score <= 1.0);
            }

            let again = expand_paths(&triples, &seeds, max_hops, None, &config);
            prop_assert_eq!(paths, again);
        }
    }
}
