use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};


#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord,
    Serialize, Deserialize, Display, EnumString, EnumIter, AsRefStr,
)]
#[strum(ascii_case_insensitive)]
pub enum EntityType {
    Company,
    Product,
    Location,
    LogisticsNode,
    RiskEvent,
}


#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{}", b),
            Self::Int(i) => write!(f, "{}", i),
            Self::Float(x) => write!(f, "{}", x),
            Self::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<&str> for Scalar {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for Scalar {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<i64> for Scalar {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<f64> for Scalar {
    fn from(x: f64) -> Self {
        Self::Float(x)
    }
}

impl From<bool> for Scalar {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}


#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub name: String,
    pub entity_type: EntityType,
    #[serde(default)]
    pub attributes: BTreeMap<String, Scalar>,
    #[serde(default)]
    pub aliases: Vec<String>,
}

impl Entity {
    pub fn new(name: impl Into<String>, entity_type: EntityType) -> Self {
        Self {
            name: name.into(),
            entity_type,
            attributes: BTreeMap::new(),
            aliases: Vec::new(),
        }
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<Scalar>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn is_risk_event(&self) -> bool {
        self.entity_type == EntityType::RiskEvent
    }

    pub fn to_ref(&self) -> EntityRef {
        EntityRef {
            name: self.name.clone(),
            entity_type: self.entity_type,
        }
    }
}


#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityRef {
    pub name: String,
    pub entity_type: EntityType,
}

impl EntityRef {
    pub fn new(name: impl Into<String>, entity_type: EntityType) -> Self {
        Self {
            name: name.into(),
            entity_type,
        }
    }
}


#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EdgeType {
    Manufactures,
    DependsOn,
    Affects,
    StoredIn,
    ShipsVia,
    OperatesAt,
    Supplies,
    LocatedIn,

    Custom(String),
}

impl EdgeType {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Manufactures => "MANUFACTURES",
            Self::DependsOn => "DEPENDS_ON",
            Self::Affects => "AFFECTS",
            Self::StoredIn => "STORED_IN",
            Self::ShipsVia => "SHIPS_VIA",
            Self::OperatesAt => "OPERATES_AT",
            Self::Supplies => "SUPPLIES",
            Self::LocatedIn => "LOCATED_IN",
            Self::Custom(label) => label,
        }
    }
}

impl fmt::Display for EdgeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for EdgeType {
    fn from(s: &str) -> Self {
        let label = s.trim().to_uppercase().replace([' ', '-'], "_");
        match label.as_str() {
            "MANUFACTURES" => Self::Manufactures,
            "DEPENDS_ON" => Self::DependsOn,
            "AFFECTS" => Self::Affects,
            "STORED_IN" => Self::StoredIn,
            "SHIPS_VIA" => Self::ShipsVia,
            "OPERATES_AT" => Self::OperatesAt,
            "SUPPLIES" => Self::Supplies,
            "LOCATED_IN" => Self::LocatedIn,
            _ => Self::Custom(label),
        }
    }
}

impl From<String> for EdgeType {
    fn from(s: String) -> Self {
        Self::from(s.as_str())
    }
}

impl From<EdgeType> for String {
    fn from(edge_type: EdgeType) -> Self {
        edge_type.as_str().to_string()
    }
}


#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub source: String,
    pub target: String,
    pub edge_type: EdgeType,
    #[serde(default)]
    pub properties: BTreeMap<String, Scalar>,
}

impl Edge {
    pub fn new(source: impl Into<String>, edge_type: EdgeType, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            edge_type,
            properties: BTreeMap::new(),
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Scalar>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }
}


#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Triple {
    pub source: Entity,
    pub edge: Edge,
    pub target: Entity,
}


#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Outgoing,
    Incoming,
}


#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hop {
    pub from: Entity,
    pub edge: Edge,
    pub to: Entity,
    pub direction: Direction,
}


#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Path {
    pub seed: String,
    pub hops: Vec<Hop>,
    pub score: f64,
    pub discovery: usize,
}

impl Path {
    pub fn len(&self) -> usize {
        self.hops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hops.is_empty()
    }

    /// Entity names in walk order, seed first.
    pub fn entity_names(&self) -> Vec<&str> {
        let mut names = Vec::with_capacity(self.hops.len() + 1);
        names.push(self.seed.as_str());
        names.extend(self.hops.iter().map(|hop| hop.to.name.as_str()));
        names
    }

    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.hops
            .first()
            .map(|hop| &hop.from)
            .into_iter()
            .chain(self.hops.iter().map(|hop| &hop.to))
    }

    pub fn terminal(&self) -> Option<&Entity> {
        self.hops.last().map(|hop| &hop.to)
    }

    pub fn terminal_set(&self) -> BTreeSet<String> {
        let mut set = BTreeSet::new();
        set.insert(self.seed.clone());
        if let Some(last) = self.terminal() {
            set.insert(last.name.clone());
        }
        set
    }

    pub fn edge_types(&self) -> impl Iterator<Item = &EdgeType> {
        self.hops.iter().map(|hop| &hop.edge.edge_type)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entity_names().contains(&name)
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.seed)?;
        for hop in &self.hops {
            match hop.direction {
                Direction::Outgoing => write!(f, " -[{}]-> {}", hop.edge.edge_type, hop.to.name)?,
                Direction::Incoming => write!(f, " <-[{}]- {}", hop.edge.edge_type, hop.to.name)?,
            }
        }
        Ok(())
    }
}


#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextSpan {
    pub start: usize,
    pub end: usize,
}

impl TextSpan {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn overlaps(&self, other: &TextSpan) -> bool {
        self.start < other.end && other.start < self.end
    }
}


#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorHit {
    pub chunk_id: String,
    pub document_id: String,
    pub text: String,
    pub score: f64,
    #[serde(default)]
    pub span: Option<TextSpan>,
    #[serde(default)]
    pub mentions: Vec<String>,
}

impl VectorHit {
    pub fn reference(&self) -> String {
        format!("{}#{}", self.document_id, self.chunk_id)
    }
}
