use serde::{Deserialize, Serialize};
use strum::Display;


#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Condition {
    EntityNotFound,
    GraphUnavailable,
    VectorUnavailable,
    BudgetExceeded,
    Timeout,
    NoEvidenceFound,
}

impl Condition {
    /// Conditions that mean one evidence source is missing from the result.
    pub fn is_source_loss(&self) -> bool {
        matches!(self, Self::GraphUnavailable | Self::VectorUnavailable | Self::Timeout)
    }
}


/// What a retrieval branch hands to the fusion stage. Failures travel as data.
#[derive(Debug, Clone, PartialEq)]
pub enum BranchOutcome<T> {
    Complete(T),
    Degraded {
        value: T,
        conditions: Vec<Condition>,
        reason: String,
    },
    Unavailable {
        conditions: Vec<Condition>,
        reason: String,
    },
}

impl<T> BranchOutcome<T> {
    pub fn unavailable(condition: Condition, timed_out: bool, reason: impl Into<String>) -> Self {
        let mut conditions = vec![condition];
        if timed_out {
            conditions.push(Condition::Timeout);
        }
        Self::Unavailable {
            conditions,
            reason: reason.into(),
        }
    }

    pub fn degraded(value: T, conditions: Vec<Condition>, reason: impl Into<String>) -> Self {
        Self::Degraded {
            value,
            conditions,
            reason: reason.into(),
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, Self::Complete(_))
    }

    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            Self::Complete(value) | Self::Degraded { value, .. } => Some(value),
            Self::Unavailable { .. } => None,
        }
    }

    pub fn conditions(&self) -> &[Condition] {
        match self {
            Self::Complete(_) => &[],
            Self::Degraded { conditions, .. } | Self::Unavailable { conditions, .. } => conditions,
        }
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::Complete(_) => None,
            Self::Degraded { reason, .. } | Self::Unavailable { reason, .. } => Some(reason),
        }
    }
}

impl<T: Default> BranchOutcome<T> {
    /// Splits into the usable value (empty when unavailable) and the raised conditions.
    pub fn into_parts(self) -> (T, Vec<Condition>) {
        match self {
            Self::Complete(value) => (value, Vec::new()),
            Self::Degraded { value, conditions, .. } => (value, conditions),
            Self::Unavailable { conditions, .. } => (T::default(), conditions),
        }
    }
}
