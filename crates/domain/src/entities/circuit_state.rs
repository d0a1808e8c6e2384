//! Circuit breaker state

use std::fmt;

use serde::{Deserialize, Serialize};

/// State of a circuit breaker
///
/// ```text
/// Closed ──[threshold failures]──> Open ──[open duration elapsed]──> HalfOpen
///   ^                                ^                                  │
///   │                                └────────[probe fails]─────────────┤
///   └─────────────────────────────────────────[probe succeeds]──────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Normal operation, calls pass through
    #[default]
    Closed,
    /// Dependency assumed down, calls are blocked
    Open,
    /// Recovery check, a bounded number of probes pass through
    HalfOpen,
}

impl CircuitState {
    /// Returns true if `next` is a legal successor of `self`
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Closed, Self::Open)
                | (Self::Open, Self::HalfOpen)
                | (Self::HalfOpen, Self::Closed | Self::Open)
        )
    }
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Closed => write!(f, "closed"),
            Self::Open => write!(f, "open"),
            Self::HalfOpen => write!(f, "half-open"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [CircuitState; 3] = [
        CircuitState::Closed,
        CircuitState::Open,
        CircuitState::HalfOpen,
    ];

    #[test]
    fn display() {
        assert_eq!(CircuitState::Closed.to_string(), "closed");
        assert_eq!(CircuitState::Open.to_string(), "open");
        assert_eq!(CircuitState::HalfOpen.to_string(), "half-open");
    }

    #[test]
    fn only_four_edges_exist() {
        let edges: Vec<_> = ALL
            .iter()
            .flat_map(|from| ALL.iter().map(move |to| (*from, *to)))
            .filter(|(from, to)| from.can_transition_to(*to))
            .collect();

        assert_eq!(
            edges,
            vec![
                (CircuitState::Closed, CircuitState::Open),
                (CircuitState::Open, CircuitState::HalfOpen),
                (CircuitState::HalfOpen, CircuitState::Closed),
                (CircuitState::HalfOpen, CircuitState::Open),
            ]
        );
    }

    #[test]
    fn default_is_closed() {
        assert_eq!(CircuitState::default(), CircuitState::Closed);
    }
}
