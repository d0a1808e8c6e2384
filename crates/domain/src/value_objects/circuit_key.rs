//! Circuit key value object

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of a target endpoint or dependency guarded by its own breaker
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CircuitKey(String);

impl CircuitKey {
    /// Create a circuit key
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Get the key as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CircuitKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CircuitKey {
    fn from(key: &str) -> Self {
        Self(key.to_string())
    }
}

impl From<String> for CircuitKey {
    fn from(key: String) -> Self {
        Self(key)
    }
}

impl AsRef<str> for CircuitKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
