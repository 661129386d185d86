//! Context type for tracking request origin

use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Origin of a state write or service call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Context {
    /// Unique identifier for this context (ULID)
    pub id: String,
}

impl Context {
    /// Create a new context with a fresh ULID
    pub fn new() -> Self {
        Self {
            id: Ulid::new().to_string(),
        }
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contexts_are_unique() {
        let first = Context::new();
        let second = Context::new();

        assert_ne!(first.id, second.id);
        assert_eq!(first.id.len(), 26);
    }
}
