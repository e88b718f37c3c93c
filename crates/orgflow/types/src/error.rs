use thiserror::Error;

/// Result type shared across orgflow crates.
pub type CoreResult<T> = Result<T, CoreError>;

/// Error taxonomy of the approval engine.
///
/// Every user-visible failure is one of these kinds with enough context
/// (entity, id, field) to render a specific message. Raw storage errors never
/// cross a component boundary.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Malformed input or invariant violation.
    #[error("validation failed: {0}")]
    Validation(String),

    /// A referenced entity does not exist, or is inactive where activity is
    /// required.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Concurrent mutation detected (lost quorum race, stale version).
    #[error("conflict: {0}")]
    Conflict(String),

    /// A resolved chain step would have zero approvers even after fallback
    /// rules; blocks request creation.
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl CoreError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn not_found(entity: &'static str, id: impl std::fmt::Display) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_carries_entity_and_id() {
        let err = CoreError::not_found("org node", "n-42");
        assert_eq!(err.to_string(), "org node not found: n-42");
    }
}
