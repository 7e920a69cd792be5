//! Domain error model.

use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Keep this focused on deterministic, business/domain failures (validation,
/// missing references, conflicts, entitlement refusals). Datastore failures
/// belong to the infra layer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A value failed validation (missing field, out-of-range number, ...).
    #[error("validation failed: {0}")]
    Validation(String),

    /// A referenced entity does not exist. Carries the entity name.
    #[error("{0} not found")]
    NotFound(&'static str),

    /// A uniqueness or state conflict (duplicate email, duplicate course name).
    #[error("conflict: {0}")]
    Conflict(String),

    /// The caller is authenticated but not allowed to perform the operation.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// The cohort already holds as many students as its capacity allows.
    #[error("turma '{turma}' is full (capacity {capacidade})")]
    TurmaFull { turma: String, capacidade: u32 },

    /// The owning admin already has as many instrutores as the plan allows.
    #[error("instructor limit reached ({atual}/{limite})")]
    InstructorLimitReached { limite: u32, atual: u32 },

    /// The one-time trial was already consumed by this user.
    #[error("trial already used")]
    TrialAlreadyUsed,

    /// The requested plan is not in the catalog.
    #[error("invalid plan '{0}'")]
    InvalidPlan(String),

    #[error("subscription not found")]
    SubscriptionNotFound,

    /// The operation needs an active subscription and none is in force.
    #[error("an active subscription is required")]
    SubscriptionRequired,
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    pub fn not_found(entity: &'static str) -> Self {
        Self::NotFound(entity)
    }
}
