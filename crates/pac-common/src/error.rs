//! Error types for the access control core

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Access control error type
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AccessError {
    /// Acting role does not hold the required permission
    #[error("forbidden: role lacks permission {0}")]
    Forbidden(String),

    /// Source IP falls outside the role's allowlist
    #[error("access restricted: source IP not on the role allowlist")]
    IpRestricted,

    /// Organization-wide MFA enforcement is on and the actor has not satisfied it
    #[error("multi-factor authentication required")]
    MfaRequired,

    /// Permission codes not present in the catalog
    #[error("unknown permission codes: {}", .0.join(", "))]
    UnknownPermission(Vec<String>),

    /// Malformed CIDR block or IP address
    #[error("invalid CIDR block: {0}")]
    InvalidCidr(String),

    /// Entity not found
    #[error("not found: {0}")]
    NotFound(String),

    /// Field-level validation failure
    #[error("validation failed: {0}")]
    Validation(String),

    /// Break-glass policy is disabled
    #[error("break-glass access is disabled by policy")]
    BreakGlassDisabled,

    /// Break-glass activation requires a reason
    #[error("break-glass activation requires a reason")]
    ReasonRequired,

    /// Break-glass policy requires a ticket reference
    #[error("break-glass activation requires a ticket reference")]
    TicketRequired,

    /// Requested duration outside the policy bounds
    #[error("break-glass duration {requested} exceeds limit {max_minutes} minutes")]
    DurationExceeded {
        /// Minutes requested by the actor
        requested: i64,
        /// Policy maximum in minutes
        max_minutes: i64,
    },

    /// Actor is still inside the break-glass cooldown window
    #[error("break-glass activation is in cooldown until {until}")]
    CooldownActive {
        /// Instant at which the actor may activate again
        until: DateTime<Utc>,
    },
}

/// Result type for the access control core
pub type AccessResult<T> = Result<T, AccessError>;
