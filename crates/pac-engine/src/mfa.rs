//! MFA Policy
//!
//! Single organization-wide enforcement flag for internal administrators,
//! versioned by its update timestamp.

use crate::audit::{AuditEntry, AuditSink};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Organization-wide MFA policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MfaPolicy {
    /// Whether internal administrators must have satisfied MFA
    pub enforce_internal_mfa: bool,
    /// Version stamp of the last update
    pub updated_at: DateTime<Utc>,
}

/// Owner of the singleton MFA policy
pub struct MfaPolicyStore {
    policy: RwLock<MfaPolicy>,
    audit: Arc<dyn AuditSink>,
}

impl MfaPolicyStore {
    /// Enforcement off until an administrator turns it on
    pub fn new(audit: Arc<dyn AuditSink>) -> Self {
        Self {
            policy: RwLock::new(MfaPolicy {
                enforce_internal_mfa: false,
                updated_at: Utc::now(),
            }),
            audit,
        }
    }

    /// Current policy snapshot
    pub fn get(&self) -> MfaPolicy {
        *self.policy.read()
    }

    /// Flip the enforcement flag
    pub fn set(&self, enforce: bool, updated_by: &str) -> MfaPolicy {
        let updated = MfaPolicy {
            enforce_internal_mfa: enforce,
            updated_at: Utc::now(),
        };
        *self.policy.write() = updated;

        tracing::info!(enforce, updated_by, "internal MFA policy updated");
        self.audit.append(AuditEntry::new(
            "access.mfa.updated",
            updated_by,
            serde_json::json!({ "enforce": enforce }),
        ));

        updated
    }
}
