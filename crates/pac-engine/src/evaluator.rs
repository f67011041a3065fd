//! Access Policy Evaluator
//!
//! Composes the break-glass controller, role templates, MFA policy, and IP
//! allowlist into one authorization decision per request. The evaluation
//! order is fixed and must stay reproducible:
//!
//! 1. Active break-glass grant => Allow (override, still audited)
//! 2. Role template missing the permission => Deny(Forbidden)
//! 3. MFA enforced and not satisfied => Deny(MfaRequired)
//! 4. Source IP outside the role allowlist => Deny(IpRestricted)
//! 5. Allow
//!
//! The evaluator is pure and synchronous; its only side effect is audit
//! emission, so it is safe for concurrent invocation across simultaneous
//! administrator requests.

use crate::allowlist::IpAllowlistRegistry;
use crate::audit::{AuditEntry, AuditSink};
use crate::breakglass::BreakGlassController;
use crate::mfa::MfaPolicyStore;
use crate::templates::RoleTemplateStore;
use crate::{AccessRequest, AllowBasis, Decision, DenyReason};
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Authorization decision engine
pub struct PolicyEvaluator {
    templates: Arc<RoleTemplateStore>,
    allowlist: Arc<IpAllowlistRegistry>,
    mfa: Arc<MfaPolicyStore>,
    break_glass: Arc<BreakGlassController>,
    audit: Arc<dyn AuditSink>,
}

impl PolicyEvaluator {
    /// Wire the evaluator over read-only snapshots of the stores
    pub fn new(
        templates: Arc<RoleTemplateStore>,
        allowlist: Arc<IpAllowlistRegistry>,
        mfa: Arc<MfaPolicyStore>,
        break_glass: Arc<BreakGlassController>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            templates,
            allowlist,
            mfa,
            break_glass,
            audit,
        }
    }

    /// Decide one request
    pub fn evaluate(&self, request: &AccessRequest) -> Decision {
        self.evaluate_at(request, Utc::now())
    }

    /// Decision with an explicit clock, used directly by tests
    pub fn evaluate_at(&self, request: &AccessRequest, now: DateTime<Utc>) -> Decision {
        let decision = self.decide(request, now);
        self.audit_decision(request, &decision, now);
        decision
    }

    fn decide(&self, request: &AccessRequest, now: DateTime<Utc>) -> Decision {
        // 1. Break-glass override bypasses checks 2-4, never the audit
        if let Some(event) = self.break_glass.active_event_for(&request.actor, now) {
            return Decision::Allow(AllowBasis::BreakGlass { event_id: event.id });
        }

        // 2. Role must hold the permission; an unknown role holds nothing
        if !self
            .templates
            .grants(&request.role_code, &request.permission_code)
        {
            return Decision::Deny(DenyReason::Forbidden);
        }

        // 3. Organization-wide MFA enforcement
        if self.mfa.get().enforce_internal_mfa && !request.mfa_satisfied {
            return Decision::Deny(DenyReason::MfaRequired);
        }

        // 4. Per-role network restrictions
        if !self
            .allowlist
            .is_allowed(&request.role_code, request.source_ip)
        {
            return Decision::Deny(DenyReason::IpRestricted);
        }

        Decision::Allow(AllowBasis::Rbac)
    }

    /// Every Allow and Deny lands in the audit trail with the permission
    /// requested and the deciding rule, regardless of whether the caller
    /// performs the action.
    fn audit_decision(&self, request: &AccessRequest, decision: &Decision, now: DateTime<Utc>) {
        let (outcome, rule) = match decision {
            Decision::Allow(AllowBasis::BreakGlass { .. }) => ("allow", "break_glass_override"),
            Decision::Allow(AllowBasis::Rbac) => ("allow", "rbac"),
            Decision::Deny(DenyReason::Forbidden) => ("deny", "rbac"),
            Decision::Deny(DenyReason::MfaRequired) => ("deny", "mfa_policy"),
            Decision::Deny(DenyReason::IpRestricted) => ("deny", "ip_allowlist"),
        };
        tracing::debug!(
            actor = %request.actor,
            role = %request.role_code,
            permission = %request.permission_code,
            outcome,
            rule,
            "access decision"
        );
        self.audit.append(AuditEntry::at(
            "access.decision",
            &request.actor,
            serde_json::json!({
                "role_code": request.role_code,
                "permission_code": request.permission_code,
                "source_ip": request.source_ip.to_string(),
                "mfa_satisfied": request.mfa_satisfied,
                "outcome": outcome,
                "rule": rule,
            }),
            now,
        ));
    }
}
