//! Break-Glass Controller
//!
//! Time-bound emergency access grants with guardrail policy, per-actor
//! cooldown, and mandatory audit. Event lifecycle: `Active` then `Expired`
//! or `Revoked`, both terminal. Events are never deleted.

use crate::alert::{Alert, AlertDispatcher, AlertSeverity};
use crate::audit::{AuditEntry, AuditSink};
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use pac_common::{AccessError, AccessResult};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// Hard cap on the configurable max duration, minutes
pub const MAX_DURATION_CAP_MINUTES: i64 = 180;
/// Hard cap on the configurable cooldown, minutes
pub const MAX_COOLDOWN_MINUTES: i64 = 1440;

const EVENT_LIST_DEFAULT: usize = 100;
const EVENT_LIST_MAX: usize = 500;

/// Guardrail configuration for emergency access
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BreakGlassPolicy {
    /// Whether break-glass activation is available at all
    pub enabled: bool,
    /// Longest grant an actor may request, minutes
    pub max_duration_minutes: i64,
    /// Whether activation requires an incident ticket reference
    pub require_ticket: bool,
    /// Per-actor waiting period after a grant lapses, minutes
    pub cooldown_minutes: i64,
    /// Version stamp of the last update
    pub updated_at: DateTime<Utc>,
}

impl Default for BreakGlassPolicy {
    fn default() -> Self {
        Self {
            enabled: false,
            max_duration_minutes: 30,
            require_ticket: true,
            cooldown_minutes: 60,
            updated_at: Utc::now(),
        }
    }
}

/// Requested guardrail changes
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BreakGlassPolicyUpdate {
    /// New enabled flag
    pub enabled: bool,
    /// New max duration, minutes
    pub max_duration_minutes: i64,
    /// New ticket requirement
    pub require_ticket: bool,
    /// New cooldown, minutes
    pub cooldown_minutes: i64,
}

/// Lifecycle state of a grant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BreakGlassStatus {
    /// Grant is live
    Active,
    /// Grant lapsed at `expires_at`
    Expired,
    /// Grant was explicitly revoked
    Revoked,
}

/// One emergency access grant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreakGlassEvent {
    /// Event id
    pub id: Uuid,
    /// Actor the grant belongs to
    pub requested_by: String,
    /// Justification supplied at activation
    pub reason: String,
    /// Incident ticket reference, when required by policy
    pub ticket_ref: Option<String>,
    /// Granted duration, minutes
    pub duration_minutes: i64,
    /// When the grant started
    pub activated_at: DateTime<Utc>,
    /// When the grant lapses
    pub expires_at: DateTime<Utc>,
    /// Stored lifecycle state; read through `effective_status`
    pub status: BreakGlassStatus,
}

impl BreakGlassEvent {
    /// Single expiry predicate shared by the lazy read path and the sweep
    fn has_lapsed(&self, now: DateTime<Utc>) -> bool {
        self.status == BreakGlassStatus::Active && now >= self.expires_at
    }

    /// Status as observed at `now`, flipping Active to Expired once
    /// `expires_at` is reached
    pub fn effective_status(&self, now: DateTime<Utc>) -> BreakGlassStatus {
        if self.has_lapsed(now) {
            BreakGlassStatus::Expired
        } else {
            self.status
        }
    }

    /// Whether the grant confers access at `now`
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.effective_status(now) == BreakGlassStatus::Active
    }
}

/// Owner of the guardrail policy and every grant ever issued
pub struct BreakGlassController {
    policy: RwLock<BreakGlassPolicy>,
    events: DashMap<Uuid, BreakGlassEvent>,
    by_actor: DashMap<String, Vec<Uuid>>,
    audit: Arc<dyn AuditSink>,
    alerts: Arc<dyn AlertDispatcher>,
}

impl BreakGlassController {
    /// Controller with the default (disabled) policy
    pub fn new(audit: Arc<dyn AuditSink>, alerts: Arc<dyn AlertDispatcher>) -> Self {
        Self {
            policy: RwLock::new(BreakGlassPolicy::default()),
            events: DashMap::new(),
            by_actor: DashMap::new(),
            audit,
            alerts,
        }
    }

    /// Current guardrail snapshot
    pub fn policy(&self) -> BreakGlassPolicy {
        *self.policy.read()
    }

    /// Replace the guardrail policy
    pub fn update_policy(
        &self,
        update: BreakGlassPolicyUpdate,
        updated_by: &str,
    ) -> AccessResult<BreakGlassPolicy> {
        if update.max_duration_minutes <= 0 {
            return Err(AccessError::Validation(
                "max_duration_minutes must be positive".into(),
            ));
        }
        if update.max_duration_minutes > MAX_DURATION_CAP_MINUTES {
            return Err(AccessError::Validation(format!(
                "max_duration_minutes may not exceed {MAX_DURATION_CAP_MINUTES}"
            )));
        }
        if update.cooldown_minutes < 0 || update.cooldown_minutes > MAX_COOLDOWN_MINUTES {
            return Err(AccessError::Validation(format!(
                "cooldown_minutes must be between 0 and {MAX_COOLDOWN_MINUTES}"
            )));
        }

        let policy = BreakGlassPolicy {
            enabled: update.enabled,
            max_duration_minutes: update.max_duration_minutes,
            require_ticket: update.require_ticket,
            cooldown_minutes: update.cooldown_minutes,
            updated_at: Utc::now(),
        };
        *self.policy.write() = policy;

        tracing::info!(
            enabled = policy.enabled,
            max_duration = policy.max_duration_minutes,
            cooldown = policy.cooldown_minutes,
            updated_by,
            "break-glass policy updated"
        );
        self.audit.append(AuditEntry::new(
            "breakglass.policy.updated",
            updated_by,
            serde_json::json!({
                "enabled": policy.enabled,
                "max_duration_minutes": policy.max_duration_minutes,
                "require_ticket": policy.require_ticket,
                "cooldown_minutes": policy.cooldown_minutes,
            }),
        ));

        Ok(policy)
    }

    /// Activate emergency access for an actor
    pub async fn activate(
        &self,
        actor: &str,
        reason: &str,
        ticket_ref: Option<&str>,
        duration_minutes: i64,
    ) -> AccessResult<BreakGlassEvent> {
        self.activate_at(actor, reason, ticket_ref, duration_minutes, Utc::now())
            .await
    }

    /// Activation with an explicit clock, used directly by tests
    pub async fn activate_at(
        &self,
        actor: &str,
        reason: &str,
        ticket_ref: Option<&str>,
        duration_minutes: i64,
        now: DateTime<Utc>,
    ) -> AccessResult<BreakGlassEvent> {
        let policy = self.policy();
        if !policy.enabled {
            return Err(AccessError::BreakGlassDisabled);
        }

        let reason = reason.trim();
        if reason.is_empty() {
            return Err(AccessError::ReasonRequired);
        }

        let ticket = ticket_ref
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(String::from);
        if policy.require_ticket && ticket.is_none() {
            return Err(AccessError::TicketRequired);
        }

        if duration_minutes <= 0 || duration_minutes > policy.max_duration_minutes {
            return Err(AccessError::DurationExceeded {
                requested: duration_minutes,
                max_minutes: policy.max_duration_minutes,
            });
        }

        let actor = actor.trim().to_string();
        let event = {
            // Entry lock makes activation atomic per actor: two simultaneous
            // calls for the same actor serialize here and the loser sees the
            // winner's grant.
            let mut ids = self.by_actor.entry(actor.clone()).or_default();

            let prior = ids
                .iter()
                .filter_map(|id| self.events.get(id).map(|e| e.clone()))
                .max_by_key(|e| e.activated_at);
            if let Some(prior) = prior {
                let until = prior.expires_at + Duration::minutes(policy.cooldown_minutes);
                if prior.is_active_at(now) {
                    return Err(AccessError::CooldownActive { until });
                }
                if policy.cooldown_minutes > 0 && now < until {
                    return Err(AccessError::CooldownActive { until });
                }
            }

            let event = BreakGlassEvent {
                id: Uuid::new_v4(),
                requested_by: actor.clone(),
                reason: reason.to_string(),
                ticket_ref: ticket.clone(),
                duration_minutes,
                activated_at: now,
                expires_at: now + Duration::minutes(duration_minutes),
                status: BreakGlassStatus::Active,
            };
            self.events.insert(event.id, event.clone());
            ids.push(event.id);
            event
        };

        tracing::warn!(
            actor = %event.requested_by,
            duration = duration_minutes,
            ticket = ticket.as_deref().unwrap_or("-"),
            "break-glass access activated"
        );
        // Durable audit before the activation is considered settled
        self.audit.append(AuditEntry::at(
            "breakglass.activated",
            &event.requested_by,
            serde_json::json!({
                "event_id": event.id,
                "reason": event.reason,
                "ticket_ref": event.ticket_ref,
                "duration_minutes": event.duration_minutes,
                "expires_at": event.expires_at,
            }),
            now,
        ));
        self.alerts
            .notify(Alert {
                severity: AlertSeverity::High,
                title: "Break-glass access activated".into(),
                message: format!(
                    "{} activated emergency access for {} minutes: {}",
                    event.requested_by, event.duration_minutes, event.reason
                ),
                actor: event.requested_by.clone(),
                raised_at: now,
            })
            .await;

        Ok(event)
    }

    /// Revoke a live grant
    pub fn revoke(&self, event_id: Uuid, actor: &str) -> AccessResult<BreakGlassEvent> {
        self.revoke_at(event_id, actor, Utc::now())
    }

    /// Revocation with an explicit clock, used directly by tests
    pub fn revoke_at(
        &self,
        event_id: Uuid,
        actor: &str,
        now: DateTime<Utc>,
    ) -> AccessResult<BreakGlassEvent> {
        let mut entry = self
            .events
            .get_mut(&event_id)
            .ok_or_else(|| AccessError::NotFound(format!("break-glass event {event_id}")))?;

        if entry.effective_status(now) != BreakGlassStatus::Active {
            return Err(AccessError::Validation(
                "break-glass event is not active".into(),
            ));
        }
        entry.status = BreakGlassStatus::Revoked;
        let snapshot = entry.clone();
        drop(entry);

        tracing::warn!(event = %event_id, actor, "break-glass access revoked");
        self.audit.append(AuditEntry::at(
            "breakglass.revoked",
            actor,
            serde_json::json!({
                "event_id": event_id,
                "requested_by": snapshot.requested_by,
            }),
            now,
        ));

        Ok(snapshot)
    }

    /// The actor's live grant, if any
    pub fn active_event_for(&self, actor: &str, now: DateTime<Utc>) -> Option<BreakGlassEvent> {
        let ids = self.by_actor.get(actor.trim())?;
        ids.iter()
            .filter_map(|id| self.events.get(id))
            .find(|event| event.is_active_at(now))
            .map(|event| event.clone())
    }

    /// Event history, newest first, with effective statuses
    pub fn events(&self, limit: usize, offset: usize) -> Vec<BreakGlassEvent> {
        self.events_at(limit, offset, Utc::now())
    }

    /// Event history with an explicit clock
    pub fn events_at(&self, limit: usize, offset: usize, now: DateTime<Utc>) -> Vec<BreakGlassEvent> {
        let limit = if limit == 0 || limit > EVENT_LIST_MAX {
            EVENT_LIST_DEFAULT
        } else {
            limit
        };
        let mut all: Vec<BreakGlassEvent> = self
            .events
            .iter()
            .map(|entry| {
                let mut event = entry.clone();
                event.status = event.effective_status(now);
                event
            })
            .collect();
        all.sort_by(|a, b| b.activated_at.cmp(&a.activated_at));
        all.into_iter().skip(offset).take(limit).collect()
    }

    /// Persist expiry for lapsed grants; agrees with the lazy read predicate
    pub fn sweep_expired(&self, now: DateTime<Utc>) -> usize {
        let mut swept = 0;
        for mut entry in self.events.iter_mut() {
            if entry.has_lapsed(now) {
                entry.status = BreakGlassStatus::Expired;
                swept += 1;
            }
        }
        if swept > 0 {
            tracing::debug!(swept, "expired break-glass grants swept");
        }
        swept
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::RecordingAlertDispatcher;
    use crate::audit::MemoryAuditSink;

    struct Harness {
        controller: BreakGlassController,
        audit: Arc<MemoryAuditSink>,
        alerts: Arc<RecordingAlertDispatcher>,
    }

    fn harness() -> Harness {
        let audit = Arc::new(MemoryAuditSink::new());
        let alerts = Arc::new(RecordingAlertDispatcher::new());
        Harness {
            controller: BreakGlassController::new(audit.clone(), alerts.clone()),
            audit,
            alerts,
        }
    }

    fn enabled_policy() -> BreakGlassPolicyUpdate {
        BreakGlassPolicyUpdate {
            enabled: true,
            max_duration_minutes: 30,
            require_ticket: true,
            cooldown_minutes: 60,
        }
    }

    #[tokio::test]
    async fn activation_fails_while_disabled() {
        let h = harness();
        let err = h
            .controller
            .activate("oncall", "S1 DB failure", Some("INC-1"), 20)
            .await
            .unwrap_err();
        assert_eq!(err, AccessError::BreakGlassDisabled);
    }

    #[tokio::test]
    async fn activation_guardrails_reject_in_order() {
        let h = harness();
        h.controller.update_policy(enabled_policy(), "root").unwrap();

        assert_eq!(
            h.controller.activate("oncall", "   ", Some("INC-1"), 20).await,
            Err(AccessError::ReasonRequired)
        );
        assert_eq!(
            h.controller.activate("oncall", "S1 DB failure", Some(""), 20).await,
            Err(AccessError::TicketRequired)
        );
        assert_eq!(
            h.controller
                .activate("oncall", "S1 DB failure", Some("INC-1"), 45)
                .await,
            Err(AccessError::DurationExceeded {
                requested: 45,
                max_minutes: 30
            })
        );
        assert_eq!(
            h.controller
                .activate("oncall", "S1 DB failure", Some("INC-1"), 0)
                .await,
            Err(AccessError::DurationExceeded {
                requested: 0,
                max_minutes: 30
            })
        );
        // Nothing was created along the way
        assert!(h.controller.events(0, 0).is_empty());
    }

    #[tokio::test]
    async fn successful_activation_audits_and_alerts() {
        let h = harness();
        h.controller.update_policy(enabled_policy(), "root").unwrap();

        let now = Utc::now();
        let event = h
            .controller
            .activate_at("oncall", "S1 DB failure", Some("INC-1"), 20, now)
            .await
            .unwrap();

        assert_eq!(event.status, BreakGlassStatus::Active);
        assert_eq!(event.expires_at, now + Duration::minutes(20));
        assert_eq!(event.ticket_ref.as_deref(), Some("INC-1"));

        let audited = h.audit.for_action("breakglass.activated");
        assert_eq!(audited.len(), 1);
        assert_eq!(audited[0].actor, "oncall");

        let alerts = h.alerts.delivered();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].severity, AlertSeverity::High);
    }

    #[tokio::test]
    async fn expiry_flips_exactly_at_expires_at_and_never_reverts() {
        let h = harness();
        h.controller.update_policy(enabled_policy(), "root").unwrap();

        let t0 = Utc::now();
        let event = h
            .controller
            .activate_at("oncall", "S1 DB failure", Some("INC-1"), 20, t0)
            .await
            .unwrap();

        let just_before = event.expires_at - Duration::seconds(1);
        assert_eq!(event.effective_status(just_before), BreakGlassStatus::Active);
        assert_eq!(event.effective_status(event.expires_at), BreakGlassStatus::Expired);
        assert_eq!(
            event.effective_status(event.expires_at + Duration::seconds(1)),
            BreakGlassStatus::Expired
        );

        assert!(h.controller.active_event_for("oncall", just_before).is_some());
        assert!(h.controller.active_event_for("oncall", event.expires_at).is_none());
    }

    #[tokio::test]
    async fn sweep_agrees_with_lazy_expiry() {
        let h = harness();
        h.controller.update_policy(enabled_policy(), "root").unwrap();

        let t0 = Utc::now();
        let event = h
            .controller
            .activate_at("oncall", "S1 DB failure", Some("INC-1"), 20, t0)
            .await
            .unwrap();
        let later = event.expires_at + Duration::seconds(1);

        // Lazy read already observes expiry
        let listed = h.controller.events_at(10, 0, later);
        assert_eq!(listed[0].status, BreakGlassStatus::Expired);

        assert_eq!(h.controller.sweep_expired(later), 1);
        assert_eq!(h.controller.sweep_expired(later), 0);

        let listed = h.controller.events_at(10, 0, later);
        assert_eq!(listed[0].status, BreakGlassStatus::Expired);
    }

    #[tokio::test]
    async fn cooldown_rejects_reactivation_per_actor() {
        let h = harness();
        h.controller.update_policy(enabled_policy(), "root").unwrap();

        let t0 = Utc::now();
        let event = h
            .controller
            .activate_at("oncall", "S1 DB failure", Some("INC-1"), 20, t0)
            .await
            .unwrap();

        // 5 minutes after expiry, cooldown 60: rejected
        let retry = event.expires_at + Duration::minutes(5);
        let err = h
            .controller
            .activate_at("oncall", "still broken", Some("INC-2"), 10, retry)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            AccessError::CooldownActive {
                until: event.expires_at + Duration::minutes(60)
            }
        );

        // A different actor is unaffected
        assert!(h
            .controller
            .activate_at("backup", "still broken", Some("INC-2"), 10, retry)
            .await
            .is_ok());

        // Past the cooldown window the actor may activate again
        let after = event.expires_at + Duration::minutes(61);
        assert!(h
            .controller
            .activate_at("oncall", "regression", Some("INC-3"), 10, after)
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn overlapping_grants_are_impossible() {
        let h = harness();
        h.controller.update_policy(enabled_policy(), "root").unwrap();

        let t0 = Utc::now();
        h.controller
            .activate_at("oncall", "S1 DB failure", Some("INC-1"), 20, t0)
            .await
            .unwrap();
        let err = h
            .controller
            .activate_at("oncall", "second attempt", Some("INC-1"), 20, t0)
            .await
            .unwrap_err();
        assert!(matches!(err, AccessError::CooldownActive { .. }));
    }

    #[tokio::test]
    async fn revoke_transitions_only_active_grants() {
        let h = harness();
        h.controller.update_policy(enabled_policy(), "root").unwrap();

        let t0 = Utc::now();
        let event = h
            .controller
            .activate_at("oncall", "S1 DB failure", Some("INC-1"), 20, t0)
            .await
            .unwrap();

        let revoked = h.controller.revoke_at(event.id, "root", t0).unwrap();
        assert_eq!(revoked.status, BreakGlassStatus::Revoked);
        assert_eq!(h.audit.for_action("breakglass.revoked").len(), 1);

        // Terminal state: a second revoke fails
        assert!(matches!(
            h.controller.revoke_at(event.id, "root", t0),
            Err(AccessError::Validation(_))
        ));
        assert!(matches!(
            h.controller.revoke_at(Uuid::new_v4(), "root", t0),
            Err(AccessError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn revoke_after_expiry_fails() {
        let h = harness();
        h.controller.update_policy(enabled_policy(), "root").unwrap();

        let t0 = Utc::now();
        let event = h
            .controller
            .activate_at("oncall", "S1 DB failure", Some("INC-1"), 20, t0)
            .await
            .unwrap();
        assert!(matches!(
            h.controller
                .revoke_at(event.id, "root", event.expires_at + Duration::seconds(1)),
            Err(AccessError::Validation(_))
        ));
    }

    #[test]
    fn policy_update_validates_ranges() {
        let h = harness();
        let bad = [
            BreakGlassPolicyUpdate {
                max_duration_minutes: 0,
                ..enabled_policy()
            },
            BreakGlassPolicyUpdate {
                max_duration_minutes: 181,
                ..enabled_policy()
            },
            BreakGlassPolicyUpdate {
                cooldown_minutes: -1,
                ..enabled_policy()
            },
            BreakGlassPolicyUpdate {
                cooldown_minutes: 1441,
                ..enabled_policy()
            },
        ];
        for update in bad {
            assert!(matches!(
                h.controller.update_policy(update, "root"),
                Err(AccessError::Validation(_))
            ));
        }
        // Failed updates never touch the stored policy
        assert!(!h.controller.policy().enabled);
        assert!(h.audit.for_action("breakglass.policy.updated").is_empty());
    }

    #[tokio::test]
    async fn events_list_newest_first_with_paging() {
        let h = harness();
        h.controller
            .update_policy(
                BreakGlassPolicyUpdate {
                    cooldown_minutes: 0,
                    ..enabled_policy()
                },
                "root",
            )
            .unwrap();

        let t0 = Utc::now();
        for i in 0..3 {
            let at = t0 + Duration::hours(i);
            h.controller
                .activate_at(&format!("actor-{i}"), "incident", Some("INC-9"), 5, at)
                .await
                .unwrap();
        }

        let listed = h.controller.events_at(2, 0, t0 + Duration::hours(3));
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].requested_by, "actor-2");
        assert_eq!(listed[1].requested_by, "actor-1");

        let page2 = h.controller.events_at(2, 2, t0 + Duration::hours(3));
        assert_eq!(page2.len(), 1);
        assert_eq!(page2[0].requested_by, "actor-0");
    }
}
