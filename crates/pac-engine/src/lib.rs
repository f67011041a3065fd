//! Platform Access Control Engine
//!
//! Access decision core for the platform administrative surface. For every
//! privileged action it decides whether the acting administrator is
//! authorized, accounting for:
//! - Role-based permissions (fixed platform roles, editable templates)
//! - Per-role network restrictions (opt-in IP allowlists)
//! - Organization-wide MFA enforcement
//! - Time-bound emergency break-glass overrides with cooldown
//!
//! # Architecture
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                    PLATFORM ACCESS CONTROL                       │
//! ├──────────────────────────────────────────────────────────────────┤
//! │                                                                  │
//! │  Request ──► BreakGlass ──► Templates ──► MFA ──► Allowlist      │
//! │     │            │              │           │          │         │
//! │     ▼            ▼              ▼           ▼          ▼         │
//! │  ┌───────┐  ┌─────────┐   ┌─────────┐ ┌─────────┐ ┌─────────┐   │
//! │  │ Actor │  │ Grants  │   │  RBAC   │ │ Policy  │ │  CIDR   │   │
//! │  │ + IP  │  │Cooldown │   │ Matrix  │ │  Flag   │ │ Ranges  │   │
//! │  └───────┘  └─────────┘   └─────────┘ └─────────┘ └─────────┘   │
//! │                                                                  │
//! │         EVERY DECISION AND MUTATION LANDS IN THE AUDIT TRAIL     │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Billing screens, support-ticket CRUD, and the rest of the admin surface
//! are external collaborators: they call [`PlatformAccessControl`] for
//! decisions and receive audit entries through the [`audit::AuditSink`]
//! contract.

#![warn(missing_docs)]
#![warn(clippy::all)]

use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::str::FromStr;
use std::sync::Arc;
use uuid::Uuid;

pub mod alert;
pub mod allowlist;
pub mod audit;
pub mod breakglass;
pub mod catalog;
pub mod evaluator;
pub mod mfa;
pub mod templates;

pub use alert::{Alert, AlertDispatcher, AlertSeverity, LogAlertDispatcher};
pub use allowlist::{IpAllowlistEntry, IpAllowlistRegistry};
pub use audit::{AuditEntry, AuditSink, MemoryAuditSink};
pub use breakglass::{
    BreakGlassController, BreakGlassEvent, BreakGlassPolicy, BreakGlassPolicyUpdate,
    BreakGlassStatus,
};
pub use catalog::{Permission, PermissionCatalog};
pub use evaluator::PolicyEvaluator;
pub use mfa::{MfaPolicy, MfaPolicyStore};
pub use pac_common::{AccessError, AccessResult};
pub use templates::{RbacMatrix, RoleTemplate, RoleTemplateStore};

// =============================================================================
// Core Types
// =============================================================================

/// Fixed platform roles; one role template exists per variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlatformRole {
    /// Full platform authority
    SuperAdmin,
    /// First-line support
    SupportL1,
    /// Escalation support
    SupportL2,
    /// Billing and invoicing
    Finance,
    /// Platform operations
    Ops,
    /// Integration development
    Developer,
}

impl PlatformRole {
    /// Every role, in the platform's fixed display order
    pub fn all() -> [PlatformRole; 6] {
        [
            Self::SuperAdmin,
            Self::SupportL1,
            Self::SupportL2,
            Self::Finance,
            Self::Ops,
            Self::Developer,
        ]
    }

    /// Stable role code
    pub fn code(&self) -> &'static str {
        match self {
            Self::SuperAdmin => "super_admin",
            Self::SupportL1 => "support_l1",
            Self::SupportL2 => "support_l2",
            Self::Finance => "finance",
            Self::Ops => "ops",
            Self::Developer => "developer",
        }
    }

    /// Human-readable name
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::SuperAdmin => "Super Admin",
            Self::SupportL1 => "Support L1",
            Self::SupportL2 => "Support L2",
            Self::Finance => "Finance",
            Self::Ops => "Operations",
            Self::Developer => "Developer",
        }
    }
}

impl FromStr for PlatformRole {
    type Err = AccessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "super_admin" => Ok(Self::SuperAdmin),
            "support_l1" => Ok(Self::SupportL1),
            "support_l2" => Ok(Self::SupportL2),
            "finance" => Ok(Self::Finance),
            "ops" => Ok(Self::Ops),
            "developer" => Ok(Self::Developer),
            other => Err(AccessError::NotFound(format!("platform role {other}"))),
        }
    }
}

impl std::fmt::Display for PlatformRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

/// One authorization request, as supplied by the external identity provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessRequest {
    /// Authenticated actor id
    pub actor: String,
    /// Actor's platform role code
    pub role_code: String,
    /// Permission being exercised
    pub permission_code: String,
    /// Source IP of the request
    pub source_ip: IpAddr,
    /// Whether the identity provider saw MFA satisfied
    pub mfa_satisfied: bool,
}

/// Why an allow decision was reached
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AllowBasis {
    /// Normal RBAC path: permission held, MFA and network checks passed
    Rbac,
    /// Active break-glass grant bypassed checks 2-4
    BreakGlass {
        /// The overriding grant
        event_id: Uuid,
    },
}

/// Why a deny decision was reached
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DenyReason {
    /// Role does not hold the permission
    Forbidden,
    /// MFA enforced and not satisfied
    MfaRequired,
    /// Source IP outside the role allowlist
    IpRestricted,
}

impl DenyReason {
    fn into_error(self, permission: &str) -> AccessError {
        match self {
            Self::Forbidden => AccessError::Forbidden(permission.to_string()),
            Self::MfaRequired => AccessError::MfaRequired,
            Self::IpRestricted => AccessError::IpRestricted,
        }
    }
}

/// One authorization decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Decision {
    /// Action is authorized
    Allow(AllowBasis),
    /// Action is denied, with the deciding rule
    Deny(DenyReason),
}

impl Decision {
    /// Whether the caller may proceed
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow(_))
    }
}

/// The acting administrator behind a control-plane call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminContext {
    /// Authenticated actor id
    pub actor: String,
    /// Actor's platform role code
    pub role_code: String,
    /// Source IP of the call
    pub source_ip: IpAddr,
    /// Whether the identity provider saw MFA satisfied
    pub mfa_satisfied: bool,
}

impl AdminContext {
    fn request(&self, permission_code: &str) -> AccessRequest {
        AccessRequest {
            actor: self.actor.clone(),
            role_code: self.role_code.clone(),
            permission_code: permission_code.to_string(),
            source_ip: self.source_ip,
            mfa_satisfied: self.mfa_satisfied,
        }
    }
}

// =============================================================================
// Control Plane
// =============================================================================

/// The assembled access control core
///
/// Owns the stores, the break-glass controller, and the evaluator, and
/// exposes the administrative operations the platform screens call. Mutating
/// operations are themselves authorized through the evaluator, so the
/// permission to manage access policy is evaluated like any other
/// (self-referential bootstrap).
pub struct PlatformAccessControl {
    catalog: Arc<PermissionCatalog>,
    templates: Arc<RoleTemplateStore>,
    allowlist: Arc<IpAllowlistRegistry>,
    mfa: Arc<MfaPolicyStore>,
    break_glass: Arc<BreakGlassController>,
    evaluator: PolicyEvaluator,
}

impl PlatformAccessControl {
    /// Bootstrap the control plane: builtin catalog, default role templates,
    /// empty allowlists, MFA off, break-glass disabled
    pub fn new(audit: Arc<dyn AuditSink>, alerts: Arc<dyn AlertDispatcher>) -> Self {
        let catalog = Arc::new(PermissionCatalog::builtin());
        let templates = Arc::new(RoleTemplateStore::bootstrap(catalog.clone(), audit.clone()));
        let allowlist = Arc::new(IpAllowlistRegistry::new(audit.clone()));
        let mfa = Arc::new(MfaPolicyStore::new(audit.clone()));
        let break_glass = Arc::new(BreakGlassController::new(audit.clone(), alerts));
        let evaluator = PolicyEvaluator::new(
            templates.clone(),
            allowlist.clone(),
            mfa.clone(),
            break_glass.clone(),
            audit,
        );
        Self {
            catalog,
            templates,
            allowlist,
            mfa,
            break_glass,
            evaluator,
        }
    }

    /// The permission catalog
    pub fn catalog(&self) -> &PermissionCatalog {
        &self.catalog
    }

    /// The decision engine
    pub fn evaluator(&self) -> &PolicyEvaluator {
        &self.evaluator
    }

    /// Decide one request
    pub fn evaluate(&self, request: &AccessRequest) -> Decision {
        self.evaluator.evaluate(request)
    }

    fn authorize(&self, ctx: &AdminContext, permission: &str) -> AccessResult<()> {
        match self.evaluator.evaluate(&ctx.request(permission)) {
            Decision::Allow(_) => Ok(()),
            Decision::Deny(reason) => Err(reason.into_error(permission)),
        }
    }

    // --- RBAC templates -----------------------------------------------------

    /// Role templates plus the catalog, for the matrix screen
    pub fn rbac_matrix(&self) -> RbacMatrix {
        self.templates.matrix()
    }

    /// Snapshot of one role template
    pub fn role_template(&self, role_code: &str) -> AccessResult<RoleTemplate> {
        self.templates.get(role_code)
    }

    /// Replace a role's permission set (requires `access.roles.manage`)
    pub fn commit_role_permissions<I, S>(
        &self,
        ctx: &AdminContext,
        role_code: &str,
        codes: I,
    ) -> AccessResult<RoleTemplate>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.authorize(ctx, "access.roles.manage")?;
        self.templates.commit_permissions(role_code, codes, &ctx.actor)
    }

    // --- IP allowlist -------------------------------------------------------

    /// Allowlist entries, optionally filtered by role
    pub fn list_allowlist(&self, role_filter: Option<&str>) -> Vec<IpAllowlistEntry> {
        self.allowlist.list(role_filter)
    }

    /// Add an allowlist entry (requires `access.allowlist.manage`)
    pub fn add_allowlist_entry(
        &self,
        ctx: &AdminContext,
        role_name: &str,
        cidr_block: &str,
        description: &str,
    ) -> AccessResult<IpAllowlistEntry> {
        self.authorize(ctx, "access.allowlist.manage")?;
        self.allowlist.add(role_name, cidr_block, description, &ctx.actor)
    }

    /// Remove an allowlist entry (requires `access.allowlist.manage`)
    pub fn remove_allowlist_entry(&self, ctx: &AdminContext, id: Uuid) -> AccessResult<()> {
        self.authorize(ctx, "access.allowlist.manage")?;
        self.allowlist.remove(id, &ctx.actor)
    }

    /// Whether a source IP is acceptable for a role
    pub fn is_ip_allowed(&self, role_name: &str, source_ip: IpAddr) -> bool {
        self.allowlist.is_allowed(role_name, source_ip)
    }

    // --- MFA policy ---------------------------------------------------------

    /// Current MFA policy
    pub fn mfa_policy(&self) -> MfaPolicy {
        self.mfa.get()
    }

    /// Flip MFA enforcement (requires `access.policy.manage`)
    pub fn set_mfa_policy(&self, ctx: &AdminContext, enforce: bool) -> AccessResult<MfaPolicy> {
        self.authorize(ctx, "access.policy.manage")?;
        Ok(self.mfa.set(enforce, &ctx.actor))
    }

    // --- Break-glass --------------------------------------------------------

    /// Current break-glass guardrails
    pub fn break_glass_policy(&self) -> BreakGlassPolicy {
        self.break_glass.policy()
    }

    /// Replace the break-glass guardrails (requires `access.policy.manage`)
    pub fn update_break_glass_policy(
        &self,
        ctx: &AdminContext,
        update: BreakGlassPolicyUpdate,
    ) -> AccessResult<BreakGlassPolicy> {
        self.authorize(ctx, "access.policy.manage")?;
        self.break_glass.update_policy(update, &ctx.actor)
    }

    /// Activate emergency access for the calling actor
    ///
    /// Deliberately not permission-gated: break-glass exists for actors whose
    /// normal grants are insufficient during an incident. The guardrail
    /// policy, cooldown, alert, and audit trail are the controls.
    pub async fn activate_break_glass(
        &self,
        ctx: &AdminContext,
        reason: &str,
        ticket_ref: Option<&str>,
        duration_minutes: i64,
    ) -> AccessResult<BreakGlassEvent> {
        self.break_glass
            .activate(&ctx.actor, reason, ticket_ref, duration_minutes)
            .await
    }

    /// Revoke a live grant (requires `access.policy.manage`)
    pub fn revoke_break_glass(
        &self,
        ctx: &AdminContext,
        event_id: Uuid,
    ) -> AccessResult<BreakGlassEvent> {
        self.authorize(ctx, "access.policy.manage")?;
        self.break_glass.revoke(event_id, &ctx.actor)
    }

    /// Break-glass event history, newest first
    pub fn break_glass_events(&self, limit: usize, offset: usize) -> Vec<BreakGlassEvent> {
        self.break_glass.events(limit, offset)
    }

    /// The break-glass controller, for collaborators needing direct access
    pub fn break_glass(&self) -> &BreakGlassController {
        &self.break_glass
    }
}
