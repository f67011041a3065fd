//! Role Template Store
//!
//! Maps the fixed platform roles to permission sets. Commits use full-replace
//! semantics: the admin matrix screen selects or deselects whole modules and
//! then commits the complete set, which avoids lost-update races between
//! concurrent editors.

use crate::audit::{AuditEntry, AuditSink};
use crate::catalog::{Permission, PermissionCatalog};
use crate::PlatformRole;
use dashmap::DashMap;
use pac_common::{AccessError, AccessResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Permission set for one platform role
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleTemplate {
    /// Fixed role code, e.g. `support_l1`
    pub role_code: String,
    /// Display name, e.g. `Support L1`
    pub role_name: String,
    /// Granted permission codes; every code exists in the catalog
    pub permission_codes: BTreeSet<String>,
}

impl RoleTemplate {
    /// Whether the template grants a permission
    pub fn grants(&self, permission_code: &str) -> bool {
        self.permission_codes.contains(permission_code)
    }
}

/// Role templates plus the permission catalog, for the matrix screen
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RbacMatrix {
    /// Templates in fixed role order
    pub roles: Vec<RoleTemplate>,
    /// Full permission catalog
    pub permissions: Vec<Permission>,
}

/// Owner of all role template records
///
/// Writes to the same role serialize on the map shard; commits to different
/// roles proceed independently.
pub struct RoleTemplateStore {
    catalog: Arc<PermissionCatalog>,
    templates: DashMap<PlatformRole, RoleTemplate>,
    audit: Arc<dyn AuditSink>,
}

impl RoleTemplateStore {
    /// Create the store with one template per fixed role, seeded with the
    /// platform defaults
    pub fn bootstrap(catalog: Arc<PermissionCatalog>, audit: Arc<dyn AuditSink>) -> Self {
        let store = Self {
            catalog,
            templates: DashMap::new(),
            audit,
        };
        for role in PlatformRole::all() {
            let codes: BTreeSet<String> = default_permissions(role, &store.catalog)
                .into_iter()
                .collect();
            store.templates.insert(
                role,
                RoleTemplate {
                    role_code: role.code().to_string(),
                    role_name: role.display_name().to_string(),
                    permission_codes: codes,
                },
            );
        }
        store
    }

    /// Snapshot of one role's template
    pub fn get(&self, role_code: &str) -> AccessResult<RoleTemplate> {
        let role: PlatformRole = role_code.parse()?;
        self.templates
            .get(&role)
            .map(|t| t.clone())
            .ok_or_else(|| AccessError::NotFound(format!("role template {role_code}")))
    }

    /// Whether a role currently grants a permission
    pub fn grants(&self, role_code: &str, permission_code: &str) -> bool {
        role_code
            .parse::<PlatformRole>()
            .ok()
            .and_then(|role| self.templates.get(&role))
            .map(|t| t.grants(permission_code))
            .unwrap_or(false)
    }

    /// Replace a role's entire permission set
    ///
    /// Codes are trimmed, lowercased, and de-duplicated, then validated
    /// against the catalog before any state changes. Unknown codes fail the
    /// whole commit, listing every offender.
    pub fn commit_permissions<I, S>(
        &self,
        role_code: &str,
        codes: I,
        updated_by: &str,
    ) -> AccessResult<RoleTemplate>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let role: PlatformRole = role_code.parse()?;

        let normalized: BTreeSet<String> = codes
            .into_iter()
            .map(|c| c.as_ref().trim().to_lowercase())
            .filter(|c| !c.is_empty())
            .collect();

        let unknown: Vec<String> = normalized
            .iter()
            .filter(|code| !self.catalog.exists(code))
            .cloned()
            .collect();
        if !unknown.is_empty() {
            return Err(AccessError::UnknownPermission(unknown));
        }

        // Entry lock serializes concurrent commits to the same role
        let mut entry = self
            .templates
            .get_mut(&role)
            .ok_or_else(|| AccessError::NotFound(format!("role template {role_code}")))?;
        entry.permission_codes = normalized.clone();
        let snapshot = entry.clone();
        drop(entry);

        tracing::info!(
            role = role.code(),
            permissions = normalized.len(),
            updated_by,
            "role template committed"
        );
        self.audit.append(AuditEntry::new(
            "rbac.template.updated",
            updated_by,
            serde_json::json!({
                "role_code": role.code(),
                "permission_codes": normalized,
            }),
        ));

        Ok(snapshot)
    }

    /// Templates in fixed role order plus the catalog
    pub fn matrix(&self) -> RbacMatrix {
        let roles = PlatformRole::all()
            .iter()
            .filter_map(|role| self.templates.get(role).map(|t| t.clone()))
            .collect();
        RbacMatrix {
            roles,
            permissions: self.catalog.list(),
        }
    }
}

/// Bootstrap permission sets per fixed role
fn default_permissions(role: PlatformRole, catalog: &PermissionCatalog) -> Vec<String> {
    let codes: Vec<&str> = match role {
        PlatformRole::SuperAdmin => {
            return catalog.list().into_iter().map(|p| p.code).collect();
        }
        PlatformRole::SupportL1 => vec!["tickets.view", "users.view", "tenants.view"],
        PlatformRole::SupportL2 => vec![
            "tickets.view",
            "tickets.resolve",
            "tickets.manage",
            "users.view",
            "tenants.view",
            "monitoring.view",
        ],
        PlatformRole::Finance => vec![
            "billing.view",
            "billing.manage",
            "billing.adjustments.manage",
            "tenants.view",
            "analytics.view",
        ],
        PlatformRole::Ops => vec![
            "ops.manage",
            "monitoring.view",
            "tenants.view",
            "audit.view",
            "security.events.view",
        ],
        PlatformRole::Developer => vec![
            "integrations.view",
            "integrations.manage",
            "monitoring.view",
            "analytics.view",
        ],
    };
    codes.into_iter().map(String::from).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::MemoryAuditSink;
    use proptest::prelude::*;

    fn store() -> (RoleTemplateStore, Arc<MemoryAuditSink>) {
        let sink = Arc::new(MemoryAuditSink::new());
        let catalog = Arc::new(PermissionCatalog::builtin());
        (
            RoleTemplateStore::bootstrap(catalog, sink.clone()),
            sink,
        )
    }

    #[test]
    fn bootstrap_creates_one_template_per_role() {
        let (store, _) = store();
        for role in PlatformRole::all() {
            let template = store.get(role.code()).unwrap();
            assert_eq!(template.role_code, role.code());
            assert!(!template.permission_codes.is_empty());
        }
    }

    #[test]
    fn bootstrap_defaults_are_catalog_valid() {
        let (store, _) = store();
        let catalog = PermissionCatalog::builtin();
        for role in PlatformRole::all() {
            for code in store.get(role.code()).unwrap().permission_codes {
                assert!(catalog.exists(&code), "{code} missing from catalog");
            }
        }
    }

    #[test]
    fn get_unknown_role_fails() {
        let (store, _) = store();
        assert!(matches!(
            store.get("warlord"),
            Err(AccessError::NotFound(_))
        ));
    }

    #[test]
    fn commit_replaces_entire_set() {
        let (store, sink) = store();
        let committed = store
            .commit_permissions("support_l1", ["tickets.view", "tickets.resolve"], "root")
            .unwrap();
        assert_eq!(committed.permission_codes.len(), 2);

        // Full-replace: the bootstrap grants are gone
        let template = store.get("support_l1").unwrap();
        assert!(!template.grants("users.view"));
        assert!(template.grants("tickets.resolve"));

        let entries = sink.for_action("rbac.template.updated");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].details["role_code"], "support_l1");
    }

    #[test]
    fn commit_rejects_unknown_codes_listing_all() {
        let (store, sink) = store();
        let err = store
            .commit_permissions(
                "ops",
                ["tickets.view", "tickets.forge", "billing.mint"],
                "root",
            )
            .unwrap_err();
        match err {
            AccessError::UnknownPermission(codes) => {
                assert_eq!(codes, vec!["billing.mint", "tickets.forge"]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        // Rejected before any state mutation
        assert!(store.get("ops").unwrap().grants("ops.manage"));
        assert!(sink.for_action("rbac.template.updated").is_empty());
    }

    #[test]
    fn commit_normalizes_codes() {
        let (store, _) = store();
        let committed = store
            .commit_permissions(
                "developer",
                ["  Tickets.View ", "tickets.view", "", "analytics.view"],
                "root",
            )
            .unwrap();
        assert_eq!(committed.permission_codes.len(), 2);
        assert!(committed.grants("tickets.view"));
        assert!(committed.grants("analytics.view"));
    }

    #[test]
    fn matrix_lists_roles_in_fixed_order() {
        let (store, _) = store();
        let matrix = store.matrix();
        let codes: Vec<&str> = matrix.roles.iter().map(|r| r.role_code.as_str()).collect();
        assert_eq!(
            codes,
            vec!["super_admin", "support_l1", "support_l2", "finance", "ops", "developer"]
        );
        assert_eq!(matrix.permissions.len(), PermissionCatalog::builtin().len());
    }

    proptest! {
        // Referential integrity: whatever the input, a successful commit only
        // ever stores catalog codes.
        #[test]
        fn committed_codes_always_exist_in_catalog(raw in proptest::collection::vec("[a-z.]{1,24}", 0..12)) {
            let (store, _) = store();
            if let Ok(template) = store.commit_permissions("finance", raw.iter(), "root") {
                let catalog = PermissionCatalog::builtin();
                for code in template.permission_codes {
                    prop_assert!(catalog.exists(&code));
                }
            }
        }
    }
}
