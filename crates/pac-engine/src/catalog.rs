//! Permission Catalog
//!
//! Static registry of platform permission codes, grouped by module. The
//! catalog is populated once at startup; there is no runtime registration in
//! the decision path.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A single platform permission
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
    /// Globally unique code, `module.action` style
    pub code: String,
    /// Module the permission belongs to
    pub module: String,
    /// Human-readable description
    pub description: String,
}

/// Static permission registry
///
/// Immutable after construction, so it can be shared freely across
/// concurrent evaluations without locking.
pub struct PermissionCatalog {
    by_code: BTreeMap<String, Permission>,
}

impl PermissionCatalog {
    /// The builtin platform registry
    pub fn builtin() -> Self {
        let mut catalog = Self {
            by_code: BTreeMap::new(),
        };
        for &(code, module, description) in BUILTIN_PERMISSIONS {
            catalog.register(code, module, description);
        }
        catalog
    }

    fn register(&mut self, code: &str, module: &str, description: &str) {
        self.by_code.insert(
            code.to_string(),
            Permission {
                code: code.to_string(),
                module: module.to_string(),
                description: description.to_string(),
            },
        );
    }

    /// All permissions, ordered by code
    pub fn list(&self) -> Vec<Permission> {
        self.by_code.values().cloned().collect()
    }

    /// Whether a code exists in the registry
    pub fn exists(&self, code: &str) -> bool {
        self.by_code.contains_key(code)
    }

    /// Look up a single permission
    pub fn get(&self, code: &str) -> Option<&Permission> {
        self.by_code.get(code)
    }

    /// Permissions grouped by module, for the admin matrix screen
    pub fn modules(&self) -> Vec<(String, Vec<Permission>)> {
        let mut grouped: BTreeMap<String, Vec<Permission>> = BTreeMap::new();
        for perm in self.by_code.values() {
            grouped
                .entry(perm.module.clone())
                .or_default()
                .push(perm.clone());
        }
        grouped.into_iter().collect()
    }

    /// Number of registered permissions
    pub fn len(&self) -> usize {
        self.by_code.len()
    }

    /// Whether the registry is empty
    pub fn is_empty(&self) -> bool {
        self.by_code.is_empty()
    }
}

impl Default for PermissionCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Fixed platform permission registry: (code, module, description)
const BUILTIN_PERMISSIONS: &[(&str, &str, &str)] = &[
    // Tenant directory
    ("tenants.view", "tenants", "View tenant accounts and their status"),
    ("tenants.manage", "tenants", "Create, suspend, and update tenant accounts"),
    ("tenants.export", "tenants", "Export tenant data archives"),
    // Internal user directory
    ("users.view", "users", "View internal platform users"),
    ("users.manage", "users", "Create and update internal platform users"),
    ("users.sessions.revoke", "users", "Revoke active user sessions"),
    // Billing
    ("billing.view", "billing", "View invoices and billing configuration"),
    ("billing.manage", "billing", "Manage plans, invoices, and billing runs"),
    ("billing.adjustments.manage", "billing", "Apply invoice adjustments and credits"),
    // Support desk
    ("tickets.view", "support", "View support tickets"),
    ("tickets.resolve", "support", "Resolve and close support tickets"),
    ("tickets.manage", "support", "Reassign tickets and manage ticket notes"),
    ("support.sla.manage", "support", "Configure support SLA targets"),
    // Access control surface
    ("access.policy.manage", "access", "Manage MFA and break-glass security policies"),
    ("access.allowlist.manage", "access", "Manage per-role IP allowlists"),
    ("access.roles.manage", "access", "Edit role template permission sets"),
    // Audit
    ("audit.view", "audit", "Read the platform audit log"),
    ("security.events.view", "audit", "Read security events and blocks"),
    // Analytics
    ("analytics.view", "analytics", "View platform analytics dashboards"),
    // Operations
    ("ops.manage", "operations", "Run operational tooling and maintenance tasks"),
    ("monitoring.view", "operations", "View service health and monitoring"),
    // Settings
    ("settings.manage", "settings", "Edit platform-wide settings"),
    // Integrations
    ("integrations.view", "integrations", "View configured integrations"),
    ("integrations.manage", "integrations", "Configure third-party integrations"),
    // Marketing
    ("marketing.manage", "marketing", "Manage marketing pages and broadcasts"),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_catalog_has_unique_codes() {
        let catalog = PermissionCatalog::builtin();
        assert_eq!(catalog.len(), BUILTIN_PERMISSIONS.len());
    }

    #[test]
    fn exists_matches_registry() {
        let catalog = PermissionCatalog::builtin();
        assert!(catalog.exists("tickets.view"));
        assert!(catalog.exists("access.allowlist.manage"));
        assert!(!catalog.exists("tickets.forge"));
        assert!(!catalog.exists(""));
    }

    #[test]
    fn modules_group_every_permission() {
        let catalog = PermissionCatalog::builtin();
        let grouped = catalog.modules();
        let total: usize = grouped.iter().map(|(_, perms)| perms.len()).sum();
        assert_eq!(total, catalog.len());
        assert!(grouped.iter().any(|(module, _)| module == "support"));
        for (module, perms) in grouped {
            for perm in perms {
                assert_eq!(perm.module, module);
            }
        }
    }
}
