//! IP Allowlist Registry
//!
//! Per-role network restrictions. Allowlisting is opt-in per role: a role
//! with zero entries is unrestricted ("No network restrictions active"), and
//! becomes fail-closed the moment its first entry lands.

use crate::audit::{AuditEntry, AuditSink};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use ipnetwork::IpNetwork;
use pac_common::{AccessError, AccessResult};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::sync::Arc;
use uuid::Uuid;

/// One allowlisted CIDR range for a role
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpAllowlistEntry {
    /// Entry id
    pub id: Uuid,
    /// Role the restriction applies to
    pub role_name: String,
    /// Allowed network range
    pub cidr_block: IpNetwork,
    /// Operator note
    pub description: String,
    /// Administrator that added the entry
    pub created_by: String,
    /// When the entry was added
    pub created_at: DateTime<Utc>,
}

/// Owner of all allowlist entries
pub struct IpAllowlistRegistry {
    entries: DashMap<Uuid, IpAllowlistEntry>,
    by_role: DashMap<String, Vec<Uuid>>,
    audit: Arc<dyn AuditSink>,
}

impl IpAllowlistRegistry {
    /// Empty registry: every role unrestricted
    pub fn new(audit: Arc<dyn AuditSink>) -> Self {
        Self {
            entries: DashMap::new(),
            by_role: DashMap::new(),
            audit,
        }
    }

    /// Add an entry
    ///
    /// A bare IP address is accepted and normalized to a host-length prefix
    /// (/32 or /128). Duplicate exact CIDRs are permitted; re-adds are safe.
    pub fn add(
        &self,
        role_name: &str,
        cidr_block: &str,
        description: &str,
        created_by: &str,
    ) -> AccessResult<IpAllowlistEntry> {
        let role = normalize_role(role_name);
        if role.is_empty() {
            return Err(AccessError::Validation("role name is required".into()));
        }
        let network = parse_cidr(cidr_block)?;

        let entry = IpAllowlistEntry {
            id: Uuid::new_v4(),
            role_name: role.clone(),
            cidr_block: network,
            description: description.trim().to_string(),
            created_by: created_by.to_string(),
            created_at: Utc::now(),
        };

        self.entries.insert(entry.id, entry.clone());
        self.by_role.entry(role.clone()).or_default().push(entry.id);

        tracing::info!(role = %role, cidr = %network, created_by, "allowlist entry added");
        self.audit.append(AuditEntry::new(
            "access.allowlist.added",
            created_by,
            serde_json::json!({
                "id": entry.id,
                "role_name": role,
                "cidr_block": network.to_string(),
            }),
        ));

        Ok(entry)
    }

    /// Remove an entry by id
    pub fn remove(&self, id: Uuid, removed_by: &str) -> AccessResult<()> {
        let (_, entry) = self
            .entries
            .remove(&id)
            .ok_or_else(|| AccessError::NotFound(format!("allowlist entry {id}")))?;

        if let Some(mut ids) = self.by_role.get_mut(&entry.role_name) {
            ids.retain(|candidate| *candidate != id);
        }

        tracing::info!(role = %entry.role_name, cidr = %entry.cidr_block, removed_by, "allowlist entry removed");
        self.audit.append(AuditEntry::new(
            "access.allowlist.removed",
            removed_by,
            serde_json::json!({
                "id": id,
                "role_name": entry.role_name,
                "cidr_block": entry.cidr_block.to_string(),
            }),
        ));

        Ok(())
    }

    /// Whether a source IP is acceptable for a role
    ///
    /// Zero entries for the role means unrestricted; once any entry exists
    /// the IP must match at least one CIDR.
    pub fn is_allowed(&self, role_name: &str, source_ip: IpAddr) -> bool {
        let role = normalize_role(role_name);
        let ids = match self.by_role.get(&role) {
            Some(ids) if !ids.is_empty() => ids,
            _ => return true,
        };
        ids.iter().any(|id| {
            self.entries
                .get(id)
                .map(|entry| entry.cidr_block.contains(source_ip))
                .unwrap_or(false)
        })
    }

    /// Entries, optionally filtered by role, oldest first
    pub fn list(&self, role_filter: Option<&str>) -> Vec<IpAllowlistEntry> {
        let filter = role_filter.map(normalize_role);
        let mut entries: Vec<IpAllowlistEntry> = self
            .entries
            .iter()
            .filter(|entry| match &filter {
                Some(role) => entry.role_name == *role,
                None => true,
            })
            .map(|entry| entry.clone())
            .collect();
        entries.sort_by_key(|entry| entry.created_at);
        entries
    }
}

fn normalize_role(role_name: &str) -> String {
    role_name.trim().to_lowercase()
}

/// Parse a CIDR block, falling back to a single address as /32 or /128
fn parse_cidr(raw: &str) -> AccessResult<IpNetwork> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(AccessError::InvalidCidr(raw.to_string()));
    }
    if let Ok(network) = trimmed.parse::<IpNetwork>() {
        return Ok(network);
    }
    trimmed
        .parse::<IpAddr>()
        .map(IpNetwork::from)
        .map_err(|_| AccessError::InvalidCidr(trimmed.to_string()))
}
