//! Append-only audit trail of tenant mutations.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicI64, Ordering};
use tracing::info;
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuditEntry {
    pub id: i64,
    pub tenant_id: i64,
    pub actor_user_id: Option<i64>,
    pub action: String,
    pub entity: String,
    pub entity_id: Option<String>,
    #[schema(value_type = Object)]
    pub meta: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// Entries never change once written. Data stored in DashMap (development);
/// swap to PostgreSQL for production.
pub struct AuditLogger {
    entries: DashMap<i64, AuditEntry>,
    next_id: AtomicI64,
}

impl Default for AuditLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl AuditLogger {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            next_id: AtomicI64::new(1),
        }
    }

    /// Record an action. `entity_id` is free-form (row id, slug, `tid:uid`).
    pub fn log_action(
        &self,
        tenant_id: i64,
        actor_user_id: Option<i64>,
        action: &str,
        entity: &str,
        entity_id: Option<String>,
        meta: serde_json::Value,
    ) -> AuditEntry {
        let entry = AuditEntry {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            tenant_id,
            actor_user_id,
            action: action.to_string(),
            entity: entity.to_string(),
            entity_id,
            meta,
            created_at: tlx_core::time::now(),
        };
        info!(
            tenant_id = tenant_id,
            actor = ?actor_user_id,
            action = %entry.action,
            entity = %entry.entity,
            entity_id = ?entry.entity_id,
            "Audit event"
        );
        self.entries.insert(entry.id, entry.clone());
        entry
    }

    /// Entries for one tenant, newest first.
    pub fn list_for_tenant(&self, tenant_id: i64, limit: usize) -> Vec<AuditEntry> {
        let mut entries: Vec<AuditEntry> = self
            .entries
            .iter()
            .filter(|e| e.tenant_id == tenant_id)
            .map(|e| e.value().clone())
            .collect();
        entries.sort_by(|a, b| b.id.cmp(&a.id));
        entries.truncate(limit);
        entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
