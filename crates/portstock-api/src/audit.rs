//! # Audit Trail
//!
//! Tamper-evident log of every mutation. Each entry's SHA-256 hash covers
//! the previous entry's hash and the entry's own fields, so editing or
//! deleting a row breaks every link after it. [`AuditTrail::verify`]
//! recomputes the chain.
//!
//! Entries are appended in memory after the mutation they describe has
//! been persisted, then written to `audit_events` when a database is
//! configured. A failed audit write is logged and does not undo the
//! mutation.

use std::sync::Arc;

use chrono::{DateTime, SubsecRound, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::state::AppState;

/// Hash preceding the first entry.
pub const GENESIS_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";

/// One audit entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditEntry {
    pub id: Uuid,
    pub sequence: i64,
    pub actor: String,
    pub action: String,
    pub resource_type: String,
    pub resource_id: Uuid,
    pub detail: serde_json::Value,
    pub previous_hash: String,
    pub event_hash: String,
    pub created_at: DateTime<Utc>,
}

impl AuditEntry {
    fn compute_hash(&self) -> String {
        let sequence = self.sequence.to_string();
        let resource_id = self.resource_id.to_string();
        let detail = self.detail.to_string();
        let created_at = self.created_at.to_rfc3339();
        let mut hasher = Sha256::new();
        for part in [
            self.previous_hash.as_str(),
            sequence.as_str(),
            self.actor.as_str(),
            self.action.as_str(),
            self.resource_type.as_str(),
            resource_id.as_str(),
            detail.as_str(),
            created_at.as_str(),
        ] {
            hasher.update(part.as_bytes());
            hasher.update([0x1f]);
        }
        hasher
            .finalize()
            .iter()
            .map(|b| format!("{b:02x}"))
            .collect()
    }
}

/// Result of [`AuditTrail::verify`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChainIntegrity {
    pub total_events: usize,
    /// Sequence numbers whose link or hash does not check out.
    pub broken: Vec<i64>,
}

impl ChainIntegrity {
    pub fn is_valid(&self) -> bool {
        self.broken.is_empty()
    }
}

/// In-memory audit chain.
#[derive(Debug, Clone, Default)]
pub struct AuditTrail {
    entries: Arc<RwLock<Vec<AuditEntry>>>,
}

impl AuditTrail {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry linked to the current head.
    pub fn append(
        &self,
        actor: &str,
        action: &str,
        resource_type: &str,
        resource_id: Uuid,
        detail: serde_json::Value,
    ) -> AuditEntry {
        let mut entries = self.entries.write();
        let (previous_hash, sequence) = match entries.last() {
            Some(last) => (last.event_hash.clone(), last.sequence + 1),
            None => (GENESIS_HASH.to_string(), 1),
        };
        let mut entry = AuditEntry {
            id: Uuid::new_v4(),
            sequence,
            actor: actor.to_string(),
            action: action.to_string(),
            resource_type: resource_type.to_string(),
            resource_id,
            detail,
            previous_hash,
            event_hash: String::new(),
            // Postgres keeps microseconds; the hash must survive a round trip.
            created_at: Utc::now().trunc_subsecs(6),
        };
        entry.event_hash = entry.compute_hash();
        entries.push(entry.clone());
        entry
    }

    /// Replace the chain with entries loaded from the database.
    pub fn restore(&self, mut loaded: Vec<AuditEntry>) {
        loaded.sort_by_key(|e| e.sequence);
        *self.entries.write() = loaded;
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Most recent entries first, optionally narrowed to one resource type.
    pub fn recent(&self, limit: usize, resource_type: Option<&str>) -> Vec<AuditEntry> {
        self.entries
            .read()
            .iter()
            .rev()
            .filter(|e| resource_type.map_or(true, |t| e.resource_type == t))
            .take(limit)
            .cloned()
            .collect()
    }

    /// Entries about one resource, oldest first.
    pub fn for_resource(&self, resource_id: Uuid) -> Vec<AuditEntry> {
        self.entries
            .read()
            .iter()
            .filter(|e| e.resource_id == resource_id)
            .cloned()
            .collect()
    }

    /// Recompute every hash and link.
    pub fn verify(&self) -> ChainIntegrity {
        let entries = self.entries.read();
        let mut broken = Vec::new();
        let mut expected_prev: &str = GENESIS_HASH;
        for entry in entries.iter() {
            if entry.previous_hash != expected_prev || entry.compute_hash() != entry.event_hash {
                broken.push(entry.sequence);
            }
            expected_prev = &entry.event_hash;
        }
        ChainIntegrity {
            total_events: entries.len(),
            broken,
        }
    }

    #[cfg(test)]
    fn tamper(&self, index: usize, f: impl FnOnce(&mut AuditEntry)) {
        if let Some(e) = self.entries.write().get_mut(index) {
            f(e);
        }
    }
}

/// Append an audit entry and persist it when a database is configured.
pub async fn record(
    state: &AppState,
    actor: &str,
    action: &str,
    resource_type: &str,
    resource_id: Uuid,
    detail: serde_json::Value,
) {
    let entry = state
        .audit
        .append(actor, action, resource_type, resource_id, detail);
    tracing::debug!(
        sequence = entry.sequence,
        actor,
        action,
        resource_type,
        %resource_id,
        "audit event"
    );
    if let Some(pool) = &state.db_pool {
        if let Err(e) = crate::db::audit::insert(pool, &entry).await {
            tracing::error!(
                sequence = entry.sequence,
                action,
                error = %e,
                "failed to persist audit event"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn trail_with(n: usize) -> AuditTrail {
        let trail = AuditTrail::new();
        for i in 0..n {
            trail.append("admin", "item.create", "item", Uuid::new_v4(), json!({ "n": i }));
        }
        trail
    }

    #[test]
    fn chain_links_entries() {
        let trail = trail_with(3);
        let entries = trail.recent(10, None);
        assert_eq!(entries.len(), 3);
        // recent() is newest first.
        assert_eq!(entries[0].previous_hash, entries[1].event_hash);
        assert_eq!(entries[2].previous_hash, GENESIS_HASH);
        assert_eq!(entries[0].sequence, 3);
        assert!(trail.verify().is_valid());
    }

    #[test]
    fn editing_an_entry_is_detected() {
        let trail = trail_with(4);
        trail.tamper(1, |e| e.actor = "someone-else".into());
        let result = trail.verify();
        assert!(!result.is_valid());
        assert_eq!(result.broken, vec![2]);
    }

    #[test]
    fn deleting_an_entry_is_detected() {
        let trail = trail_with(4);
        let mut kept = trail.recent(10, None);
        kept.remove(2); // sequence 2
        trail.restore(kept);
        let result = trail.verify();
        assert_eq!(result.total_events, 3);
        assert_eq!(result.broken, vec![3]);
    }

    #[test]
    fn recent_filters_by_resource_type() {
        let trail = trail_with(2);
        let user = Uuid::new_v4();
        trail.append("admin", "user.create", "user", user, json!({}));
        assert_eq!(trail.recent(10, Some("user")).len(), 1);
        assert_eq!(trail.for_resource(user).len(), 1);
        assert_eq!(trail.recent(1, None)[0].action, "user.create");
    }

    #[test]
    fn restore_orders_by_sequence() {
        let trail = trail_with(3);
        let reversed = trail.recent(10, None);
        let copy = AuditTrail::new();
        copy.restore(reversed);
        assert!(copy.verify().is_valid());
    }
}
