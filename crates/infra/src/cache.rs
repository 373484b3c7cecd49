//! Short-lived cache of ERP line snapshots.
//!
//! Snapshots are display data; a stale entry is dropped on read rather than
//! served. Only successful lookups are cached.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;

use tokio::time::Instant;

use forgewms_core::TenantId;
use forgewms_erp::LineMatch;
use forgewms_warehouse::ExternalOrderRef;

#[derive(Debug, Clone)]
struct Entry {
    value: LineMatch,
    stored_at: Instant,
}

#[derive(Debug)]
struct Entries {
    map: HashMap<(TenantId, ExternalOrderRef), Entry>,
    last_sweep: Instant,
}

impl Entries {
    /// Drop every expired entry, at most once per TTL period.
    fn sweep_if_due(&mut self, ttl: Duration) {
        if self.last_sweep.elapsed() < ttl {
            return;
        }
        let before = self.map.len();
        self.map.retain(|_, e| e.stored_at.elapsed() < ttl);
        self.last_sweep = Instant::now();
        let dropped = before - self.map.len();
        if dropped > 0 {
            tracing::debug!(dropped, remaining = self.map.len(), "expired snapshots swept");
        }
    }
}

/// TTL cache keyed by tenant and external line.
///
/// Expired entries are never served. Besides being dropped when read, they are
/// swept in bulk once per TTL period, so keys that are never read again do
/// not accumulate.
#[derive(Debug)]
pub struct SnapshotCache {
    ttl: Duration,
    entries: RwLock<Entries>,
}

impl SnapshotCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(Entries {
                map: HashMap::new(),
                last_sweep: Instant::now(),
            }),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn get(&self, tenant_id: TenantId, key: &ExternalOrderRef) -> Option<LineMatch> {
        let cache_key = (tenant_id, key.clone());
        {
            let entries = self.entries.read().ok()?;
            match entries.map.get(&cache_key) {
                Some(entry) if entry.stored_at.elapsed() < self.ttl => {
                    return Some(entry.value.clone());
                }
                None if entries.last_sweep.elapsed() < self.ttl => return None,
                _ => {}
            }
        }

        if let Ok(mut entries) = self.entries.write() {
            if entries
                .map
                .get(&cache_key)
                .is_some_and(|e| e.stored_at.elapsed() >= self.ttl)
            {
                entries.map.remove(&cache_key);
            }
            entries.sweep_if_due(self.ttl);
        }
        None
    }

    pub fn put(&self, tenant_id: TenantId, key: ExternalOrderRef, value: LineMatch) {
        if self.ttl.is_zero() {
            return;
        }
        if let Ok(mut entries) = self.entries.write() {
            entries.sweep_if_due(self.ttl);
            entries.map.insert(
                (tenant_id, key),
                Entry {
                    value,
                    stored_at: Instant::now(),
                },
            );
        }
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.map.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
