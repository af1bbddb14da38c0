use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::error::Result;
use crate::ratelimit::RateLimit;

/// Extra time a cell may sit past its window expiry before the sweep
/// reclaims it.
const SWEEP_GRACE: Duration = Duration::from_secs(10);

/// Keyed factory/cache of [`RateLimit`] cells.
///
/// Cells are addressed by an ordered list of string descriptors plus the
/// limit spec itself, so the same descriptor prefix can carry differently
/// configured limits without collision. Identical keys always resolve to
/// the same cell instance; callers rely on that for shared-state counting.
pub struct RateLimitManager {
    cells: DashMap<Vec<String>, Arc<RateLimit>, ahash::RandomState>,
    created: AtomicU64,
    swept: AtomicU64,
}

impl RateLimitManager {
    pub fn new() -> Self {
        Self {
            cells: DashMap::with_hasher(ahash::RandomState::new()),
            created: AtomicU64::new(0),
            swept: AtomicU64::new(0),
        }
    }

    fn key(spec: &str, descriptors: &[&str]) -> Vec<String> {
        let mut key: Vec<String> = descriptors.iter().map(|d| d.to_string()).collect();
        key.push(spec.to_string());
        key
    }

    /// Memoized lookup/creation of the cell for `(descriptors, spec)`.
    pub fn get(&self, spec: &str, descriptors: &[&str]) -> Result<Arc<RateLimit>> {
        let key = Self::key(spec, descriptors);
        if let Some(cell) = self.cells.get(&key) {
            return Ok(cell.clone());
        }

        // Parse outside the entry closure so a bad spec never inserts.
        let cell = Arc::new(RateLimit::from_spec(spec)?);
        let entry = self
            .cells
            .entry(key)
            .or_insert_with(|| {
                self.created.fetch_add(1, Ordering::Relaxed);
                cell
            })
            .clone();
        Ok(entry)
    }

    /// Sugar for `get(...).call()`.
    pub fn call(&self, spec: &str, descriptors: &[&str]) -> Result<bool> {
        Ok(self.get(spec, descriptors)?.call())
    }

    /// Removes every cell expired beyond its window plus a 10 s grace.
    ///
    /// Returns the number of cells removed. The store is a flat map, so
    /// this is a single linear scan.
    pub fn sweep(&self) -> usize {
        let mut removed = 0usize;
        self.cells.retain(|_, cell| {
            if cell.expired_for(SWEEP_GRACE) {
                removed += 1;
                false
            } else {
                true
            }
        });
        if removed > 0 {
            self.swept.fetch_add(removed as u64, Ordering::Relaxed);
            debug!(removed, remaining = self.cells.len(), "swept rate limit cells");
        }
        removed
    }

    /// Spawns the periodic sweep task. The task stops when the returned
    /// handle is aborted or dropped by its owner.
    pub fn start_sweeper(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                manager.sweep();
            }
        })
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn stats(&self) -> ManagerStats {
        ManagerStats {
            active: self.cells.len(),
            created: self.created.load(Ordering::Relaxed),
            swept: self.swept.load(Ordering::Relaxed),
        }
    }
}

impl Default for RateLimitManager {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for RateLimitManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimitManager")
            .field("active", &self.cells.len())
            .finish()
    }
}

/// Lifetime counters for the manager, for host metrics and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ManagerStats {
    pub active: usize,
    pub created: u64,
    pub swept: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_keys_share_one_cell() {
        let manager = RateLimitManager::new();
        let a = manager.get("2/10s", &["user1", "ping"]).unwrap();
        let b = manager.get("2/10s", &["user1", "ping"]).unwrap();
        let c = manager.get("2/10s", &["user1", "pong"]).unwrap();

        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
        assert_eq!(manager.len(), 2);
    }

    #[test]
    fn spec_is_part_of_the_key() {
        let manager = RateLimitManager::new();
        let a = manager.get("2/10s", &["user1"]).unwrap();
        let b = manager.get("5/10s", &["user1"]).unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn shared_cell_counts_across_lookups() {
        let manager = RateLimitManager::new();
        assert!(manager.call("2/10s", &["u", "cmd"]).unwrap());
        assert!(manager.call("2/10s", &["u", "cmd"]).unwrap());
        assert!(!manager.call("2/10s", &["u", "cmd"]).unwrap());
    }

    #[test]
    fn bad_spec_inserts_nothing() {
        let manager = RateLimitManager::new();
        assert!(manager.get("nope", &["u"]).is_err());
        assert!(manager.is_empty());
    }

    #[test]
    fn sweep_reclaims_only_long_expired_cells() {
        let manager = RateLimitManager::new();
        manager.call("1/10m", &["fresh"]).unwrap();
        assert_eq!(manager.sweep(), 0);
        assert_eq!(manager.len(), 1);
    }

    #[tokio::test]
    async fn sweeper_task_runs_periodically() {
        let manager = Arc::new(RateLimitManager::new());
        manager.get("1/10m", &["idle"]).unwrap();

        let handle = manager.start_sweeper(Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(35)).await;
        handle.abort();

        // Cell is inside its window; the task ran but must not remove it.
        assert_eq!(manager.len(), 1);
        assert_eq!(manager.stats().swept, 0);
    }
}
