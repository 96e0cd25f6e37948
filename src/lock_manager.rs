//! Byte-range advisory lock manager with NLM (Network Lock Manager) semantics:
//! shared/exclusive ranges, conflict detection, owner-scoped release, and
//! lease expiry.
//!
//! Grounded on `original_source/include/simple_nfsd/lock_manager.hpp`'s
//! `LockManager`/`FileLock`/`LockOwner` and its `nlmTest`/`nlmLock`/
//! `nlmUnlock` wrappers, translated from a `std::map<uint32_t, FileLock>` +
//! mutex into a `Mutex<HashMap<u32, FileLock>>`, matching the single-lock
//! shape `src/protocol/nfs/portmap/mod.rs`'s `PortmapTable` already uses for
//! its own keyed map.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Default lease for a lock acquired through the core API (24 hours).
pub const DEFAULT_LEASE: Duration = Duration::from_secs(24 * 3600);

/// Default lease for a lock acquired on NLM's behalf - NLM clients renew far
/// more aggressively than the core API assumes, so a short lease here bounds
/// how long a crashed client's lock lingers.
pub const NLM_LEASE: Duration = Duration::from_secs(30);

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum LockType {
    /// Multiple readers allowed.
    Shared,
    /// Only one writer allowed.
    Exclusive,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct LockOwner {
    pub client_id: u32,
    pub process_id: u32,
    pub client_address: String,
}

#[derive(Clone, Debug)]
pub struct FileLock {
    pub lock_id: u32,
    pub file_id: String,
    pub lock_type: LockType,
    /// Start offset.
    pub offset: u64,
    /// Length of the lock; 0 means "to end of file".
    pub length: u64,
    pub owner: LockOwner,
    pub acquired_at: Instant,
    pub expires_at: Instant,
}

impl FileLock {
    fn end(&self) -> u64 {
        if self.length == 0 {
            u64::MAX
        } else {
            self.offset.saturating_add(self.length)
        }
    }

    /// Two locks overlap iff they reference the same file and their byte
    /// ranges intersect: `a.end > b.start && b.end > a.start`.
    pub fn overlaps(&self, other: &FileLock) -> bool {
        self.file_id == other.file_id && self.end() > other.offset && other.end() > self.offset
    }

    /// Two locks conflict iff they overlap, belong to distinct owners, and at
    /// least one is exclusive. Same-owner overlapping locks never conflict:
    /// that's an upgrade or downgrade, not a contention.
    pub fn conflicts(&self, other: &FileLock) -> bool {
        self.owner != other.owner
            && self.overlaps(other)
            && (self.lock_type == LockType::Exclusive || other.lock_type == LockType::Exclusive)
    }

    fn is_expired(&self, now: Instant) -> bool {
        now > self.expires_at
    }
}

pub enum LockOutcome {
    Granted(u32),
    Conflict(FileLock),
}

pub struct LockManager {
    lease: Duration,
    next_id: AtomicU32,
    locks: Mutex<HashMap<u32, FileLock>>,
}

impl LockManager {
    pub fn new(lease: Duration) -> Self {
        Self { lease, next_id: AtomicU32::new(1), locks: Mutex::new(HashMap::new()) }
    }

    fn evict_expired(locks: &mut HashMap<u32, FileLock>, now: Instant) {
        locks.retain(|_, lock| !lock.is_expired(now));
    }

    /// Evaluates conflicts against all non-expired locks with different
    /// owners; same-owner overlapping locks are allowed. On success installs
    /// the lock with `expires_at = now + lease`.
    pub fn acquire(
        &self,
        file_id: &str,
        lock_type: LockType,
        offset: u64,
        length: u64,
        owner: LockOwner,
    ) -> LockOutcome {
        let now = Instant::now();
        let mut locks = self.locks.lock().expect("lock manager poisoned");
        Self::evict_expired(&mut locks, now);

        let candidate = FileLock {
            lock_id: 0,
            file_id: file_id.to_string(),
            lock_type,
            offset,
            length,
            owner,
            acquired_at: now,
            expires_at: now + self.lease,
        };
        if let Some(conflicting) = locks.values().find(|existing| candidate.conflicts(existing)) {
            return LockOutcome::Conflict(conflicting.clone());
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut installed = candidate;
        installed.lock_id = id;
        locks.insert(id, installed);
        LockOutcome::Granted(id)
    }

    /// Ownership is verified; a mismatched owner (or unknown id) fails
    /// silently by returning `false` rather than erroring.
    pub fn release(&self, lock_id: u32, owner: &LockOwner) -> bool {
        let mut locks = self.locks.lock().expect("lock manager poisoned");
        match locks.get(&lock_id) {
            Some(lock) if &lock.owner == owner => {
                locks.remove(&lock_id);
                true
            }
            _ => false,
        }
    }

    /// Removes every lock matching the owner - invoked on client crash
    /// detection. Returns the number of locks released.
    pub fn release_by_owner(&self, owner: &LockOwner) -> usize {
        let mut locks = self.locks.lock().expect("lock manager poisoned");
        let before = locks.len();
        locks.retain(|_, lock| &lock.owner != owner);
        before - locks.len()
    }

    /// Releases every one of `owner`'s locks that overlaps `[offset, offset+length)`.
    pub fn release_range(&self, file_id: &str, offset: u64, length: u64, owner: &LockOwner) -> usize {
        let probe = FileLock {
            lock_id: 0,
            file_id: file_id.to_string(),
            lock_type: LockType::Shared,
            offset,
            length,
            owner: owner.clone(),
            acquired_at: Instant::now(),
            expires_at: Instant::now(),
        };
        let mut locks = self.locks.lock().expect("lock manager poisoned");
        let before = locks.len();
        locks.retain(|_, lock| !(&lock.owner == owner && lock.overlaps(&probe)));
        before - locks.len()
    }

    /// Non-blocking probe used by NLM_TEST: returns the first conflicting
    /// lock, if any, without installing anything.
    pub fn test(
        &self,
        file_id: &str,
        lock_type: LockType,
        offset: u64,
        length: u64,
        owner: &LockOwner,
    ) -> Option<FileLock> {
        let now = Instant::now();
        let candidate = FileLock {
            lock_id: 0,
            file_id: file_id.to_string(),
            lock_type,
            offset,
            length,
            owner: owner.clone(),
            acquired_at: now,
            expires_at: now,
        };
        let locks = self.locks.lock().expect("lock manager poisoned");
        locks
            .values()
            .filter(|existing| !existing.is_expired(now))
            .find(|existing| candidate.conflicts(existing))
            .cloned()
    }

    pub fn cleanup_expired(&self) {
        let now = Instant::now();
        let mut locks = self.locks.lock().expect("lock manager poisoned");
        Self::evict_expired(&mut locks, now);
    }

    pub fn clear_all(&self) {
        self.locks.lock().expect("lock manager poisoned").clear();
    }

    pub fn lock_count(&self) -> usize {
        self.locks.lock().expect("lock manager poisoned").len()
    }

    pub fn locks_for_file(&self, file_id: &str) -> Vec<FileLock> {
        self.locks
            .lock()
            .expect("lock manager poisoned")
            .values()
            .filter(|lock| lock.file_id == file_id)
            .cloned()
            .collect()
    }
}

impl Default for LockManager {
    fn default() -> Self {
        Self::new(DEFAULT_LEASE)
    }
}

/// NLM sideband entry points, using the short NLM lease rather than the core
/// API's default so a crashed NLM client's locks expire promptly.
pub struct NlmLockManager {
    inner: LockManager,
}

impl NlmLockManager {
    pub fn new() -> Self {
        Self { inner: LockManager::new(NLM_LEASE) }
    }

    pub fn nlm_test(
        &self,
        file_id: &str,
        lock_type: LockType,
        offset: u64,
        length: u64,
        owner: &LockOwner,
    ) -> Option<FileLock> {
        self.inner.test(file_id, lock_type, offset, length, owner)
    }

    pub fn nlm_lock(
        &self,
        file_id: &str,
        lock_type: LockType,
        offset: u64,
        length: u64,
        owner: LockOwner,
    ) -> LockOutcome {
        self.inner.acquire(file_id, lock_type, offset, length, owner)
    }

    pub fn nlm_unlock(&self, file_id: &str, offset: u64, length: u64, owner: &LockOwner) -> bool {
        self.inner.release_range(file_id, offset, length, owner) > 0
    }
}

impl Default for NlmLockManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn owner(client_id: u32) -> LockOwner {
        LockOwner { client_id, process_id: 1, client_address: "10.0.0.1".to_string() }
    }

    #[test]
    fn exclusive_locks_from_different_owners_conflict() {
        let mgr = LockManager::default();
        let a = mgr.acquire("f", LockType::Exclusive, 0, 100, owner(1));
        assert!(matches!(a, LockOutcome::Granted(_)));
        let b = mgr.acquire("f", LockType::Shared, 50, 100, owner(2));
        assert!(matches!(b, LockOutcome::Conflict(_)));
    }

    #[test]
    fn shared_locks_from_different_owners_coexist() {
        let mgr = LockManager::default();
        assert!(matches!(mgr.acquire("f", LockType::Shared, 0, 10, owner(1)), LockOutcome::Granted(_)));
        assert!(matches!(mgr.acquire("f", LockType::Shared, 5, 10, owner(2)), LockOutcome::Granted(_)));
    }

    #[test]
    fn same_owner_overlap_is_allowed() {
        let mgr = LockManager::default();
        assert!(matches!(mgr.acquire("f", LockType::Exclusive, 0, 10, owner(1)), LockOutcome::Granted(_)));
        assert!(matches!(mgr.acquire("f", LockType::Exclusive, 5, 10, owner(1)), LockOutcome::Granted(_)));
    }

    #[test]
    fn release_requires_matching_owner() {
        let mgr = LockManager::default();
        let id = match mgr.acquire("f", LockType::Exclusive, 0, 10, owner(1)) {
            LockOutcome::Granted(id) => id,
            _ => panic!("expected grant"),
        };
        assert!(!mgr.release(id, &owner(2)));
        assert!(mgr.release(id, &owner(1)));
        assert!(!mgr.release(id, &owner(1)), "second release is idempotent and returns false");
    }

    #[test]
    fn zero_length_lock_covers_to_end_of_file() {
        let mgr = LockManager::default();
        assert!(matches!(mgr.acquire("f", LockType::Exclusive, 0, 0, owner(1)), LockOutcome::Granted(_)));
        let conflict = mgr.test("f", LockType::Shared, 1_000_000, 10, &owner(2));
        assert!(conflict.is_some());
    }

    #[test]
    fn release_by_owner_clears_every_lock_for_that_owner() {
        let mgr = LockManager::default();
        mgr.acquire("f", LockType::Shared, 0, 10, owner(1));
        mgr.acquire("g", LockType::Shared, 0, 10, owner(1));
        mgr.acquire("f", LockType::Shared, 20, 10, owner(2));
        assert_eq!(mgr.release_by_owner(&owner(1)), 2);
        assert_eq!(mgr.lock_count(), 1);
    }

    #[test]
    fn expired_locks_do_not_conflict() {
        let mgr = LockManager::new(Duration::from_millis(0));
        mgr.acquire("f", LockType::Exclusive, 0, 10, owner(1));
        std::thread::sleep(Duration::from_millis(5));
        assert!(mgr.test("f", LockType::Exclusive, 0, 10, &owner(2)).is_none());
    }
}
