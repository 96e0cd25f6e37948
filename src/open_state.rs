//! Open-state tracker: file-open intents used for NFSv4 share reservations,
//! distinct from the byte-range locks `lock_manager` tracks.
//!
//! Grounded on `original_source/include/simple_nfsd/file_access_tracker.hpp`'s
//! `FileAccessTracker`/`FileOpenState`/`FileAccessMode`/`FileSharingMode`,
//! translated from a `std::map<uint32_t, FileOpenState>` + mutex into the
//! same `Mutex<HashMap<...>>` shape used by `lock_manager::LockManager` and
//! the Portmapper's `PortmapTable`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum AccessMode {
    ReadOnly,
    WriteOnly,
    ReadWrite,
    Append,
}

impl AccessMode {
    /// Writeish access is anything that could observe or create a write
    /// conflict: WRITE, RW, and APPEND.
    fn is_writeish(self) -> bool {
        !matches!(self, AccessMode::ReadOnly)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SharingMode {
    Exclusive,
    SharedRead,
    SharedWrite,
    SharedAll,
}

impl SharingMode {
    /// Whether this open permits another open to write concurrently.
    fn permits_write_sharing(self) -> bool {
        matches!(self, SharingMode::SharedWrite | SharingMode::SharedAll)
    }
}

#[derive(Clone, Debug)]
pub struct FileOpenState {
    pub open_id: u32,
    pub file_path: String,
    pub client_id: u32,
    pub process_id: u32,
    pub access_mode: AccessMode,
    pub sharing_mode: SharingMode,
    pub opened_at: Instant,
    pub last_accessed: Instant,
}

pub enum OpenOutcome {
    Granted(u32),
    Conflict,
}

pub struct OpenStateTracker {
    lease: Duration,
    next_id: AtomicU32,
    opens: Mutex<HashMap<u32, FileOpenState>>,
}

impl OpenStateTracker {
    pub fn new(lease: Duration) -> Self {
        Self { lease, next_id: AtomicU32::new(1), opens: Mutex::new(HashMap::new()) }
    }

    fn evict_stale(opens: &mut HashMap<u32, FileOpenState>, lease: Duration, now: Instant) {
        opens.retain(|_, open| now.duration_since(open.last_accessed) < lease);
    }

    /// Conflict rule, evaluated against every existing open of the same
    /// file: same client is always an upgrade; otherwise either side being
    /// EXCLUSIVE conflicts, and two writeish opens conflict unless at least
    /// one permits write sharing.
    fn conflicts(
        existing: &FileOpenState,
        client_id: u32,
        access_mode: AccessMode,
        sharing_mode: SharingMode,
    ) -> bool {
        if existing.client_id == client_id {
            return false;
        }
        if existing.sharing_mode == SharingMode::Exclusive || sharing_mode == SharingMode::Exclusive {
            return true;
        }
        if existing.access_mode.is_writeish()
            && access_mode.is_writeish()
            && !existing.sharing_mode.permits_write_sharing()
            && !sharing_mode.permits_write_sharing()
        {
            return true;
        }
        false
    }

    /// `open(file, client, process, access, share)`: expires stale entries,
    /// checks every existing open of the same file against the conflict
    /// rule above, and on success installs a new entry (or, for a same-client
    /// reopen of the same file, accepts the upgrade without adding a second
    /// entry).
    pub fn open(
        &self,
        file_path: &str,
        client_id: u32,
        process_id: u32,
        access_mode: AccessMode,
        sharing_mode: SharingMode,
    ) -> OpenOutcome {
        let now = Instant::now();
        let mut opens = self.opens.lock().expect("open-state tracker poisoned");
        Self::evict_stale(&mut opens, self.lease, now);

        for existing in opens.values() {
            if existing.file_path != file_path {
                continue;
            }
            if Self::conflicts(existing, client_id, access_mode, sharing_mode) {
                return OpenOutcome::Conflict;
            }
        }

        if let Some(existing) = opens.values_mut().find(|open| {
            open.file_path == file_path && open.client_id == client_id && open.process_id == process_id
        }) {
            existing.access_mode = access_mode;
            existing.sharing_mode = sharing_mode;
            existing.last_accessed = now;
            return OpenOutcome::Granted(existing.open_id);
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        opens.insert(
            id,
            FileOpenState {
                open_id: id,
                file_path: file_path.to_string(),
                client_id,
                process_id,
                access_mode,
                sharing_mode,
                opened_at: now,
                last_accessed: now,
            },
        );
        OpenOutcome::Granted(id)
    }

    /// Verifies ownership before removal.
    pub fn close(&self, open_id: u32, client_id: u32) -> bool {
        let mut opens = self.opens.lock().expect("open-state tracker poisoned");
        match opens.get(&open_id) {
            Some(open) if open.client_id == client_id => {
                opens.remove(&open_id);
                true
            }
            _ => false,
        }
    }

    /// Sweeps every open belonging to `client_id`, e.g. on disconnect.
    pub fn close_by_client(&self, client_id: u32) -> usize {
        let mut opens = self.opens.lock().expect("open-state tracker poisoned");
        let before = opens.len();
        opens.retain(|_, open| open.client_id != client_id);
        before - opens.len()
    }

    pub fn is_open(&self, file_path: &str) -> bool {
        self.opens
            .lock()
            .expect("open-state tracker poisoned")
            .values()
            .any(|open| open.file_path == file_path)
    }

    pub fn open_count(&self) -> usize {
        self.opens.lock().expect("open-state tracker poisoned").len()
    }

    pub fn cleanup_expired(&self) {
        let now = Instant::now();
        let mut opens = self.opens.lock().expect("open-state tracker poisoned");
        Self::evict_stale(&mut opens, self.lease, now);
    }
}

impl Default for OpenStateTracker {
    fn default() -> Self {
        Self::new(Duration::from_secs(300))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_client_reopen_upgrades_instead_of_conflicting() {
        let tracker = OpenStateTracker::default();
        let a = match tracker.open("f", 1, 100, AccessMode::ReadOnly, SharingMode::SharedRead) {
            OpenOutcome::Granted(id) => id,
            _ => panic!("expected grant"),
        };
        let b = match tracker.open("f", 1, 100, AccessMode::ReadWrite, SharingMode::SharedAll) {
            OpenOutcome::Granted(id) => id,
            _ => panic!("expected grant"),
        };
        assert_eq!(a, b);
        assert_eq!(tracker.open_count(), 1);
    }

    #[test]
    fn exclusive_share_conflicts_with_any_other_client() {
        let tracker = OpenStateTracker::default();
        tracker.open("f", 1, 100, AccessMode::ReadOnly, SharingMode::Exclusive);
        assert!(matches!(
            tracker.open("f", 2, 200, AccessMode::ReadOnly, SharingMode::SharedRead),
            OpenOutcome::Conflict
        ));
    }

    #[test]
    fn two_writers_without_write_sharing_conflict() {
        let tracker = OpenStateTracker::default();
        tracker.open("f", 1, 100, AccessMode::WriteOnly, SharingMode::SharedRead);
        assert!(matches!(
            tracker.open("f", 2, 200, AccessMode::WriteOnly, SharingMode::SharedRead),
            OpenOutcome::Conflict
        ));
    }

    #[test]
    fn writers_with_shared_write_do_not_conflict() {
        let tracker = OpenStateTracker::default();
        tracker.open("f", 1, 100, AccessMode::WriteOnly, SharingMode::SharedWrite);
        assert!(matches!(
            tracker.open("f", 2, 200, AccessMode::WriteOnly, SharingMode::SharedWrite),
            OpenOutcome::Granted(_)
        ));
    }

    #[test]
    fn close_requires_matching_client() {
        let tracker = OpenStateTracker::default();
        let id = match tracker.open("f", 1, 100, AccessMode::ReadOnly, SharingMode::SharedRead) {
            OpenOutcome::Granted(id) => id,
            _ => panic!("expected grant"),
        };
        assert!(!tracker.close(id, 2));
        assert!(tracker.close(id, 1));
    }

    #[test]
    fn close_by_client_sweeps_every_open() {
        let tracker = OpenStateTracker::default();
        tracker.open("f", 1, 100, AccessMode::ReadOnly, SharingMode::SharedRead);
        tracker.open("g", 1, 101, AccessMode::ReadOnly, SharingMode::SharedRead);
        assert_eq!(tracker.close_by_client(1), 2);
        assert_eq!(tracker.open_count(), 0);
    }
}
