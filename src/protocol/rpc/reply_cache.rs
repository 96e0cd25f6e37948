//! Reply cache for UDP transport idempotency.
//!
//! UDP has no record marking and no connection state, so an RPC call retried
//! over UDP (because the client's timeout elapsed before the reply arrived)
//! cannot be distinguished from a fresh call by [`TransactionTracker`](super::TransactionTracker)
//! alone, which only records pass/fail of processing - not the reply bytes.
//! `ReplyCache` stores the last reply sent for a given (xid, client address)
//! pair so a retransmitted non-idempotent call (WRITE, CREATE, REMOVE, ...)
//! can be answered from cache instead of re-executed.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, SystemTime};

/// Caches RPC replies keyed by (xid, client address) so UDP retransmissions
/// can be answered without reprocessing the call.
pub struct ReplyCache {
    retention_period: Duration,
    entries: Mutex<HashMap<(u32, String), CachedReply>>,
}

struct CachedReply {
    reply: Vec<u8>,
    recorded_at: SystemTime,
}

impl ReplyCache {
    /// Creates a new reply cache that retains entries for `retention_period`.
    pub fn new(retention_period: Duration) -> Self {
        Self {
            retention_period,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Returns a previously cached reply for this (xid, client) pair, if any.
    pub fn get(&self, xid: u32, client_addr: &str) -> Option<Vec<u8>> {
        let entries = self.entries.lock().expect("unable to lock reply cache");
        entries.get(&(xid, client_addr.to_string())).map(|c| c.reply.clone())
    }

    /// Records the reply sent for this (xid, client) pair, evicting expired entries.
    pub fn insert(&self, xid: u32, client_addr: &str, reply: Vec<u8>) {
        let mut entries = self.entries.lock().expect("unable to lock reply cache");
        let cutoff = SystemTime::now() - self.retention_period;
        entries.retain(|_, v| v.recorded_at >= cutoff);
        entries.insert(
            (xid, client_addr.to_string()),
            CachedReply { reply, recorded_at: SystemTime::now() },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn caches_and_returns_reply() {
        let cache = ReplyCache::new(Duration::from_secs(60));
        assert!(cache.get(1, "127.0.0.1:111").is_none());
        cache.insert(1, "127.0.0.1:111", vec![1, 2, 3]);
        assert_eq!(cache.get(1, "127.0.0.1:111"), Some(vec![1, 2, 3]));
        assert!(cache.get(1, "127.0.0.1:222").is_none());
    }

    #[test]
    fn expired_entries_are_evicted() {
        let cache = ReplyCache::new(Duration::from_millis(0));
        cache.insert(1, "127.0.0.1:111", vec![1]);
        std::thread::sleep(Duration::from_millis(5));
        cache.insert(2, "127.0.0.1:111", vec![2]);
        assert!(cache.get(1, "127.0.0.1:111").is_none());
    }
}
