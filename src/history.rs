//! History Log: bounded, append-only execution records per request
//!
//! Entries are kept newest-first. When a request exceeds the capacity its
//! oldest entry is evicted; eviction is the only way an entry disappears.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::collection::NodeId;
use crate::models::HistoryEntry;

pub type SharedHistory = Arc<Mutex<HistoryLog>>;

#[derive(Debug)]
pub struct HistoryLog {
    capacity: usize,
    entries: HashMap<NodeId, VecDeque<Arc<HistoryEntry>>>,
}

impl HistoryLog {
    /// A capacity of zero is treated as one
    pub fn new(capacity: usize) -> Self {
        HistoryLog {
            capacity: capacity.max(1),
            entries: HashMap::new(),
        }
    }

    pub fn into_shared(self) -> SharedHistory {
        Arc::new(Mutex::new(self))
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Add entry to history
    pub fn append(&mut self, entry: HistoryEntry) -> Arc<HistoryEntry> {
        let entry = Arc::new(entry);
        let list = self.entries.entry(entry.request_id).or_default();
        list.push_front(Arc::clone(&entry));
        while list.len() > self.capacity {
            list.pop_back();
        }
        entry
    }

    /// Entries for a request, newest first
    pub fn list(&self, request_id: NodeId) -> Vec<Arc<HistoryEntry>> {
        self.entries
            .get(&request_id)
            .map(|list| list.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Get history item by index (0 = most recent)
    pub fn get(&self, request_id: NodeId, index: usize) -> Option<Arc<HistoryEntry>> {
        self.entries.get(&request_id)?.get(index).cloned()
    }

    pub fn latest(&self, request_id: NodeId) -> Option<Arc<HistoryEntry>> {
        self.get(request_id, 0)
    }

    pub fn len(&self, request_id: NodeId) -> usize {
        self.entries.get(&request_id).map_or(0, VecDeque::len)
    }

    pub fn total_len(&self) -> usize {
        self.entries.values().map(VecDeque::len).sum()
    }
}

/// Lock the log for a single short operation; never hold across an await
pub fn lock_history(history: &SharedHistory) -> MutexGuard<'_, HistoryLog> {
    history.lock().unwrap_or_else(PoisonError::into_inner)
}
