use std::collections::{HashSet, VecDeque};

/// Bounded FIFO set of recently-seen transcript ids for one call.
///
/// Transcription providers redeliver finalized utterances (typically on
/// reconnect); without this filter each redelivery would re-enter history,
/// re-run the trigger policy and be persisted twice.
#[derive(Debug)]
pub struct DedupFilter {
    seen: HashSet<String>,
    order: VecDeque<String>,
    capacity: usize,
}

impl DedupFilter {
    pub fn new(capacity: usize) -> Self {
        Self {
            seen: HashSet::with_capacity(capacity),
            order: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Returns `true` exactly once per key within the retention window,
    /// recording it as seen. At capacity the oldest key is evicted.
    pub fn should_process(&mut self, key: &str) -> bool {
        if self.seen.contains(key) {
            return false;
        }
        if self.order.len() >= self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.seen.remove(&oldest);
            }
        }
        self.seen.insert(key.to_string());
        self.order.push_back(key.to_string());
        true
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}
