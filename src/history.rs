use std::collections::{BTreeMap, VecDeque};

/// Samples kept per device
pub const HISTORY_CAPACITY: usize = 40;

/// Rolling per-device record of "was throttled" flags
#[derive(Debug, Clone)]
pub struct HistoryTracker {
    capacity: usize,
    buffers: BTreeMap<u32, VecDeque<bool>>,
}

impl HistoryTracker {
    pub fn new() -> Self {
        Self::with_capacity(HISTORY_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            buffers: BTreeMap::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Push a flag, evicting the oldest one when the buffer is full
    pub fn append(&mut self, index: u32, throttled: bool) {
        let capacity = self.capacity;
        let queue = self
            .buffers
            .entry(index)
            .or_insert_with(|| VecDeque::with_capacity(capacity));
        if queue.len() >= capacity {
            queue.pop_front();
        }
        queue.push_back(throttled);
    }

    /// Flags for one device, oldest first
    pub fn snapshot(&self, index: u32) -> Vec<bool> {
        self.buffers
            .get(&index)
            .map(|q| q.iter().copied().collect())
            .unwrap_or_default()
    }

    /// The trailing `width` samples, left-padded with `None` so the graph
    /// always spans `width` cells
    pub fn padded(&self, index: u32, width: usize) -> Vec<Option<bool>> {
        let samples = self.snapshot(index);
        let tail = &samples[samples.len().saturating_sub(width)..];
        let mut out = vec![None; width - tail.len()];
        out.extend(tail.iter().copied().map(Some));
        out
    }
}

impl Default for HistoryTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keeps_most_recent_forty() {
        let mut history = HistoryTracker::new();
        let flags: Vec<bool> = (0..97).map(|i| i % 3 == 0).collect();
        for &f in &flags {
            history.append(0, f);
        }
        let kept = history.snapshot(0);
        assert_eq!(kept.len(), HISTORY_CAPACITY);
        assert_eq!(kept, flags[flags.len() - HISTORY_CAPACITY..].to_vec());
    }

    #[test]
    fn test_devices_are_independent() {
        let mut history = HistoryTracker::new();
        history.append(0, true);
        history.append(2, false);
        history.append(2, true);
        assert_eq!(history.snapshot(0), vec![true]);
        assert_eq!(history.snapshot(2), vec![false, true]);
        assert!(history.snapshot(1).is_empty());
    }

    #[test]
    fn test_padded_left_fills() {
        let mut history = HistoryTracker::new();
        history.append(0, true);
        history.append(0, false);
        let graph = history.padded(0, 5);
        assert_eq!(graph, vec![None, None, None, Some(true), Some(false)]);
    }

    #[test]
    fn test_padded_takes_trailing_window() {
        let mut history = HistoryTracker::new();
        for i in 0..30 {
            history.append(0, i >= 25);
        }
        let graph = history.padded(0, 20);
        assert_eq!(graph.len(), 20);
        assert!(graph.iter().all(Option::is_some));
        assert_eq!(graph.iter().filter(|g| **g == Some(true)).count(), 5);
    }
}
