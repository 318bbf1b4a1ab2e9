//! Bounded recency buffer.

use std::collections::HashMap;
use std::sync::Mutex;

use super::{Clock, Memory, lock};

/// Default number of records kept in short-term memory.
pub const DEFAULT_CAPACITY: usize = 10;

/// Fixed-capacity buffer of the most recent conversation turns.
///
/// When an insert pushes the buffer past capacity, exactly one record is
/// evicted: the one with the lowest `(importance, timestamp)` key. With
/// uniform importance this is plain FIFO.
#[derive(Debug)]
pub struct ShortTermMemory {
    capacity: usize,
    inner: Mutex<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    memories: Vec<Memory>,
    clock: Clock,
}

impl Default for ShortTermMemory {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl ShortTermMemory {
    /// Create an empty buffer holding at most `capacity` records.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Maximum number of records kept.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of records currently held.
    #[must_use]
    pub fn len(&self) -> usize {
        lock(&self.inner).memories.len()
    }

    /// Whether the buffer is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Record a message, evicting one record if capacity is exceeded.
    pub fn add_memory(
        &self,
        content: impl Into<String>,
        importance: f32,
        context: HashMap<String, String>,
    ) {
        let mut inner = lock(&self.inner);
        let memory = Memory {
            content: content.into(),
            timestamp: inner.clock.now(),
            importance,
            context,
        };
        inner.memories.push(memory);

        if inner.memories.len() > self.capacity
            && let Some(victim) = eviction_candidate(&inner.memories)
        {
            let evicted = inner.memories.remove(victim);
            tracing::trace!(
                importance = evicted.importance,
                timestamp = %evicted.timestamp,
                "Evicted short-term memory"
            );
        }
    }

    /// Return up to `n` records, newest first.
    ///
    /// `None` means "up to capacity".
    #[must_use]
    pub fn get_recent_memories(&self, n: Option<usize>) -> Vec<Memory> {
        let n = n.unwrap_or(self.capacity);
        if n == 0 {
            return Vec::new();
        }

        let mut recent = lock(&self.inner).memories.clone();
        recent.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        recent.truncate(n);
        recent
    }
}

/// Index of the record with the minimum `(importance, timestamp)` key.
fn eviction_candidate(memories: &[Memory]) -> Option<usize> {
    memories
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| {
            a.importance
                .total_cmp(&b.importance)
                .then_with(|| a.timestamp.cmp(&b.timestamp))
        })
        .map(|(idx, _)| idx)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contents(memories: &[Memory]) -> Vec<&str> {
        memories.iter().map(|m| m.content.as_str()).collect()
    }

    #[test]
    fn test_default_capacity() {
        let memory = ShortTermMemory::default();
        assert_eq!(memory.capacity(), 10);
        assert!(memory.is_empty());
    }

    #[test]
    fn test_fifo_with_uniform_importance() {
        let memory = ShortTermMemory::new(2);
        memory.add_memory("one", 1.0, HashMap::new());
        memory.add_memory("two", 1.0, HashMap::new());
        memory.add_memory("three", 1.0, HashMap::new());

        assert_eq!(memory.len(), 2);
        assert_eq!(contents(&memory.get_recent_memories(None)), ["three", "two"]);
    }

    #[test]
    fn test_low_importance_evicted_before_older_records() {
        let memory = ShortTermMemory::new(2);
        memory.add_memory("old but important", 5.0, HashMap::new());
        memory.add_memory("trivial", 0.1, HashMap::new());
        memory.add_memory("fresh", 1.0, HashMap::new());

        let held = memory.get_recent_memories(None);
        assert_eq!(contents(&held), ["fresh", "old but important"]);
    }

    #[test]
    fn test_newest_record_can_be_evicted() {
        let memory = ShortTermMemory::new(1);
        memory.add_memory("keeper", 2.0, HashMap::new());
        memory.add_memory("noise", 0.5, HashMap::new());

        assert_eq!(contents(&memory.get_recent_memories(None)), ["keeper"]);
    }

    #[test]
    fn test_recent_limits_and_degenerate_n() {
        let memory = ShortTermMemory::new(5);
        for i in 0..4 {
            memory.add_memory(format!("m{i}"), 1.0, HashMap::new());
        }

        assert_eq!(contents(&memory.get_recent_memories(Some(2))), ["m3", "m2"]);
        assert_eq!(memory.get_recent_memories(Some(10)).len(), 4);
        assert!(memory.get_recent_memories(Some(0)).is_empty());
    }

    #[test]
    fn test_context_is_copied() {
        let memory = ShortTermMemory::new(2);
        let mut context = HashMap::new();
        context.insert("speaker".to_string(), "Alice".to_string());
        memory.add_memory("hi", 1.0, context.clone());
        context.insert("speaker".to_string(), "Bob".to_string());

        let held = memory.get_recent_memories(None);
        assert_eq!(held[0].context["speaker"], "Alice");
    }

    #[test]
    fn test_zero_capacity_holds_nothing() {
        let memory = ShortTermMemory::new(0);
        memory.add_memory("gone", 1.0, HashMap::new());
        assert!(memory.is_empty());
    }
}
