//! Append-only vector memory with exact similarity search.

use std::collections::HashMap;
use std::sync::Mutex;

use super::index::FlatL2Index;
use super::{Clock, Memory, MemoryError, lock};

/// Default embedding dimension (matches 768-d sentence encoders).
pub const DEFAULT_EMBEDDING_DIM: usize = 768;

/// Unbounded store of `(Memory, embedding)` pairs.
///
/// Records are never evicted, mutated or deleted. `memories[i]` and
/// `embeddings[i]` always describe the same record, and the similarity
/// index covers every stored vector by the time [`add_memory`] returns.
///
/// [`add_memory`]: LongTermMemory::add_memory
#[derive(Debug)]
pub struct LongTermMemory {
    dimension: usize,
    inner: Mutex<Inner>,
}

#[derive(Debug)]
struct Inner {
    memories: Vec<Memory>,
    embeddings: Vec<Vec<f32>>,
    index: FlatL2Index,
    clock: Clock,
}

impl Default for LongTermMemory {
    fn default() -> Self {
        Self::new(DEFAULT_EMBEDDING_DIM)
    }
}

impl LongTermMemory {
    /// Create an empty store for vectors of `dimension` components.
    #[must_use]
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            inner: Mutex::new(Inner {
                memories: Vec::new(),
                embeddings: Vec::new(),
                index: FlatL2Index::new(dimension),
                clock: Clock::default(),
            }),
        }
    }

    /// Embedding dimension accepted by this store.
    #[must_use]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Number of stored records.
    #[must_use]
    pub fn len(&self) -> usize {
        lock(&self.inner).memories.len()
    }

    /// Whether the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Store a message with its embedding.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::DimensionMismatch`] if `embedding` does not
    /// have [`dimension`](Self::dimension) components. Nothing is stored in
    /// that case.
    pub fn add_memory(
        &self,
        content: impl Into<String>,
        embedding: Vec<f32>,
        importance: f32,
        context: HashMap<String, String>,
    ) -> Result<(), MemoryError> {
        self.check_dimension(&embedding)?;

        let mut inner = lock(&self.inner);
        let memory = Memory {
            content: content.into(),
            timestamp: inner.clock.now(),
            importance,
            context,
        };
        inner.memories.push(memory);
        inner.embeddings.push(embedding);

        // Full rebuild keeps the index exactly in step with `embeddings`.
        let index = FlatL2Index::build(self.dimension, &inner.embeddings);
        inner.index = index;

        tracing::trace!(records = inner.memories.len(), "Long-term memory indexed");
        Ok(())
    }

    /// The `k` records closest to `query`, nearest first.
    ///
    /// Distances are raw squared Euclidean distances; lower is more
    /// relevant. An empty store or `k == 0` yields an empty result.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::DimensionMismatch`] if `query` has the wrong
    /// number of components.
    pub fn search_memories(
        &self,
        query: &[f32],
        k: usize,
    ) -> Result<Vec<(Memory, f32)>, MemoryError> {
        let inner = lock(&self.inner);
        if inner.memories.is_empty() || k == 0 {
            return Ok(Vec::new());
        }
        self.check_dimension(query)?;

        Ok(inner
            .index
            .search(query, k)
            .into_iter()
            .filter_map(|(row, distance)| {
                inner
                    .memories
                    .get(row)
                    .map(|memory| (memory.clone(), distance))
            })
            .collect())
    }

    /// Copy of every stored record, in insertion order.
    #[must_use]
    pub fn get_all_memories(&self) -> Vec<Memory> {
        lock(&self.inner).memories.clone()
    }

    /// Copy of every stored embedding, co-indexed with
    /// [`get_all_memories`](Self::get_all_memories).
    #[must_use]
    pub fn embeddings(&self) -> Vec<Vec<f32>> {
        lock(&self.inner).embeddings.clone()
    }

    fn check_dimension(&self, vector: &[f32]) -> Result<(), MemoryError> {
        if vector.len() == self.dimension {
            Ok(())
        } else {
            Err(MemoryError::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(entries: &[(&str, [f32; 2])]) -> LongTermMemory {
        let memory = LongTermMemory::new(2);
        for (content, vector) in entries {
            memory
                .add_memory(*content, vector.to_vec(), 1.0, HashMap::new())
                .unwrap();
        }
        memory
    }

    #[test]
    fn test_default_dimension() {
        assert_eq!(LongTermMemory::default().dimension(), 768);
    }

    #[test]
    fn test_empty_store_search() {
        let memory = LongTermMemory::new(2);
        assert!(memory.search_memories(&[0.0, 0.0], 5).unwrap().is_empty());
        // Wrong-sized queries against an empty store are still just empty.
        assert!(memory.search_memories(&[0.0], 5).unwrap().is_empty());
    }

    #[test]
    fn test_zero_dimension_store_is_searchable() {
        let memory = LongTermMemory::new(0);
        memory
            .add_memory("blank", Vec::new(), 1.0, HashMap::new())
            .unwrap();
        assert_eq!(memory.len(), 1);

        let hits = memory.search_memories(&[], 1).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].0.content, "blank");
        assert_eq!(hits[0].1, 0.0);
    }

    #[test]
    fn test_single_record_is_searchable() {
        let memory = store(&[("only", [0.5, 0.5])]);
        let hits = memory.search_memories(&[0.5, 0.5], 3).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].0.content, "only");
        assert_eq!(hits[0].1, 0.0);
    }

    #[test]
    fn test_nearest_first() {
        let memory = store(&[("cat", [1.0, 0.0]), ("dog", [0.9, 0.1]), ("car", [0.0, 1.0])]);
        let hits = memory.search_memories(&[1.0, 0.0], 2).unwrap();

        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].0.content, "cat");
        assert_eq!(hits[0].1, 0.0);
        assert_eq!(hits[1].0.content, "dog");
        assert!((hits[1].1 - 0.02).abs() < 1e-6);
    }

    #[test]
    fn test_dimension_mismatch_rejected() {
        let memory = store(&[("cat", [1.0, 0.0])]);
        let err = memory
            .add_memory("bad", vec![1.0, 2.0, 3.0], 1.0, HashMap::new())
            .unwrap_err();
        assert_eq!(
            err,
            MemoryError::DimensionMismatch {
                expected: 2,
                actual: 3
            }
        );
        assert_eq!(memory.len(), 1);
        assert_eq!(memory.embeddings().len(), 1);

        assert!(memory.search_memories(&[1.0], 1).is_err());
    }

    #[test]
    fn test_zero_k_is_empty() {
        let memory = store(&[("cat", [1.0, 0.0])]);
        assert!(memory.search_memories(&[1.0, 0.0], 0).unwrap().is_empty());
    }

    #[test]
    fn test_get_all_memories_in_insertion_order() {
        let memory = store(&[("a", [0.0, 0.0]), ("b", [1.0, 1.0]), ("c", [2.0, 2.0])]);
        let all: Vec<String> = memory
            .get_all_memories()
            .into_iter()
            .map(|m| m.content)
            .collect();
        assert_eq!(all, ["a", "b", "c"]);
        assert_eq!(memory.embeddings()[1], vec![1.0, 1.0]);
    }
}
