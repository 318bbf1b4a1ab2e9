//! Conversation memory.
//!
//! Two independent stores back every agent:
//!
//! - [`ShortTermMemory`]: a bounded recency buffer of raw turns ("what was
//!   just said"). Eviction removes the least important, oldest record.
//! - [`LongTermMemory`]: an unbounded, append-only store of records and
//!   their embeddings with exact nearest-neighbor search ("what's relevant
//!   from the whole conversation").
//!
//! Neither store knows about embedding models or network clients; callers
//! compute vectors and pass them in.
//!
//! # Example
//!
//! ```rust
//! use std::collections::HashMap;
//! use persona_duet::memory::{LongTermMemory, ShortTermMemory};
//!
//! let short = ShortTermMemory::new(3);
//! short.add_memory("hello", 1.0, HashMap::new());
//! assert_eq!(short.get_recent_memories(None).len(), 1);
//!
//! let long = LongTermMemory::new(2);
//! long.add_memory("cat", vec![1.0, 0.0], 1.0, HashMap::new()).unwrap();
//! let hits = long.search_memories(&[1.0, 0.0], 1).unwrap();
//! assert_eq!(hits[0].0.content, "cat");
//! ```

pub mod index;
mod long_term;
mod short_term;

pub use long_term::{DEFAULT_EMBEDDING_DIM, LongTermMemory};
pub use short_term::{DEFAULT_CAPACITY, ShortTermMemory};

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// A single remembered message.
///
/// Records are immutable once created; stores hand out clones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Memory {
    /// Message text.
    pub content: String,
    /// Creation time, strictly increasing within one store.
    pub timestamp: DateTime<Utc>,
    /// Relative weight used by short-term eviction.
    pub importance: f32,
    /// Free-form metadata (speaker, turn, ...), owned by the record.
    pub context: HashMap<String, String>,
}

/// Errors raised by the memory stores.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MemoryError {
    /// A vector did not match the store's embedding dimension.
    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Dimension the store was built with.
        expected: usize,
        /// Dimension of the rejected vector.
        actual: usize,
    },
}

/// Hands out strictly increasing timestamps for one store.
///
/// Two inserts within the same clock tick would otherwise tie and make the
/// eviction and recency orderings ambiguous.
#[derive(Debug, Default)]
pub(crate) struct Clock {
    last: Option<DateTime<Utc>>,
}

impl Clock {
    pub(crate) fn now(&mut self) -> DateTime<Utc> {
        let mut now = Utc::now();
        if let Some(last) = self.last
            && now <= last
        {
            now = last + Duration::nanoseconds(1);
        }
        self.last = Some(now);
        now
    }
}

/// Lock a store mutex, recovering the data if a writer panicked.
///
/// Every mutation completes before the guard drops, so a poisoned lock
/// still holds consistent state.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
}
