//! Exact nearest-neighbor index over dense vectors.

use std::cmp::Ordering;

/// Squared Euclidean distance between two vectors of equal length.
#[must_use]
pub fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}

/// Brute-force L2 index over a flat, row-major copy of the stored vectors.
///
/// Building is O(n·d) and the long-term store rebuilds after every insert.
/// That is fine at conversation scale (tens to hundreds of turns); a
/// high-volume deployment needs an incrementally updatable index behind the
/// same search contract.
#[derive(Debug, Clone, Default)]
pub struct FlatL2Index {
    dimension: usize,
    rows: usize,
    data: Vec<f32>,
}

impl FlatL2Index {
    /// Empty index for vectors of `dimension` components.
    #[must_use]
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            rows: 0,
            data: Vec::new(),
        }
    }

    /// Build an index from scratch over `vectors`.
    ///
    /// Callers guarantee every vector has `dimension` components.
    #[must_use]
    pub fn build(dimension: usize, vectors: &[Vec<f32>]) -> Self {
        let mut data = Vec::with_capacity(dimension * vectors.len());
        for vector in vectors {
            debug_assert_eq!(vector.len(), dimension);
            data.extend_from_slice(vector);
        }
        Self {
            dimension,
            rows: vectors.len(),
            data,
        }
    }

    /// Number of indexed vectors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows
    }

    /// Whether the index holds no vectors.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The `k` rows closest to `query`, as `(row, squared distance)` pairs.
    ///
    /// Results are ordered by distance, then by row, so equal distances come
    /// back in insertion order on every call.
    #[must_use]
    pub fn search(&self, query: &[f32], k: usize) -> Vec<(usize, f32)> {
        if k == 0 {
            return Vec::new();
        }

        // Zero-width rows are all at distance 0.
        let mut scored: Vec<(usize, f32)> = if self.dimension == 0 {
            (0..self.rows).map(|row| (row, 0.0)).collect()
        } else {
            self.data
                .chunks_exact(self.dimension)
                .map(|row| squared_l2(query, row))
                .enumerate()
                .collect()
        };

        let by_distance = |a: &(usize, f32), b: &(usize, f32)| -> Ordering {
            a.1.total_cmp(&b.1).then_with(|| a.0.cmp(&b.0))
        };

        if k < scored.len() {
            scored.select_nth_unstable_by(k - 1, by_distance);
            scored.truncate(k);
        }
        scored.sort_by(by_distance);
        scored
    }
}
