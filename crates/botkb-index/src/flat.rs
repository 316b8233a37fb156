//! Flat (brute-force) vector index.
//!
//! Vectors live in one contiguous `Vec<f32>`; id `i` occupies
//! `data[i * dims..(i + 1) * dims]`. Ids are dense, zero-based and assigned
//! in insertion order.

use std::cmp::Ordering;
use std::ops::Range;

use crate::errors::{IndexError, Result};
use crate::metric::Metric;

/// One search result: an index id and its score under the index metric.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Neighbor {
    /// Index id.
    pub id: usize,
    /// Squared distance (L2) or similarity (inner product).
    pub score: f32,
}

/// Exact nearest-neighbor index over fixed-dimension vectors.
#[derive(Clone, Debug, PartialEq)]
pub struct FlatIndex {
    dims: usize,
    metric: Metric,
    data: Vec<f32>,
}

impl FlatIndex {
    /// Create an empty index.
    pub fn new(dims: usize, metric: Metric) -> Result<Self> {
        if dims == 0 {
            return Err(IndexError::ZeroDimension);
        }
        Ok(Self {
            dims,
            metric,
            data: Vec::new(),
        })
    }

    /// Rebuild an index from its flattened vector data.
    pub fn from_raw(dims: usize, metric: Metric, data: Vec<f32>) -> Result<Self> {
        if dims == 0 {
            return Err(IndexError::ZeroDimension);
        }
        if data.len() % dims != 0 {
            return Err(IndexError::DimensionMismatch {
                expected: dims,
                actual: data.len() % dims,
            });
        }
        Ok(Self { dims, metric, data })
    }

    /// Vector dimension.
    pub fn dims(&self) -> usize {
        self.dims
    }

    /// Ranking metric.
    pub fn metric(&self) -> Metric {
        self.metric
    }

    /// Number of vectors.
    pub fn len(&self) -> usize {
        self.data.len() / self.dims
    }

    /// Whether the index holds no vectors.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// The vector stored under `id`.
    pub fn vector(&self, id: usize) -> Option<&[f32]> {
        let start = id.checked_mul(self.dims)?;
        self.data.get(start..start.checked_add(self.dims)?)
    }

    /// All vectors in id order.
    pub fn vectors(&self) -> impl Iterator<Item = &[f32]> {
        self.data.chunks_exact(self.dims)
    }

    /// Flattened vector data in id order.
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    /// Check that every vector has this index's dimension.
    pub fn check<V: AsRef<[f32]>>(&self, vectors: &[V]) -> Result<()> {
        for v in vectors {
            let actual = v.as_ref().len();
            if actual != self.dims {
                return Err(IndexError::DimensionMismatch {
                    expected: self.dims,
                    actual,
                });
            }
        }
        Ok(())
    }

    /// Append vectors in order, returning the ids they were assigned.
    ///
    /// All vectors are validated before any is appended, so a
    /// `DimensionMismatch` leaves the index unchanged.
    pub fn add<V: AsRef<[f32]>>(&mut self, vectors: &[V]) -> Result<Range<usize>> {
        self.check(vectors)?;
        let first = self.len();
        self.data.reserve(vectors.len() * self.dims);
        for v in vectors {
            self.data.extend_from_slice(v.as_ref());
        }
        Ok(first..self.len())
    }

    /// Return the `k` closest vectors to `query`, closest first.
    ///
    /// Every stored vector is scored; the best `k` are selected with a
    /// partial sort and then ordered. Ties are broken by ascending id. An
    /// empty index or `k == 0` yields an empty result.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>> {
        if query.len() != self.dims {
            return Err(IndexError::DimensionMismatch {
                expected: self.dims,
                actual: query.len(),
            });
        }
        let k = k.min(self.len());
        if k == 0 {
            return Ok(Vec::new());
        }

        let metric = self.metric;
        let mut scored: Vec<Neighbor> = self
            .vectors()
            .enumerate()
            .map(|(id, v)| Neighbor {
                id,
                score: metric.score(query, v),
            })
            .collect();

        let order = |a: &Neighbor, b: &Neighbor| -> Ordering {
            metric.rank(a.score, b.score).then(a.id.cmp(&b.id))
        };
        if k < scored.len() {
            let _ = scored.select_nth_unstable_by(k - 1, order);
            scored.truncate(k);
        }
        scored.sort_by(order);
        Ok(scored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn five_points() -> FlatIndex {
        let mut idx = FlatIndex::new(2, Metric::L2).unwrap();
        let _ = idx
            .add(&[
                vec![0.0, 0.0],   // d² from (3, 4): 25
                vec![3.0, 4.0],   // 0
                vec![10.0, 10.0], // 85
                vec![2.0, 4.0],   // 1
                vec![3.0, 1.0],   // 9
            ])
            .unwrap();
        idx
    }

    // ── construction ────────────────────────────────────────────────

    #[test]
    fn zero_dimension_rejected() {
        assert!(matches!(
            FlatIndex::new(0, Metric::L2),
            Err(IndexError::ZeroDimension)
        ));
    }

    #[test]
    fn from_raw_rejects_ragged_data() {
        let err = FlatIndex::from_raw(3, Metric::L2, vec![1.0; 7]).unwrap_err();
        assert!(matches!(err, IndexError::DimensionMismatch { .. }));
    }

    // ── add ─────────────────────────────────────────────────────────

    #[test]
    fn add_assigns_sequential_ids() {
        let mut idx = FlatIndex::new(2, Metric::L2).unwrap();
        assert_eq!(idx.add(&[vec![1.0, 0.0], vec![0.0, 1.0]]).unwrap(), 0..2);
        assert_eq!(idx.add(&[vec![1.0, 1.0]]).unwrap(), 2..3);
        assert_eq!(idx.len(), 3);
        assert_eq!(idx.vector(2), Some(&[1.0, 1.0][..]));
        assert_eq!(idx.vector(3), None);
    }

    #[test]
    fn add_dimension_mismatch_leaves_index_unchanged() {
        let mut idx = FlatIndex::new(2, Metric::L2).unwrap();
        let _ = idx.add(&[vec![1.0, 0.0]]).unwrap();
        let err = idx
            .add(&[vec![0.0, 1.0], vec![1.0, 2.0, 3.0]])
            .unwrap_err();
        assert!(matches!(
            err,
            IndexError::DimensionMismatch {
                expected: 2,
                actual: 3
            }
        ));
        assert_eq!(idx.len(), 1);
    }

    #[test]
    fn add_empty_batch_is_noop() {
        let mut idx = FlatIndex::new(4, Metric::InnerProduct).unwrap();
        let empty: Vec<Vec<f32>> = Vec::new();
        assert_eq!(idx.add(&empty).unwrap(), 0..0);
        assert!(idx.is_empty());
    }

    #[test]
    fn vector_lookup_out_of_range() {
        let index = five_points();
        assert_eq!(index.vector(4).map(<[f32]>::len), Some(index.dims()));
        assert!(index.vector(5).is_none());
        assert!(index.vector(usize::MAX / index.dims()).is_none());
        assert!(index.vector(usize::MAX).is_none());
    }

    // ── search ──────────────────────────────────────────────────────

    #[test]
    fn search_empty_returns_empty() {
        let idx = FlatIndex::new(2, Metric::L2).unwrap();
        assert!(idx.search(&[1.0, 1.0], 5).unwrap().is_empty());
    }

    #[test]
    fn search_top3_l2_known_distances() {
        let idx = five_points();
        let hits = idx.search(&[3.0, 4.0], 3).unwrap();
        let ids: Vec<usize> = hits.iter().map(|n| n.id).collect();
        assert_eq!(ids, vec![1, 3, 4]);
        assert_eq!(hits[0].score, 0.0);
        assert!((hits[1].score - 1.0).abs() < 1e-6);
        assert!((hits[2].score - 9.0).abs() < 1e-6);
    }

    #[test]
    fn search_k_larger_than_len() {
        let idx = five_points();
        assert_eq!(idx.search(&[0.0, 0.0], 50).unwrap().len(), 5);
    }

    #[test]
    fn search_k_zero() {
        let idx = five_points();
        assert!(idx.search(&[0.0, 0.0], 0).unwrap().is_empty());
    }

    #[test]
    fn search_inner_product_descending() {
        let mut idx = FlatIndex::new(2, Metric::InnerProduct).unwrap();
        let _ = idx
            .add(&[vec![1.0, 0.0], vec![0.0, 1.0], vec![0.7, 0.7]])
            .unwrap();
        let hits = idx.search(&[1.0, 0.1], 3).unwrap();
        let ids: Vec<usize> = hits.iter().map(|n| n.id).collect();
        assert_eq!(ids, vec![0, 2, 1]);
        assert!(hits[0].score >= hits[1].score && hits[1].score >= hits[2].score);
    }

    #[test]
    fn search_ties_break_by_id() {
        let mut idx = FlatIndex::new(1, Metric::L2).unwrap();
        let _ = idx.add(&[vec![1.0], vec![-1.0], vec![1.0]]).unwrap();
        let ids: Vec<usize> = idx.search(&[0.0], 2).unwrap().iter().map(|n| n.id).collect();
        assert_eq!(ids, vec![0, 1]);
    }

    #[test]
    fn search_query_dimension_mismatch() {
        let idx = five_points();
        assert!(matches!(
            idx.search(&[1.0], 3),
            Err(IndexError::DimensionMismatch { .. })
        ));
    }

    // ── brute-force reference ───────────────────────────────────────

    fn reference(idx: &FlatIndex, query: &[f32], k: usize) -> Vec<usize> {
        let metric = idx.metric();
        let mut all: Vec<(usize, f32)> = idx
            .vectors()
            .enumerate()
            .map(|(id, v)| (id, metric.score(query, v)))
            .collect();
        all.sort_by(|a, b| metric.rank(a.1, b.1).then(a.0.cmp(&b.0)));
        all.into_iter().take(k).map(|(id, _)| id).collect()
    }

    proptest! {
        #[test]
        fn search_matches_full_sort(
            points in prop::collection::vec(prop::collection::vec(-10.0f32..10.0, 3), 0..40),
            query in prop::collection::vec(-10.0f32..10.0, 3),
            k in 0usize..45,
            l2 in any::<bool>(),
        ) {
            let metric = if l2 { Metric::L2 } else { Metric::InnerProduct };
            let mut idx = FlatIndex::new(3, metric).unwrap();
            let _ = idx.add(&points).unwrap();

            let got: Vec<usize> = idx.search(&query, k).unwrap().iter().map(|n| n.id).collect();
            prop_assert_eq!(got.len(), k.min(points.len()));
            prop_assert_eq!(got, reference(&idx, &query, k));
        }
    }
}
