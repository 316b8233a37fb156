//! Distance metrics.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

/// Metric an index ranks by. Fixed when the index is built.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Metric {
    /// Squared Euclidean distance; smaller is closer.
    L2,
    /// Inner product similarity; larger is closer.
    #[default]
    InnerProduct,
}

impl Metric {
    /// Score `candidate` against `query`.
    pub fn score(self, query: &[f32], candidate: &[f32]) -> f32 {
        match self {
            Self::L2 => squared_l2(query, candidate),
            Self::InnerProduct => dot(query, candidate),
        }
    }

    /// Order two scores so that the closer one sorts first.
    ///
    /// Uses `total_cmp`, so the order is total even for NaN scores.
    pub fn rank(self, a: f32, b: f32) -> Ordering {
        match self {
            Self::L2 => a.total_cmp(&b),
            Self::InnerProduct => b.total_cmp(&a),
        }
    }

    /// On-disk tag.
    pub fn tag(self) -> u8 {
        match self {
            Self::L2 => 0,
            Self::InnerProduct => 1,
        }
    }

    /// Inverse of [`Metric::tag`].
    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(Self::L2),
            1 => Some(Self::InnerProduct),
            _ => None,
        }
    }

    /// Display name, matching the settings wire name.
    pub fn name(self) -> &'static str {
        match self {
            Self::L2 => "l2",
            Self::InnerProduct => "innerProduct",
        }
    }
}

/// Inner product of two equal-length vectors.
pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len(), "vectors must have equal dimensions");
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Squared Euclidean distance between two equal-length vectors.
pub fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len(), "vectors must have equal dimensions");
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y) * (x - y))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn l2_scores_squared_distance() {
        assert!((Metric::L2.score(&[0.0, 0.0], &[3.0, 4.0]) - 25.0).abs() < 1e-6);
    }

    #[test]
    fn inner_product_scores_dot() {
        let s = Metric::InnerProduct.score(&[1.0, 2.0, 3.0], &[4.0, -5.0, 6.0]);
        assert!((s - 12.0).abs() < 1e-6);
    }

    #[test]
    fn rank_direction() {
        assert_eq!(Metric::L2.rank(1.0, 2.0), Ordering::Less);
        assert_eq!(Metric::InnerProduct.rank(1.0, 2.0), Ordering::Greater);
        assert_eq!(Metric::InnerProduct.rank(2.0, 2.0), Ordering::Equal);
    }

    #[test]
    fn tag_roundtrip() {
        for m in [Metric::L2, Metric::InnerProduct] {
            assert_eq!(Metric::from_tag(m.tag()), Some(m));
        }
        assert_eq!(Metric::from_tag(9), None);
    }

    #[test]
    fn name_matches_serde() {
        for m in [Metric::L2, Metric::InnerProduct] {
            let wire = serde_json::to_value(m).unwrap();
            assert_eq!(wire, m.name());
        }
    }
}
