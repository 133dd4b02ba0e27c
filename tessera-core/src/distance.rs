//! Similarity kernels for dense vectors.
//!
//! Recall ranks by score, so every metric here is expressed so that a
//! higher score means a closer match.

use serde::{Deserialize, Serialize};

/// Supported distance metrics, named as they appear in index metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum DistanceMetric {
    /// Inner product. Score is the dot product.
    #[default]
    #[serde(rename = "ip")]
    InnerProduct,
    /// Squared Euclidean distance. Score is `1 - d`.
    #[serde(rename = "l2")]
    L2,
    /// Cosine distance. Score is the cosine similarity, `1 - d`.
    #[serde(rename = "cosine")]
    Cosine,
}

impl DistanceMetric {
    /// Computes the similarity score between two vectors using this metric.
    ///
    /// # Panics
    ///
    /// Panics in debug builds if vectors have different dimensions.
    #[inline]
    pub fn score(&self, a: &[f32], b: &[f32]) -> f32 {
        debug_assert_eq!(a.len(), b.len(), "Vector dimensions must match");

        match self {
            DistanceMetric::InnerProduct => dot_product(a, b),
            DistanceMetric::L2 => 1.0 - euclidean_distance_squared(a, b),
            DistanceMetric::Cosine => 1.0 - cosine_distance(a, b),
        }
    }

    /// Name used in index metadata.
    pub fn as_str(&self) -> &'static str {
        match self {
            DistanceMetric::InnerProduct => "ip",
            DistanceMetric::L2 => "l2",
            DistanceMetric::Cosine => "cosine",
        }
    }
}

/// Computes squared Euclidean distance (avoids sqrt for comparisons).
#[inline]
pub fn euclidean_distance_squared(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let diff = x - y;
            diff * diff
        })
        .sum()
}

/// Computes cosine distance between two vectors.
///
/// Formula: 1 - (a · b) / (||a|| * ||b||)
/// Range: [0, 2] where 0 = identical direction, 2 = opposite direction
#[inline]
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    let dot = dot_product(a, b);
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    let denominator = norm_a * norm_b;
    if denominator == 0.0 {
        return 1.0; // Undefined, treat as orthogonal
    }

    1.0 - (dot / denominator)
}

/// Computes dot product (inner product) between two vectors.
///
/// Formula: sum(a[i] * b[i])
#[inline]
pub fn dot_product(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}
