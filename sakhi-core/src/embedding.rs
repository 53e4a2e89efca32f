//! Dense embeddings for fact retrieval.

use crate::{SakhiError, SakhiResult, VectorError};
use serde::{Deserialize, Serialize};

/// Embedding of a fact's document text or of a retrieval query.
///
/// The dimension count is whatever the producing provider emits; the only
/// requirement is that vectors compared with each other agree on it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingVector {
    pub data: Vec<f32>,
}

impl EmbeddingVector {
    pub fn new(data: Vec<f32>) -> Self {
        Self { data }
    }

    /// Number of dimensions.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Cosine similarity against another vector.
    /// Zero-magnitude vectors compare as dissimilar rather than erroring;
    /// a dimension mismatch is a hard error.
    pub fn cosine_similarity(&self, other: &EmbeddingVector) -> SakhiResult<f32> {
        if self.len() != other.len() {
            return Err(SakhiError::Vector(VectorError::DimensionMismatch {
                expected: self.len(),
                got: other.len(),
            }));
        }

        let dot: f32 = self
            .data
            .iter()
            .zip(&other.data)
            .map(|(a, b)| a * b)
            .sum();
        let norm = self.magnitude() * other.magnitude();
        if norm == 0.0 {
            return Ok(0.0);
        }
        Ok(dot / norm)
    }

    fn magnitude(&self) -> f32 {
        self.data.iter().map(|x| x * x).sum::<f32>().sqrt()
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{SakhiError, VectorError};

    #[test]
    fn test_identical_directions_score_one() {
        let a = EmbeddingVector::new(vec![1.0, 0.0, 0.0]);
        let b = EmbeddingVector::new(vec![1.0, 0.0, 0.0]);
        let sim = a.cosine_similarity(&b).unwrap();
        assert!((sim - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_scaling_does_not_change_similarity() {
        let a = EmbeddingVector::new(vec![1.0, 2.0, 3.0]);
        let b = EmbeddingVector::new(vec![2.0, 4.0, 6.0]);
        let sim = a.cosine_similarity(&b).unwrap();
        assert!((sim - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_orthogonal_vectors_score_zero() {
        let a = EmbeddingVector::new(vec![1.0, 0.0]);
        let b = EmbeddingVector::new(vec![0.0, 1.0]);
        let sim = a.cosine_similarity(&b).unwrap();
        assert!(sim.abs() < 1e-6);
    }

    #[test]
    fn test_zero_magnitude_scores_zero() {
        let a = EmbeddingVector::new(vec![0.0, 0.0]);
        let b = EmbeddingVector::new(vec![1.0, 0.0]);
        assert_eq!(a.cosine_similarity(&b).unwrap(), 0.0);
    }

    #[test]
    fn test_dimension_mismatch_is_an_error() {
        let a = EmbeddingVector::new(vec![1.0, 0.0]);
        let b = EmbeddingVector::new(vec![1.0, 0.0, 0.0]);
        let err = a.cosine_similarity(&b).unwrap_err();
        assert!(matches!(
            err,
            SakhiError::Vector(VectorError::DimensionMismatch { expected: 2, got: 3 })
        ));
    }

    #[test]
    fn test_similarity_is_symmetric() {
        let a = EmbeddingVector::new(vec![1.0, 2.0]);
        let b = EmbeddingVector::new(vec![3.0, 4.0]);
        let ab = a.cosine_similarity(&b).unwrap();
        let ba = b.cosine_similarity(&a).unwrap();
        assert!((ab - ba).abs() < 1e-6);
    }

    #[test]
    fn test_len_and_empty() {
        assert_eq!(EmbeddingVector::new(vec![0.5; 4]).len(), 4);
        assert!(EmbeddingVector::new(vec![]).is_empty());
    }
}
