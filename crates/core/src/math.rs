//! Vector math helpers for embedding operations

/// Dot product of two equal-length vectors
pub fn dot_product(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Cosine similarity between two vectors. Returns 0.0 when either vector
/// has zero magnitude.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let norm_a = dot_product(a, a).sqrt();
    let norm_b = dot_product(b, b).sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot_product(a, b) / (norm_a * norm_b)
}

/// Scale a vector to unit length. Zero vectors are returned unchanged.
pub fn normalize_vector(v: &[f32]) -> Vec<f32> {
    let norm = dot_product(v, v).sqrt();
    if norm == 0.0 {
        return v.to_vec();
    }
    v.iter().map(|x| x / norm).collect()
}

/// Element-wise arithmetic mean of a set of equal-length vectors.
/// No normalization is applied to the result. Returns `None` for an
/// empty input.
pub fn mean_vector(vectors: &[Vec<f32>]) -> Option<Vec<f32>> {
    let first = vectors.first()?;
    let mut acc = vec![0.0f32; first.len()];
    for v in vectors {
        for (slot, x) in acc.iter_mut().zip(v.iter()) {
            *slot += x;
        }
    }
    let n = vectors.len() as f32;
    for slot in acc.iter_mut() {
        *slot /= n;
    }
    Some(acc)
}
