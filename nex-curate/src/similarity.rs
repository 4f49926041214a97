//! Vector helpers shared by the index and the clustering engine.

/// Return a unit-length copy of `vector`.
///
/// A zero vector stays zero; it then has similarity 0 with everything under
/// [`dot`].
pub fn l2_normalize(vector: &[f32]) -> Vec<f32> {
    let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm == 0.0 || !norm.is_finite() {
        return vec![0.0; vector.len()];
    }
    vector.iter().map(|x| x / norm).collect()
}

/// Dot product; equals cosine similarity for unit vectors.
pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Squared Euclidean distance.
pub fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

/// Cosine similarity of two unit vectors recovered from their L2 distance:
/// `1 - d^2 / 2`.
pub fn similarity_from_l2(a: &[f32], b: &[f32]) -> f32 {
    1.0 - squared_l2(a, b) / 2.0
}

/// Euclidean distance between unit vectors with the given cosine similarity.
pub fn distance_for_similarity(similarity: f64) -> f64 {
    (2.0 * (1.0 - similarity)).max(0.0).sqrt()
}

/// Pairwise cosine similarity of unit vectors, as a dense symmetric matrix.
pub fn similarity_matrix(unit_vectors: &[Vec<f32>]) -> Vec<Vec<f64>> {
    let n = unit_vectors.len();
    let mut matrix = vec![vec![0.0f64; n]; n];
    for i in 0..n {
        matrix[i][i] = 1.0;
        for j in (i + 1)..n {
            let s = f64::from(dot(&unit_vectors[i], &unit_vectors[j]));
            matrix[i][j] = s;
            matrix[j][i] = s;
        }
    }
    matrix
}
