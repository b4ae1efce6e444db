/// Compute the squared Euclidean distance between two vectors.
pub fn l2_distance_sqr(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len());
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let diff = x - y;
            diff * diff
        })
        .sum()
}

/// Compute the L1 (Manhattan) distance between two vectors.
pub fn l1_distance(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len());
    a.iter().zip(b.iter()).map(|(x, y)| (x - y).abs()).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn l2_of_identical_vectors_is_zero() {
        let v = vec![1.0, -2.5, 3.0];
        assert_eq!(l2_distance_sqr(&v, &v), 0.0);
    }

    #[test]
    fn l2_matches_hand_computation() {
        let a = [0.0, 0.5];
        let b = [10.0, 11.0];
        assert_eq!(l2_distance_sqr(&a, &b), 100.0 + 110.25);
    }

    #[test]
    fn l1_matches_hand_computation() {
        let a = [1.0, -1.0];
        let b = [4.0, 1.0];
        assert_eq!(l1_distance(&a, &b), 5.0);
    }
}
