use rand::prelude::*;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use crate::dataset::Dataset;
use crate::distance::Distance;
use crate::{HclusterError, PointId};

/// Strategy used to pick the initial cluster centers at each split.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CentersInit {
    /// Uniform sampling without replacement, rejecting coincident points.
    Random,
    /// Gonzales farthest-first traversal.
    Gonzales,
    /// k-means++ seeding: draw with probability proportional to the distance
    /// to the nearest already-chosen center.
    KmeansPP,
}

/// Pick up to `branching` distinct center points out of `subset`.
///
/// All strategies return fewer than `branching` centers when the subset is
/// too degenerate to support that many (duplicate points, or simply too few
/// of them). The caller treats a short result as "do not split here".
pub fn select_centers<D: Distance>(
    init: CentersInit,
    dataset: &Dataset,
    distance: &D,
    branching: usize,
    subset: &[PointId],
    rng: &mut StdRng,
) -> Result<Vec<PointId>, HclusterError> {
    if branching < 2 {
        return Err(HclusterError::BadParameter(
            "branching factor must be at least 2",
        ));
    }
    if subset.is_empty() {
        return Ok(Vec::new());
    }
    let centers = match init {
        CentersInit::Random => random_centers(dataset, distance, branching, subset, rng),
        CentersInit::Gonzales => gonzales_centers(dataset, distance, branching, subset, rng),
        CentersInit::KmeansPP => kmeanspp_centers(dataset, distance, branching, subset, rng),
    };
    Ok(centers)
}

/// Uniform sampling. Candidates are visited in shuffled order and kept only
/// if they are at nonzero distance from every center already kept, so a
/// subset of coincident points yields a single center rather than several
/// indistinguishable ones.
fn random_centers<D: Distance>(
    dataset: &Dataset,
    distance: &D,
    branching: usize,
    subset: &[PointId],
    rng: &mut StdRng,
) -> Vec<PointId> {
    let mut order: Vec<PointId> = subset.to_vec();
    order.shuffle(rng);

    let mut centers: Vec<PointId> = Vec::with_capacity(branching);
    for &candidate in &order {
        if centers.len() == branching {
            break;
        }
        let distinct = centers.iter().all(|&center| {
            distance.distance(dataset.point(candidate), dataset.point(center)) > 0.0
        });
        if distinct {
            centers.push(candidate);
        }
    }
    centers
}

/// Farthest-first traversal. The first center is uniform; each later one
/// maximizes the minimum distance to the centers so far, ties going to the
/// lowest point id. Stops early once the best remaining minimum distance
/// reaches zero.
fn gonzales_centers<D: Distance>(
    dataset: &Dataset,
    distance: &D,
    branching: usize,
    subset: &[PointId],
    rng: &mut StdRng,
) -> Vec<PointId> {
    let first = subset[rng.gen_range(0..subset.len())];
    let mut centers = vec![first];
    let mut min_dist: Vec<f32> = subset
        .iter()
        .map(|&pid| distance.distance(dataset.point(pid), dataset.point(first)))
        .collect();

    while centers.len() < branching {
        let mut best = 0usize;
        for i in 1..subset.len() {
            if min_dist[i] > min_dist[best]
                || (min_dist[i] == min_dist[best] && subset[i] < subset[best])
            {
                best = i;
            }
        }
        if min_dist[best] <= 0.0 {
            break;
        }
        let chosen = subset[best];
        centers.push(chosen);
        for (i, &pid) in subset.iter().enumerate() {
            let d = distance.distance(dataset.point(pid), dataset.point(chosen));
            if d < min_dist[i] {
                min_dist[i] = d;
            }
        }
    }
    centers
}

/// k-means++ seeding over the subset. Weights are the distance to the
/// nearest already-chosen center; when every remaining weight is zero the
/// set cannot support another center and selection stops.
fn kmeanspp_centers<D: Distance>(
    dataset: &Dataset,
    distance: &D,
    branching: usize,
    subset: &[PointId],
    rng: &mut StdRng,
) -> Vec<PointId> {
    let first = subset[rng.gen_range(0..subset.len())];
    let mut centers = vec![first];
    let mut closest: Vec<f32> = subset
        .iter()
        .map(|&pid| distance.distance(dataset.point(pid), dataset.point(first)))
        .collect();

    while centers.len() < branching {
        let total: f64 = closest.iter().map(|&d| d.max(0.0) as f64).sum();
        if total == 0.0 {
            break;
        }
        let mut threshold = rng.gen::<f64>() * total;
        let mut next = None;
        for (i, &d) in closest.iter().enumerate() {
            let weight = d.max(0.0) as f64;
            if weight == 0.0 {
                continue;
            }
            next = Some(i);
            threshold -= weight;
            if threshold <= 0.0 {
                break;
            }
        }
        // total > 0 guarantees at least one positive weight.
        let chosen = match next {
            Some(i) => subset[i],
            None => break,
        };
        centers.push(chosen);
        for (i, &pid) in subset.iter().enumerate() {
            let d = distance.distance(dataset.point(pid), dataset.point(chosen));
            if d < closest[i] {
                closest[i] = d;
            }
        }
    }
    centers
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distance::SquaredEuclidean;

    fn line_dataset() -> Dataset {
        Dataset::from_rows(&[vec![0.0], vec![1.0], vec![10.0]]).unwrap()
    }

    fn duplicate_dataset(n: usize) -> Dataset {
        Dataset::from_rows(&vec![vec![1.0, 1.0]; n]).unwrap()
    }

    #[test]
    fn rejects_branching_below_two() {
        let dataset = line_dataset();
        let mut rng = StdRng::seed_from_u64(1);
        let err = select_centers(
            CentersInit::Random,
            &dataset,
            &SquaredEuclidean,
            1,
            &[0, 1, 2],
            &mut rng,
        )
        .unwrap_err();
        assert!(matches!(err, HclusterError::BadParameter(_)));
    }

    #[test]
    fn random_returns_all_points_when_subset_is_small() {
        let dataset = line_dataset();
        let mut rng = StdRng::seed_from_u64(7);
        let mut centers = select_centers(
            CentersInit::Random,
            &dataset,
            &SquaredEuclidean,
            8,
            &[0, 1, 2],
            &mut rng,
        )
        .unwrap();
        centers.sort_unstable();
        assert_eq!(centers, vec![0, 1, 2]);
    }

    #[test]
    fn random_collapses_duplicates_to_one_center() {
        let dataset = duplicate_dataset(10);
        let subset: Vec<PointId> = (0..10).collect();
        let mut rng = StdRng::seed_from_u64(3);
        let centers = select_centers(
            CentersInit::Random,
            &dataset,
            &SquaredEuclidean,
            4,
            &subset,
            &mut rng,
        )
        .unwrap();
        assert_eq!(centers.len(), 1);
    }

    #[test]
    fn gonzales_spreads_to_the_far_point() {
        let dataset = line_dataset();
        let mut rng = StdRng::seed_from_u64(11);
        let centers = select_centers(
            CentersInit::Gonzales,
            &dataset,
            &SquaredEuclidean,
            2,
            &[0, 1, 2],
            &mut rng,
        )
        .unwrap();
        assert_eq!(centers.len(), 2);
        assert_ne!(centers[0], centers[1]);
        // Whichever point seeds the traversal, the far end of the line is in.
        assert!(centers.contains(&2));
    }

    #[test]
    fn gonzales_aborts_on_duplicates() {
        let dataset = duplicate_dataset(6);
        let subset: Vec<PointId> = (0..6).collect();
        let mut rng = StdRng::seed_from_u64(5);
        let centers = select_centers(
            CentersInit::Gonzales,
            &dataset,
            &SquaredEuclidean,
            4,
            &subset,
            &mut rng,
        )
        .unwrap();
        assert_eq!(centers.len(), 1);
    }

    #[test]
    fn kmeanspp_aborts_on_duplicates() {
        let dataset = duplicate_dataset(6);
        let subset: Vec<PointId> = (0..6).collect();
        let mut rng = StdRng::seed_from_u64(9);
        let centers = select_centers(
            CentersInit::KmeansPP,
            &dataset,
            &SquaredEuclidean,
            4,
            &subset,
            &mut rng,
        )
        .unwrap();
        assert_eq!(centers.len(), 1);
    }

    #[test]
    fn kmeanspp_returns_distinct_centers() {
        let dataset = line_dataset();
        let mut rng = StdRng::seed_from_u64(21);
        let centers = select_centers(
            CentersInit::KmeansPP,
            &dataset,
            &SquaredEuclidean,
            3,
            &[0, 1, 2],
            &mut rng,
        )
        .unwrap();
        assert_eq!(centers.len(), 3);
        let mut sorted = centers.clone();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(sorted.len(), 3);
    }

    #[test]
    fn selection_is_deterministic_given_seed() {
        let dataset = line_dataset();
        for init in [
            CentersInit::Random,
            CentersInit::Gonzales,
            CentersInit::KmeansPP,
        ] {
            let mut rng1 = StdRng::seed_from_u64(0x5eed);
            let mut rng2 = StdRng::seed_from_u64(0x5eed);
            let a = select_centers(init, &dataset, &SquaredEuclidean, 2, &[0, 1, 2], &mut rng1)
                .unwrap();
            let b = select_centers(init, &dataset, &SquaredEuclidean, 2, &[0, 1, 2], &mut rng2)
                .unwrap();
            assert_eq!(a, b);
        }
    }
}
