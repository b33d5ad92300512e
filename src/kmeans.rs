use log::{debug, trace};
use ndarray::{Array1, Array2, ArrayBase, Axis, Data, Ix1, Ix2};
use rand::distributions::{Distribution, WeightedError, WeightedIndex};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;

use crate::error::{Error, Result};

/// Seed used for centroid initialisation.
pub const DEFAULT_SEED: u64 = 42;
/// Upper bound on Lloyd iterations.
pub const DEFAULT_MAX_ITER: usize = 300;
/// Convergence tolerance, relative to the mean per-axis variance of the data.
pub const DEFAULT_TOL: f64 = 1e-4;

/// Enum representing the distance metric to be used.
#[derive(Clone, Debug, Default)]
pub enum DistanceMetric {
    #[default]
    SquaredEuclidean,
}

/// Standard K-Means clustering (k-means++ seeding, Lloyd iterations).
#[derive(Clone, Debug)]
pub struct KMeans {
    pub n_clusters: usize,
    pub max_iter: usize,
    pub tol: f64,
    pub seed: u64,
    pub metric: DistanceMetric,
}

/// Result of fitting [`KMeans`] to a point set.
#[derive(Clone, Debug)]
pub struct KMeansFit {
    /// One row per cluster.
    pub centroids: Array2<f64>,
    /// Index of the nearest centroid for every input row.
    pub labels: Array1<usize>,
    /// Sum of squared distances from each point to its centroid.
    pub inertia: f64,
    /// Lloyd iterations performed.
    pub n_iter: usize,
}

impl KMeans {
    /// Creates a new KMeans instance with the default seed, iteration cap and tolerance.
    pub fn new(n_clusters: usize) -> Self {
        KMeans {
            n_clusters,
            max_iter: DEFAULT_MAX_ITER,
            tol: DEFAULT_TOL,
            seed: DEFAULT_SEED,
            metric: DistanceMetric::default(),
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    pub fn with_tol(mut self, tol: f64) -> Self {
        self.tol = tol;
        self
    }

    /// Fits the model to the data and returns centroids, labels and inertia.
    ///
    /// Iteration stops when no label changes, when the summed squared centroid
    /// shift drops to `tol` times the mean per-axis variance, or after
    /// `max_iter` rounds. An emptied cluster is moved onto the point farthest
    /// from its current centroid.
    pub fn fit<S>(&self, x: &ArrayBase<S, Ix2>) -> Result<KMeansFit>
    where
        S: Data<Elem = f64> + Sync,
    {
        self.validate(x)?;
        let n_samples = x.len_of(Axis(0));
        let n_features = x.len_of(Axis(1));
        let k = self.n_clusters;

        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut centroids = self.init_plusplus(x, &mut rng)?;

        let threshold = self.tol * mean_variance(x);
        let mut labels = Array1::<usize>::zeros(n_samples);
        let mut n_iter = 0;

        for iter in 1..=self.max_iter {
            n_iter = iter;

            // Assign labels.
            let nearest = self.nearest(x, &centroids);
            let new_labels: Array1<usize> = nearest.iter().map(|&(j, _)| j).collect();
            if iter > 1 && new_labels == labels {
                trace!("iteration {iter}: labels stable");
                break;
            }
            labels = new_labels;

            // Compute new centroids.
            let mut sums = Array2::<f64>::zeros((k, n_features));
            let mut counts = vec![0usize; k];
            x.axis_iter(Axis(0))
                .zip(labels.iter())
                .for_each(|(row, &label)| {
                    sums.row_mut(label).zip_mut_with(&row, |a, &b| *a += b);
                    counts[label] += 1;
                });

            relocate_empty(x, &nearest, &labels, &mut sums, &mut counts);

            sums.axis_iter_mut(Axis(0))
                .enumerate()
                .for_each(|(j, mut c)| {
                    if counts[j] > 0 {
                        c.mapv_inplace(|v| v / counts[j] as f64);
                    }
                });

            let shift = (&sums - &centroids).mapv(|v| v * v).sum();
            centroids = sums;
            trace!("iteration {iter}: centroid shift {shift:.6e}");
            if shift <= threshold {
                break;
            }
        }

        // Final assignment against the centroids actually returned.
        let nearest = self.nearest(x, &centroids);
        let labels: Array1<usize> = nearest.iter().map(|&(j, _)| j).collect();
        let inertia: f64 = nearest.iter().map(|&(_, d)| d).sum();

        Ok(KMeansFit {
            centroids,
            labels,
            inertia,
            n_iter,
        })
    }

    /// Computes clustering and predicts cluster indices for each sample.
    pub fn fit_predict<S>(&self, x: &ArrayBase<S, Ix2>) -> Result<(Array2<f64>, Array1<usize>)>
    where
        S: Data<Elem = f64> + Sync,
    {
        let fit = self.fit(x)?;
        Ok((fit.centroids, fit.labels))
    }

    /// Predicts the closest cluster each sample in X belongs to.
    pub fn predict<S1, S2>(
        &self,
        x: &ArrayBase<S1, Ix2>,
        centroids: &ArrayBase<S2, Ix2>,
    ) -> Array1<usize>
    where
        S1: Data<Elem = f64> + Sync,
        S2: Data<Elem = f64> + Sync,
    {
        self.nearest(x, centroids).into_iter().map(|(j, _)| j).collect()
    }

    fn validate<S>(&self, x: &ArrayBase<S, Ix2>) -> Result<()>
    where
        S: Data<Elem = f64>,
    {
        let n_items = x.len_of(Axis(0));
        if n_items == 0 {
            return Err(Error::EmptyInput);
        }
        if x.len_of(Axis(1)) == 0 {
            return Err(Error::InvalidParameter {
                name: "points",
                message: "rows must have at least one coordinate".into(),
            });
        }
        if x.iter().any(|v| !v.is_finite()) {
            return Err(Error::InvalidParameter {
                name: "points",
                message: "coordinates must be finite".into(),
            });
        }
        if !spread_sq(x).is_finite() {
            return Err(Error::InvalidParameter {
                name: "points",
                message: "squared distances between points overflow f64".into(),
            });
        }
        if self.n_clusters == 0 || self.n_clusters > n_items {
            return Err(Error::InvalidClusterCount {
                requested: self.n_clusters,
                n_items,
            });
        }
        let distinct = count_distinct(x);
        if self.n_clusters > distinct {
            return Err(Error::TooFewDistinctPoints {
                requested: self.n_clusters,
                distinct,
            });
        }
        Ok(())
    }

    /// k-means++: first centroid uniform, each next one drawn with probability
    /// proportional to squared distance from the nearest centroid so far.
    fn init_plusplus<S, R>(&self, x: &ArrayBase<S, Ix2>, rng: &mut R) -> Result<Array2<f64>>
    where
        S: Data<Elem = f64>,
        R: Rng,
    {
        let n_samples = x.len_of(Axis(0));
        let n_features = x.len_of(Axis(1));
        let mut centroids = Array2::<f64>::zeros((self.n_clusters, n_features));

        let first = rng.gen_range(0..n_samples);
        centroids.row_mut(0).assign(&x.row(first));
        let mut closest: Vec<f64> = x
            .axis_iter(Axis(0))
            .map(|row| self.compute_distance(&row, &x.row(first)))
            .collect();

        for c in 1..self.n_clusters {
            let weights = WeightedIndex::new(&closest).map_err(|e| match e {
                WeightedError::AllWeightsZero => Error::TooFewDistinctPoints {
                    requested: self.n_clusters,
                    distinct: c,
                },
                other => Error::InvalidParameter {
                    name: "points",
                    message: format!("cannot draw k-means++ seed {c}: {other}"),
                },
            })?;
            let idx = weights.sample(rng);
            centroids.row_mut(c).assign(&x.row(idx));
            for (d, row) in closest.iter_mut().zip(x.axis_iter(Axis(0))) {
                *d = d.min(self.compute_distance(&row, &x.row(idx)));
            }
        }

        Ok(centroids)
    }

    /// Index of and distance to the closest centroid for every sample.
    fn nearest<S1, S2>(
        &self,
        x: &ArrayBase<S1, Ix2>,
        centroids: &ArrayBase<S2, Ix2>,
    ) -> Vec<(usize, f64)>
    where
        S1: Data<Elem = f64> + Sync,
        S2: Data<Elem = f64> + Sync,
    {
        let n_samples = x.len_of(Axis(0));
        let n_centroids = centroids.len_of(Axis(0));
        (0..n_samples)
            .into_par_iter()
            .map(|i| {
                let row = x.row(i);
                let mut min_dist = f64::INFINITY;
                let mut min_j = 0;
                for j in 0..n_centroids {
                    let dist = self.compute_distance(&row, &centroids.row(j));
                    if dist < min_dist {
                        min_dist = dist;
                        min_j = j;
                    }
                }
                (min_j, min_dist)
            })
            .collect()
    }

    /// Computes the distance between two points based on the selected metric.
    fn compute_distance<S1, S2>(&self, a: &ArrayBase<S1, Ix1>, b: &ArrayBase<S2, Ix1>) -> f64
    where
        S1: Data<Elem = f64>,
        S2: Data<Elem = f64>,
    {
        match self.metric {
            DistanceMetric::SquaredEuclidean => a
                .iter()
                .zip(b.iter())
                .map(|(p, q)| (p - q) * (p - q))
                .sum(),
        }
    }
}

/// Clusters `points` into `k` groups with the default configuration and
/// returns the centroids.
pub fn reduce<S>(points: &ArrayBase<S, Ix2>, k: usize) -> Result<Array2<f64>>
where
    S: Data<Elem = f64> + Sync,
{
    let fit = KMeans::new(k).fit(points)?;
    debug!(
        "k={k}: converged after {} iterations, inertia {:.3}",
        fit.n_iter, fit.inertia
    );
    Ok(fit.centroids)
}

/// Seats every empty cluster on a distinct point, farthest from its current
/// centroid first. The donor cluster gives the point up unless it is the
/// donor's only member.
fn relocate_empty<S>(
    x: &ArrayBase<S, Ix2>,
    nearest: &[(usize, f64)],
    labels: &Array1<usize>,
    sums: &mut Array2<f64>,
    counts: &mut [usize],
) where
    S: Data<Elem = f64>,
{
    let empty: Vec<usize> = (0..counts.len()).filter(|&j| counts[j] == 0).collect();
    if empty.is_empty() {
        return;
    }
    let mut farthest: Vec<usize> = (0..nearest.len()).collect();
    farthest.sort_by(|&a, &b| nearest[b].1.total_cmp(&nearest[a].1));
    for (&j, &i) in empty.iter().zip(&farthest) {
        let old = labels[i];
        if counts[old] > 1 {
            sums.row_mut(old).zip_mut_with(&x.row(i), |a, &b| *a -= b);
            counts[old] -= 1;
        }
        sums.row_mut(j).assign(&x.row(i));
        counts[j] = 1;
        debug!("relocated empty cluster {j} onto point {i}");
    }
}

/// Squared diagonal of the bounding box: the largest squared distance any
/// two points can have.
fn spread_sq<S>(x: &ArrayBase<S, Ix2>) -> f64
where
    S: Data<Elem = f64>,
{
    x.axis_iter(Axis(1))
        .map(|col| {
            let lo = col.iter().copied().fold(f64::INFINITY, f64::min);
            let hi = col.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            (hi - lo) * (hi - lo)
        })
        .sum()
}

fn mean_variance<S>(x: &ArrayBase<S, Ix2>) -> f64
where
    S: Data<Elem = f64>,
{
    x.var_axis(Axis(0), 0.0).mean().unwrap_or(0.0)
}

fn count_distinct<S>(x: &ArrayBase<S, Ix2>) -> usize
where
    S: Data<Elem = f64>,
{
    // +0.0 folds -0.0 onto 0.0 so both hash to the same bits.
    let mut rows: Vec<Vec<u64>> = x
        .axis_iter(Axis(0))
        .map(|row| row.iter().map(|&v| (v + 0.0).to_bits()).collect())
        .collect();
    rows.sort_unstable();
    rows.dedup();
    rows.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn blobs() -> Array2<f64> {
        array![
            [0.0, 0.0],
            [0.5, 0.2],
            [0.1, 0.4],
            [100.0, 100.0],
            [100.3, 99.8],
            [99.9, 100.4],
        ]
    }

    #[test]
    fn separates_two_blobs() {
        let (_, labels) = KMeans::new(2).fit_predict(&blobs()).unwrap();
        assert_eq!(labels[0], labels[1]);
        assert_eq!(labels[1], labels[2]);
        assert_eq!(labels[3], labels[4]);
        assert_eq!(labels[4], labels[5]);
        assert_ne!(labels[0], labels[3]);
    }

    #[test]
    fn centroid_count_matches_k() {
        for k in 1..=6 {
            let fit = KMeans::new(k).fit(&blobs()).unwrap();
            assert_eq!(fit.centroids.dim(), (k, 2));
            assert_eq!(fit.labels.len(), 6);
            assert!(fit.labels.iter().all(|&l| l < k));
        }
    }

    #[test]
    fn single_cluster_is_mean() {
        let x = blobs();
        let centroids = reduce(&x, 1).unwrap();
        let mean = x.mean_axis(Axis(0)).unwrap();
        assert!((centroids[[0, 0]] - mean[0]).abs() < 1e-9);
        assert!((centroids[[0, 1]] - mean[1]).abs() < 1e-9);
    }

    #[test]
    fn k_equals_n_returns_points() {
        let x = blobs();
        let centroids = reduce(&x, x.nrows()).unwrap();
        let mut got: Vec<(f64, f64)> = centroids.rows().into_iter().map(|r| (r[0], r[1])).collect();
        let mut want: Vec<(f64, f64)> = x.rows().into_iter().map(|r| (r[0], r[1])).collect();
        got.sort_by(|a, b| a.partial_cmp(b).unwrap());
        want.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert_eq!(got, want);
    }

    #[test]
    fn deterministic_for_fixed_seed() {
        let x = blobs();
        let a = KMeans::new(3).fit(&x).unwrap();
        let b = KMeans::new(3).fit(&x).unwrap();
        assert_eq!(a.centroids, b.centroids);
        assert_eq!(a.labels, b.labels);
    }

    #[test]
    fn inertia_is_zero_when_every_point_is_a_centroid() {
        let x = blobs();
        let fit = KMeans::new(6).fit(&x).unwrap();
        assert!(fit.inertia.abs() < 1e-12);
    }

    #[test]
    fn predict_matches_fit_labels() {
        let x = blobs();
        let model = KMeans::new(2);
        let fit = model.fit(&x).unwrap();
        assert_eq!(model.predict(&x, &fit.centroids), fit.labels);
    }

    #[test]
    fn rejects_bad_cluster_counts() {
        let x = blobs();
        assert!(matches!(
            KMeans::new(0).fit(&x),
            Err(Error::InvalidClusterCount { requested: 0, n_items: 6 })
        ));
        assert!(matches!(
            KMeans::new(7).fit(&x),
            Err(Error::InvalidClusterCount { requested: 7, n_items: 6 })
        ));
    }

    #[test]
    fn rejects_k_above_distinct_points() {
        let x = array![[1.0, 1.0], [1.0, 1.0], [2.0, 2.0], [-0.0, 0.0], [0.0, 0.0]];
        assert!(KMeans::new(3).fit(&x).is_ok());
        assert!(matches!(
            KMeans::new(4).fit(&x),
            Err(Error::TooFewDistinctPoints { requested: 4, distinct: 3 })
        ));
    }

    #[test]
    fn rejects_empty_and_non_finite() {
        let empty = Array2::<f64>::zeros((0, 2));
        assert!(matches!(KMeans::new(1).fit(&empty), Err(Error::EmptyInput)));
        let nan = array![[0.0, f64::NAN], [1.0, 1.0]];
        assert!(matches!(
            KMeans::new(1).fit(&nan),
            Err(Error::InvalidParameter { name: "points", .. })
        ));
    }

    #[test]
    fn respects_iteration_cap() {
        let x = crate::coords::generate_coords(500, 7000.0, 7).unwrap();
        let fit = KMeans::new(20).with_max_iter(2).with_tol(0.0).fit(&x).unwrap();
        assert!(fit.n_iter <= 2);
        assert_eq!(fit.centroids.nrows(), 20);
    }

    #[test]
    fn relocation_moves_farthest_point_out_of_donor() {
        let x = array![[0.0, 0.0], [1.0, 0.0], [10.0, 0.0], [20.0, 0.0]];
        let labels = array![0, 0, 0, 1];
        // Distances to the pre-update centroids: point 2 is the farthest.
        let nearest = vec![(0, 1.0), (0, 0.0), (0, 81.0), (1, 0.0)];
        let mut sums = array![[11.0, 0.0], [20.0, 0.0], [0.0, 0.0]];
        let mut counts = vec![3, 1, 0];

        relocate_empty(&x, &nearest, &labels, &mut sums, &mut counts);

        assert_eq!(counts, vec![2, 1, 1]);
        assert_eq!(sums.row(2), x.row(2));
        assert_eq!(sums.row(0), array![1.0, 0.0]);
        assert_eq!(sums.row(1), array![20.0, 0.0]);
    }

    #[test]
    fn relocation_leaves_singleton_donor_intact() {
        let x = array![[0.0, 0.0], [5.0, 5.0], [9.0, 9.0]];
        let labels = array![0, 0, 1];
        let nearest = vec![(0, 0.0), (0, 2.0), (1, 50.0)];
        let mut sums = array![[5.0, 5.0], [9.0, 9.0], [0.0, 0.0]];
        let mut counts = vec![2, 1, 0];

        relocate_empty(&x, &nearest, &labels, &mut sums, &mut counts);

        assert_eq!(counts, vec![2, 1, 1]);
        assert_eq!(sums.row(1), array![9.0, 9.0]);
        assert_eq!(sums.row(2), x.row(2));
    }

    #[test]
    fn relocation_seats_each_empty_cluster_on_a_distinct_point() {
        let x = array![[0.0, 0.0], [3.0, 0.0], [7.0, 0.0]];
        let labels = array![0, 0, 0];
        let nearest = vec![(0, 9.0), (0, 1.0), (0, 16.0)];
        let mut sums = array![[10.0, 0.0], [0.0, 0.0], [0.0, 0.0]];
        let mut counts = vec![3, 0, 0];

        relocate_empty(&x, &nearest, &labels, &mut sums, &mut counts);

        assert_eq!(counts, vec![1, 1, 1]);
        assert_eq!(sums.row(1), x.row(2));
        assert_eq!(sums.row(2), x.row(0));
        assert_eq!(sums.row(0), x.row(1));
    }

    #[test]
    fn overflowing_spread_is_reported_as_invalid_points() {
        let x = array![[0.0, 0.0], [1e200, 1e200], [5.0, 5.0]];
        for k in 1..=3 {
            match KMeans::new(k).fit(&x) {
                Err(Error::InvalidParameter { name, message }) => {
                    assert_eq!(name, "points");
                    assert!(message.contains("overflow"));
                }
                other => panic!("k={k}: unexpected {other:?}"),
            }
        }
    }

    #[test]
    fn count_distinct_folds_signed_zero() {
        let x = array![[0.0, -0.0], [-0.0, 0.0], [0.0, 0.0]];
        assert_eq!(count_distinct(&x), 1);
    }
}
