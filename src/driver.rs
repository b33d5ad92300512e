use std::fs;
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};

use log::{debug, info};
use ndarray::{Array2, ArrayBase, Data, Ix2};

use crate::coords::{self, generate_coords};
use crate::csv::write_points;
use crate::error::{Error, Result};
use crate::kmeans::{self, KMeans};

/// Point-set sizes swept by the default run.
pub const DEFAULT_SIZES: [usize; 5] = [200, 400, 600, 800, 1000];
/// Largest cluster count swept by the default run.
pub const DEFAULT_MAX_CLUSTERS: usize = 28;

/// Parameters of one generate-and-cluster sweep.
#[derive(Clone, Debug)]
pub struct DriverConfig {
    /// Directory under which `<n>/` output folders live.
    pub root: PathBuf,
    pub sizes: Vec<usize>,
    pub clusters: RangeInclusive<usize>,
    pub extent: f64,
    pub coord_seed: u64,
    pub kmeans_seed: u64,
    /// Create missing `<n>/` folders instead of failing.
    pub create_dirs: bool,
}

impl Default for DriverConfig {
    fn default() -> Self {
        DriverConfig {
            root: PathBuf::from("."),
            sizes: DEFAULT_SIZES.to_vec(),
            clusters: 1..=DEFAULT_MAX_CLUSTERS,
            extent: coords::DEFAULT_EXTENT,
            coord_seed: coords::DEFAULT_SEED,
            kmeans_seed: kmeans::DEFAULT_SEED,
            create_dirs: true,
        }
    }
}

/// Files produced by [`run`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub point_files: usize,
    pub centroid_files: usize,
}

/// `<root>/<n>/<n>sms.csv`
pub fn points_path(root: &Path, n: usize) -> PathBuf {
    root.join(n.to_string()).join(format!("{n}sms.csv"))
}

/// `<root>/<n>/<k>gws.csv`
pub fn centroids_path(root: &Path, n: usize, k: usize) -> PathBuf {
    root.join(n.to_string()).join(format!("{k}gws.csv"))
}

/// Generates `n` points with the default extent and seed and writes them to
/// [`points_path`]. The `<n>/` folder must already exist.
pub fn gen_ncoords(root: &Path, n: usize) -> Result<Array2<f64>> {
    gen_ncoords_with(root, n, coords::DEFAULT_EXTENT, coords::DEFAULT_SEED)
}

/// [`gen_ncoords`] with an explicit extent and seed.
pub fn gen_ncoords_with(root: &Path, n: usize, extent: f64, seed: u64) -> Result<Array2<f64>> {
    let points = generate_coords(n, extent, seed)?;
    write_points(&points_path(root, n), &points)?;
    Ok(points)
}

/// Reduces `points` to `k` centroids with the default model and writes them
/// to [`centroids_path`], keyed by the number of points.
pub fn cluster_ncoords<S>(root: &Path, points: &ArrayBase<S, Ix2>, k: usize) -> Result<Array2<f64>>
where
    S: Data<Elem = f64> + Sync,
{
    cluster_ncoords_with(root, points, &KMeans::new(k))
}

/// [`cluster_ncoords`] with a caller-configured model; k is `model.n_clusters`.
pub fn cluster_ncoords_with<S>(
    root: &Path,
    points: &ArrayBase<S, Ix2>,
    model: &KMeans,
) -> Result<Array2<f64>>
where
    S: Data<Elem = f64> + Sync,
{
    let (n, k) = (points.nrows(), model.n_clusters);
    let fit = model.fit(points)?;
    debug!(
        "n={n} k={k}: {} iterations, inertia {:.3}",
        fit.n_iter, fit.inertia
    );
    write_points(&centroids_path(root, n, k), &fit.centroids)?;
    Ok(fit.centroids)
}

/// Runs the full sweep: one point set per size, then every cluster count
/// against it. Stops at the first error; files already written are kept.
pub fn run(config: &DriverConfig) -> Result<RunSummary> {
    let mut summary = RunSummary::default();

    for &n in &config.sizes {
        info!("generating {n} points");
        prepare_dir(&config.root.join(n.to_string()), config.create_dirs)?;

        let points = gen_ncoords_with(&config.root, n, config.extent, config.coord_seed)?;
        summary.point_files += 1;

        for k in config.clusters.clone() {
            let model = KMeans::new(k).with_seed(config.kmeans_seed);
            cluster_ncoords_with(&config.root, &points, &model)?;
            summary.centroid_files += 1;
        }
        info!("n={n}: wrote {} centroid sets", config.clusters.clone().count());
    }

    info!(
        "done: {} point files, {} centroid files under {}",
        summary.point_files,
        summary.centroid_files,
        config.root.display()
    );
    Ok(summary)
}

fn prepare_dir(dir: &Path, create: bool) -> Result<()> {
    if dir.is_dir() {
        return Ok(());
    }
    if !create {
        return Err(Error::MissingDirectory(dir.to_path_buf()));
    }
    debug!("creating {}", dir.display());
    fs::create_dir_all(dir).map_err(|e| Error::io(dir, e))
}
