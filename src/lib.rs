//! Synthetic gateway placement.
//!
//! Generates uniform random end-device coordinates in a square area, reduces
//! each point set to `k` gateway positions with k-means, and writes both as
//! headerless CSV files laid out as `<n>/<n>sms.csv` and `<n>/<k>gws.csv`.

pub mod coords;
pub mod csv;
pub mod driver;
pub mod error;
pub mod kmeans;

pub use coords::generate_coords;
pub use csv::{read_points, write_points};
pub use driver::{
    centroids_path, cluster_ncoords, cluster_ncoords_with, gen_ncoords, gen_ncoords_with,
    points_path, run, DriverConfig, RunSummary,
};
pub use error::{Error, Result};
pub use kmeans::{reduce, DistanceMetric, KMeans, KMeansFit};
