use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use env_logger::Env;
use gwplace::driver::{DEFAULT_MAX_CLUSTERS, DEFAULT_SIZES};
use gwplace::{coords, kmeans, DriverConfig};

/// Generate random end-device coordinates and k-means gateway positions.
#[derive(Parser, Debug)]
#[command(version)]
struct Opts {
    /// Directory that holds the `<n>/` output folders.
    #[arg(long, default_value = ".")]
    root: PathBuf,

    /// Point-set sizes to generate.
    #[arg(long, value_delimiter = ',', default_values_t = DEFAULT_SIZES)]
    sizes: Vec<usize>,

    /// Cluster counts 1..=K are computed for every size.
    #[arg(long, default_value_t = DEFAULT_MAX_CLUSTERS)]
    max_clusters: usize,

    /// Side length of the square deployment area.
    #[arg(long, default_value_t = coords::DEFAULT_EXTENT)]
    extent: f64,

    /// Seed for coordinate generation.
    #[arg(long, default_value_t = coords::DEFAULT_SEED)]
    seed: u64,

    /// Seed for centroid initialisation.
    #[arg(long, default_value_t = kmeans::DEFAULT_SEED)]
    kmeans_seed: u64,

    /// Fail instead of creating missing `<n>/` folders.
    #[arg(long)]
    no_create_dirs: bool,
}

impl From<Opts> for DriverConfig {
    fn from(opts: Opts) -> Self {
        DriverConfig {
            root: opts.root,
            sizes: opts.sizes,
            clusters: 1..=opts.max_clusters,
            extent: opts.extent,
            coord_seed: opts.seed,
            kmeans_seed: opts.kmeans_seed,
            create_dirs: !opts.no_create_dirs,
        }
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::init_from_env(Env::default().filter_or("RUST_LOG", "info"));

    let config = DriverConfig::from(Opts::parse());
    log::info!(
        "sizes {:?}, clusters {:?}, extent {}",
        config.sizes,
        config.clusters,
        config.extent
    );
    gwplace::run(&config).with_context(|| {
        format!("sweep under {} aborted", config.root.display())
    })?;
    Ok(())
}
