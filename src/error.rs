use std::path::PathBuf;

use thiserror::Error;

/// Errors returned by point generation, clustering and file I/O.
#[derive(Debug, Error)]
pub enum Error {
    /// Input point set is empty.
    #[error("empty input")]
    EmptyInput,

    /// Invalid parameter value.
    #[error("invalid parameter {name}: {message}")]
    InvalidParameter {
        /// Parameter name.
        name: &'static str,
        /// Human-readable explanation.
        message: String,
    },

    /// Requested cluster count is incompatible with the dataset.
    #[error("invalid cluster count: requested {requested}, but dataset has {n_items} items")]
    InvalidClusterCount {
        /// Requested number of clusters.
        requested: usize,
        /// Number of points in the dataset.
        n_items: usize,
    },

    /// More clusters requested than there are distinct points to seat them on.
    #[error("requested {requested} clusters, but dataset has only {distinct} distinct points")]
    TooFewDistinctPoints {
        /// Requested number of clusters.
        requested: usize,
        /// Number of distinct points in the dataset.
        distinct: usize,
    },

    /// Output directory does not exist and was not allowed to be created.
    #[error("output directory {} does not exist", .0.display())]
    MissingDirectory(PathBuf),

    /// A row in a coordinate file could not be parsed.
    #[error("{}:{line}: {message}", path.display())]
    Parse {
        /// File being read.
        path: PathBuf,
        /// 1-based line number.
        line: usize,
        /// What was wrong with the row.
        message: String,
    },

    /// Filesystem failure.
    #[error("{}: {source}", path.display())]
    Io {
        /// Path being read or written.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type used by this crate.
pub type Result<T> = std::result::Result<T, Error>;
