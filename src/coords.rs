use ndarray::Array2;
use ndarray_rand::RandomExt;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::Uniform;

use crate::error::{Error, Result};

/// Side length of the square deployment area.
pub const DEFAULT_EXTENT: f64 = 7000.0;
/// Seed used for coordinate generation.
pub const DEFAULT_SEED: u64 = 42;

/// Generates `n` points uniformly distributed in `[0, extent) x [0, extent)`.
///
/// The generator is seeded locally and dropped on return, so repeated calls
/// with the same seed yield the same array and nothing else in the process
/// observes the seed.
pub fn generate_coords(n: usize, extent: f64, seed: u64) -> Result<Array2<f64>> {
    if !(extent.is_finite() && extent > 0.0) {
        return Err(Error::InvalidParameter {
            name: "extent",
            message: format!("must be positive and finite, got {extent}"),
        });
    }
    let mut rng = StdRng::seed_from_u64(seed);
    Ok(Array2::random_using((n, 2), Uniform::new(0.0, extent), &mut rng))
}
