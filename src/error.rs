// srfloat: stochastic rounding for IEEE 754 floats
//
// error.rs
//
// Configuration errors

use thiserror::Error;

/// Rejected backend configuration.
///
/// The command-line boundary turns these into a stderr diagnostic and
/// exit code 42; the arithmetic path can never produce one.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error(
        "rounding-mode invalid value provided ({0}), must be one of: \
         nearest, upward, downward, toward_zero, random, random_det, \
         random_comdet, average, average_det, average_comdet, prandom, \
         prandom_det, prandom_comdet, farthest, float, native, ftz"
    )]
    UnknownRoundingMode(String),

    #[error("seed invalid value provided ({0}), must be an integer")]
    InvalidSeed(String),
}
