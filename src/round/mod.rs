/*!
Rounding modes and the rounding-decision dispatcher.

Every intercepted operation is first evaluated under hardware
round-to-nearest; the dispatcher then consults the selected
[`RoundingMode`] and the recovered rounding error to decide between the
nearest result and one of its two representable neighbors (a few modes —
float, native, ftz — have their own value sets instead).
*/

pub mod dispatch;

pub use dispatch::{apply, apply_mode};

use std::fmt;
use std::str::FromStr;

use crate::error::ConfigError;

/// Rounding modes selectable by the host.
///
/// The directed modes (`Upward`, `Downward`, `Zero`) and `Farthest`
/// depend only on the sign of the rounding error. The `Random`,
/// `Average`, and `PRandom` families draw from the per-thread generator;
/// their `*Det` variants draw from a keyed hash of the call site instead
/// (reproducible per operand tuple), and `*Comdet` additionally
/// canonicalizes commutative argument packs so algebraic reorderings
/// perturb identically.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RoundingMode {
    Nearest,
    Upward,
    Downward,
    Zero,
    Random,
    RandomDet,
    RandomComdet,
    Average,
    AverageDet,
    AverageComdet,
    PRandom,
    PRandomDet,
    PRandomComdet,
    Farthest,
    Float,
    Native,
    Ftz,
}

impl RoundingMode {
    /// All modes, in the order the CLI documents them.
    pub const ALL: [RoundingMode; 17] = [
        RoundingMode::Nearest,
        RoundingMode::Upward,
        RoundingMode::Downward,
        RoundingMode::Zero,
        RoundingMode::Random,
        RoundingMode::RandomDet,
        RoundingMode::RandomComdet,
        RoundingMode::Average,
        RoundingMode::AverageDet,
        RoundingMode::AverageComdet,
        RoundingMode::PRandom,
        RoundingMode::PRandomDet,
        RoundingMode::PRandomComdet,
        RoundingMode::Farthest,
        RoundingMode::Float,
        RoundingMode::Native,
        RoundingMode::Ftz,
    ];

    /// The command-line spelling of this mode.
    pub fn cli_name(self) -> &'static str {
        match self {
            RoundingMode::Nearest => "nearest",
            RoundingMode::Upward => "upward",
            RoundingMode::Downward => "downward",
            RoundingMode::Zero => "toward_zero",
            RoundingMode::Random => "random",
            RoundingMode::RandomDet => "random_det",
            RoundingMode::RandomComdet => "random_comdet",
            RoundingMode::Average => "average",
            RoundingMode::AverageDet => "average_det",
            RoundingMode::AverageComdet => "average_comdet",
            RoundingMode::PRandom => "prandom",
            RoundingMode::PRandomDet => "prandom_det",
            RoundingMode::PRandomComdet => "prandom_comdet",
            RoundingMode::Farthest => "farthest",
            RoundingMode::Float => "float",
            RoundingMode::Native => "native",
            RoundingMode::Ftz => "ftz",
        }
    }
}

impl fmt::Display for RoundingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RoundingMode::Nearest => "NEAREST",
            RoundingMode::Upward => "UPWARD",
            RoundingMode::Downward => "DOWNWARD",
            RoundingMode::Zero => "TOWARD_ZERO",
            RoundingMode::Random => "RANDOM",
            RoundingMode::RandomDet => "RANDOM_DET",
            RoundingMode::RandomComdet => "RANDOM_COMDET",
            RoundingMode::Average => "AVERAGE",
            RoundingMode::AverageDet => "AVERAGE_DET",
            RoundingMode::AverageComdet => "AVERAGE_COMDET",
            RoundingMode::PRandom => "PRANDOM",
            RoundingMode::PRandomDet => "PRANDOM_DET",
            RoundingMode::PRandomComdet => "PRANDOM_COMDET",
            RoundingMode::Farthest => "FARTHEST",
            RoundingMode::Float => "FLOAT",
            RoundingMode::Native => "NATIVE",
            RoundingMode::Ftz => "FTZ",
        };
        f.write_str(name)
    }
}

impl FromStr for RoundingMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, ConfigError> {
        RoundingMode::ALL
            .iter()
            .copied()
            .find(|m| m.cli_name().eq_ignore_ascii_case(s))
            .ok_or_else(|| ConfigError::UnknownRoundingMode(s.to_string()))
    }
}
