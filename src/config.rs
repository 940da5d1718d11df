/*!
Command-line configuration.

The host forwards its backend argument vector here before calling
[`init`][crate::backend::init]. Three options are understood:

- `--rounding-mode=<MODE>` — one of the seventeen mode spellings
  (see [`RoundingMode`]);
- `--seed=<N>` — pin the random generator seed;
- `--static-backend` — request the mode-specialized dispatch table.

An unknown mode or a non-integer seed prints a diagnostic on stderr and
exits with code 42.
*/

use clap::Parser;

use crate::backend::Context;
use crate::error::ConfigError;
use crate::round::RoundingMode;

/// Backend options, as forwarded by the host.
#[derive(Parser, Debug, Default)]
#[command(name = "srfloat", disable_help_flag = true, no_binary_name = true)]
pub struct Args {
    /// Select the rounding mode among {nearest, upward, downward,
    /// toward_zero, random, random_det, random_comdet, average,
    /// average_det, average_comdet, prandom, prandom_det,
    /// prandom_comdet, farthest, float, native, ftz}.
    #[arg(long, value_name = "ROUNDING_MODE")]
    pub rounding_mode: Option<String>,

    /// Fix the random generator seed.
    #[arg(long, value_name = "SEED", allow_hyphen_values = true)]
    pub seed: Option<String>,

    /// Load the operators directly instead of switching, which makes
    /// computations faster.
    #[arg(long)]
    pub static_backend: bool,
}

impl Args {
    /// Validates the raw option values and writes them into the context.
    pub fn apply(&self, ctx: &mut Context) -> Result<(), ConfigError> {
        if let Some(mode) = &self.rounding_mode {
            ctx.rounding_mode = mode.parse::<RoundingMode>()?;
            ctx.default_rounding_mode = ctx.rounding_mode;
        }
        if let Some(seed) = &self.seed {
            ctx.seed = seed
                .trim()
                .parse::<u64>()
                .map_err(|_| ConfigError::InvalidSeed(seed.clone()))?;
            ctx.choose_seed = true;
        }
        if self.static_backend {
            ctx.static_backend = true;
        }
        Ok(())
    }
}

/// Parses an argument slice into the context. Invalid option values come
/// back as [`ConfigError`]; malformed options follow standard argument
/// parser behavior.
pub fn from_args<I, S>(args: I, ctx: &mut Context) -> Result<(), ConfigError>
where
    I: IntoIterator<Item = S>,
    S: Into<std::ffi::OsString> + Clone,
{
    let parsed = Args::try_parse_from(args).unwrap_or_else(|e| e.exit());
    parsed.apply(ctx)
}

/// Parses and applies backend arguments, exiting with code 42 on an
/// invalid value. Logs the resulting mode on success.
pub fn cli<I, S>(args: I, ctx: &mut Context)
where
    I: IntoIterator<Item = S>,
    S: Into<std::ffi::OsString> + Clone,
{
    if let Err(err) = from_args(args, ctx) {
        eprintln!("{err}");
        std::process::exit(42);
    }
    tracing::info!("ROUNDING MODE : {}", ctx.rounding_mode);
}
