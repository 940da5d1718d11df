/*!
`srfloat` is a floating-point instrumentation backend: it recomputes every
elementary IEEE 754 operation of an instrumented program — addition,
subtraction, multiplication, division, fused multiply-add, and
double-to-float narrowing — under a caller-selectable non-standard rounding
rule. Perturbing every rounding decision exposes computations whose answer
depends on the details of round-to-nearest.

This is the API documentation.

The crate is a thin, stateless-per-call pipeline over two layers:

  - an error-free transform layer ([`ops`]) that recovers, for each
    operation, the round-to-nearest result `x` together with the exact
    rounding error `e` such that `x + e` equals the operation over the
    reals;
  - a rounding-decision layer ([`round`]) that consumes `(x, e)` and emits
    an adjacent representable value according to the selected
    [`RoundingMode`] — directed, random, stochastic-average, deterministic
    hashed, farthest, float-precision, flush-to-zero, or native.

Hosts drive the backend through [`Context`] and the vtables returned by
[`backend::init`]; packed binary32 variants live in [`simd`].
*/

pub mod backend;
pub mod config;
pub mod ops;
pub mod profiling;
pub mod quad;
pub mod real;
pub mod rng;
pub mod round;
pub mod simd;

mod error;

pub use crate::backend::{BackendInterface, Context};
pub use crate::error::ConfigError;
pub use crate::real::Real;
pub use crate::round::RoundingMode;
