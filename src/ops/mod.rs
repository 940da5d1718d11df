/*!
Error-free transforms for the instrumented operations.

For each operation kind this module provides a pure `nearest` function
(the IEEE round-to-nearest result `x`) and an `error` function recovering
the rounding error `e` such that, over the reals, `x + e` equals the exact
result (for division, `e` is a signed residual; see [`DivOp`]). The
rounding-decision layer consumes these through the [`FpOp`] trait.

All arithmetic here executes under hardware round-to-nearest-ties-to-even
and must compile to fused multiply-adds where the formulas call for them;
without a correctly-rounded fma the transforms are not exact and every
rounding decision downstream becomes biased.
*/

pub mod arith;
pub mod cast;
pub mod fma;
pub mod pack;

pub use arith::{AddOp, DivOp, MulOp, SubOp};
pub use cast::CastOp;
pub use fma::FmaOp;
pub use pack::{ArgPack, Pack1, Pack2, Pack3};

use crate::real::Real;

/// Operation hash labels.
pub mod op_hash {
    pub const ADD: u64 = 0;
    pub const SUB: u64 = 1;
    pub const MUL: u64 = 2;
    pub const DIV: u64 = 3;
    pub const FMA: u64 = 4;
    pub const CAST: u64 = 5;
}

/// Number of per-type hash labels (binary32, binary64, other).
pub const NB_TYPE_HASH: u64 = 3;

/// An intercepted floating-point operation.
///
/// Implementors are zero-sized tags; every function is pure and
/// side-effect free. `Real` is the *output* type of the operation, which
/// differs from the pack's operand type only for the narrowing cast.
pub trait FpOp {
    /// Output scalar type.
    type Real: Real;

    /// Operand pack type.
    type Pack: ArgPack;

    /// Operation hash label (see [`op_hash`]).
    const OP_HASH: u64;

    /// Operation name for diagnostics.
    fn name() -> &'static str;

    /// Combined per-call label: `op * 3 + type`.
    fn hash() -> u64 {
        Self::OP_HASH * NB_TYPE_HASH + Self::Real::TYPE_HASH
    }

    /// The IEEE 754 round-to-nearest result.
    fn nearest(p: &Self::Pack) -> Self::Real;

    /// The rounding error of `x = nearest(p)`, exactly representable for
    /// finite, non-underflowing inputs.
    fn error(p: &Self::Pack, x: Self::Real) -> Self::Real;

    /// A value whose sign equals the sign of the true error (zero iff
    /// the operation was exact). Cheaper than `error` for the formats
    /// where the error itself needs a wider intermediate.
    fn same_sign_of_error(p: &Self::Pack, x: Self::Real) -> Self::Real {
        Self::error(p, x)
    }

    /// Canonicalized pack for the commutativity-aware deterministic
    /// modes. Identity for non-commutative operations.
    fn comdet_pack(p: &Self::Pack) -> Self::Pack {
        *p
    }

    /// Hash used together with [`FpOp::comdet_pack`]; subtraction reports
    /// the addition hash so that `a - b` and `a + (-b)` key identically.
    fn comdet_hash() -> u64 {
        Self::hash()
    }

    /// True when an infinite nearest result is an artifact of the inputs
    /// (NaN/Inf operands, division by zero) rather than of rounding, so
    /// the directed modes must saturate instead of trusting the error
    /// term.
    fn inf_not_specific_to_nearest(p: &Self::Pack) -> bool;
}

/// Knuth's branch-free TwoSum: returns `(x, e)` with `x = a + b` rounded
/// to nearest and `x + e == a + b` exactly.
pub fn two_sum<T: Real>(a: T, b: T) -> (T, T) {
    let x = a + b;
    let z = x - a;
    let e = (a - (x - z)) + (b - z);
    (x, e)
}

/// TwoProd via one fma: returns `(x, e)` with `x = a * b` rounded to
/// nearest and `x + e == a * b` exactly.
pub fn two_prod<T: Real>(a: T, b: T) -> (T, T) {
    let x = a * b;
    let e = T::fma(a, b, -x);
    (x, e)
}
