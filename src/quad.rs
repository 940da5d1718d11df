/*!
Binary128 helper arithmetic using MPFR.

The error-free transforms never need more than the native formats, but
two consumers want a wider type: hosts asking for a binary128 fused
multiply-add, and the exactness tests, which reconstruct `x + e` in a
precision where every double is representable without rounding.
*/

use rug::Float;

/// Significand width of IEEE 754 binary128.
pub const BINARY128_PREC: u32 = 113;

// Wide enough that any sum/product of a handful of doubles is exact:
// the double exponent range spans ~2100 bits.
const EXACT_PREC: u32 = 4096;

/// Correctly-rounded binary128 `a * b + c`, narrowed back to binary64.
pub fn fma_binary128(a: f64, b: f64, c: f64) -> f64 {
    let fa = Float::with_val(BINARY128_PREC, a);
    let fb = Float::with_val(BINARY128_PREC, b);
    let fc = Float::with_val(BINARY128_PREC, c);
    fa.mul_add(&fb, &fc).to_f64()
}

/// Lifts a binary64 value into a precision where subsequent sums and
/// products of doubles stay exact.
pub fn wide(x: f64) -> Float {
    Float::with_val(EXACT_PREC, x)
}

/// Lifts a binary32 value; same exactness guarantee.
pub fn wide32(x: f32) -> Float {
    Float::with_val(EXACT_PREC, x)
}
