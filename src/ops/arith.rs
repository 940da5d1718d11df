// srfloat: stochastic rounding for IEEE 754 floats
//
// ops/arith.rs
//
// Error-free transforms for add, sub, mul, div

use std::marker::PhantomData;

use crate::ops::{op_hash, ArgPack, FpOp, Pack2};
use crate::real::Real;

/// Addition: error recovered by TwoSum.
pub struct AddOp<T>(PhantomData<T>);

/// Subtraction: TwoSum on `(a, -b)`.
pub struct SubOp<T>(PhantomData<T>);

/// Multiplication: error recovered by one fma.
pub struct MulOp<T>(PhantomData<T>);

/// Division: the error term is a signed residual, not the quotient error.
///
/// For binary64 the residual `a - x*b` is returned as-is; for binary32 it
/// is additionally divided by `b`, putting it on the quotient-error scale.
/// The magnitude mismatch between the two formats is long-standing
/// observable behavior and is preserved, not fixed.
pub struct DivOp<T>(PhantomData<T>);

impl<T: Real> FpOp for AddOp<T> {
    type Real = T;
    type Pack = Pack2<T>;

    const OP_HASH: u64 = op_hash::ADD;

    fn name() -> &'static str {
        "add"
    }

    fn nearest(p: &Pack2<T>) -> T {
        p.a + p.b
    }

    fn error(p: &Pack2<T>, x: T) -> T {
        let z = x - p.a;
        (p.a - (x - z)) + (p.b - z)
    }

    fn comdet_pack(p: &Pack2<T>) -> Pack2<T> {
        Pack2::new(p.a.min(p.b), p.a.max(p.b))
    }

    fn inf_not_specific_to_nearest(p: &Pack2<T>) -> bool {
        p.any_nan_inf()
    }
}

impl<T: Real> FpOp for SubOp<T> {
    type Real = T;
    type Pack = Pack2<T>;

    const OP_HASH: u64 = op_hash::SUB;

    fn name() -> &'static str {
        "sub"
    }

    fn nearest(p: &Pack2<T>) -> T {
        p.a - p.b
    }

    fn error(p: &Pack2<T>, x: T) -> T {
        let b = -p.b;
        let z = x - p.a;
        (p.a - (x - z)) + (b - z)
    }

    fn comdet_pack(p: &Pack2<T>) -> Pack2<T> {
        let nb = -p.b;
        Pack2::new(p.a.min(nb), p.a.max(nb))
    }

    fn comdet_hash() -> u64 {
        AddOp::<T>::hash()
    }

    fn inf_not_specific_to_nearest(p: &Pack2<T>) -> bool {
        p.any_nan_inf()
    }
}

impl FpOp for MulOp<f64> {
    type Real = f64;
    type Pack = Pack2<f64>;

    const OP_HASH: u64 = op_hash::MUL;

    fn name() -> &'static str {
        "mul"
    }

    fn nearest(p: &Pack2<f64>) -> f64 {
        p.a * p.b
    }

    // "Accurate Sum and Dot Product", Ogita, Rump, Oishi
    fn error(p: &Pack2<f64>, x: f64) -> f64 {
        f64::fma(p.a, p.b, -x)
    }

    fn same_sign_of_error(p: &Pack2<f64>, x: f64) -> f64 {
        if x != 0.0 {
            Self::error(p, x)
        } else if p.a == 0.0 || p.b == 0.0 {
            0.0
        } else if p.a > 0.0 {
            p.b
        } else {
            -p.b
        }
    }

    fn comdet_pack(p: &Pack2<f64>) -> Pack2<f64> {
        Pack2::new(p.a.min(p.b), p.a.max(p.b))
    }

    fn inf_not_specific_to_nearest(p: &Pack2<f64>) -> bool {
        p.any_nan_inf()
    }
}

impl FpOp for MulOp<f32> {
    type Real = f32;
    type Pack = Pack2<f32>;

    const OP_HASH: u64 = op_hash::MUL;

    fn name() -> &'static str {
        "mul"
    }

    fn nearest(p: &Pack2<f32>) -> f32 {
        p.a * p.b
    }

    fn error(p: &Pack2<f32>, x: f32) -> f32 {
        f32::fma(p.a, p.b, -x)
    }

    // The binary32 error can underflow; the sign is recovered through the
    // binary64 product, which is exact.
    fn same_sign_of_error(p: &Pack2<f32>, x: f32) -> f32 {
        let r = f64::fma(f64::from(p.a), f64::from(p.b), -f64::from(x));
        if r < 0.0 {
            -1.0
        } else if r > 0.0 {
            1.0
        } else {
            0.0
        }
    }

    fn comdet_pack(p: &Pack2<f32>) -> Pack2<f32> {
        Pack2::new(p.a.min(p.b), p.a.max(p.b))
    }

    fn inf_not_specific_to_nearest(p: &Pack2<f32>) -> bool {
        p.any_nan_inf()
    }
}

impl FpOp for DivOp<f64> {
    type Real = f64;
    type Pack = Pack2<f64>;

    const OP_HASH: u64 = op_hash::DIV;

    fn name() -> &'static str {
        "div"
    }

    fn nearest(p: &Pack2<f64>) -> f64 {
        p.a / p.b
    }

    fn error(p: &Pack2<f64>, x: f64) -> f64 {
        -f64::fma(x, p.b, -p.a)
    }

    // An infinite divisor makes the residual fma evaluate 0 * inf; the
    // quotient is exact there, so a NaN residual reads as no error.
    fn same_sign_of_error(p: &Pack2<f64>, x: f64) -> f64 {
        let r = -f64::fma(x, p.b, -p.a);
        if r.is_nan() {
            0.0
        } else {
            r
        }
    }

    fn inf_not_specific_to_nearest(p: &Pack2<f64>) -> bool {
        p.a.is_nan_inf() || p.b == 0.0
    }
}

impl FpOp for DivOp<f32> {
    type Real = f32;
    type Pack = Pack2<f32>;

    const OP_HASH: u64 = op_hash::DIV;

    fn name() -> &'static str {
        "div"
    }

    fn error(p: &Pack2<f32>, x: f32) -> f32 {
        -f32::fma(x, p.b, -p.a) / p.b
    }

    fn nearest(p: &Pack2<f32>) -> f32 {
        p.a / p.b
    }

    // sign(a - x*b) * sign(b), with the residual taken in binary64
    fn same_sign_of_error(p: &Pack2<f32>, x: f32) -> f32 {
        let r = -f64::fma(f64::from(x), f64::from(p.b), -f64::from(p.a));
        if r > 0.0 {
            p.b
        } else if r < 0.0 {
            -p.b
        } else {
            0.0
        }
    }

    fn inf_not_specific_to_nearest(p: &Pack2<f32>) -> bool {
        p.a.is_nan_inf() || p.b == 0.0
    }
}
