// srfloat: stochastic rounding for IEEE 754 floats
//
// ops/cast.rs
//
// Error-free transform for double-to-float narrowing

use crate::ops::{op_hash, ArgPack, FpOp, Pack1};

/// Narrowing conversion binary64 -> binary32.
///
/// The output type is binary32, so the combined hash carries the
/// binary32 type label even though the operand is a binary64.
pub struct CastOp;

impl FpOp for CastOp {
    type Real = f32;
    type Pack = Pack1<f64>;

    const OP_HASH: u64 = op_hash::CAST;

    fn name() -> &'static str {
        "cast"
    }

    fn nearest(p: &Pack1<f64>) -> f32 {
        p.a as f32
    }

    // the high-order error fits a binary64 exactly; only then narrow
    fn error(p: &Pack1<f64>, x: f32) -> f32 {
        (p.a - f64::from(x)) as f32
    }

    fn inf_not_specific_to_nearest(p: &Pack1<f64>) -> bool {
        p.any_nan_inf()
    }
}
