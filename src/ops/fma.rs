// srfloat: stochastic rounding for IEEE 754 floats
//
// ops/fma.rs
//
// Error-free transform for the fused multiply-add

use std::marker::PhantomData;

use crate::ops::{op_hash, two_prod, two_sum, ArgPack, FpOp, Pack3};
use crate::real::Real;

/// Fused multiply-add `a * b + c`, correctly rounded.
pub struct FmaOp<T>(PhantomData<T>);

impl<T: Real> FpOp for FmaOp<T> {
    type Real = T;
    type Pack = Pack3<T>;

    const OP_HASH: u64 = op_hash::FMA;

    fn name() -> &'static str {
        "madd"
    }

    fn nearest(p: &Pack3<T>) -> T {
        T::fma(p.a, p.b, p.c)
    }

    // ErrFmaApp, "Exact and Approximated Error of the FMA",
    // Boldo and Muller
    fn error(p: &Pack3<T>, x: T) -> T {
        let (ph, pl) = two_prod(p.a, p.b);
        let (uh, ul) = two_sum(p.c, ph);
        let t = uh - x;
        t + (pl + ul)
    }

    fn comdet_pack(p: &Pack3<T>) -> Pack3<T> {
        Pack3::new(p.a.min(p.b), p.a.max(p.b), p.c)
    }

    fn inf_not_specific_to_nearest(p: &Pack3<T>) -> bool {
        p.any_nan_inf()
    }
}
