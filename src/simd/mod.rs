/*!
Packed binary32 specializations.

For f32 add, sub, and mul the backend provides vectorized variants of
width 4, 8, and 16 lanes (16 emulated as 2x8 or 4x4). Each lane goes
through the same decision logic as the scalar path: the per-lane error
sign drives per-lane blending between the nearest result and its two
neighbors, with a fast exit when every lane is exact. Division is never
vectorized; its entries loop the scalar kernel per lane.

The packed kernels cover the directed modes the hardware can blend
branch-free (nearest/native, upward, downward) on SSE4.1 or AVX2+FMA,
selected once at runtime; every other mode — and every other ISA — takes
the scalar per-lane loop, which supports the full mode set (one PRNG bit
per lane for the random family).
*/

#[cfg(target_arch = "x86_64")]
mod avx;
#[cfg(target_arch = "x86_64")]
mod sse;

use crate::backend::Context;
use crate::ops::{AddOp, DivOp, FpOp, MulOp, Pack2, SubOp};
#[cfg(target_arch = "x86_64")]
use crate::profiling;
use crate::round::dispatch::apply;
#[cfg(target_arch = "x86_64")]
use crate::round::RoundingMode;

/// One packed binary operation entry: lane count is implied by the vtable
/// slot; slices must hold at least that many elements.
pub type VecBinOp = fn(&[f32], &[f32], &mut [f32], &Context);

/// Entries for one operation, keyed by lane count.
#[derive(Clone, Copy, Debug)]
pub struct VectorEntries {
    pub by1: VecBinOp,
    pub by4: VecBinOp,
    pub by8: VecBinOp,
    pub by16: VecBinOp,
}

/// Vector vtable handed to the host next to the scalar one.
#[derive(Clone, Copy, Debug)]
pub struct VectorInterface {
    pub add: VectorEntries,
    pub sub: VectorEntries,
    pub mul: VectorEntries,
    pub div: VectorEntries,
}

/// Operations with packed kernels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum PackedOp {
    Add,
    Sub,
    Mul,
}

/// Modes the packed kernels implement directly.
#[cfg(target_arch = "x86_64")]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum PackedMode {
    Nearest,
    Upward,
    Downward,
}

#[cfg(target_arch = "x86_64")]
fn packed_mode(mode: RoundingMode) -> Option<PackedMode> {
    match mode {
        RoundingMode::Nearest | RoundingMode::Native => Some(PackedMode::Nearest),
        RoundingMode::Upward => Some(PackedMode::Upward),
        RoundingMode::Downward => Some(PackedMode::Downward),
        _ => None,
    }
}

#[cfg(target_arch = "x86_64")]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Isa {
    Scalar,
    Sse41,
    Avx2,
}

#[cfg(target_arch = "x86_64")]
fn isa() -> Isa {
    use std::sync::OnceLock;
    static ISA: OnceLock<Isa> = OnceLock::new();
    *ISA.get_or_init(|| {
        if std::arch::is_x86_feature_detected!("avx2") && std::arch::is_x86_feature_detected!("fma")
        {
            Isa::Avx2
        } else if std::arch::is_x86_feature_detected!("sse4.1") {
            Isa::Sse41
        } else {
            Isa::Scalar
        }
    })
}

// Returns true when the packed kernels handled the call.
#[cfg(target_arch = "x86_64")]
fn try_packed(op: PackedOp, lanes: usize, a: &[f32], b: &[f32], res: &mut [f32], ctx: &Context) -> bool {
    let Some(mode) = packed_mode(ctx.rounding_mode) else {
        return false;
    };
    if isa() == Isa::Scalar {
        return false;
    }
    assert!(a.len() >= lanes && b.len() >= lanes && res.len() >= lanes);
    profiling::count_op();
    match (isa(), lanes) {
        (Isa::Avx2, 8) => {
            // SAFETY: avx2+fma verified by isa(); the assert above
            // guarantees 8 readable/writable lanes.
            unsafe { avx::binop8(op, mode, a.as_ptr(), b.as_ptr(), res.as_mut_ptr()) };
            true
        }
        (Isa::Avx2, 16) => {
            // SAFETY: as above, for both 8-lane halves.
            unsafe {
                avx::binop8(op, mode, a.as_ptr(), b.as_ptr(), res.as_mut_ptr());
                avx::binop8(
                    op,
                    mode,
                    a.as_ptr().add(8),
                    b.as_ptr().add(8),
                    res.as_mut_ptr().add(8),
                );
            }
            true
        }
        (Isa::Avx2 | Isa::Sse41, 4) => {
            // SAFETY: sse4.1 is implied by avx2; 4 lanes asserted.
            unsafe { sse::binop4(op, mode, a.as_ptr(), b.as_ptr(), res.as_mut_ptr()) };
            true
        }
        (Isa::Sse41, 8 | 16) => {
            // SAFETY: sse4.1 verified; lane count asserted above.
            unsafe {
                for chunk in 0..lanes / 4 {
                    sse::binop4(
                        op,
                        mode,
                        a.as_ptr().add(4 * chunk),
                        b.as_ptr().add(4 * chunk),
                        res.as_mut_ptr().add(4 * chunk),
                    );
                }
            }
            true
        }
        _ => false,
    }
}

#[cfg(not(target_arch = "x86_64"))]
fn try_packed(
    _op: PackedOp,
    _lanes: usize,
    _a: &[f32],
    _b: &[f32],
    _res: &mut [f32],
    _ctx: &Context,
) -> bool {
    false
}

fn lanes_binop<Op>(lanes: usize, a: &[f32], b: &[f32], res: &mut [f32], ctx: &Context)
where
    Op: FpOp<Real = f32, Pack = Pack2<f32>>,
{
    assert!(a.len() >= lanes && b.len() >= lanes && res.len() >= lanes);
    for i in 0..lanes {
        res[i] = apply::<Op>(&Pack2::new(a[i], b[i]), ctx);
    }
}

macro_rules! vector_entries {
    ($op_ty:ty, $packed:expr, $by1:ident, $by4:ident, $by8:ident, $by16:ident) => {
        fn $by1(a: &[f32], b: &[f32], res: &mut [f32], ctx: &Context) {
            lanes_binop::<$op_ty>(1, a, b, res, ctx);
        }

        fn $by4(a: &[f32], b: &[f32], res: &mut [f32], ctx: &Context) {
            if !try_packed($packed, 4, a, b, res, ctx) {
                lanes_binop::<$op_ty>(4, a, b, res, ctx);
            }
        }

        fn $by8(a: &[f32], b: &[f32], res: &mut [f32], ctx: &Context) {
            if !try_packed($packed, 8, a, b, res, ctx) {
                lanes_binop::<$op_ty>(8, a, b, res, ctx);
            }
        }

        fn $by16(a: &[f32], b: &[f32], res: &mut [f32], ctx: &Context) {
            if !try_packed($packed, 16, a, b, res, ctx) {
                lanes_binop::<$op_ty>(16, a, b, res, ctx);
            }
        }
    };
}

vector_entries!(AddOp<f32>, PackedOp::Add, add_1, add_4, add_8, add_16);
vector_entries!(SubOp<f32>, PackedOp::Sub, sub_1, sub_4, sub_8, sub_16);
vector_entries!(MulOp<f32>, PackedOp::Mul, mul_1, mul_4, mul_8, mul_16);

fn div_1(a: &[f32], b: &[f32], res: &mut [f32], ctx: &Context) {
    lanes_binop::<DivOp<f32>>(1, a, b, res, ctx);
}

fn div_4(a: &[f32], b: &[f32], res: &mut [f32], ctx: &Context) {
    lanes_binop::<DivOp<f32>>(4, a, b, res, ctx);
}

fn div_8(a: &[f32], b: &[f32], res: &mut [f32], ctx: &Context) {
    lanes_binop::<DivOp<f32>>(8, a, b, res, ctx);
}

fn div_16(a: &[f32], b: &[f32], res: &mut [f32], ctx: &Context) {
    lanes_binop::<DivOp<f32>>(16, a, b, res, ctx);
}

/// Builds the vector vtable.
pub fn vector_interface() -> VectorInterface {
    VectorInterface {
        add: VectorEntries {
            by1: add_1,
            by4: add_4,
            by8: add_8,
            by16: add_16,
        },
        sub: VectorEntries {
            by1: sub_1,
            by4: sub_4,
            by8: sub_8,
            by16: sub_16,
        },
        mul: VectorEntries {
            by1: mul_1,
            by4: mul_4,
            by8: mul_8,
            by16: mul_16,
        },
        div: VectorEntries {
            by1: div_1,
            by4: div_4,
            by8: div_8,
            by16: div_16,
        },
    }
}
