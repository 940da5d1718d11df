// srfloat: stochastic rounding for IEEE 754 floats
//
// simd/sse.rs
//
// 4-lane binary32 kernels (SSE4.1)

use std::arch::x86_64::*;

use super::{PackedMode, PackedOp};
use crate::real::Real;

const EXP_MASK: i32 = 0x7f80_0000u32 as i32;

#[inline]
#[target_feature(enable = "sse4.1")]
unsafe fn has_nan_inf(v: __m128) -> __m128 {
    let mask = _mm_set1_epi32(EXP_MASK);
    let bits = _mm_castps_si128(v);
    _mm_castsi128_ps(_mm_cmpeq_epi32(_mm_and_si128(bits, mask), mask))
}

#[inline]
#[target_feature(enable = "sse4.1")]
unsafe fn away_from_zero(v: __m128) -> __m128 {
    let one = _mm_set1_epi32(1);
    _mm_castsi128_ps(_mm_add_epi32(_mm_castps_si128(v), one))
}

#[inline]
#[target_feature(enable = "sse4.1")]
unsafe fn toward_zero(v: __m128) -> __m128 {
    let one = _mm_set1_epi32(1);
    _mm_castsi128_ps(_mm_sub_epi32(_mm_castps_si128(v), one))
}

// Next value toward +inf per lane; both zeros land on +denorm_min.
#[inline]
#[target_feature(enable = "sse4.1")]
unsafe fn next_after(v: __m128) -> __m128 {
    let zero = _mm_setzero_ps();
    let neg = _mm_cmplt_ps(v, zero);
    let base = _mm_blendv_ps(away_from_zero(v), toward_zero(v), neg);
    let denorm = _mm_set1_ps(f32::from_bits(1));
    _mm_blendv_ps(base, denorm, _mm_cmpeq_ps(v, zero))
}

// Next value toward -inf per lane; both zeros land on -denorm_min.
#[inline]
#[target_feature(enable = "sse4.1")]
unsafe fn next_prev(v: __m128) -> __m128 {
    let zero = _mm_setzero_ps();
    let pos = _mm_cmpgt_ps(v, zero);
    let base = _mm_blendv_ps(away_from_zero(v), toward_zero(v), pos);
    let neg_denorm = _mm_set1_ps(-f32::from_bits(1));
    _mm_blendv_ps(base, neg_denorm, _mm_cmpeq_ps(v, zero))
}

// TwoSum error per lane.
#[inline]
#[target_feature(enable = "sse4.1")]
unsafe fn two_sum_error(a: __m128, b: __m128, x: __m128) -> __m128 {
    let z = _mm_sub_ps(x, a);
    _mm_add_ps(
        _mm_sub_ps(a, _mm_sub_ps(x, z)),
        _mm_sub_ps(b, z),
    )
}

#[inline]
#[target_feature(enable = "sse4.1")]
unsafe fn split(a: __m128) -> (__m128, __m128) {
    let factor = _mm_set1_ps(<f32 as Real>::SPLIT_FACTOR);
    let c = _mm_mul_ps(factor, a);
    let hi = _mm_sub_ps(c, _mm_sub_ps(c, a));
    let lo = _mm_sub_ps(a, hi);
    (hi, lo)
}

// Product error by Dekker splitting; SSE4.1 has no packed fma.
// "Accurate Sum and Dot Product", Ogita, Rump, Oishi.
#[inline]
#[target_feature(enable = "sse4.1")]
unsafe fn mul_error(a: __m128, b: __m128, x: __m128) -> __m128 {
    let (a1, a2) = split(a);
    let (b1, b2) = split(b);
    _mm_add_ps(
        _mm_add_ps(
            _mm_sub_ps(_mm_mul_ps(a1, b1), x),
            _mm_add_ps(_mm_mul_ps(a1, b2), _mm_mul_ps(a2, b1)),
        ),
        _mm_mul_ps(a2, b2),
    )
}

#[inline]
#[target_feature(enable = "sse4.1")]
unsafe fn error_of(op: PackedOp, a: __m128, b: __m128, x: __m128) -> __m128 {
    match op {
        PackedOp::Add => two_sum_error(a, b, x),
        PackedOp::Sub => two_sum_error(a, _mm_sub_ps(_mm_setzero_ps(), b), x),
        PackedOp::Mul => mul_error(a, b, x),
    }
}

// Directed rounding of one 4-lane result: saturate NaN/Inf lanes
// (keeping NaNs), test the per-lane error sign, fast-exit when no lane
// steps, and blend the stepped neighbor in.
#[inline]
#[target_feature(enable = "sse4.1")]
unsafe fn directed(op: PackedOp, a: __m128, b: __m128, x: __m128, up: bool) -> __m128 {
    let zero = _mm_setzero_ps();
    let sat_val = _mm_set1_ps(if up { -f32::MAX } else { f32::MAX });

    let inf_cond = _mm_or_ps(
        _mm_or_ps(has_nan_inf(a), has_nan_inf(b)),
        has_nan_inf(x),
    );
    let saturated = _mm_blendv_ps(x, sat_val, inf_cond);
    let is_nan = _mm_cmpunord_ps(x, x);
    let x = _mm_blendv_ps(saturated, x, is_nan);

    let e = error_of(op, a, b, x);
    let wants_step = if up {
        _mm_cmpgt_ps(e, zero)
    } else {
        _mm_cmplt_ps(e, zero)
    };
    let step = _mm_andnot_ps(inf_cond, wants_step);
    if _mm_movemask_ps(step) == 0 {
        return x;
    }

    let neighbor = if up { next_after(x) } else { next_prev(x) };
    _mm_blendv_ps(x, neighbor, step)
}

/// Rounds 4 lanes of `op` under `mode`.
///
/// # Safety
///
/// Requires SSE4.1 and 4 readable lanes at `a` and `b`, 4 writable at
/// `out`.
#[target_feature(enable = "sse4.1")]
pub(super) unsafe fn binop4(
    op: PackedOp,
    mode: PackedMode,
    a: *const f32,
    b: *const f32,
    out: *mut f32,
) {
    let va = _mm_loadu_ps(a);
    let vb = _mm_loadu_ps(b);
    let x = match op {
        PackedOp::Add => _mm_add_ps(va, vb),
        PackedOp::Sub => _mm_sub_ps(va, vb),
        PackedOp::Mul => _mm_mul_ps(va, vb),
    };
    let r = match mode {
        PackedMode::Nearest => x,
        PackedMode::Upward => directed(op, va, vb, x, true),
        PackedMode::Downward => directed(op, va, vb, x, false),
    };
    _mm_storeu_ps(out, r);
}
