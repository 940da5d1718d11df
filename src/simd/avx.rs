// srfloat: stochastic rounding for IEEE 754 floats
//
// simd/avx.rs
//
// 8-lane binary32 kernels (AVX2 + FMA)

use std::arch::x86_64::*;

use super::{PackedMode, PackedOp};

const EXP_MASK: i32 = 0x7f80_0000u32 as i32;

#[inline]
#[target_feature(enable = "avx2,fma")]
unsafe fn has_nan_inf(v: __m256) -> __m256 {
    let mask = _mm256_set1_epi32(EXP_MASK);
    let bits = _mm256_castps_si256(v);
    _mm256_castsi256_ps(_mm256_cmpeq_epi32(_mm256_and_si256(bits, mask), mask))
}

#[inline]
#[target_feature(enable = "avx2,fma")]
unsafe fn away_from_zero(v: __m256) -> __m256 {
    let one = _mm256_set1_epi32(1);
    _mm256_castsi256_ps(_mm256_add_epi32(_mm256_castps_si256(v), one))
}

#[inline]
#[target_feature(enable = "avx2,fma")]
unsafe fn toward_zero(v: __m256) -> __m256 {
    let one = _mm256_set1_epi32(1);
    _mm256_castsi256_ps(_mm256_sub_epi32(_mm256_castps_si256(v), one))
}

// Both zeros land on +denorm_min, as in the scalar walker.
#[inline]
#[target_feature(enable = "avx2,fma")]
unsafe fn next_after(v: __m256) -> __m256 {
    let zero = _mm256_setzero_ps();
    let neg = _mm256_cmp_ps::<_CMP_LT_OQ>(v, zero);
    let base = _mm256_blendv_ps(away_from_zero(v), toward_zero(v), neg);
    let denorm = _mm256_set1_ps(f32::from_bits(1));
    _mm256_blendv_ps(base, denorm, _mm256_cmp_ps::<_CMP_EQ_OQ>(v, zero))
}

#[inline]
#[target_feature(enable = "avx2,fma")]
unsafe fn next_prev(v: __m256) -> __m256 {
    let zero = _mm256_setzero_ps();
    let pos = _mm256_cmp_ps::<_CMP_GT_OQ>(v, zero);
    let base = _mm256_blendv_ps(away_from_zero(v), toward_zero(v), pos);
    let neg_denorm = _mm256_set1_ps(-f32::from_bits(1));
    _mm256_blendv_ps(base, neg_denorm, _mm256_cmp_ps::<_CMP_EQ_OQ>(v, zero))
}

#[inline]
#[target_feature(enable = "avx2,fma")]
unsafe fn two_sum_error(a: __m256, b: __m256, x: __m256) -> __m256 {
    let z = _mm256_sub_ps(x, a);
    _mm256_add_ps(
        _mm256_sub_ps(a, _mm256_sub_ps(x, z)),
        _mm256_sub_ps(b, z),
    )
}

// With FMA available, the product error is a single fused operation.
#[inline]
#[target_feature(enable = "avx2,fma")]
unsafe fn mul_error(a: __m256, b: __m256, x: __m256) -> __m256 {
    _mm256_fmadd_ps(a, b, _mm256_sub_ps(_mm256_setzero_ps(), x))
}

#[inline]
#[target_feature(enable = "avx2,fma")]
unsafe fn error_of(op: PackedOp, a: __m256, b: __m256, x: __m256) -> __m256 {
    match op {
        PackedOp::Add => two_sum_error(a, b, x),
        PackedOp::Sub => two_sum_error(a, _mm256_sub_ps(_mm256_setzero_ps(), b), x),
        PackedOp::Mul => mul_error(a, b, x),
    }
}

#[inline]
#[target_feature(enable = "avx2,fma")]
unsafe fn directed(op: PackedOp, a: __m256, b: __m256, x: __m256, up: bool) -> __m256 {
    let zero = _mm256_setzero_ps();
    let sat_val = _mm256_set1_ps(if up { -f32::MAX } else { f32::MAX });

    let inf_cond = _mm256_or_ps(
        _mm256_or_ps(has_nan_inf(a), has_nan_inf(b)),
        has_nan_inf(x),
    );
    let saturated = _mm256_blendv_ps(x, sat_val, inf_cond);
    let is_nan = _mm256_cmp_ps::<_CMP_UNORD_Q>(x, x);
    let x = _mm256_blendv_ps(saturated, x, is_nan);

    let e = error_of(op, a, b, x);
    let wants_step = if up {
        _mm256_cmp_ps::<_CMP_GT_OQ>(e, zero)
    } else {
        _mm256_cmp_ps::<_CMP_LT_OQ>(e, zero)
    };
    let step = _mm256_andnot_ps(inf_cond, wants_step);
    if _mm256_movemask_ps(step) == 0 {
        return x;
    }

    let neighbor = if up { next_after(x) } else { next_prev(x) };
    _mm256_blendv_ps(x, neighbor, step)
}

/// Rounds 8 lanes of `op` under `mode`.
///
/// # Safety
///
/// Requires AVX2 and FMA, 8 readable lanes at `a` and `b`, 8 writable at
/// `out`.
#[target_feature(enable = "avx2,fma")]
pub(super) unsafe fn binop8(
    op: PackedOp,
    mode: PackedMode,
    a: *const f32,
    b: *const f32,
    out: *mut f32,
) {
    let va = _mm256_loadu_ps(a);
    let vb = _mm256_loadu_ps(b);
    let x = match op {
        PackedOp::Add => _mm256_add_ps(va, vb),
        PackedOp::Sub => _mm256_sub_ps(va, vb),
        PackedOp::Mul => _mm256_mul_ps(va, vb),
    };
    let r = match mode {
        PackedMode::Nearest => x,
        PackedMode::Upward => directed(op, va, vb, x, true),
        PackedMode::Downward => directed(op, va, vb, x, false),
    };
    _mm256_storeu_ps(out, r);
}
