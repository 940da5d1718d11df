// srfloat: stochastic rounding for IEEE 754 floats
//
// round/dispatch.rs
//
// The rounding-decision layer

use crate::backend::Context;
use crate::ops::{ArgPack, FpOp};
use crate::profiling;
use crate::real::Real;
use num_traits::{Float, Zero};
use crate::rng;
use crate::rng::hash::{det_key, DetRng};
use crate::round::RoundingMode;

/// Rounds one operation under the mode selected in `ctx`.
pub fn apply<Op: FpOp>(p: &Op::Pack, ctx: &Context) -> Op::Real {
    apply_mode::<Op>(ctx.rounding_mode, p, ctx)
}

/// Rounds one operation under an explicit mode. Called with a constant
/// mode (as the static backend does), the match folds away.
#[inline]
pub fn apply_mode<Op: FpOp>(mode: RoundingMode, p: &Op::Pack, ctx: &Context) -> Op::Real {
    match mode {
        RoundingMode::Nearest | RoundingMode::Native => nearest::<Op>(p),
        RoundingMode::Upward => upward::<Op>(p),
        RoundingMode::Downward => downward::<Op>(p),
        RoundingMode::Zero => toward_zero::<Op>(p),
        RoundingMode::Farthest => farthest::<Op>(p),
        RoundingMode::Random => random::<Op>(p, || rng::with_thread(|r| r.next_bool())),
        RoundingMode::RandomDet => random::<Op>(p, || det_rng::<Op>(p, false).next_bool()),
        RoundingMode::RandomComdet => random::<Op>(p, || det_rng::<Op>(p, true).next_bool()),
        RoundingMode::Average => average::<Op>(p, || rng::with_thread(|r| r.next_f64())),
        RoundingMode::AverageDet => average::<Op>(p, || det_rng::<Op>(p, false).next_f64()),
        RoundingMode::AverageComdet => average::<Op>(p, || det_rng::<Op>(p, true).next_f64()),
        RoundingMode::PRandom => {
            prandom::<Op>(p, ctx.p, || rng::with_thread(|r| r.next_f64()))
        }
        RoundingMode::PRandomDet => {
            prandom::<Op>(p, ctx.p, || det_rng::<Op>(p, false).next_f64())
        }
        RoundingMode::PRandomComdet => {
            prandom::<Op>(p, ctx.p, || det_rng::<Op>(p, true).next_f64())
        }
        RoundingMode::Float => projected::<Op>(p),
        RoundingMode::Ftz => ftz::<Op>(p),
    }
}

// Call-local generator for the deterministic modes, keyed on the
// operation hash, the live seed, and the operand bits. Reorderings of a
// commutative operation key identically on the comdet path.
fn det_rng<Op: FpOp>(p: &Op::Pack, comdet: bool) -> DetRng {
    let (hash, pack) = if comdet {
        (Op::comdet_hash(), Op::comdet_pack(p))
    } else {
        (Op::hash(), *p)
    };
    let mut buf = [0.0f64; 3];
    pack.serialize(&mut buf);
    let seed = rng::with_thread(|r| r.seed());
    DetRng::new(det_key(hash, seed, &buf[..Op::Pack::ARITY]))
}

fn nearest<Op: FpOp>(p: &Op::Pack) -> Op::Real {
    profiling::count_op();
    Op::nearest(p)
}

// Directed modes saturate infinite results that do not genuinely come
// from rounding: upward pins to -MAX so later operations cannot run away
// toward -inf, downward symmetrically to +MAX. NaN results survive.
fn upward<Op: FpOp>(p: &Op::Pack) -> Op::Real {
    let x = Op::nearest(p);
    profiling::count_op();
    if x.is_nan_inf() || Op::inf_not_specific_to_nearest(p) {
        if x.is_nan() {
            return x;
        }
        return -Op::Real::MAX_FINITE;
    }
    let s = Op::same_sign_of_error(p, x);
    if s.is_zero() {
        profiling::count_exact();
        x
    } else if s > Op::Real::zero() {
        x.next_after()
    } else {
        x
    }
}

fn downward<Op: FpOp>(p: &Op::Pack) -> Op::Real {
    let x = Op::nearest(p);
    profiling::count_op();
    if x.is_nan_inf() || Op::inf_not_specific_to_nearest(p) {
        if x.is_nan() {
            return x;
        }
        return Op::Real::MAX_FINITE;
    }
    let s = Op::same_sign_of_error(p, x);
    if s.is_zero() {
        profiling::count_exact();
        x
    } else if s < Op::Real::zero() {
        x.next_prev()
    } else {
        x
    }
}

fn toward_zero<Op: FpOp>(p: &Op::Pack) -> Op::Real {
    let x = Op::nearest(p);
    profiling::count_op();
    if x.is_nan_inf() || Op::inf_not_specific_to_nearest(p) {
        if x.is_nan() {
            return x;
        }
        // magnitude can only shrink
        return if x > Op::Real::zero() {
            Op::Real::MAX_FINITE
        } else {
            -Op::Real::MAX_FINITE
        };
    }
    let s = Op::same_sign_of_error(p, x);
    if s.is_zero() {
        profiling::count_exact();
        return x;
    }
    let step_in = (x > Op::Real::zero() && s < Op::Real::zero())
        || (x < Op::Real::zero() && s > Op::Real::zero());
    if step_in {
        x.next_toward_zero()
    } else {
        x
    }
}

// Anti-nearest: of the two values bracketing the exact result, emit the
// one round-to-nearest rejected. Only the error sign matters here, so
// the sign helper (which screens non-finite residuals) decides.
fn farthest<Op: FpOp>(p: &Op::Pack) -> Op::Real {
    let x = Op::nearest(p);
    profiling::count_op();
    if x.is_nan_inf() {
        return x;
    }
    let s = Op::same_sign_of_error(p, x);
    if s.is_zero() {
        profiling::count_exact();
        x
    } else if s > Op::Real::zero() {
        x.next_after()
    } else {
        x.next_prev()
    }
}

fn random<Op: FpOp>(p: &Op::Pack, draw: impl FnOnce() -> bool) -> Op::Real {
    let x = Op::nearest(p);
    profiling::count_op();
    if x.is_nan_inf() {
        return x;
    }
    let s = Op::same_sign_of_error(p, x);
    if s.is_zero() {
        profiling::count_exact();
        return x;
    }
    if draw() == (s > Op::Real::zero()) {
        x.next_after()
    } else {
        x.next_prev()
    }
}

// Stochastic rounding proper: round away from x in the direction of the
// error with probability |e| / ulp(x).
fn average<Op: FpOp>(p: &Op::Pack, draw: impl FnOnce() -> f64) -> Op::Real {
    let x = Op::nearest(p);
    profiling::count_op();
    if x.is_nan_inf() {
        return x;
    }
    let e = Op::error(p, x);
    if e.is_zero() {
        profiling::count_exact();
        return x;
    }
    let u = draw();
    if u * x.ulp().as_f64() < e.abs().as_f64() {
        if e > Op::Real::zero() {
            x.next_after()
        } else {
            x.next_prev()
        }
    } else {
        x
    }
}

// Bernoulli rounding with a fixed probability instead of |e| / ulp.
fn prandom<Op: FpOp>(p: &Op::Pack, prob: f64, draw: impl FnOnce() -> f64) -> Op::Real {
    let x = Op::nearest(p);
    profiling::count_op();
    if x.is_nan_inf() {
        return x;
    }
    let s = Op::same_sign_of_error(p, x);
    if s.is_zero() {
        profiling::count_exact();
        return x;
    }
    if draw() < prob {
        if s > Op::Real::zero() {
            x.next_after()
        } else {
            x.next_prev()
        }
    } else {
        x
    }
}

// Binary32 emulation: operands projected to binary32, the operation
// evaluated on the projections, the result re-projected. Evaluating in
// the wide type first is safe: 53 >= 2*24 + 2, so the double rounding
// never changes the binary32 result.
fn projected<Op: FpOp>(p: &Op::Pack) -> Op::Real {
    profiling::count_op();
    let proj = p.project_binary32();
    let x = Op::nearest(&proj);
    Op::Real::of_binary32(x.to_binary32())
}

// Nearest with subnormal outputs flushed to zero, keeping the sign.
fn ftz<Op: FpOp>(p: &Op::Pack) -> Op::Real {
    let x = Op::nearest(p);
    profiling::count_op();
    if !x.is_zero() && x.abs() < Op::Real::min_positive_value() {
        if x < Op::Real::zero() {
            Op::Real::neg_zero()
        } else {
            Op::Real::zero()
        }
    } else {
        x
    }
}
