// srfloat: stochastic rounding for IEEE 754 floats
//
// rounding.rs
//
// Tests for the rounding-decision dispatcher

use proptest::prelude::*;
use rstest::rstest;

use srfloat::backend::{self, Context};
use srfloat::ops::{AddOp, CastOp, DivOp, FmaOp, MulOp, Pack1, Pack2, Pack3};
use srfloat::real::Real;
use srfloat::round::{apply, RoundingMode};

fn ctx_with(mode: RoundingMode) -> Context {
    let mut ctx = Context::pre_init();
    ctx.rounding_mode = mode;
    ctx.default_rounding_mode = mode;
    ctx.seed = 1;
    ctx.choose_seed = true;
    ctx
}

fn perturbing_modes() -> Vec<RoundingMode> {
    vec![
        RoundingMode::Upward,
        RoundingMode::Downward,
        RoundingMode::Zero,
        RoundingMode::Random,
        RoundingMode::RandomDet,
        RoundingMode::RandomComdet,
        RoundingMode::Average,
        RoundingMode::AverageDet,
        RoundingMode::AverageComdet,
        RoundingMode::PRandom,
        RoundingMode::PRandomDet,
        RoundingMode::PRandomComdet,
        RoundingMode::Farthest,
    ]
}

proptest! {
    // P3: the emitted value is always the nearest result or one of its
    // two representable neighbors
    #[test]
    fn emitted_value_is_adjacent_to_nearest(
        a in (-1e12f64..1e12).prop_filter("nonzero", |x| x.abs() > 1e-12),
        b in (-1e12f64..1e12).prop_filter("nonzero", |x| x.abs() > 1e-12),
        mode in prop::sample::select(perturbing_modes()),
    ) {
        backend::set_seed(1);
        let ctx = ctx_with(mode);

        let p = Pack2::new(a, b);
        let x = a + b;
        if x.is_finite() {
            let got = apply::<AddOp<f64>>(&p, &ctx);
            prop_assert!(got == x || got == x.next_after() || got == x.next_prev());
        }

        let x = a * b;
        if x.is_finite() {
            let got = apply::<MulOp<f64>>(&p, &ctx);
            prop_assert!(got == x || got == x.next_after() || got == x.next_prev());
        }

        let x = a / b;
        if x.is_finite() && x != 0.0 {
            let got = apply::<DivOp<f64>>(&p, &ctx);
            prop_assert!(got == x || got == x.next_after() || got == x.next_prev());
        }
    }

    // P4: exact operations pass through every perturbing mode untouched
    #[test]
    fn exact_operations_pass_through(
        mode in prop::sample::select(perturbing_modes()),
        k in -20i32..20,
    ) {
        backend::set_seed(1);
        let ctx = ctx_with(mode);
        let s = 2f64.powi(k);

        prop_assert_eq!(apply::<AddOp<f64>>(&Pack2::new(1.5 * s, 2.25 * s), &ctx), 3.75 * s);
        prop_assert_eq!(apply::<MulOp<f64>>(&Pack2::new(3.0 * s, 8.0), &ctx), 24.0 * s);
        prop_assert_eq!(apply::<DivOp<f64>>(&Pack2::new(s, 4.0), &ctx), 0.25 * s);
        prop_assert_eq!(apply::<FmaOp<f64>>(&Pack3::new(3.0, 7.0 * s, s), &ctx), 22.0 * s);
        prop_assert_eq!(apply::<CastOp>(&Pack1::new(1.5 * s), &ctx), (1.5 * s) as f32);
    }
}

#[test]
fn directed_rounding_of_an_inexact_sum() {
    // 1 + 2^-53 is a tie resolved to 1.0; the dropped half-ulp drives
    // the directed modes
    let p = Pack2::new(1.0f64, 2f64.powi(-53));
    assert_eq!(apply::<AddOp<f64>>(&p, &ctx_with(RoundingMode::Nearest)), 1.0);
    assert_eq!(
        apply::<AddOp<f64>>(&p, &ctx_with(RoundingMode::Upward)),
        1.0 + 2f64.powi(-52)
    );
    assert_eq!(apply::<AddOp<f64>>(&p, &ctx_with(RoundingMode::Downward)), 1.0);
}

#[test]
fn directed_rounding_of_an_inexact_product() {
    // the nearest square of 0.1 lies above the exact value (negative
    // error), so upward keeps it and downward steps
    let p = Pack2::new(0.1f64, 0.1f64);
    let x = 0.010000000000000002f64;
    assert_eq!(apply::<MulOp<f64>>(&p, &ctx_with(RoundingMode::Nearest)), x);
    assert_eq!(apply::<MulOp<f64>>(&p, &ctx_with(RoundingMode::Upward)), x);
    assert_eq!(
        apply::<MulOp<f64>>(&p, &ctx_with(RoundingMode::Downward)),
        x.next_prev()
    );
}

#[test]
fn directed_rounding_of_inexact_quotients() {
    // RN(1/3) sits below 1/3: positive residual, upward steps
    let p = Pack2::new(1.0f64, 3.0f64);
    let x = 1.0f64 / 3.0;
    assert_eq!(apply::<DivOp<f64>>(&p, &ctx_with(RoundingMode::Nearest)), x);
    assert_eq!(
        apply::<DivOp<f64>>(&p, &ctx_with(RoundingMode::Upward)),
        x.next_after()
    );
    assert_eq!(apply::<DivOp<f64>>(&p, &ctx_with(RoundingMode::Downward)), x);

    // RN(2/3) sits above 2/3: negative residual, downward steps
    let p = Pack2::new(2.0f64, 3.0f64);
    let x = 2.0f64 / 3.0;
    assert_eq!(
        apply::<DivOp<f64>>(&p, &ctx_with(RoundingMode::Downward)),
        x.next_prev()
    );
    assert_eq!(apply::<DivOp<f64>>(&p, &ctx_with(RoundingMode::Upward)), x);
}

#[test]
fn directed_rounding_of_a_narrowing_cast() {
    let p = Pack1::new(1.0 + 2f64.powi(-40));
    assert_eq!(apply::<CastOp>(&p, &ctx_with(RoundingMode::Downward)), 1.0f32);
    assert_eq!(
        apply::<CastOp>(&p, &ctx_with(RoundingMode::Upward)),
        1.0000001f32
    );
    assert_eq!(
        apply::<CastOp>(&p, &ctx_with(RoundingMode::Upward)),
        1.0f32.next_after()
    );
}

#[test]
fn exact_fma_passes_through_every_mode() {
    let p = Pack3::new(3.0f64, 7.0, 1.0);
    for mode in RoundingMode::ALL {
        if mode == RoundingMode::Ftz || mode == RoundingMode::Float {
            continue;
        }
        backend::set_seed(1);
        assert_eq!(apply::<FmaOp<f64>>(&p, &ctx_with(mode)), 22.0, "{mode}");
    }
}

#[test]
fn fma_landing_on_two_is_inexact_but_adjacent() {
    // fl(1e-16) * 1e16 is not exactly 1, so modes may step off 2.0 but
    // never further than one ulp
    let p = Pack3::new(1e16f64, 1e-16, 1.0);
    assert_eq!(apply::<FmaOp<f64>>(&p, &ctx_with(RoundingMode::Nearest)), 2.0);
    for mode in perturbing_modes() {
        backend::set_seed(1);
        let got = apply::<FmaOp<f64>>(&p, &ctx_with(mode));
        assert!(
            got == 2.0 || got == 2.0f64.next_after() || got == 2.0f64.next_prev(),
            "{mode}: {got}"
        );
    }
}

#[rstest]
#[case(RoundingMode::Upward)]
#[case(RoundingMode::Downward)]
#[case(RoundingMode::Zero)]
fn nan_inputs_stay_nan_in_directed_modes(#[case] mode: RoundingMode) {
    let ctx = ctx_with(mode);
    assert!(apply::<AddOp<f64>>(&Pack2::new(f64::NAN, 1.0), &ctx).is_nan());
    assert!(apply::<MulOp<f64>>(&Pack2::new(1.0, f64::NAN), &ctx).is_nan());
    assert!(apply::<DivOp<f64>>(&Pack2::new(0.0, 0.0), &ctx).is_nan());
}

#[test]
fn directed_modes_saturate_infinities() {
    // documented non-IEEE behavior: upward pins to -MAX, downward to
    // +MAX, whatever the sign of the infinity
    let inf = Pack2::new(f64::INFINITY, 1.0);
    let ninf = Pack2::new(f64::NEG_INFINITY, 1.0);
    assert_eq!(apply::<AddOp<f64>>(&inf, &ctx_with(RoundingMode::Downward)), f64::MAX);
    assert_eq!(apply::<AddOp<f64>>(&ninf, &ctx_with(RoundingMode::Downward)), f64::MAX);
    assert_eq!(apply::<AddOp<f64>>(&inf, &ctx_with(RoundingMode::Upward)), -f64::MAX);
    assert_eq!(apply::<AddOp<f64>>(&ninf, &ctx_with(RoundingMode::Upward)), -f64::MAX);

    // division by zero counts as not-specific-to-nearest
    let div0 = Pack2::new(1.0f64, 0.0);
    assert_eq!(apply::<DivOp<f64>>(&div0, &ctx_with(RoundingMode::Downward)), f64::MAX);
    assert_eq!(apply::<DivOp<f64>>(&div0, &ctx_with(RoundingMode::Upward)), -f64::MAX);

    // overflow of finite inputs saturates too
    let big = Pack2::new(f64::MAX, f64::MAX);
    assert_eq!(apply::<AddOp<f64>>(&big, &ctx_with(RoundingMode::Downward)), f64::MAX);

    // toward-zero shrinks the magnitude with the matching sign
    assert_eq!(apply::<AddOp<f64>>(&inf, &ctx_with(RoundingMode::Zero)), f64::MAX);
    assert_eq!(apply::<AddOp<f64>>(&ninf, &ctx_with(RoundingMode::Zero)), -f64::MAX);
}

#[test]
fn stochastic_modes_pass_nan_inf_through() {
    for mode in [
        RoundingMode::Random,
        RoundingMode::Average,
        RoundingMode::PRandom,
        RoundingMode::Farthest,
    ] {
        backend::set_seed(1);
        let ctx = ctx_with(mode);
        assert!(apply::<AddOp<f64>>(&Pack2::new(f64::NAN, 1.0), &ctx).is_nan(), "{mode}");
        assert_eq!(
            apply::<AddOp<f64>>(&Pack2::new(f64::INFINITY, 1.0), &ctx),
            f64::INFINITY,
            "{mode}"
        );
    }
}

// 1/inf is exactly zero: no mode may perturb it, and none may saturate
// (the divisor is infinite, not the result)
#[test]
fn division_by_an_infinite_divisor_is_exact() {
    for mode in perturbing_modes() {
        backend::set_seed(1);
        let ctx = ctx_with(mode);

        let got = apply::<DivOp<f64>>(&Pack2::new(1.0, f64::INFINITY), &ctx);
        assert_eq!(got.to_bits(), 0.0f64.to_bits(), "{mode} 1/inf");

        let got = apply::<DivOp<f64>>(&Pack2::new(-1.0, f64::INFINITY), &ctx);
        assert_eq!(got.to_bits(), (-0.0f64).to_bits(), "{mode} -1/inf");

        let got = apply::<DivOp<f32>>(&Pack2::new(1.0f32, f32::INFINITY), &ctx);
        assert_eq!(got.to_bits(), 0.0f32.to_bits(), "{mode} 1/inf (f32)");
    }
}

// upward from a negative zero quotient steps to +denorm_min, never back
// below the exact value
#[test]
fn upward_never_undershoots_a_negative_zero_quotient() {
    let ctx = ctx_with(RoundingMode::Upward);
    let p = Pack2::new(f64::DENORM_MIN, -3.0);
    assert_eq!((p.a / p.b).to_bits(), (-0.0f64).to_bits());
    let got = apply::<DivOp<f64>>(&p, &ctx);
    assert_eq!(got, f64::DENORM_MIN);
}

#[test]
fn toward_zero_never_grows_the_magnitude() {
    // positive result above the exact value steps down
    let p = Pack2::new(0.1f64, 0.1f64);
    let x = 0.010000000000000002f64;
    assert_eq!(apply::<MulOp<f64>>(&p, &ctx_with(RoundingMode::Zero)), x.next_prev());

    // mirrored operands step toward zero from below
    let p = Pack2::new(-0.1f64, 0.1f64);
    assert_eq!(apply::<MulOp<f64>>(&p, &ctx_with(RoundingMode::Zero)), -x.next_prev());

    // a result below the exact value is already the truncation
    let p = Pack2::new(1.0f64, 3.0f64);
    let x = 1.0f64 / 3.0;
    assert_eq!(apply::<DivOp<f64>>(&p, &ctx_with(RoundingMode::Zero)), x);
}

#[test]
fn farthest_emits_the_rejected_neighbor() {
    let ctx = ctx_with(RoundingMode::Farthest);

    // positive error: the rejected value is one step up
    let p = Pack2::new(1.0f64, 2f64.powi(-53));
    assert_eq!(apply::<AddOp<f64>>(&p, &ctx), 1.0 + 2f64.powi(-52));

    // negative error at a binade boundary: one step down
    let p = Pack2::new(1.0f64, -2f64.powi(-54));
    assert_eq!(apply::<AddOp<f64>>(&p, &ctx), 1.0 - 2f64.powi(-53));
}

proptest! {
    // P8: FLOAT mode equals the operation performed in binary32
    #[test]
    fn float_mode_matches_binary32_arithmetic(
        a in (-1e6f64..1e6).prop_filter("nonzero", |x| x.abs() > 1e-6),
        b in (-1e6f64..1e6).prop_filter("nonzero", |x| x.abs() > 1e-6),
    ) {
        let ctx = ctx_with(RoundingMode::Float);
        let (a32, b32) = (a as f32, b as f32);

        prop_assert_eq!(
            apply::<AddOp<f64>>(&Pack2::new(a, b), &ctx),
            f64::from(a32 + b32)
        );
        prop_assert_eq!(
            apply::<MulOp<f64>>(&Pack2::new(a, b), &ctx),
            f64::from(a32 * b32)
        );
        prop_assert_eq!(
            apply::<DivOp<f64>>(&Pack2::new(a, b), &ctx),
            f64::from(a32 / b32)
        );
    }
}

#[test]
fn ftz_flushes_subnormal_results() {
    let ctx = ctx_with(RoundingMode::Ftz);

    let flushed = apply::<MulOp<f64>>(&Pack2::new(1e-300f64, 1e-20), &ctx);
    assert_eq!(flushed, 0.0);
    assert!(flushed.is_sign_positive());

    let flushed = apply::<MulOp<f64>>(&Pack2::new(-1e-300f64, 1e-20), &ctx);
    assert_eq!(flushed, 0.0);
    assert!(flushed.is_sign_negative());

    // normal results are untouched
    assert_eq!(apply::<MulOp<f64>>(&Pack2::new(0.5f64, 0.5), &ctx), 0.25);
}

#[test]
fn native_mode_is_a_passthrough() {
    let ctx = ctx_with(RoundingMode::Native);
    assert_eq!(apply::<AddOp<f64>>(&Pack2::new(0.1f64, 0.2), &ctx), 0.1 + 0.2);
    assert_eq!(
        apply::<DivOp<f64>>(&Pack2::new(1.0f64, 0.0), &ctx),
        f64::INFINITY
    );
}

#[test]
fn backend_interface_routes_to_the_dispatcher() {
    let mut ctx = ctx_with(RoundingMode::Upward);
    let iface = backend::init(&mut ctx);

    let mut res = 0.0f64;
    (iface.add_f64)(1.0, 2f64.powi(-53), &mut res, &ctx);
    assert_eq!(res, 1.0 + 2f64.powi(-52));

    let mut res32 = 0.0f32;
    (iface.cast_f64_to_f32)(1.0 + 2f64.powi(-40), &mut res32, &ctx);
    assert_eq!(res32, 1.0f32.next_after());

    assert_eq!((iface.get_backend_name)(), "srfloat");
    assert_eq!((iface.get_backend_version)(), "1.x-dev");
    (iface.finalize)(&ctx);
}

#[test]
fn static_backend_matches_dynamic_dispatch() {
    for mode in [
        RoundingMode::Nearest,
        RoundingMode::Upward,
        RoundingMode::Downward,
        RoundingMode::Zero,
        RoundingMode::Farthest,
        RoundingMode::Float,
        RoundingMode::Ftz,
        RoundingMode::RandomDet,
        RoundingMode::AverageComdet,
    ] {
        let mut dynamic = ctx_with(mode);
        let dyn_iface = backend::init(&mut dynamic);

        let mut fixed = ctx_with(mode);
        fixed.static_backend = true;
        let static_iface = backend::init(&mut fixed);

        for (a, b) in [(0.1, 0.2), (1.0, 3.0), (2.0, 3.0), (-0.7, 0.1)] {
            let (mut r1, mut r2) = (0.0f64, 0.0f64);
            (dyn_iface.mul_f64)(a, b, &mut r1, &dynamic);
            (static_iface.mul_f64)(a, b, &mut r2, &fixed);
            assert_eq!(r1.to_bits(), r2.to_bits(), "{mode} mul({a}, {b})");

            (dyn_iface.div_f64)(a, b, &mut r1, &dynamic);
            (static_iface.div_f64)(a, b, &mut r2, &fixed);
            assert_eq!(r1.to_bits(), r2.to_bits(), "{mode} div({a}, {b})");
        }
    }
}

#[test]
fn instrumented_region_markers_swap_the_mode() {
    let mut ctx = ctx_with(RoundingMode::Random);
    ctx.end_instr();
    assert_eq!(ctx.rounding_mode, RoundingMode::Nearest);
    ctx.begin_instr();
    assert_eq!(ctx.rounding_mode, RoundingMode::Random);
}

#[test]
fn user_call_inexact_perturbs_by_one_ulp()  {
    let ctx = ctx_with(RoundingMode::Nearest);
    backend::set_seed(7);

    for _ in 0..32 {
        let mut v = 1.0f64;
        backend::user_call(
            &ctx,
            backend::UserCallId::INEXACT,
            backend::UserCallArg::Double(&mut v),
        );
        assert!(v == 1.0f64.next_after() || v == 1.0f64.next_prev());
    }

    let mut v32 = 1.0f32;
    backend::user_call(
        &ctx,
        backend::UserCallId::INEXACT,
        backend::UserCallArg::Float(&mut v32),
    );
    assert!(v32 == 1.0f32.next_after() || v32 == 1.0f32.next_prev());

    // unknown ids leave the value alone
    let mut untouched = 42.0f64;
    backend::user_call(
        &ctx,
        backend::UserCallId(999),
        backend::UserCallArg::Double(&mut untouched),
    );
    assert_eq!(untouched, 42.0);
}
