/*!
Backend surface handed to the host.

The host drives the backend through a [`Context`] it owns and a
[`BackendInterface`] vtable of scalar entry points returned by [`init`].
The context is built by [`Context::pre_init`], optionally overwritten by
[`configure`] or the command-line layer, and only then activated by
[`init`], which wires the seed, prints the load banner, and picks either
the dynamic dispatch table or a mode-specialized static one.

On the arithmetic path the context is read-only; it is mutated only by
the begin/end instrumentation markers and the explicit setters here.
*/

use crate::ops::{AddOp, CastOp, DivOp, FmaOp, MulOp, Pack1, Pack2, Pack3, SubOp};
use crate::real::Real;
use crate::rng;
use crate::round::dispatch::{apply, apply_mode};
use crate::round::RoundingMode;
use crate::simd::{self, VectorInterface};

/// Reported backend name.
pub const BACKEND_NAME: &str = "srfloat";

/// Reported backend version.
pub const BACKEND_VERSION: &str = "1.x-dev";

/// Per-host instrumentation context.
///
/// Allocated by the host before [`init`] and owned by it afterwards; the
/// arithmetic entry points borrow it immutably.
#[derive(Clone, Debug)]
pub struct Context {
    /// Mode applied by the arithmetic entry points.
    pub rounding_mode: RoundingMode,
    /// Mode restored by [`Context::begin_instr`].
    pub default_rounding_mode: RoundingMode,
    /// PRNG seed; derived from the clock and thread id at [`init`] unless
    /// `choose_seed` is set.
    pub seed: u64,
    /// True once the host pinned the seed explicitly.
    pub choose_seed: bool,
    /// Bernoulli probability used by the prandom modes.
    pub p: f64,
    /// Request the mode-specialized dispatch table from [`init`].
    pub static_backend: bool,
}

/// Host-supplied configuration record; same layout as the context.
pub type Config = Context;

impl Context {
    /// Context with the documented defaults: downward rounding, seed 0
    /// (not chosen), dynamic dispatch.
    pub fn pre_init() -> Self {
        Self {
            rounding_mode: RoundingMode::Downward,
            default_rounding_mode: RoundingMode::Downward,
            seed: 0,
            choose_seed: false,
            p: 0.5,
            static_backend: false,
        }
    }

    /// Enters an instrumented region: restores the configured mode.
    pub fn begin_instr(&mut self) {
        self.rounding_mode = self.default_rounding_mode;
    }

    /// Leaves an instrumented region: arithmetic reverts to nearest.
    pub fn end_instr(&mut self) {
        self.rounding_mode = RoundingMode::Nearest;
    }
}

/// Copies a host-supplied configuration into the context.
pub fn configure(conf: &Config, ctx: &mut Context) {
    ctx.default_rounding_mode = conf.default_rounding_mode;
    ctx.rounding_mode = conf.rounding_mode;
    ctx.seed = conf.seed;
    ctx.choose_seed = conf.choose_seed;
    ctx.static_backend = conf.static_backend;
    ctx.p = conf.p;
}

/// User-call identifiers. Ids outside the known set are logged and
/// ignored.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UserCallId(pub u32);

impl UserCallId {
    /// Perturb a value in place by one ulp, direction drawn from the
    /// thread generator.
    pub const INEXACT: UserCallId = UserCallId(1);
}

/// Payload of a user call.
#[derive(Debug)]
pub enum UserCallArg<'a> {
    Float(&'a mut f32),
    Double(&'a mut f64),
}

/// Scalar vtable returned by [`init`].
#[derive(Clone, Copy)]
pub struct BackendInterface {
    pub add_f32: fn(f32, f32, &mut f32, &Context),
    pub sub_f32: fn(f32, f32, &mut f32, &Context),
    pub mul_f32: fn(f32, f32, &mut f32, &Context),
    pub div_f32: fn(f32, f32, &mut f32, &Context),
    pub add_f64: fn(f64, f64, &mut f64, &Context),
    pub sub_f64: fn(f64, f64, &mut f64, &Context),
    pub mul_f64: fn(f64, f64, &mut f64, &Context),
    pub div_f64: fn(f64, f64, &mut f64, &Context),
    pub fma_f32: fn(f32, f32, f32, &mut f32, &Context),
    pub fma_f64: fn(f64, f64, f64, &mut f64, &Context),
    pub cast_f64_to_f32: fn(f64, &mut f32, &Context),
    pub user_call: fn(&Context, UserCallId, UserCallArg<'_>),
    pub finalize: fn(&Context),
    pub get_backend_name: fn() -> &'static str,
    pub get_backend_version: fn() -> &'static str,
    pub vector: VectorInterface,
}

impl std::fmt::Debug for BackendInterface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendInterface")
            .field("name", &(self.get_backend_name)())
            .field("version", &(self.get_backend_version)())
            .finish_non_exhaustive()
    }
}

/* dynamic entry points */

fn add_f32(a: f32, b: f32, res: &mut f32, ctx: &Context) {
    *res = apply::<AddOp<f32>>(&Pack2::new(a, b), ctx);
}

fn sub_f32(a: f32, b: f32, res: &mut f32, ctx: &Context) {
    *res = apply::<SubOp<f32>>(&Pack2::new(a, b), ctx);
}

fn mul_f32(a: f32, b: f32, res: &mut f32, ctx: &Context) {
    *res = apply::<MulOp<f32>>(&Pack2::new(a, b), ctx);
}

fn div_f32(a: f32, b: f32, res: &mut f32, ctx: &Context) {
    *res = apply::<DivOp<f32>>(&Pack2::new(a, b), ctx);
}

fn add_f64(a: f64, b: f64, res: &mut f64, ctx: &Context) {
    *res = apply::<AddOp<f64>>(&Pack2::new(a, b), ctx);
}

fn sub_f64(a: f64, b: f64, res: &mut f64, ctx: &Context) {
    *res = apply::<SubOp<f64>>(&Pack2::new(a, b), ctx);
}

fn mul_f64(a: f64, b: f64, res: &mut f64, ctx: &Context) {
    *res = apply::<MulOp<f64>>(&Pack2::new(a, b), ctx);
}

fn div_f64(a: f64, b: f64, res: &mut f64, ctx: &Context) {
    *res = apply::<DivOp<f64>>(&Pack2::new(a, b), ctx);
}

fn fma_f32(a: f32, b: f32, c: f32, res: &mut f32, ctx: &Context) {
    *res = apply::<FmaOp<f32>>(&Pack3::new(a, b, c), ctx);
}

fn fma_f64(a: f64, b: f64, c: f64, res: &mut f64, ctx: &Context) {
    *res = apply::<FmaOp<f64>>(&Pack3::new(a, b, c), ctx);
}

fn cast_f64_to_f32(a: f64, res: &mut f32, ctx: &Context) {
    *res = apply::<CastOp>(&Pack1::new(a), ctx);
}

/// Dispatches a host user call.
///
/// `INEXACT` always perturbs by exactly one ulp with a 50/50 direction
/// draw, whatever the selected rounding mode.
pub fn user_call(_ctx: &Context, id: UserCallId, arg: UserCallArg) {
    match id {
        UserCallId::INEXACT => inexact(arg),
        UserCallId(other) => {
            tracing::warn!(id = other, "unknown user call id, ignored");
        }
    }
}

fn inexact(arg: UserCallArg) {
    match arg {
        UserCallArg::Float(v) => {
            *v = if rng::with_thread(|r| r.next_bool()) {
                v.next_after()
            } else {
                v.next_prev()
            };
        }
        UserCallArg::Double(v) => {
            *v = if rng::with_thread(|r| r.next_bool()) {
                v.next_after()
            } else {
                v.next_prev()
            };
        }
    }
}

/// Backend teardown; nothing to release.
pub fn finalize(_ctx: &Context) {}

fn get_backend_name() -> &'static str {
    BACKEND_NAME
}

fn get_backend_version() -> &'static str {
    BACKEND_VERSION
}

fn dynamic_interface() -> BackendInterface {
    BackendInterface {
        add_f32,
        sub_f32,
        mul_f32,
        div_f32,
        add_f64,
        sub_f64,
        mul_f64,
        div_f64,
        fma_f32,
        fma_f64,
        cast_f64_to_f32,
        user_call,
        finalize,
        get_backend_name,
        get_backend_version,
        vector: simd::vector_interface(),
    }
}

// Mode-specialized tables: each module monomorphizes the dispatcher on a
// constant mode so the per-call branch folds away.
macro_rules! fixed_mode_interface {
    ($name:ident, $mode:expr) => {
        mod $name {
            use super::*;

            pub(super) fn add_f32(a: f32, b: f32, res: &mut f32, ctx: &Context) {
                *res = apply_mode::<AddOp<f32>>($mode, &Pack2::new(a, b), ctx);
            }

            pub(super) fn sub_f32(a: f32, b: f32, res: &mut f32, ctx: &Context) {
                *res = apply_mode::<SubOp<f32>>($mode, &Pack2::new(a, b), ctx);
            }

            pub(super) fn mul_f32(a: f32, b: f32, res: &mut f32, ctx: &Context) {
                *res = apply_mode::<MulOp<f32>>($mode, &Pack2::new(a, b), ctx);
            }

            pub(super) fn div_f32(a: f32, b: f32, res: &mut f32, ctx: &Context) {
                *res = apply_mode::<DivOp<f32>>($mode, &Pack2::new(a, b), ctx);
            }

            pub(super) fn add_f64(a: f64, b: f64, res: &mut f64, ctx: &Context) {
                *res = apply_mode::<AddOp<f64>>($mode, &Pack2::new(a, b), ctx);
            }

            pub(super) fn sub_f64(a: f64, b: f64, res: &mut f64, ctx: &Context) {
                *res = apply_mode::<SubOp<f64>>($mode, &Pack2::new(a, b), ctx);
            }

            pub(super) fn mul_f64(a: f64, b: f64, res: &mut f64, ctx: &Context) {
                *res = apply_mode::<MulOp<f64>>($mode, &Pack2::new(a, b), ctx);
            }

            pub(super) fn div_f64(a: f64, b: f64, res: &mut f64, ctx: &Context) {
                *res = apply_mode::<DivOp<f64>>($mode, &Pack2::new(a, b), ctx);
            }

            pub(super) fn fma_f32(a: f32, b: f32, c: f32, res: &mut f32, ctx: &Context) {
                *res = apply_mode::<FmaOp<f32>>($mode, &Pack3::new(a, b, c), ctx);
            }

            pub(super) fn fma_f64(a: f64, b: f64, c: f64, res: &mut f64, ctx: &Context) {
                *res = apply_mode::<FmaOp<f64>>($mode, &Pack3::new(a, b, c), ctx);
            }

            pub(super) fn cast_f64_to_f32(a: f64, res: &mut f32, ctx: &Context) {
                *res = apply_mode::<CastOp>($mode, &Pack1::new(a), ctx);
            }

            pub(super) fn interface() -> BackendInterface {
                BackendInterface {
                    add_f32,
                    sub_f32,
                    mul_f32,
                    div_f32,
                    add_f64,
                    sub_f64,
                    mul_f64,
                    div_f64,
                    fma_f32,
                    fma_f64,
                    cast_f64_to_f32,
                    user_call: super::user_call,
                    finalize: super::finalize,
                    get_backend_name: super::get_backend_name,
                    get_backend_version: super::get_backend_version,
                    vector: simd::vector_interface(),
                }
            }
        }
    };
}

fixed_mode_interface!(fixed_nearest, RoundingMode::Nearest);
fixed_mode_interface!(fixed_upward, RoundingMode::Upward);
fixed_mode_interface!(fixed_downward, RoundingMode::Downward);
fixed_mode_interface!(fixed_zero, RoundingMode::Zero);
fixed_mode_interface!(fixed_random, RoundingMode::Random);
fixed_mode_interface!(fixed_random_det, RoundingMode::RandomDet);
fixed_mode_interface!(fixed_random_comdet, RoundingMode::RandomComdet);
fixed_mode_interface!(fixed_average, RoundingMode::Average);
fixed_mode_interface!(fixed_average_det, RoundingMode::AverageDet);
fixed_mode_interface!(fixed_average_comdet, RoundingMode::AverageComdet);
fixed_mode_interface!(fixed_prandom, RoundingMode::PRandom);
fixed_mode_interface!(fixed_prandom_det, RoundingMode::PRandomDet);
fixed_mode_interface!(fixed_prandom_comdet, RoundingMode::PRandomComdet);
fixed_mode_interface!(fixed_farthest, RoundingMode::Farthest);
fixed_mode_interface!(fixed_float, RoundingMode::Float);
fixed_mode_interface!(fixed_native, RoundingMode::Native);
fixed_mode_interface!(fixed_ftz, RoundingMode::Ftz);

fn static_interface(mode: RoundingMode) -> BackendInterface {
    match mode {
        RoundingMode::Nearest => fixed_nearest::interface(),
        RoundingMode::Upward => fixed_upward::interface(),
        RoundingMode::Downward => fixed_downward::interface(),
        RoundingMode::Zero => fixed_zero::interface(),
        RoundingMode::Random => fixed_random::interface(),
        RoundingMode::RandomDet => fixed_random_det::interface(),
        RoundingMode::RandomComdet => fixed_random_comdet::interface(),
        RoundingMode::Average => fixed_average::interface(),
        RoundingMode::AverageDet => fixed_average_det::interface(),
        RoundingMode::AverageComdet => fixed_average_comdet::interface(),
        RoundingMode::PRandom => fixed_prandom::interface(),
        RoundingMode::PRandomDet => fixed_prandom_det::interface(),
        RoundingMode::PRandomComdet => fixed_prandom_comdet::interface(),
        RoundingMode::Farthest => fixed_farthest::interface(),
        RoundingMode::Float => fixed_float::interface(),
        RoundingMode::Native => fixed_native::interface(),
        RoundingMode::Ftz => fixed_ftz::interface(),
    }
}

/* seed wiring */

#[cfg(target_os = "linux")]
fn thread_id() -> u64 {
    // SAFETY: gettid has no preconditions and cannot fail.
    (unsafe { libc::gettid() }) as u64
}

#[cfg(all(unix, not(target_os = "linux")))]
fn thread_id() -> u64 {
    u64::from(std::process::id())
}

#[cfg(unix)]
fn entropy_seed() -> u64 {
    let mut tv = libc::timeval {
        tv_sec: 0,
        tv_usec: 0,
    };
    // SAFETY: gettimeofday fills the struct we hand it; a null timezone
    // is explicitly allowed.
    unsafe {
        libc::gettimeofday(&mut tv, std::ptr::null_mut());
    }
    (tv.tv_sec as u64) ^ (tv.tv_usec as u64) ^ thread_id()
}

#[cfg(not(unix))]
fn entropy_seed() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    let micros = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_micros() as u64)
        .unwrap_or(0);
    micros ^ u64::from(std::process::id())
}

/// Reseeds the calling thread's generator, rotating one output into the
/// saved-seed slot first.
pub fn set_seed(seed: u64) {
    rng::with_thread(|r| r.set_seed(seed));
}

/// Reseeds from the slot saved by the last [`set_seed`], reestablishing
/// a known point in the stream.
pub fn set_random_seed() {
    rng::with_thread(|r| r.restore_saved_seed());
}

/// Current prandom probability.
pub fn prandom_pvalue(ctx: &Context) -> f64 {
    ctx.p
}

/// Draws a fresh prandom probability from the thread generator.
pub fn updatep_prandom(ctx: &mut Context) {
    ctx.p = rng::with_thread(|r| {
        r.update_p();
        r.pvalue()
    });
}

/// Pins the prandom probability.
pub fn updatep_prandom_double(ctx: &mut Context, p: f64) {
    rng::with_thread(|r| r.update_p_with(p));
    ctx.p = p;
}

fn print_banner(ctx: &Context) {
    let silent = std::env::var("VFC_BACKENDS_SILENT_LOAD")
        .map(|v| v.eq_ignore_ascii_case("true"))
        .unwrap_or(false);
    if silent {
        return;
    }
    tracing::info!(backend = BACKEND_NAME, "load backend with:");
    tracing::info!("rounding-mode = {}", ctx.rounding_mode);
    tracing::info!("seed = {}", ctx.seed);
    tracing::info!("static-backend = {}", ctx.static_backend);
}

/// Activates the backend: derives the seed unless the host chose one,
/// seeds the thread generator, prints the load banner, and returns the
/// dispatch table.
pub fn init(ctx: &mut Context) -> BackendInterface {
    if !ctx.choose_seed {
        ctx.seed = entropy_seed();
    }
    set_seed(ctx.seed);
    ctx.p = rng::with_thread(|r| r.pvalue());

    print_banner(ctx);

    if ctx.static_backend {
        static_interface(ctx.rounding_mode)
    } else {
        dynamic_interface()
    }
}
