//! # Check — Progression Checkers and the Exact Candidate Test
//!
//! A dispatched denominator arrives here as a set of progressions
//! w ≡ r (mod a·bb): w is the candidate |z|, a carries the cube roots of k
//! modulo the coprime part, and bb folds the auxiliary modulus with the
//! k-divisor residues. Three strategies, chosen by the dispatcher:
//!
//! - [`check_one`] — at most one candidate per progression: evaluate it.
//! - [`check_few`] — short progressions: enumerate candidates directly.
//! - [`check_lifted`] — long progressions: extend the modulus with
//!   auxiliary primes first. Each auxiliary prime q keeps only the z mod q
//!   residues for which x³ + y³ + z³ ≡ k (mod q) is solvable with
//!   x + y ≡ ±d, shrinking the candidate count by roughly |allowed|/q per
//!   prime before any big-integer work happens.
//!
//! The exact test reconstructs the quadratic: with the signed z recovered
//! from (si, w), n = (k − z³)/(x+y) must equal x² − xy + y², so
//! (x − y)² = (4n − d²)/3 must be a perfect square of d's parity. w³
//! reaches 2^288 at the zmax cap, far past u128, so this is `rug`
//! territory. A passing candidate is reported through the sink; deciding
//! what to do with it is the caller's business.

use rug::ops::Pow;
use rug::{Complete, Integer};

use crate::dispatch::PrimeStats;
use crate::modular::{crt128_with_inv, mod_inverse, mul_mod, sub_mod};
use crate::report::ReportSink;
use crate::tables::{flip_res, signed_dm, Tables};
use crate::{ceil_div, soft_assert, ZBUFBITS, ZSHORT};

/// Per-worker scratch for the checkers. Allocated once at worker start;
/// the vectors are reused across every dispatch.
pub struct CheckBuffers {
    /// Folded auxiliary residues of w modulo bb.
    pub zb: Vec<u64>,
    /// Scratch for residue folding.
    pub zb_tmp: Vec<u64>,
    /// Progression start values during lifting.
    pub res: Vec<u128>,
    pub res_tmp: Vec<u128>,
}

impl CheckBuffers {
    pub fn new() -> CheckBuffers {
        let cap = 1usize << ZBUFBITS;
        CheckBuffers {
            zb: Vec::with_capacity(256),
            zb_tmp: Vec::with_capacity(256),
            res: Vec::with_capacity(cap),
            res_tmp: Vec::with_capacity(cap),
        }
    }
}

impl Default for CheckBuffers {
    fn default() -> Self {
        Self::new()
    }
}

/// Progression length is at most 1: evaluate the single candidate of each
/// progression, if it lies below zmax.
#[allow(clippy::too_many_arguments)]
pub fn check_one(
    t: &Tables,
    st: &mut PrimeStats,
    ck: &mut CheckBuffers,
    sink: &dyn ReportSink,
    d: u64,
    si: u8,
    a: u64,
    za: &[u64],
    bb: u64,
    ainv: u64,
) {
    enumerate_progressions(t, st, ck, sink, d, si, a, za, bb, ainv);
}

/// Short progressions: enumerate every candidate directly.
#[allow(clippy::too_many_arguments)]
pub fn check_few(
    t: &Tables,
    st: &mut PrimeStats,
    ck: &mut CheckBuffers,
    sink: &dyn ReportSink,
    d: u64,
    si: u8,
    a: u64,
    za: &[u64],
    bb: u64,
    ainv: u64,
) {
    enumerate_progressions(t, st, ck, sink, d, si, a, za, bb, ainv);
}

#[allow(clippy::too_many_arguments)]
fn enumerate_progressions(
    t: &Tables,
    st: &mut PrimeStats,
    ck: &mut CheckBuffers,
    sink: &dyn ReportSink,
    d: u64,
    si: u8,
    a: u64,
    za: &[u64],
    bb: u64,
    ainv: u64,
) {
    let m = a as u128 * bb as u128;
    for &r in za {
        let wr = flip_res(r, si, a);
        for j in 0..ck.zb.len() {
            let zbr = ck.zb[j];
            let mut w = crt128_with_inv(wr, a, zbr, bb, ainv);
            while w <= t.zmax {
                exact_check(t, st, sink, d, si, w);
                w += m;
            }
        }
    }
}

/// Long progressions: lift through auxiliary primes until the remaining
/// enumeration is short or the residue buffer is full, then enumerate.
#[allow(clippy::too_many_arguments)]
pub fn check_lifted(
    t: &Tables,
    st: &mut PrimeStats,
    ck: &mut CheckBuffers,
    sink: &dyn ReportSink,
    d: u64,
    si: u8,
    a: u64,
    za: &[u64],
    bb: u64,
    ainv: u64,
) {
    ck.res.clear();
    for &r in za {
        let wr = flip_res(r, si, a);
        for j in 0..ck.zb.len() {
            let zbr = ck.zb[j];
            ck.res.push(crt128_with_inv(wr, a, zbr, bb, ainv));
        }
    }

    let mut mm = a as u128 * bb as u128;
    let cap = 1usize << ZBUFBITS;
    for (q, masks) in &t.auxtab {
        let q = *q;
        if ceil_div(t.zmax, mm) <= ZSHORT {
            break;
        }
        if mm % q as u128 == 0 || d % q == 0 {
            continue; // q already constrained through the progression itself
        }
        let mask = masks[signed_dm(d, si, q) as usize];
        let allowed = mask.count_ones() as usize;
        if allowed == 0 {
            ck.res.clear();
            break;
        }
        if ck.res.len().saturating_mul(allowed) > cap {
            break;
        }
        let minv = mod_inverse((mm % q as u128) as u64, q).expect("aux prime coprime to modulus");
        ck.res_tmp.clear();
        for i in 0..ck.res.len() {
            let r = ck.res[i];
            let rq = (r % q as u128) as u64;
            for zq in 0..q {
                if mask & (1 << zq) == 0 {
                    continue;
                }
                let wq = flip_res(zq, si, q);
                let step = mul_mod(sub_mod(wq, rq, q), minv, q);
                ck.res_tmp.push(r + mm * step as u128);
            }
        }
        std::mem::swap(&mut ck.res, &mut ck.res_tmp);
        mm *= q as u128;
    }

    for i in 0..ck.res.len() {
        let mut w = ck.res[i];
        while w <= t.zmax {
            exact_check(t, st, sink, d, si, w);
            w += mm;
        }
    }
}

/// The exact test: does w = |z| complete (d, si) to a solution candidate?
///
/// Progression membership guarantees d | k − z³; what remains is whether
/// n = (k − z³)/(x + y) is representable as x² − xy + y² with x + y = ±d,
/// i.e. whether (4n − d²)/3 is a perfect square of the right parity.
pub fn exact_check(
    t: &Tables,
    st: &mut PrimeStats,
    sink: &dyn ReportSink,
    d: u64,
    si: u8,
    w: u128,
) {
    st.residues += 1;

    let w3 = Integer::from(w).pow(3);
    // si = 1: z = −w, x + y = d, so d·n = k + w³.
    // si = 0: z = +w, x + y = −d, so d·n = w³ − k.
    let tval = if si == 1 { w3 + t.k } else { w3 - t.k };
    if tval <= 0 {
        return;
    }
    let (n, rem) = tval.div_rem(Integer::from(d));
    soft_assert!(rem == 0, "progression member must satisfy d | k − z³");
    if rem != 0 {
        return;
    }

    let delta = Integer::from(4u32) * &n - Integer::from(d).pow(2);
    if delta < 0 || !delta.is_divisible_u(3) {
        return;
    }
    let (sq, sq_rem) = (delta / 3u32).sqrt_rem(Integer::new());
    if sq_rem != 0 {
        return;
    }
    // x = (d + √Δ)/2 must be integral: d and √Δ share parity.
    if (&sq + d).complete().is_odd() {
        return;
    }

    let x = (&sq + d).complete() / 2u32;
    let y = Integer::from(d) - &x;
    let (sx, sy, sz) = if si == 1 {
        (x, y, -Integer::from(w))
    } else {
        (-x, -y, Integer::from(w))
    };
    soft_assert!(
        Integer::from((&sx).pow(3)) + Integer::from((&sy).pow(3)) + Integer::from((&sz).pow(3))
            == t.k,
        "reconstructed candidate must satisfy the equation"
    );

    st.hits += 1;
    sink.hit(&sx, &sy, &sz);
}
