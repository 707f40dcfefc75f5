//! # Enumerate — Walking Every Smooth Denominator
//!
//! Given an outer prime power p^e with its cube roots, enumerate every
//! admissible denominator whose largest coprime-to-k prime is p, in
//! canonical descending-prime order: each recursion level appends powers
//! of a strictly smaller prime, so every denominator is formed exactly
//! once. Cube roots ride along, composed by CRT at each extension.
//!
//! Two regimes:
//!
//! - [`enum_divisors`] — generic recursion over cached primes q < p.
//!   Candidate prime powers are gathered and inverted modulo the current
//!   denominator in batches of [`IBATCH`] (Montgomery's trick: one
//!   extended-gcd inverse plus 3(n−1) multiplications), since every CRT
//!   extension at one level shares the modulus.
//! - [`enum_chain`] — once the denominator crosses cdmin, the remaining
//!   cofactor budget is at most chain_span, and all admissible cofactors
//!   are precomputed as chain records grouped by largest prime factor.
//!   Records backed by sdtab use its cached inverse tables; the rest are
//!   batch-inverted like the generic path.
//!
//! Root sets live in a per-worker arena: a recursion level's children are
//! written directly after its own roots, so siblings never trample a
//! child's slice and the high-water mark stays below
//! [`CUBEROOT_BUFSIZE`].

use crate::check::CheckBuffers;
use crate::dispatch::{process_k_divisors, PrimeStats};
use crate::modular::{batch_inverse, crt64_with_inv};
use crate::report::ReportSink;
use crate::tables::Tables;
use crate::{soft_assert, CUBEROOT_BUFSIZE, IBATCH};

/// Extend d by every admissible prime power q^e with q < pbound and
/// d·q^e ≤ dmax, dispatching and recursing on each product.
///
/// `arena[off..off + n]` holds the cube roots of k mod d.
#[allow(clippy::too_many_arguments)]
pub fn enum_divisors(
    t: &Tables,
    arena: &mut Vec<u64>,
    st: &mut PrimeStats,
    ck: &mut CheckBuffers,
    sink: &dyn ReportSink,
    d: u64,
    pbound: u64,
    off: usize,
    n: usize,
) {
    // Gather candidate prime powers first: the batch inversion below and
    // the recursion both reuse the shared buffers.
    let mut cands: Vec<(u64, u32, u32)> = Vec::new(); // (q^e, cptab idx, e)
    for (qi, entry) in t.cptab.iter().enumerate() {
        if entry.p >= pbound {
            break;
        }
        if entry.roots.is_empty() {
            continue; // q | k, or k has no cube roots mod q
        }
        let mut pe = entry.p;
        for e in 1..=entry.emax {
            match d.checked_mul(pe) {
                Some(dq) if dq <= t.dmax => cands.push((pe, qi as u32, e)),
                _ => break,
            }
            pe = match pe.checked_mul(entry.p) {
                Some(next) => next,
                None => break,
            };
        }
    }

    let mut invs: Vec<u64> = Vec::with_capacity(IBATCH);
    let mut scratch: Vec<u64> = Vec::with_capacity(IBATCH);
    for chunk in cands.chunks(IBATCH) {
        invs.clear();
        invs.extend(chunk.iter().map(|&(pe, _, _)| pe % d));
        let ok = batch_inverse(&mut invs, d, &mut scratch);
        soft_assert!(ok, "prime-power cofactors must be units mod d");
        if !ok {
            continue;
        }
        for (ci, &(pe, qi, _e)) in chunk.iter().enumerate() {
            let inv = invs[ci];
            let entry = &t.cptab[qi as usize];
            let d2 = d * pe;
            let nq = entry.roots.len();
            let n2 = n * nq;
            let off2 = off + n;
            soft_assert!(off2 + n2 <= CUBEROOT_BUFSIZE, "root arena overflow");
            let mut w = off2;
            for ri in 0..nq {
                let rq = entry.roots[ri] % pe;
                for i in 0..n {
                    arena[w] = crt64_with_inv(rq, pe, arena[off + i], d, inv);
                    w += 1;
                }
            }
            {
                let roots = &arena[off2..off2 + n2];
                process_k_divisors(t, st, ck, sink, d2, roots);
            }
            if d2 >= t.th.cdmin {
                enum_chain(t, arena, st, ck, sink, d2, entry.p, off2, n2);
            } else {
                enum_divisors(t, arena, st, ck, sink, d2, entry.p, off2, n2);
            }
        }
    }
}

/// Extend d by every chain cofactor with largest prime factor < pbound
/// and d·d' ≤ dmax. Cofactors are complete (multi-prime) numbers, so no
/// recursion happens here.
#[allow(clippy::too_many_arguments)]
pub fn enum_chain(
    t: &Tables,
    arena: &mut Vec<u64>,
    st: &mut PrimeStats,
    ck: &mut CheckBuffers,
    sink: &dyn ReportSink,
    d: u64,
    pbound: u64,
    off: usize,
    n: usize,
) {
    let mut batch: Vec<(u64, &[u64])> = Vec::with_capacity(IBATCH); // (d', roots of k mod d')
    let mut invs: Vec<u64> = Vec::with_capacity(IBATCH);
    let mut scratch: Vec<u64> = Vec::with_capacity(IBATCH);

    let mut flush = |batch: &mut Vec<(u64, &[u64])>,
                     arena: &mut Vec<u64>,
                     st: &mut PrimeStats,
                     ck: &mut CheckBuffers| {
        if batch.is_empty() {
            return;
        }
        invs.clear();
        invs.extend(batch.iter().map(|&(dq, _)| dq % d));
        let ok = batch_inverse(&mut invs, d, &mut scratch);
        soft_assert!(ok, "chain cofactors must be units mod d");
        if ok {
            for (ci, &(dq, roots_q)) in batch.iter().enumerate() {
                let inv = invs[ci]; // dq⁻¹ mod d
                let d2 = d * dq;
                let n2 = n * roots_q.len();
                let off2 = off + n;
                soft_assert!(off2 + n2 <= CUBEROOT_BUFSIZE, "root arena overflow");
                let mut w = off2;
                for &rq in roots_q {
                    for i in 0..n {
                        arena[w] = crt64_with_inv(rq, dq, arena[off + i], d, inv);
                        w += 1;
                    }
                }
                let roots = &arena[off2..off2 + n2];
                process_k_divisors(t, st, ck, sink, d2, roots);
            }
        }
        batch.clear();
    };

    for (lpf, group) in &t.chains {
        if *lpf >= pbound {
            break;
        }
        for entry in group {
            let d2 = match d.checked_mul(entry.d) {
                Some(x) if x <= t.dmax => x,
                _ => break, // entries ascend within a group
            };
            if let Some(si) = entry.sd {
                // Fully cached sub-path: the inverse of d mod d' comes
                // straight out of sdtab, no batching needed.
                let sd = &t.sdtab[si as usize];
                let inv = sd.inv_of(d);
                soft_assert!(inv != 0, "d must be a unit mod the cofactor");
                let n2 = n * entry.roots.len();
                let off2 = off + n;
                soft_assert!(off2 + n2 <= CUBEROOT_BUFSIZE, "root arena overflow");
                let mut w = off2;
                for i in 0..n {
                    let rd = arena[off + i];
                    for &rq in &entry.roots {
                        arena[w] = crt64_with_inv(rd, d, rq, entry.d, inv);
                        w += 1;
                    }
                }
                let roots = &arena[off2..off2 + n2];
                process_k_divisors(t, st, ck, sink, d2, roots);
            } else {
                batch.push((entry.d, &entry.roots));
                if batch.len() == IBATCH {
                    flush(&mut batch, arena, st, ck);
                }
            }
        }
    }
    flush(&mut batch, arena, st, ck);
}
