//! # Worker — The Per-Worker Prime Driver
//!
//! Each worker consumes primes from the shared pipe and drives the
//! enumeration for every denominator whose largest coprime-to-k prime is
//! the consumed prime. Six phases partition [pmin, pmax], gated by the
//! loader's thresholds; as p rises a worker's primes arrive in increasing
//! order, so the cached-prime index advances by linear scan.
//!
//! | phase     | interval          | path |
//! |-----------|-------------------|------|
//! | CACHED    | [pmin, cpmax]     | cached roots, all exponents, generic recursion |
//! | UNCACHED  | (cpmax, cdmin)    | roots on the fly, generic recursion |
//! | COCACHED  | [cdmin, sdmin)    | roots on the fly, chain walk |
//! | NEARPRIME | [sdmin, pdmin)    | roots on the fly, sdtab walk (descending) |
//! | PRIME     | [pdmin, bpmin)    | d = p, coprime dispatch |
//! | BIGPRIME  | [bpmin, pmax]     | d = p, cached progression length |
//!
//! The subprime variant drives only the CACHED shape, with the outer
//! prime fixed at p0 and the pipe supplying the second-largest prime;
//! when the pipe reaches p0 itself the terminating step emits d = p0 and
//! the denominators divisible by p0².

use crate::check::CheckBuffers;
use crate::coordinator::PrimePipe;
use crate::cuberoot::cuberoots_mod_p;
use crate::dispatch::{process_big_prime, process_coprime, process_k_divisors, PrimeStats};
use crate::enumerate::{enum_chain, enum_divisors};
use crate::modular::{crt64_with_inv, mod_inverse};
use crate::report::{ReportSink, Reporter};
use crate::tables::{Tables, Thresholds};
use crate::{soft_assert, CUBEROOT_BUFSIZE};

/// The six prime regimes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum Phase {
    Cached = 0,
    Uncached = 1,
    Cocached = 2,
    NearPrime = 3,
    Prime = 4,
    BigPrime = 5,
}

/// Exactly one phase claims each prime; the partition follows the
/// threshold chain cpmax ≤ cdmin ≤ sdmin ≤ pdmin ≤ bpmin.
pub fn phase_for(th: &Thresholds, p: u64) -> Phase {
    if p <= th.cpmax {
        Phase::Cached
    } else if p < th.cdmin {
        Phase::Uncached
    } else if p < th.sdmin {
        Phase::Cocached
    } else if p < th.pdmin {
        Phase::NearPrime
    } else if p < th.bpmin {
        Phase::Prime
    } else {
        Phase::BigPrime
    }
}

/// Stage gating: stage 1 runs nothing (precompute only), stage s enables
/// the first s − 1 phases, stage 6 enables all six.
pub fn phase_allowed(stage: u8, ph: Phase) -> bool {
    match stage {
        0 | 1 => false,
        6.. => true,
        s => (ph as u8) < s - 1,
    }
}

/// Per-worker driver state. Scratch buffers are owned here so that
/// workers share nothing but the tables, the pipe, and the reporter.
pub struct WorkerDriver<'a> {
    t: &'a Tables,
    stage: u8,
    /// Linear-scan index into cptab; primes arrive in increasing order.
    pi: usize,
    /// Cached BIGPRIME progression length and the largest prime it
    /// remains valid for.
    big_l: u128,
    big_l_pmax: u64,
    arena: Vec<u64>,
    ck: CheckBuffers,
}

impl<'a> WorkerDriver<'a> {
    pub fn new(t: &'a Tables, stage: u8) -> WorkerDriver<'a> {
        WorkerDriver {
            t,
            stage,
            pi: 0,
            big_l: 0,
            big_l_pmax: 0,
            arena: vec![0; CUBEROOT_BUFSIZE],
            ck: CheckBuffers::new(),
        }
    }

    /// Consume the pipe until the end-of-stream sentinel or an abort.
    pub fn run(&mut self, pipe: &PrimePipe, rep: &Reporter, sink: &dyn ReportSink) {
        while let Some(p) = pipe.pop() {
            if rep.aborted() {
                return;
            }
            self.handle_prime(p, rep, sink);
        }
    }

    /// Process a single prime end-to-end: veto, phase gate, enumeration,
    /// stats report. Public so tests can drive the engine without threads.
    ///
    /// Every non-vetoed prime reports completion, including those that do
    /// no work (primes dividing k, gated phases): the contiguous
    /// watermark must advance past them.
    pub fn handle_prime(&mut self, p: u64, rep: &Reporter, sink: &dyn ReportSink) {
        if !rep.begin_prime(p) {
            return; // vetoed: already covered by the resumed checkpoint
        }
        let mut st = PrimeStats::default();
        if self.t.k % p != 0 {
            if self.t.p0 > 1 {
                if phase_allowed(self.stage, Phase::Cached) {
                    self.subprime_step(p, &mut st, sink);
                }
            } else {
                let ph = phase_for(&self.t.th, p);
                if phase_allowed(self.stage, ph) {
                    self.process_prime(p, ph, &mut st, sink);
                }
            }
        }
        rep.finish_prime(p, st);
    }

    /// Advance the cached-prime cursor to p. Returns None when p is not a
    /// cached prime (only possible above cpmax, which callers exclude).
    fn advance_pi(&mut self, p: u64) -> Option<usize> {
        let tab = &self.t.cptab;
        while self.pi < tab.len() && tab[self.pi].p < p {
            self.pi += 1;
        }
        (self.pi < tab.len() && tab[self.pi].p == p).then_some(self.pi)
    }

    fn process_prime(&mut self, p: u64, ph: Phase, st: &mut PrimeStats, sink: &dyn ReportSink) {
        let t = self.t;
        match ph {
            Phase::Cached => {
                let Some(pi) = self.advance_pi(p) else {
                    soft_assert!(false, "cached phase prime {} missing from cptab", p);
                    return;
                };
                let entry = &t.cptab[pi];
                let n = entry.roots.len();
                if n == 0 {
                    return;
                }
                st.roots = n as u64;
                for e in 1..=entry.emax {
                    let pe = entry.pe(e);
                    for (i, &r) in entry.roots.iter().enumerate() {
                        self.arena[i] = r % pe;
                    }
                    {
                        let roots = &self.arena[..n];
                        process_k_divisors(t, st, &mut self.ck, sink, pe, roots);
                    }
                    enum_divisors(t, &mut self.arena, st, &mut self.ck, sink, pe, p, 0, n);
                }
            }
            _ => {
                // Above cpmax: p² > dmax, so the exponent is always 1 and
                // roots are computed on the fly.
                let roots = cuberoots_mod_p(t.k, p);
                if roots.is_empty() {
                    return;
                }
                let n = roots.len();
                st.roots = n as u64;
                self.arena[..n].copy_from_slice(&roots);
                match ph {
                    Phase::Uncached => {
                        {
                            let roots = &self.arena[..n];
                            process_k_divisors(t, st, &mut self.ck, sink, p, roots);
                        }
                        enum_divisors(t, &mut self.arena, st, &mut self.ck, sink, p, p, 0, n);
                    }
                    Phase::Cocached => {
                        {
                            let roots = &self.arena[..n];
                            process_k_divisors(t, st, &mut self.ck, sink, p, roots);
                        }
                        enum_chain(t, &mut self.arena, st, &mut self.ck, sink, p, p, 0, n);
                    }
                    Phase::NearPrime => {
                        {
                            let roots = &self.arena[..n];
                            process_k_divisors(t, st, &mut self.ck, sink, p, roots);
                        }
                        self.near_prime_walk(p, st, sink, n);
                    }
                    Phase::Prime => {
                        process_coprime(t, st, &mut self.ck, sink, p, &self.arena[..n]);
                    }
                    Phase::BigPrime => {
                        let l = self.refresh_big_l(p);
                        process_big_prime(t, st, &mut self.ck, sink, p, &self.arena[..n], l);
                    }
                    Phase::Cached => unreachable!(),
                }
            }
        }
    }

    /// NEARPRIME: every cofactor is fully cached. Walk sdtab in
    /// decreasing order, stopping at the largest d' with p·d' ≤ dmax.
    fn near_prime_walk(&mut self, p: u64, st: &mut PrimeStats, sink: &dyn ReportSink, n: usize) {
        let t = self.t;
        let cutoff = t.dmax / p;
        let hi = t.sdtab.partition_point(|e| e.d <= cutoff);
        for sd in t.sdtab[..hi].iter().rev() {
            let inv = sd.inv_of(p);
            soft_assert!(inv != 0, "p must be a unit mod the cached cofactor");
            let n2 = n * sd.roots.len();
            let off2 = n;
            soft_assert!(off2 + n2 <= CUBEROOT_BUFSIZE, "root arena overflow");
            let mut w = off2;
            for i in 0..n {
                let rp = self.arena[i];
                for &rq in &sd.roots {
                    self.arena[w] = crt64_with_inv(rp, p, rq, sd.d, inv);
                    w += 1;
                }
            }
            let roots = &self.arena[off2..off2 + n2];
            process_k_divisors(t, st, &mut self.ck, sink, p * sd.d, roots);
        }
    }

    /// BIGPRIME progression length, cached while (l−1)·b·p ≤ zmax holds.
    fn refresh_big_l(&mut self, p: u64) -> u128 {
        let t = self.t;
        let b = t.aux_modulus(p) as u128;
        if p & 1 == 0 {
            // p = 2 uses the even-d auxiliary modulus; never cache it.
            return t.zmax / (b * p as u128) + 1;
        }
        if self.big_l == 0 || p > self.big_l_pmax {
            let l = t.zmax / (b * p as u128) + 1;
            self.big_l = l;
            self.big_l_pmax = if l >= 2 {
                (t.zmax / ((l - 1) * b)).min(u64::MAX as u128) as u64
            } else {
                u64::MAX
            };
        }
        self.big_l
    }

    /// Subprime mode: the outer prime is fixed at p0; the pipe supplies
    /// the second-largest prime p. When p reaches p0 the terminating step
    /// emits d = p0 and everything divisible by p0².
    fn subprime_step(&mut self, p: u64, st: &mut PrimeStats, sink: &dyn ReportSink) {
        let t = self.t;
        if t.p0_idx == usize::MAX {
            return;
        }
        if p == t.p0 {
            self.subprime_terminal(st, sink);
        } else {
            self.subprime_inner(p, st, sink);
        }
    }

    fn subprime_inner(&mut self, p: u64, st: &mut PrimeStats, sink: &dyn ReportSink) {
        let t = self.t;
        let p0 = t.p0;
        let roots0: Vec<u64> = t.cptab[t.p0_idx].roots.iter().map(|&r| r % p0).collect();
        if roots0.is_empty() {
            return;
        }
        let Some(pi) = self.advance_pi(p) else {
            soft_assert!(false, "subprime inner prime {} missing from cptab", p);
            return;
        };
        let entry = &t.cptab[pi];
        if entry.roots.is_empty() {
            return;
        }
        st.roots = entry.roots.len() as u64;

        let mut pe = p;
        for _e in 1..=entry.emax {
            let d0 = match p0.checked_mul(pe) {
                Some(x) if x <= t.dmax => x,
                _ => break,
            };
            let inv = if !t.itab_p0.is_empty() {
                t.itab_p0[(pe % p0) as usize] as u64
            } else {
                mod_inverse(pe % p0, p0).unwrap_or(0)
            };
            soft_assert!(inv != 0, "inner prime power must be a unit mod p0");

            let n2 = entry.roots.len() * roots0.len();
            soft_assert!(n2 <= CUBEROOT_BUFSIZE, "root arena overflow");
            let mut w = 0;
            for &rq in &entry.roots {
                let rq = rq % pe;
                for &r0 in &roots0 {
                    self.arena[w] = crt64_with_inv(rq, pe, r0, p0, inv);
                    w += 1;
                }
            }
            {
                let roots = &self.arena[..n2];
                process_k_divisors(t, st, &mut self.ck, sink, d0, roots);
            }
            enum_divisors(t, &mut self.arena, st, &mut self.ck, sink, d0, p, 0, n2);

            pe = match pe.checked_mul(p) {
                Some(x) => x,
                None => break,
            };
        }
    }

    fn subprime_terminal(&mut self, st: &mut PrimeStats, sink: &dyn ReportSink) {
        let t = self.t;
        let entry = &t.cptab[t.p0_idx];
        let n = entry.roots.len();
        if n == 0 {
            return;
        }
        st.roots = n as u64;
        for e in 1..=entry.emax {
            let pe = entry.pe(e);
            for (i, &r) in entry.roots.iter().enumerate() {
                self.arena[i] = r % pe;
            }
            {
                let roots = &self.arena[..n];
                process_k_divisors(t, st, &mut self.ck, sink, pe, roots);
            }
            // p0¹ with smaller primes is the inner loop's job; only the
            // higher powers extend here.
            if e >= 2 {
                enum_divisors(t, &mut self.arena, st, &mut self.ck, sink, pe, t.p0, 0, n);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::SearchParams;
    use crate::report::Totals;
    use rug::Integer;
    use std::sync::Mutex;

    struct Recorder {
        divisors: Mutex<Vec<(u64, u64, Vec<u64>)>>,
    }

    impl Recorder {
        fn new() -> Recorder {
            Recorder { divisors: Mutex::new(Vec::new()) }
        }
        fn ds(&self) -> Vec<u64> {
            let mut v: Vec<u64> =
                self.divisors.lock().unwrap().iter().map(|e| e.0).collect();
            v.sort_unstable();
            v
        }
    }

    impl ReportSink for Recorder {
        fn divisor(&self, d: u64, a: u64, roots: &[u64]) {
            self.divisors.lock().unwrap().push((d, a, roots.to_vec()));
        }
        fn hit(&self, _x: &Integer, _y: &Integer, _z: &Integer) {}
    }

    fn params(k: u64, pmin: u64, pmax: u64, p0: u64, dmax: u64, zmax: u128) -> SearchParams {
        SearchParams {
            cores: 1,
            k,
            pmin,
            pmax,
            p0,
            dmax,
            zmax,
            stage: 6,
            stage_explicit: true,
            expected: Default::default(),
        }
    }

    fn drive(t: &Tables, stage: u8, lo: u64, hi: u64, sink: &dyn ReportSink) -> Totals {
        let rep = Reporter::new(0, Totals::default(), None);
        let mut w = WorkerDriver::new(t, stage);
        for p in crate::sieve::generate_primes(hi) {
            if p >= lo {
                w.handle_prime(p, &rep, sink);
            }
        }
        rep.totals()
    }

    // ── Phase partition ─────────────────────────────────────────────────

    /// Each prime in [pmin, pmax] is claimed by exactly one phase, and
    /// the claims follow the threshold intervals.
    #[test]
    fn phase_partition_matches_thresholds() {
        let th = Thresholds::derive(42, 10_000, 1_000_000_000);
        for p in crate::sieve::generate_primes(10_000) {
            let ph = phase_for(&th, p);
            let expected = if p <= th.cpmax {
                Phase::Cached
            } else if p < th.cdmin {
                Phase::Uncached
            } else if p < th.sdmin {
                Phase::Cocached
            } else if p < th.pdmin {
                Phase::NearPrime
            } else if p < th.bpmin {
                Phase::Prime
            } else {
                Phase::BigPrime
            };
            assert_eq!(ph, expected, "p={}", p);
        }
    }

    #[test]
    fn stage_gating_enables_prefixes() {
        assert!(!phase_allowed(1, Phase::Cached));
        assert!(phase_allowed(2, Phase::Cached));
        assert!(!phase_allowed(2, Phase::Uncached));
        assert!(phase_allowed(4, Phase::Cocached));
        assert!(!phase_allowed(4, Phase::NearPrime));
        assert!(phase_allowed(5, Phase::NearPrime));
        assert!(!phase_allowed(5, Phase::Prime));
        for ph in [Phase::Cached, Phase::Uncached, Phase::Cocached, Phase::NearPrime, Phase::Prime, Phase::BigPrime] {
            assert!(phase_allowed(6, ph));
        }
    }

    // ── Full-engine coverage (single worker) ────────────────────────────

    /// k = 3, primes [2, 10], dmax = 100: the emitted denominator set is
    /// exactly every d ≤ 100 coprime to 3 whose largest prime factor is
    /// ≤ 10 and for which cube roots of 3 exist — each exactly once, with
    /// root sets matching brute force.
    #[test]
    fn engine_emits_every_admissible_denominator_once() {
        let t = Tables::load(&params(3, 2, 10, 1, 100, 1_000_000));
        let sink = Recorder::new();
        let totals = drive(&t, 6, 2, 10, &sink);

        let mut expected: Vec<u64> = (2..=100u64)
            .filter(|&d| {
                d % 3 != 0
                    && crate::sieve::largest_prime_factor(d) <= 10
                    && !crate::cuberoot::brute_roots(3, d).is_empty()
            })
            .collect();
        expected.sort_unstable();
        assert_eq!(sink.ds(), expected);
        assert_eq!(totals.dcnt, expected.len() as u64);

        // Root sets are exactly the cube roots of 3 mod d.
        for (d, a, roots) in sink.divisors.lock().unwrap().iter() {
            assert_eq!(d, a);
            let mut got = roots.clone();
            got.sort_unstable();
            assert_eq!(got, crate::cuberoot::brute_roots(3, *d), "d={}", d);
        }

        // pcnt: of {2, 5, 7}, only 2 and 5 have cube roots of 3 (3 is a
        // cubic non-residue mod 7); 3 divides k and is skipped.
        assert_eq!(totals.pcnt, 2);
    }

    /// k = 42 exercises the k-divisor fan-out and all mid phases. The
    /// expected set: d = m·a with m | 42 admissible, a coprime to 42,
    /// lpf(a) ∈ [2, 200], roots existing mod a.
    #[test]
    fn engine_with_k_divisors_matches_model() {
        let t = Tables::load(&params(42, 2, 200, 1, 2_000, 2_000_000));
        let sink = Recorder::new();
        let totals = drive(&t, 6, 2, 200, &sink);

        let mut expected: Vec<u64> = Vec::new();
        for m in [1u64, 2, 7, 14] {
            for a in 2..=2_000u64 {
                let d = m * a;
                if d > 2_000 || crate::sieve::gcd(a, 42) != 1 {
                    continue;
                }
                let lpf = crate::sieve::largest_prime_factor(a);
                if !(2..=200).contains(&lpf) {
                    continue;
                }
                if crate::cuberoot::cuberoots_mod_m(42, a).is_empty() {
                    continue;
                }
                expected.push(d);
            }
        }
        expected.sort_unstable();
        assert_eq!(sink.ds(), expected);
        assert_eq!(totals.dcnt, expected.len() as u64);
    }

    /// Worker partitioning cannot change totals: dealing the primes
    /// round-robin over four drivers gives the same counters as one.
    #[test]
    fn totals_are_independent_of_worker_partitioning() {
        let t = Tables::load(&params(42, 2, 200, 1, 2_000, 2_000_000));
        let sink1 = Recorder::new();
        let single = drive(&t, 6, 2, 200, &sink1);

        let rep = Reporter::new(0, Totals::default(), None);
        let sink4 = Recorder::new();
        let mut workers: Vec<WorkerDriver> = (0..4).map(|_| WorkerDriver::new(&t, 6)).collect();
        for (i, p) in crate::sieve::generate_primes(200).into_iter().enumerate() {
            workers[i % 4].handle_prime(p, &rep, &sink4);
        }
        assert_eq!(rep.totals(), single);
        let mut a = sink1.ds();
        let mut b = sink4.ds();
        a.sort_unstable();
        b.sort_unstable();
        assert_eq!(a, b);
    }

    /// Stage 2 restricts to CACHED primes only.
    #[test]
    fn stage_limits_processed_phases() {
        let t = Tables::load(&params(42, 2, 200, 1, 2_000, 2_000_000));
        let sink = Recorder::new();
        drive(&t, 2, 2, 200, &sink);
        for (_, a, _) in sink.divisors.lock().unwrap().iter() {
            let lpf = crate::sieve::largest_prime_factor(*a);
            assert!(lpf <= t.th.cpmax, "stage 2 must stay in the cached phase");
        }
    }

    // ── Subprime mode ───────────────────────────────────────────────────

    /// Subprime p0 = 7, k = 6, inner primes {2, 5} (3 divides k): every
    /// denominator is divisible by 7 and its second-largest prime is
    /// 2 or 5; without the terminal step no d is divisible by 49.
    #[test]
    fn subprime_inner_denominators() {
        let t = Tables::load(&params(6, 2, 5, 7, 10_000, 10_000_000));
        let sink = Recorder::new();
        let totals = drive(&t, 6, 2, 5, &sink);
        assert!(totals.dcnt > 0);
        for (d, a, roots) in sink.divisors.lock().unwrap().iter() {
            assert_eq!(d % 7, 0, "d={} must be divisible by p0", d);
            assert_ne!(d % 49, 0, "terminal step did not run");
            let inner = a / 7;
            let lpf = crate::sieve::largest_prime_factor(inner);
            assert!(lpf == 2 || lpf == 5, "second-largest prime of {} is {}", d, lpf);
            for &r in roots {
                assert_eq!(crate::cuberoot::cube_mod(r, *a), 6 % *a, "a={}", a);
            }
        }
    }

    /// With the pipe reaching p0 the terminal step adds d = p0 and the
    /// p0²-divisible denominators, still without duplicates.
    #[test]
    fn subprime_terminal_step() {
        let t = Tables::load(&params(6, 2, 7, 7, 10_000, 10_000_000));
        let sink = Recorder::new();
        drive(&t, 6, 2, 7, &sink);
        let ds = sink.ds();
        let mut dedup = ds.clone();
        dedup.dedup();
        assert_eq!(ds, dedup, "duplicate denominators in subprime mode");
        assert!(ds.contains(&7));
        assert!(ds.contains(&49));
        assert!(ds.contains(&98), "49 times the k-divisor 2");
        assert!(ds.contains(&245), "49·5 comes from the terminal recursion");
        for &d in &ds {
            assert_eq!(d % 7, 0);
        }
    }

    /// COCACHED needs dmax beyond sdmax·cpmax: cofactors come from the
    /// precomputed chains, and the emitted set matches the model of all
    /// admissible smooth cofactors.
    #[test]
    fn cocached_phase_walks_chains() {
        let t = Tables::load(&params(3, 2, 4_000, 1, 4_000_000, 10_000_000));
        let p = 2003u64; // prime ≡ 2 (mod 3)
        assert_eq!(phase_for(&t.th, p), Phase::Cocached);
        let sink = Recorder::new();
        let rep = Reporter::new(0, Totals::default(), None);
        let mut w = WorkerDriver::new(&t, 6);
        w.handle_prime(p, &rep, &sink);

        let mut expected: Vec<u64> = vec![p];
        for dq in 2..=(4_000_000 / p) {
            if crate::sieve::gcd(dq, 3) == 1
                && !crate::cuberoot::cuberoots_mod_m(3, dq).is_empty()
            {
                expected.push(p * dq);
            }
        }
        expected.sort_unstable();
        assert_eq!(sink.ds(), expected);
        for (_, a, roots) in sink.divisors.lock().unwrap().iter() {
            for &r in roots {
                assert_eq!(crate::cuberoot::cube_mod(r, *a), 3 % *a, "a={}", a);
            }
        }
    }

    /// PRIME and BIGPRIME degenerate to d = p; the big-prime path caches
    /// its progression length across consecutive primes.
    #[test]
    fn prime_and_big_prime_phases() {
        let t = Tables::load(&params(3, 2, 100, 1, 100, 400_000));
        assert_eq!(phase_for(&t.th, 53), Phase::Prime);
        assert_eq!(phase_for(&t.th, 83), Phase::BigPrime);
        assert_eq!(phase_for(&t.th, 89), Phase::BigPrime);
        let sink = Recorder::new();
        let rep = Reporter::new(0, Totals::default(), None);
        let mut w = WorkerDriver::new(&t, 6);
        for p in [53u64, 83, 89] {
            w.handle_prime(p, &rep, &sink);
        }
        // 53, 83 ≡ 2 (mod 3) have a root; 89 too. All three emit d = p.
        assert_eq!(sink.ds(), vec![53, 83, 89]);
        let totals = rep.totals();
        assert_eq!(totals.dcnt, 3);
        assert!(totals.rcnt > 0);
    }

    /// The pmin = pmax = 2 boundary: for odd k the run enumerates exactly
    /// the powers of two up to dmax; for even k the prime 2 divides k and
    /// nothing is enumerated.
    #[test]
    fn prime_range_of_just_two() {
        let t3 = Tables::load(&params(3, 2, 2, 1, 100, 1_000_000));
        let sink = Recorder::new();
        drive(&t3, 6, 2, 2, &sink);
        assert_eq!(sink.ds(), vec![2, 4, 8, 16, 32, 64]);

        let t6 = Tables::load(&params(6, 2, 2, 1, 100, 1_000_000));
        let sink6 = Recorder::new();
        let totals = drive(&t6, 6, 2, 2, &sink6);
        assert!(sink6.ds().is_empty());
        assert_eq!(totals.pcnt, 0);
    }

    /// Primes dividing k do no work and report empty stats.
    #[test]
    fn primes_dividing_k_are_skipped() {
        let t = Tables::load(&params(42, 2, 10, 1, 100, 1_000_000));
        let rep = Reporter::new(0, Totals::default(), None);
        let sink = Recorder::new();
        let mut w = WorkerDriver::new(&t, 6);
        for p in [2u64, 3, 7] {
            w.handle_prime(p, &rep, &sink);
        }
        assert_eq!(rep.totals(), Totals::default());
        assert!(sink.ds().is_empty());
    }
}
