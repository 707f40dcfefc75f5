//! # Sieve — Prime Generation
//!
//! Provides the two prime sources the engine needs:
//!
//! 1. **Bulk generation** (`generate_primes`) via a wheel-30 sieve of
//!    Eratosthenes (26.7% memory of the naive sieve — stores only residues
//!    coprime to {2, 3, 5}). Used by the table loader for the cached-prime
//!    table and by the feeder for base primes.
//! 2. **Segmented streaming** (`PrimeStream`) over an arbitrary range
//!    [lo, hi], used by the feeder thread to push primes into the worker
//!    pipe without materializing π(pmax) values up front.
//!
//! Also hosts the scalar helpers shared across the arithmetic modules:
//! `pow_mod`, `gcd`, and trial-division factorization of u64.
//!
//! ## Algorithm: Wheel-30 Sieve
//!
//! The sieve tracks only integers coprime to 30 = 2·3·5 (8 residues per 30).
//! Each segment of 30 consecutive integers is packed into a single byte.
//! Complexity: O(n log log n) time, O(n/30) space.

/// Residues coprime to 30: the only positions the wheel tracks.
const RESIDUES: [u8; 8] = [1, 7, 11, 13, 17, 19, 23, 29];

/// Map residue mod 30 → wheel bit index (255 for residues sharing a factor
/// with 30).
const RES_TO_IDX: [u8; 30] = [
    255, 0, 255, 255, 255, 255, 255, 1, 255, 255, 255, 2, 255, 3, 255, 255, 255, 4, 255, 5, 255,
    255, 255, 6, 255, 255, 255, 255, 255, 7,
];

/// Generate all primes up to `limit` using a wheel-30 sieve.
pub fn generate_primes(limit: u64) -> Vec<u64> {
    if limit < 2 {
        return vec![];
    }
    if limit < 7 {
        return [2, 3, 5].iter().copied().filter(|&p| p <= limit).collect();
    }

    let limit = limit as usize;
    let num_segments = limit / 30 + 1;
    // Pack 8 residues per byte (one bit each) for each segment of 30.
    let mut sieve = vec![0xFFu8; num_segments];

    let sqrt_limit = (limit as f64).sqrt() as usize + 1;
    for seg in 0..num_segments {
        for &ri in &RESIDUES {
            let n = seg * 30 + ri as usize;
            if n < 7 || n > sqrt_limit {
                continue;
            }
            let idx = RES_TO_IDX[ri as usize] as usize;
            if sieve[seg] & (1 << idx) == 0 {
                continue; // already marked composite
            }
            let mut m = n * n;
            while m <= limit {
                let mr = m % 30;
                if RES_TO_IDX[mr] != 255 {
                    sieve[m / 30] &= !(1 << RES_TO_IDX[mr]);
                }
                m += n;
            }
        }
    }

    let mut primes = Vec::with_capacity(estimate_prime_count(limit));
    primes.extend_from_slice(&[2, 3, 5]);
    for (seg, &byte) in sieve.iter().enumerate() {
        if byte == 0 {
            continue;
        }
        for (bit_idx, &r) in RESIDUES.iter().enumerate() {
            if byte & (1 << bit_idx) != 0 {
                let n = seg * 30 + r as usize;
                if n > 5 && n <= limit {
                    primes.push(n as u64);
                }
            }
        }
    }
    primes
}

/// Estimate prime count up to n via the prime counting function.
fn estimate_prime_count(n: usize) -> usize {
    if n < 10 {
        return 4;
    }
    let nf = n as f64;
    (1.3 * nf / nf.ln()) as usize
}

/// Segment width for `PrimeStream`, in integers.
const SEGMENT_SPAN: u64 = 1 << 18;

/// Segmented prime iterator over [lo, hi]. Base primes up to √hi are sieved
/// once; each segment is then sieved on demand, so memory stays O(√hi)
/// regardless of the range length.
pub struct PrimeStream {
    lo: u64,
    hi: u64,
    base: Vec<u64>,
    buf: Vec<u64>,
    buf_pos: usize,
}

impl PrimeStream {
    pub fn new(lo: u64, hi: u64) -> Self {
        let base = if hi >= 2 { generate_primes(crate::isqrt(hi)) } else { vec![] };
        PrimeStream { lo: lo.max(2), hi, base, buf: Vec::new(), buf_pos: 0 }
    }

    /// Sieve the next segment into `buf`. Returns false when the range is
    /// exhausted.
    fn fill(&mut self) -> bool {
        while self.lo <= self.hi {
            let seg_lo = self.lo;
            let seg_hi = seg_lo.saturating_add(SEGMENT_SPAN - 1).min(self.hi);
            let span = (seg_hi - seg_lo + 1) as usize;
            let mut composite = vec![false; span];
            for &p in &self.base {
                if p.saturating_mul(p) > seg_hi {
                    break;
                }
                // First multiple of p in [seg_lo, seg_hi], at least p².
                let mut m = seg_lo.div_ceil(p) * p;
                if m < p * p {
                    m = p * p;
                }
                while m <= seg_hi {
                    composite[(m - seg_lo) as usize] = true;
                    m += p;
                }
            }
            self.buf.clear();
            self.buf_pos = 0;
            for (i, &c) in composite.iter().enumerate() {
                let n = seg_lo + i as u64;
                if n >= 2 && !c {
                    self.buf.push(n);
                }
            }
            self.lo = seg_hi.saturating_add(1);
            if self.lo == seg_hi {
                return !self.buf.is_empty(); // u64 edge: range exhausted
            }
            if !self.buf.is_empty() {
                return true;
            }
        }
        false
    }
}

impl Iterator for PrimeStream {
    type Item = u64;

    fn next(&mut self) -> Option<u64> {
        if self.buf_pos >= self.buf.len() && !self.fill() {
            return None;
        }
        let p = self.buf[self.buf_pos];
        self.buf_pos += 1;
        Some(p)
    }
}

/// Modular exponentiation: base^exp mod modulus, u128 intermediates.
pub fn pow_mod(mut base: u64, mut exp: u64, modulus: u64) -> u64 {
    if modulus == 1 {
        return 0;
    }
    let mut result: u64 = 1;
    base %= modulus;
    while exp > 0 {
        if exp & 1 == 1 {
            result = (result as u128 * base as u128 % modulus as u128) as u64;
        }
        exp >>= 1;
        base = (base as u128 * base as u128 % modulus as u128) as u64;
    }
    result
}

/// Greatest common divisor.
pub fn gcd(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        let t = b;
        b = a % b;
        a = t;
    }
    a
}

/// Trial-division factorization of a u64 into (prime, exponent) pairs.
pub fn factor_u64(mut n: u64) -> Vec<(u64, u32)> {
    let mut factors = Vec::new();
    let mut d = 2u64;
    while d * d <= n {
        if n % d == 0 {
            let mut exp = 0u32;
            while n % d == 0 {
                n /= d;
                exp += 1;
            }
            factors.push((d, exp));
        }
        d += 1;
    }
    if n > 1 {
        factors.push((n, 1));
    }
    factors
}

/// Largest prime factor of n (1 for n = 1).
pub fn largest_prime_factor(n: u64) -> u64 {
    factor_u64(n).last().map_or(1, |&(p, _)| p)
}
