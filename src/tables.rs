//! # Tables — Read-Only Precomputed State
//!
//! Everything the workers share is built here, once, before any worker
//! starts: threshold derivation, cube-root caches, divisor chains, and the
//! cubic-reciprocity residue sets that sharpen progressions. After `load`
//! returns, the value is wrapped in an `Arc` and never mutated.
//!
//! ## Sign conventions
//!
//! The engine works with the signed quantities D = x + y and Z = z of a
//! solution, but enumerates the positive pair (d, w) = (|D|, |Z|). For
//! admissible k exactly one sign branch is possible per d (see
//! [`sign_index`]), so each table is keyed by the signed residue of D and
//! returns signed residues of Z; [`signed_dm`] and [`flip_res`] translate
//! between the signed world and the enumerated one.
//!
//! ## Thresholds
//!
//! All monotone in dmax, with cpmax ≤ cdmin ≤ sdmin ≤ pdmin ≤ bpmin:
//!
//! - `cpmax ≥ √dmax` — primes with cached cube roots (cptab);
//! - `sdmax` — denominators with fully cached roots and inverses (sdtab);
//! - `cdmin` — above it, cofactor enumeration walks precomputed chains;
//! - `sdmin` — above it, every cofactor is inside sdtab;
//! - `pdmin` — above it, no multiplier fits: d must equal p;
//! - `bpmin` — above it, progressions are short enough for the direct path.

use rayon::prelude::*;

use crate::cuberoot::{brute_roots, cuberoots_mod_m, cuberoots_mod_p, lift_root};
use crate::modular::{mod_inverse, Barrett32};
use crate::params::SearchParams;
use crate::sieve::{generate_primes, largest_prime_factor};
use crate::{isqrt, soft_assert};

/// Cap on the fully cached small-denominator table.
pub const SDMAX_CAP: u64 = 1024;

/// Chain records cover cofactors up to this multiple of sdmax.
pub const CHAIN_SPAN_FACTOR: u64 = 64;

/// Inverse tables mod p0 are materialized only below this bound.
const ITAB_CAP: u64 = 1 << 20;

/// Auxiliary primes used to split long progressions. 2, 3, 7 are excluded:
/// they live in the auxiliary modulus itself.
const AUX_PRIME_POOL: [u64; 10] = [11, 13, 17, 19, 23, 29, 31, 37, 41, 43];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Thresholds {
    pub cpmax: u64,
    pub sdmax: u64,
    pub cdmin: u64,
    pub sdmin: u64,
    pub pdmin: u64,
    pub bpmin: u64,
    /// Smallest admissible multiplier ≥ 2 (prime or k-divisor).
    pub mmin: u64,
    /// Upper bound on chain cofactors: dmax / cdmin.
    pub chain_span: u64,
}

impl Thresholds {
    pub fn derive(k: u64, dmax: u64, zmax: u128) -> Thresholds {
        let cpmax = isqrt(dmax).max(16).min(dmax);
        let sdmax = cpmax.min(SDMAX_CAP).max(4);
        let cdmin = cpmax.max(dmax / (CHAIN_SPAN_FACTOR * sdmax).max(1)).max(2);
        let sdmin = cdmin.max(dmax / sdmax);

        // Smallest multiplier that could extend a prime into a composite
        // denominator: the first prime not dividing k, or the smallest
        // admissible divisor of k.
        let first_coprime_prime =
            generate_primes(50).into_iter().find(|&q| k % q != 0).unwrap_or(2);
        let smallest_kdiv = (2..=k).find(|&m| k % m == 0 && m % 3 != 0).unwrap_or(u64::MAX);
        let mmin = first_coprime_prime.min(smallest_kdiv);

        let pdmin = sdmin.max(dmax / mmin + 1);

        let b_base: u128 = if k == 3 { 81 } else { 9 };
        let big = (zmax / (64 * b_base)).min(u64::MAX as u128) as u64;
        let bpmin = pdmin.max(big);

        let chain_span = dmax / cdmin;
        Thresholds { cpmax, sdmax, cdmin, sdmin, pdmin, bpmin, mmin, chain_span }
    }
}

/// An admissible divisor of k, with the cube roots of k modulo it.
pub struct KdEntry {
    pub d: u64,
    pub roots: Vec<u64>,
}

/// A cached prime: cube roots of k mod p^emax (roots mod p^e for e ≤ emax
/// are reductions of these).
pub struct CpEntry {
    pub p: u64,
    pub emax: u32,
    pub roots: Vec<u64>,
}

impl CpEntry {
    #[inline]
    pub fn pe(&self, e: u32) -> u64 {
        debug_assert!(e >= 1 && e <= self.emax);
        self.p.pow(e)
    }
}

/// A small denominator (d ≤ sdmax) with fully cached state: cube roots of
/// k mod d, the complete inverse table mod d, and a Barrett reducer (d is
/// far below 2^32 here, and reductions mod d run in the hottest CRT
/// loops).
pub struct SdEntry {
    pub d: u64,
    pub roots: Vec<u64>,
    /// inv[x] = x⁻¹ mod d, or 0 when x is not a unit.
    pub inv: Vec<u32>,
    pub red: Barrett32,
}

impl SdEntry {
    /// Inverse of an arbitrary value mod d via Barrett reduction and the
    /// cached table.
    #[inline]
    pub fn inv_of(&self, x: u64) -> u64 {
        self.inv[self.red.reduce(x) as usize] as u64
    }
}

/// A chain cofactor: an admissible smooth number d' ≤ chain_span with its
/// cube roots, and a back-reference into sdtab when fully cached.
pub struct ChainEntry {
    pub d: u64,
    pub sd: Option<u32>,
    pub roots: Vec<u64>,
}

pub struct Tables {
    pub k: u64,
    pub dmax: u64,
    pub zmax: u128,
    pub th: Thresholds,
    /// Admissible divisors of k, ascending; index 0 is d = 1.
    pub kdtab: Vec<KdEntry>,
    /// All primes ≤ cpmax, ascending. Entries for primes dividing k (or
    /// with no cube roots) carry an empty root set.
    pub cptab: Vec<CpEntry>,
    /// Admissible denominators ≤ sdmax with roots, ascending.
    pub sdtab: Vec<SdEntry>,
    /// Chain cofactors grouped by largest prime factor, groups ascending,
    /// entries ascending within a group.
    pub chains: Vec<(u64, Vec<ChainEntry>)>,
    /// k ≡ ±2 (mod 7): the mod-7 constraint is available.
    pub sevenok: bool,
    /// 81 for k = 3 (Cassels), 9 otherwise.
    pub b_base: u64,
    /// k ≠ 3: z9[D mod 27] = signed-Z residues mod 9 solvable mod 27.
    z9: Vec<Vec<u8>>,
    /// k = 3: z81[D mod 81] = solutions of D·Z² − Z³ ≡ 1 (mod 81).
    z81: Vec<Vec<u8>>,
    /// 7 ∤ k: z7[D mod 7] = signed-Z residues mod 7.
    z7: Vec<Vec<u8>>,
    /// (q, mask[D mod q] over signed-Z residues) for progression splitting.
    pub auxtab: Vec<(u64, Vec<u64>)>,
    /// Subprime outer prime (1 = off) and its cptab index.
    pub p0: u64,
    pub p0_idx: usize,
    /// Inverse table mod p0 (empty above ITAB_CAP: fall back to egcd).
    pub itab_p0: Vec<u32>,
}

/// Which sign branch does d carry? 0: z > 0 (x + y = −d); 1: z < 0
/// (x + y = d). For admissible k every coordinate is ≡ c (mod 3) with
/// c = 1 for k ≡ 3, c = 2 for k ≡ 6 (mod 9), so x + y ≡ 2c (mod 3)
/// pins the branch from d mod 3 alone.
#[inline]
pub fn sign_index(k: u64, d: u64) -> u8 {
    soft_assert!(d % 3 != 0, "denominators are never divisible by 3");
    let c = if k % 9 == 3 { 1u64 } else { 2 };
    u8::from(d % 3 == 2 * c % 3)
}

/// Signed residue of D = x + y modulo m for the enumerated pair (d, si).
#[inline]
pub fn signed_dm(d: u64, si: u8, m: u64) -> u64 {
    if si == 1 {
        d % m
    } else {
        (m - d % m) % m
    }
}

/// Translate a signed-Z residue into a residue of w = |z|.
#[inline]
pub fn flip_res(r: u64, si: u8, m: u64) -> u64 {
    if si == 1 {
        (m - r % m) % m
    } else {
        r % m
    }
}

impl Tables {
    pub fn load(params: &SearchParams) -> Tables {
        let k = params.k;
        let dmax = params.dmax;
        let th = Thresholds::derive(k, dmax, params.zmax);

        let kdtab = build_kdtab(k);

        let primes = generate_primes(th.cpmax);
        let cptab: Vec<CpEntry> = primes
            .par_iter()
            .map(|&p| {
                if k % p == 0 {
                    return CpEntry { p, emax: 1, roots: vec![] };
                }
                let mut emax = 1u32;
                let mut pe = p;
                while let Some(next) = pe.checked_mul(p) {
                    if next > dmax {
                        break;
                    }
                    pe = next;
                    emax += 1;
                }
                let roots =
                    cuberoots_mod_p(k, p).into_iter().map(|r| lift_root(k, r, p, emax)).collect();
                CpEntry { p, emax, roots }
            })
            .collect();

        let sdtab: Vec<SdEntry> = (2..th.sdmax + 1)
            .into_par_iter()
            .filter_map(|d| {
                if crate::sieve::gcd(d, k) != 1 {
                    return None;
                }
                let roots = cuberoots_mod_m(k, d);
                if roots.is_empty() {
                    return None;
                }
                let inv =
                    (0..d).map(|x| mod_inverse(x, d).unwrap_or(0) as u32).collect();
                Some(SdEntry { d, roots, inv, red: Barrett32::new(d as u32) })
            })
            .collect();

        let chain_entries: Vec<(u64, ChainEntry)> = (2..th.chain_span.saturating_add(1))
            .into_par_iter()
            .filter_map(|d| {
                if crate::sieve::gcd(d, k) != 1 {
                    return None;
                }
                let roots = cuberoots_mod_m(k, d);
                if roots.is_empty() {
                    return None;
                }
                let sd = if d <= th.sdmax {
                    sdtab.binary_search_by_key(&d, |e| e.d).ok().map(|i| i as u32)
                } else {
                    None
                };
                Some((largest_prime_factor(d), ChainEntry { d, sd, roots }))
            })
            .collect();
        let mut chains: Vec<(u64, Vec<ChainEntry>)> = Vec::new();
        {
            let mut sorted = chain_entries;
            sorted.sort_by_key(|(lpf, e)| (*lpf, e.d));
            for (lpf, entry) in sorted {
                match chains.last_mut() {
                    Some((l, group)) if *l == lpf => group.push(entry),
                    _ => chains.push((lpf, vec![entry])),
                }
            }
        }

        let sevenok = matches!(k % 7, 2 | 5);
        let b_base = if k == 3 { 81 } else { 9 };
        let z9 = if k == 3 { vec![] } else { build_z9(k) };
        let z81 = if k == 3 { build_z81() } else { vec![] };
        let z7 = if k % 7 != 0 { build_zq(k, 7) } else { vec![] };

        let auxtab: Vec<(u64, Vec<u64>)> = AUX_PRIME_POOL
            .iter()
            .filter(|&&q| k % q != 0)
            .map(|&q| (q, build_zq_masks(k, q)))
            .collect();

        let p0 = params.p0;
        let p0_idx = if p0 > 1 {
            cptab.binary_search_by_key(&p0, |e| e.p).unwrap_or(usize::MAX)
        } else {
            0
        };
        let itab_p0 = if p0 > 1 && p0 <= ITAB_CAP {
            (0..p0).map(|x| mod_inverse(x, p0).unwrap_or(0) as u32).collect()
        } else {
            vec![]
        };

        Tables {
            k,
            dmax,
            zmax: params.zmax,
            th,
            kdtab,
            cptab,
            sdtab,
            chains,
            sevenok,
            b_base,
            z9,
            z81,
            z7,
            auxtab,
            p0,
            p0_idx,
            itab_p0,
        }
    }

    /// Cached cube roots of k mod p^e for the prime at cptab index `pi`.
    pub fn cached_roots(&self, pi: usize, e: u32) -> impl Iterator<Item = u64> + '_ {
        let entry = &self.cptab[pi];
        let pe = entry.pe(e);
        entry.roots.iter().map(move |&r| r % pe)
    }

    /// Largest exponent with cached roots for cptab index `pi`.
    #[inline]
    pub fn cached_emax(&self, pi: usize) -> u32 {
        self.cptab[pi].emax
    }

    /// The auxiliary modulus for a denominator: b_base, doubled for odd d,
    /// with the factor 7 when the mod-7 constraint applies. Even d cannot
    /// absorb the 2- or 7-part (the modulus must stay coprime to d).
    #[inline]
    pub fn aux_modulus(&self, d: u64) -> u64 {
        let mut b = self.b_base;
        if d & 1 == 1 {
            b *= 2;
            if self.sevenok {
                b *= 7;
            }
        }
        b
    }

    /// Fill `out` with the residues of w = |z| modulo b that are consistent
    /// with the cubic-reciprocity constraints for the pair (d, si).
    /// `b` must come from `aux_modulus(d)`.
    pub fn zb_residues(&self, d: u64, si: u8, b: u64, out: &mut Vec<u64>) {
        out.clear();
        let (part_m, part): (u64, &[u8]) = if self.k == 3 {
            (81, &self.z81[signed_dm(d, si, 81) as usize])
        } else {
            (9, &self.z9[signed_dm(d, si, 27) as usize])
        };
        for &z in part {
            out.push(flip_res(z as u64, si, part_m));
        }
        let mut m = part_m;

        if d & 1 == 1 {
            // Parity of Z is forced for odd D: Z ≡ k + 1 (mod 2).
            let wpar = (self.k + 1) & 1; // |z| has the same parity as z
            for r in out.iter_mut() {
                *r = crate::modular::crt64(*r, m, wpar, 2);
            }
            m *= 2;
            if self.sevenok {
                let seven = &self.z7[signed_dm(d, si, 7) as usize];
                let prev = std::mem::take(out);
                for &r in &prev {
                    for &z in seven {
                        out.push(crate::modular::crt64(r, m, flip_res(z as u64, si, 7), 7));
                    }
                }
                m *= 7;
            }
        }
        soft_assert!(m == b, "auxiliary modulus mismatch: {} vs {}", m, b);
    }
}

/// Divisors of k that can divide a denominator. 3 | k for every admissible
/// k while 3 ∤ x + y, so multiples of 3 are excluded; divisors whose cube
/// congruence has no solution contribute no denominators and are dropped.
fn build_kdtab(k: u64) -> Vec<KdEntry> {
    let mut tab = vec![KdEntry { d: 1, roots: vec![0] }];
    for m in 2..=k {
        if k % m != 0 || m % 3 == 0 {
            continue;
        }
        let roots = brute_roots(k, m);
        if !roots.is_empty() {
            tab.push(KdEntry { d: m, roots });
        }
    }
    tab
}

/// Signed-Z residues mod 9 admissible for each signed D mod 27, from
/// exhaustive solvability of x³ + y³ + z³ ≡ k (mod 27) with x + y ≡ D.
fn build_z9(k: u64) -> Vec<Vec<u8>> {
    let cube = |n: u64| n * n * n % 27;
    (0..27u64)
        .map(|dm| {
            let mut found = [false; 9];
            for x in 0..27u64 {
                let y = (27 + dm - x % 27) % 27;
                let xy = (cube(x) + cube(y)) % 27;
                for z in 0..27u64 {
                    if (xy + cube(z)) % 27 == k % 27 {
                        found[(z % 9) as usize] = true;
                    }
                }
            }
            (0..9u8).filter(|&z| found[z as usize]).collect()
        })
        .collect()
}

/// k = 3 only: Cassels' theorem forces x ≡ y ≡ z (mod 9), and expanding
/// the sum mod 243 yields D·Z² − Z³ ≡ 1 (mod 81).
fn build_z81() -> Vec<Vec<u8>> {
    (0..81u64)
        .map(|dm| {
            (0..81u8)
                .filter(|&z| {
                    let z = z as u64;
                    let zz = z * z % 81;
                    (dm * zz + 81 * 81 - z * zz) % 81 == 1
                })
                .collect()
        })
        .collect()
}

/// Signed-Z residues mod q admissible for each signed D mod q.
fn build_zq(k: u64, q: u64) -> Vec<Vec<u8>> {
    let cube = |n: u64| n * n * n % q;
    (0..q)
        .map(|dm| {
            (0..q as u8)
                .filter(|&z| {
                    (0..q).any(|x| {
                        let y = (2 * q + dm - x) % q;
                        (cube(x) + cube(y) + cube(z as u64)) % q == k % q
                    })
                })
                .collect()
        })
        .collect()
}

/// Same as `build_zq` but packed as bitmasks for the progression splitter.
fn build_zq_masks(k: u64, q: u64) -> Vec<u64> {
    build_zq(k, q)
        .into_iter()
        .map(|v| v.into_iter().fold(0u64, |m, z| m | (1 << z)))
        .collect()
}
