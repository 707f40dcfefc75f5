//! # Cuberoot — Cube Roots of k Modulo Primes and Prime Powers
//!
//! Everything the enumerator knows about z starts here: the residues r with
//! r³ ≡ k (mod p^e). Three regimes:
//!
//! - **p ≡ 2 (mod 3)**: cubing is a bijection on F_p*, so the single root
//!   is k^((2p−1)/3) mod p.
//! - **p ≡ 1 (mod 3)**: k is a cubic residue iff k^((p−1)/3) ≡ 1, and then
//!   has exactly three roots, found by the Adleman–Manders–Miller digit
//!   loop in the 3-Sylow subgroup (the cube-root analogue of
//!   Tonelli–Shanks).
//! - **p = 2**: for odd k the root is unique (cubing is a bijection mod 2^e).
//!
//! p = 3 never appears: 3 | k for every admissible k, and primes dividing k
//! are excluded from denominators.
//!
//! Roots lift uniquely from p to p^e by Hensel's lemma (the derivative 3r²
//! is a unit whenever p ∤ 3k), and combine across coprime moduli by CRT.
//!
//! ## References
//!
//! - Adleman, Manders, Miller, "On Taking Roots in Finite Fields", FOCS 1977.
//! - Cohen, "A Course in Computational Algebraic Number Theory", §1.5.

use crate::modular::{mod_inverse, mul_mod, sub_mod, MontgomeryCtx};
use crate::sieve::{factor_u64, pow_mod};
use crate::{modular::crt64, soft_assert};

/// r³ mod m without overflow.
#[inline]
pub fn cube_mod(r: u64, m: u64) -> u64 {
    mul_mod(mul_mod(r, r, m), r, m)
}

/// All cube roots of k modulo a prime p with p ∤ k and p ≠ 3.
/// Returns 0, 1, or 3 residues in [0, p).
pub fn cuberoots_mod_p(k: u64, p: u64) -> Vec<u64> {
    debug_assert!(p >= 2 && p != 3 && k % p != 0);
    if p == 2 {
        return vec![1]; // k odd when 2 ∤ k
    }
    let kp = k % p;
    if p % 3 == 2 {
        // Inverse of cubing on F_p*: (2p−1)/3 is integral for p ≡ 2 (mod 3).
        let e = ((2 * p as u128 - 1) / 3) as u64;
        let r = pow_mod(kp, e, p);
        soft_assert!(cube_mod(r, p) == kp, "cube-root exponent formula failed for p={}", p);
        return vec![r];
    }
    // p ≡ 1 (mod 3): residue test, then AMM.
    if pow_mod(kp, (p - 1) / 3, p) != 1 {
        return vec![];
    }
    amm_cuberoots(kp, p)
}

/// Adleman–Manders–Miller: the three cube roots of a cubic residue a mod p,
/// p ≡ 1 (mod 3).
///
/// Writes p − 1 = 3^s·t with 3 ∤ t. The candidate x = a^(3⁻¹ mod t) is off
/// by an element of the 3-Sylow subgroup ⟨E⟩, E = g^t for a cubic
/// nonresidue g; the correction exponent is recovered digit-by-digit in
/// base 3 (Pohlig–Hellman in a group of order 3^s).
fn amm_cuberoots(a: u64, p: u64) -> Vec<u64> {
    let ctx = MontgomeryCtx::new(p);

    let mut t = p - 1;
    let mut s = 0u32;
    while t % 3 == 0 {
        t /= 3;
        s += 1;
    }

    // Smallest cubic nonresidue; density 2/3, so this loop is short.
    let mut g = 2u64;
    while pow_mod(g, (p - 1) / 3, p) == 1 {
        g += 1;
    }

    let a_m = ctx.to_mont(a);
    let big_e = ctx.pow(ctx.to_mont(g), t); // generator of the 3-Sylow, order 3^s

    let alpha = if t == 1 { 0 } else { mod_inverse(3 % t, t).expect("3 coprime to t") };
    let x = ctx.pow(a_m, alpha);

    // err = x³ / a lies in ⟨E⟩ and is a cube there (a is a cubic residue).
    let a_inv = ctx.pow(a_m, p - 2);
    let err = ctx.mul(ctx.mul(ctx.mul(x, x), x), a_inv);

    let pow3s = 3u64.pow(s); // 3^s | p − 1 < 2^63
    let omega = ctx.pow(big_e, pow3s / 3); // primitive cube root of unity
    let omega2 = ctx.mul(omega, omega);
    let e_inv = ctx.pow(big_e, pow3s - 1);

    // Recover y with err = E^y, one base-3 digit per round. The invariant
    // is cur = err·E^(−y_partial), of order dividing 3^(s−i).
    let mut y = 0u64;
    let mut cur = err;
    for i in 0..s {
        let w = ctx.pow(cur, pow3s / 3u64.pow(i + 1));
        let digit = if w == ctx.one() {
            0
        } else if w == omega {
            1
        } else {
            soft_assert!(w == omega2, "element outside ⟨ω⟩ in digit loop");
            2
        };
        if digit != 0 {
            y += digit * 3u64.pow(i);
            cur = ctx.mul(cur, ctx.pow(e_inv, digit * 3u64.pow(i)));
        }
    }
    soft_assert!(y % 3 == 0, "discrete log of a cube must be divisible by 3");

    // h³ = E^(−y) cancels the error exactly.
    let h = ctx.pow(big_e, (pow3s - y) / 3);
    let r0 = ctx.from_mont(ctx.mul(x, h));
    let w1 = ctx.from_mont(omega);
    let r1 = mul_mod(r0, w1, p);
    let r2 = mul_mod(r1, w1, p);
    soft_assert!(cube_mod(r0, p) == a % p, "AMM produced a non-root for p={}", p);
    vec![r0, r1, r2]
}

/// Hensel-lift a cube root of k mod p to the unique root mod p^e above it.
/// Requires p ∤ 3k (the derivative 3r² must be a unit mod p) and p^e < 2^63.
pub fn lift_root(k: u64, mut r: u64, p: u64, e: u32) -> u64 {
    let mut pe = p;
    for _ in 1..e {
        let pe_next = pe * p;
        let diff = sub_mod(k % pe_next, cube_mod(r, pe_next), pe_next);
        soft_assert!(diff % pe == 0, "lift step lost divisibility");
        let q = diff / pe; // < p
        let der = mul_mod(3 % p, mul_mod(r % p, r % p, p), p);
        let inv = mod_inverse(der, p).expect("3r² is a unit mod p");
        r += pe * mul_mod(q, inv, p);
        pe = pe_next;
    }
    r
}

/// All cube roots of k mod p^e, for p ∤ k, p ≠ 3, p^e < 2^63.
pub fn cuberoots_mod_pe(k: u64, p: u64, e: u32) -> Vec<u64> {
    cuberoots_mod_p(k, p).into_iter().map(|r| lift_root(k, r, p, e)).collect()
}

/// All cube roots of k mod m for m coprime to 3k: factor m, solve each
/// prime power, CRT-combine. Empty when any prime power has no root.
pub fn cuberoots_mod_m(k: u64, m: u64) -> Vec<u64> {
    if m == 1 {
        return vec![0];
    }
    let mut acc = vec![0u64];
    let mut mm = 1u64;
    for (p, e) in factor_u64(m) {
        let pe = p.pow(e);
        let roots = cuberoots_mod_pe(k, p, e);
        if roots.is_empty() {
            return vec![];
        }
        let mut next = Vec::with_capacity(acc.len() * roots.len());
        for &r in &acc {
            for &rp in &roots {
                next.push(crt64(r, mm, rp, pe));
            }
        }
        acc = next;
        mm *= pe;
    }
    acc
}

/// Cube roots of k mod m by exhaustive scan. The only correct tool when
/// gcd(m, k) > 1 (divisors of k), where Hensel lifting does not apply;
/// m stays ≤ 1000 there.
pub fn brute_roots(k: u64, m: u64) -> Vec<u64> {
    (0..m).filter(|&z| cube_mod(z, m) == k % m).collect()
}
