//! # Params — Typed Run Configuration
//!
//! One searcher run is fully described by the positional command line
//!
//! ```text
//! cubereach <cores> <k> <pmin> <pmax> <dmax> <zmax> [stages] [pcnt=N ccnt=N dcnt=N rcnt=N]
//! ```
//!
//! `pmin`/`pmax` accept the subprime form `p0xq` (e.g. `7x2`): both bounds
//! must name the same outer prime p0, and the run then enumerates only
//! denominators divisible by p0, with the pipe feeding the second-largest
//! prime from [q, r].
//!
//! Validation is all-or-nothing: any violation is a configuration error,
//! reported before tables are built or workers spawned.

use anyhow::{bail, ensure, Context, Result};
use serde::{Deserialize, Serialize};

use crate::sieve::factor_u64;
use crate::{admissible_k, isqrt, DMAX, ZMAX};

/// Numerator of zmin/dmax ≈ 1/(2^(1/3) − 1), scaled by 10^18. Runs with
/// zmax below zmin cannot cover a full progression for the largest
/// denominators.
const ZMIN_NUM: u128 = 3_847_322_101_863_072_639;
const ZMIN_DEN: u128 = 1_000_000_000_000_000_000;

/// Expected aggregate totals supplied on the command line for cross-checking
/// a run against a reference (`pcnt=… ccnt=… dcnt=… rcnt=…`).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpectedTotals {
    pub pcnt: Option<u64>,
    pub ccnt: Option<u64>,
    pub dcnt: Option<u64>,
    pub rcnt: Option<u64>,
}

impl ExpectedTotals {
    pub fn any(&self) -> bool {
        self.pcnt.is_some() || self.ccnt.is_some() || self.dcnt.is_some() || self.rcnt.is_some()
    }
}

/// Immutable run configuration, set once at startup.
#[derive(Clone, Debug)]
pub struct SearchParams {
    pub cores: usize,
    pub k: u64,
    /// Lower prime bound. In subprime mode this is the inner bound q.
    pub pmin: u64,
    /// Upper prime bound. In subprime mode this is the inner bound r.
    pub pmax: u64,
    /// Fixed outer prime for subprime mode; 1 when absent.
    pub p0: u64,
    pub dmax: u64,
    pub zmax: u128,
    /// Execution stage limit, 1..=6. 1 = precompute only; 6 = all phases.
    pub stage: u8,
    /// Whether the stage argument was given explicitly (softens the zmin
    /// bound to a warning).
    pub stage_explicit: bool,
    pub expected: ExpectedTotals,
}

/// Parse a prime bound, either a plain integer or the subprime form
/// `p0xq`. Returns (p0, value) with p0 = 1 for the plain form.
pub fn parse_bound(s: &str) -> Result<(u64, u64)> {
    if let Some((a, b)) = s.split_once(['x', 'X']) {
        let p0: u64 = a.trim().parse().with_context(|| format!("bad outer prime in {:?}", s))?;
        let v: u64 = b.trim().parse().with_context(|| format!("bad inner bound in {:?}", s))?;
        ensure!(p0 >= 2, "outer prime must be at least 2 in {:?}", s);
        Ok((p0, v))
    } else {
        let v: u64 = s.trim().parse().with_context(|| format!("bad prime bound {:?}", s))?;
        Ok((1, v))
    }
}

impl SearchParams {
    /// Assemble from raw positional arguments. `rest` holds the optional
    /// stage digit and any `name=value` expected-counter pairs, in any
    /// order.
    pub fn from_cli(
        cores: usize,
        k: u64,
        pmin: &str,
        pmax: &str,
        dmax: u64,
        zmax: &str,
        rest: &[String],
    ) -> Result<Self> {
        let (p0a, pmin) = parse_bound(pmin)?;
        let (p0b, pmax) = parse_bound(pmax)?;
        ensure!(
            p0a == p0b,
            "subprime bounds disagree on the outer prime ({} vs {})",
            p0a,
            p0b
        );
        let zmax: u128 = zmax.trim().parse().with_context(|| format!("bad zmax {:?}", zmax))?;

        let mut stage: Option<u8> = None;
        let mut expected = ExpectedTotals::default();
        for tok in rest {
            if let Some((name, value)) = tok.split_once('=') {
                let v: u64 =
                    value.parse().with_context(|| format!("bad counter value in {:?}", tok))?;
                match name {
                    "pcnt" => expected.pcnt = Some(v),
                    "ccnt" => expected.ccnt = Some(v),
                    "dcnt" => expected.dcnt = Some(v),
                    "rcnt" => expected.rcnt = Some(v),
                    _ => bail!("unknown expected counter {:?}", name),
                }
            } else {
                ensure!(stage.is_none(), "stage given twice: {:?}", tok);
                let s: u8 = tok.parse().with_context(|| format!("bad stage {:?}", tok))?;
                ensure!((1..=6).contains(&s), "stage must be 1..=6, got {}", s);
                stage = Some(s);
            }
        }

        let params = SearchParams {
            cores,
            k,
            pmin,
            pmax,
            p0: p0a,
            dmax,
            zmax,
            stage: stage.unwrap_or(6),
            stage_explicit: stage.is_some(),
            expected,
        };
        params.validate()?;
        Ok(params)
    }

    /// All configuration constraints. Violations are fatal.
    pub fn validate(&self) -> Result<()> {
        ensure!(
            admissible_k(self.k),
            "k = {} is not admissible (need 1 ≤ k ≤ 1000 with k ≡ 3 or 6 mod 9)",
            self.k
        );
        ensure!(self.dmax >= 2 && self.dmax < DMAX, "dmax = {} out of range", self.dmax);
        ensure!(self.zmax < ZMAX, "zmax = {} exceeds the build cap", self.zmax);
        ensure!(self.pmin >= 2, "pmin must be at least 2");
        ensure!(self.pmin <= self.pmax, "pmin {} > pmax {}", self.pmin, self.pmax);

        if self.p0 > 1 {
            let f = factor_u64(self.p0);
            ensure!(f.len() == 1 && f[0].1 == 1, "outer prime p0 = {} is not prime", self.p0);
            ensure!(self.p0 <= isqrt(self.dmax), "p0 = {} exceeds √dmax", self.p0);
            ensure!(self.k % self.p0 != 0, "p0 = {} divides k = {}", self.p0, self.k);
            ensure!(
                self.p0.saturating_mul(self.pmax) <= self.dmax,
                "p0·pmax = {}·{} exceeds dmax",
                self.p0,
                self.pmax
            );
        } else {
            ensure!(self.pmax <= self.dmax, "pmax {} > dmax {}", self.pmax, self.dmax);
        }
        ensure!((self.dmax as u128) <= self.zmax, "dmax {} > zmax {}", self.dmax, self.zmax);

        let zmin = self.dmax as u128 * ZMIN_NUM / ZMIN_DEN;
        if self.zmax < zmin {
            if self.stage_explicit {
                tracing::warn!(
                    zmax = %self.zmax,
                    zmin = %zmin,
                    "zmax is below zmin ≈ dmax/(2^(1/3)−1); large denominators cannot hold a full progression"
                );
            } else {
                bail!("zmax {} is below zmin {} ≈ dmax/(2^(1/3)−1); pass a stage argument to override", self.zmax, zmin);
            }
        }
        Ok(())
    }

    /// Worker count: 0 means every logical processor.
    pub fn workers(&self) -> usize {
        if self.cores == 0 {
            std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
        } else {
            self.cores
        }
    }

    pub fn subprime(&self) -> bool {
        self.p0 > 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_args() -> (usize, u64, String, String, u64, String) {
        (1, 3, "2".into(), "10".into(), 100, "1000000".into())
    }

    #[test]
    fn parse_bound_plain_and_subprime() {
        assert_eq!(parse_bound("97").unwrap(), (1, 97));
        assert_eq!(parse_bound("7x2").unwrap(), (7, 2));
        assert_eq!(parse_bound("11X5").unwrap(), (11, 5));
        assert!(parse_bound("x5").is_err());
        assert!(parse_bound("1x5").is_err()); // outer prime must be ≥ 2
        assert!(parse_bound("abc").is_err());
    }

    #[test]
    fn from_cli_accepts_minimal_run() {
        let (c, k, pmin, pmax, dmax, zmax) = base_args();
        let p = SearchParams::from_cli(c, k, &pmin, &pmax, dmax, &zmax, &[]).unwrap();
        assert_eq!(p.stage, 6);
        assert!(!p.stage_explicit);
        assert!(!p.subprime());
        assert_eq!(p.workers(), 1);
    }

    #[test]
    fn from_cli_parses_stage_and_expected() {
        let (c, k, pmin, pmax, dmax, zmax) = base_args();
        let rest = vec!["4".to_string(), "pcnt=3".to_string(), "rcnt=99".to_string()];
        let p = SearchParams::from_cli(c, k, &pmin, &pmax, dmax, &zmax, &rest).unwrap();
        assert_eq!(p.stage, 4);
        assert!(p.stage_explicit);
        assert_eq!(p.expected.pcnt, Some(3));
        assert_eq!(p.expected.rcnt, Some(99));
        assert_eq!(p.expected.dcnt, None);
    }

    #[test]
    fn from_cli_rejects_bad_stage_and_counters() {
        let (c, k, pmin, pmax, dmax, zmax) = base_args();
        for rest in [vec!["0".to_string()], vec!["7".to_string()], vec!["xcnt=1".to_string()]] {
            assert!(SearchParams::from_cli(c, k, &pmin, &pmax, dmax, &zmax, &rest).is_err());
        }
    }

    #[test]
    fn validate_rejects_inadmissible_k() {
        for k in [1u64, 2, 4, 9, 27, 1002] {
            let p = SearchParams::from_cli(1, k, "2", "10", 100, "1000000", &[]);
            assert!(p.is_err(), "k={} accepted", k);
        }
    }

    #[test]
    fn validate_rejects_inverted_prime_range() {
        assert!(SearchParams::from_cli(1, 3, "11", "7", 100, "1000000", &[]).is_err());
    }

    #[test]
    fn validate_rejects_zmax_below_dmax() {
        assert!(SearchParams::from_cli(1, 3, "2", "10", 1000, "999", &[]).is_err());
    }

    /// zmin ≈ 3.8473·dmax: just below fails without a stage, passes with one.
    #[test]
    fn zmin_bound_is_soft_only_with_explicit_stage() {
        // dmax = 10^6 → zmin = 3_847_322 (truncated).
        let tight = "3847321";
        assert!(SearchParams::from_cli(1, 3, "2", "10", 1_000_000, tight, &[]).is_err());
        let with_stage = vec!["6".to_string()];
        assert!(SearchParams::from_cli(1, 3, "2", "10", 1_000_000, tight, &with_stage).is_ok());
        // At the bound no override is needed.
        assert!(SearchParams::from_cli(1, 3, "2", "10", 1_000_000, "3847322", &[]).is_ok());
    }

    #[test]
    fn subprime_constraints() {
        // p0 must be prime, ≤ √dmax, coprime to k, same on both bounds.
        assert!(SearchParams::from_cli(2, 3, "7x2", "7x5", 10_000, "1000000000", &[]).is_ok());
        assert!(SearchParams::from_cli(2, 3, "6x2", "6x5", 10_000, "1000000000", &[]).is_err());
        assert!(SearchParams::from_cli(2, 3, "7x2", "11x5", 10_000, "1000000000", &[]).is_err());
        assert!(SearchParams::from_cli(2, 42, "7x2", "7x5", 10_000, "1000000000", &[]).is_err());
        assert!(SearchParams::from_cli(2, 3, "211x2", "211x5", 10_000, "1000000000", &[]).is_err());
    }

    #[test]
    fn workers_zero_means_all_cores() {
        let p = SearchParams::from_cli(0, 3, "2", "10", 100, "1000000", &[]).unwrap();
        assert!(p.workers() >= 1);
    }
}
