//! # Main — CLI Entry Point
//!
//! Positional interface:
//!
//! ```text
//! cubereach <cores> <k> <pmin> <pmax> <dmax> <zmax> [stages] [pcnt=N ccnt=N dcnt=N rcnt=N]
//! ```
//!
//! - `cores` — worker count; 0 uses every logical processor.
//! - `k` — the target, 1 ≤ k ≤ 1000 with k ≡ 3 or 6 (mod 9).
//! - `pmin`/`pmax` — outer-prime range; the form `7x2` / `7x5` selects
//!   subprime mode with outer prime 7 and inner primes in [2, 5].
//! - `dmax` — denominator bound, below 2^63.
//! - `zmax` — |z| bound, decimal, below 2^96.
//! - `stages` — optional 1..6: 1 = precompute only, 6 = everything.
//! - trailing `name=value` pairs register expected totals; a mismatch at
//!   the end of the run fails with a nonzero exit.
//!
//! Exit codes: 0 success, 2 configuration error, 1 worker failure or
//! counter mismatch.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use cubereach::checkpoint::{self, RunKey};
use cubereach::coordinator;
use cubereach::params::SearchParams;
use cubereach::report::{Reporter, Totals};
use cubereach::tables::Tables;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[derive(Parser)]
#[command(
    name = "cubereach",
    about = "Enumerate candidate solutions of x³ + y³ + z³ = k over smooth denominators"
)]
struct Cli {
    /// Worker count (0 = all logical processors)
    cores: usize,

    /// Target k (k ≡ 3 or 6 mod 9, k ≤ 1000)
    k: u64,

    /// Smallest outer prime, or "p0xq" for subprime mode
    pmin: String,

    /// Largest outer prime, or "p0xr" for subprime mode
    pmax: String,

    /// Denominator bound
    dmax: u64,

    /// |z| bound (decimal, up to 128-bit)
    zmax: String,

    /// Optional stage limit (1..6) and expected counters (name=value)
    rest: Vec<String>,

    /// Path to the checkpoint file for resumable runs
    #[arg(long, default_value = "cubereach.checkpoint")]
    checkpoint: PathBuf,

    /// Ignore any existing checkpoint and start from scratch
    #[arg(long)]
    fresh: bool,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let params = match SearchParams::from_cli(
        cli.cores,
        cli.k,
        &cli.pmin,
        &cli.pmax,
        cli.dmax,
        &cli.zmax,
        &cli.rest,
    ) {
        Ok(p) => p,
        Err(e) => {
            tracing::error!(error = %e, "configuration rejected");
            return ExitCode::from(2);
        }
    };

    let started = Instant::now();
    let tables = Tables::load(&params);
    tracing::info!(
        k = params.k,
        dmax = params.dmax,
        zmax = %params.zmax,
        cpmax = tables.th.cpmax,
        cdmin = tables.th.cdmin,
        sdmin = tables.th.sdmin,
        pdmin = tables.th.pdmin,
        bpmin = tables.th.bpmin,
        cached_primes = tables.cptab.len(),
        small_denominators = tables.sdtab.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "tables loaded"
    );

    if params.stage == 1 {
        tracing::info!("stage 1: precompute only, stopping here");
        return ExitCode::SUCCESS;
    }

    if cli.fresh {
        checkpoint::clear(&cli.checkpoint);
    }
    let key = RunKey::of(&params);
    let (resume_from, base) = match checkpoint::load(&cli.checkpoint) {
        Some(cp) if cp.key == key => {
            tracing::info!(last_prime = cp.last_prime, "resuming from checkpoint");
            (cp.last_prime, cp.totals)
        }
        Some(_) => {
            tracing::error!(
                path = %cli.checkpoint.display(),
                "checkpoint belongs to a different run; use --fresh to discard it"
            );
            return ExitCode::from(2);
        }
        None => (0, Totals::default()),
    };

    let reporter = Reporter::new(resume_from, base, Some((cli.checkpoint.clone(), key)));

    let (_, feed_hi) = coordinator::feed_range(&params, resume_from);
    if let Err(e) = coordinator::run(&params, &tables, &reporter) {
        tracing::error!(error = %e, "search aborted");
        reporter.save_final(reporter.watermark());
        return ExitCode::from(1);
    }
    reporter.save_final(feed_hi);

    let totals = reporter.totals();
    tracing::info!(
        pcnt = totals.pcnt,
        ccnt = totals.ccnt,
        dcnt = totals.dcnt,
        rcnt = totals.rcnt,
        elapsed_s = started.elapsed().as_secs(),
        "search complete"
    );

    let mismatches = reporter.cross_check(&params.expected);
    if !mismatches.is_empty() {
        for m in &mismatches {
            tracing::error!(mismatch = %m, "expected counter mismatch");
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}
