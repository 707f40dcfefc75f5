//! # Report — Counters, Watermark Folding, and the Hit Sink
//!
//! Four aggregate counters describe a run:
//!
//! - `pcnt` — primes processed that had at least one cube root of k;
//! - `ccnt` — total cube roots of k found modulo those primes;
//! - `dcnt` — denominators dispatched (each admissible d exactly once);
//! - `rcnt` — residues submitted to the exact candidate test.
//!
//! Workers accumulate per-prime deltas and report them on completion.
//! Because primes finish out of order across workers, deltas are folded
//! into the running totals only once every smaller prime has finished (the
//! contiguous watermark). Totals at the watermark are therefore exactly
//! the totals of a single-threaded run over the same prefix — which is
//! what makes checkpointed resume and cross-worker determinism hold.
//!
//! The [`ReportSink`] trait decouples the engine from its consumers: the
//! production sink logs hits through `tracing`, tests substitute a
//! recording sink.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use rug::Integer;
use serde::{Deserialize, Serialize};

use crate::checkpoint::{self, Checkpoint, RunKey};
use crate::dispatch::PrimeStats;
use crate::params::ExpectedTotals;

/// Aggregate counters over a run prefix.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Totals {
    pub pcnt: u64,
    pub ccnt: u64,
    pub dcnt: u64,
    pub rcnt: u64,
}

impl Totals {
    fn absorb(&mut self, st: &PrimeStats) {
        self.pcnt += u64::from(st.roots > 0);
        self.ccnt += st.roots;
        self.dcnt += st.divisors;
        self.rcnt += st.residues;
    }

    fn add(&self, other: &Totals) -> Totals {
        Totals {
            pcnt: self.pcnt + other.pcnt,
            ccnt: self.ccnt + other.ccnt,
            dcnt: self.dcnt + other.dcnt,
            rcnt: self.rcnt + other.rcnt,
        }
    }
}

/// Consumer of engine events. Methods must be cheap and thread-safe: they
/// are called from the innermost loops of every worker.
pub trait ReportSink: Sync {
    /// A denominator d = a·(k-divisor) was dispatched, with the cube roots
    /// of k modulo its coprime part a.
    fn divisor(&self, _d: u64, _a: u64, _roots: &[u64]) {}

    /// A candidate (x, y, z) passed the exact check.
    fn hit(&self, x: &Integer, y: &Integer, z: &Integer);
}

struct RepState {
    outstanding: BTreeSet<u64>,
    pending: BTreeMap<u64, PrimeStats>,
    folded: Totals,
    watermark: u64,
    last_save: Instant,
}

/// Shared run-progress state: veto on resumed primes, abort flag, counter
/// folding, periodic checkpointing.
pub struct Reporter {
    state: Mutex<RepState>,
    abort: AtomicBool,
    resume_from: u64,
    base: Totals,
    checkpoint: Option<(PathBuf, RunKey)>,
    save_every: Duration,
}

impl Reporter {
    pub fn new(resume_from: u64, base: Totals, checkpoint: Option<(PathBuf, RunKey)>) -> Reporter {
        Reporter {
            state: Mutex::new(RepState {
                outstanding: BTreeSet::new(),
                pending: BTreeMap::new(),
                folded: Totals::default(),
                watermark: resume_from,
                last_save: Instant::now(),
            }),
            abort: AtomicBool::new(false),
            resume_from,
            base,
            checkpoint,
            save_every: Duration::from_secs(10),
        }
    }

    /// Register a prime as issued to the pipe. Must happen before any
    /// worker can pop it: the contiguous watermark treats issued-but-
    /// unfinished primes as barriers, so a fast sibling cannot fold past
    /// a prime that a slower worker is still holding.
    pub fn issue(&self, p: u64) {
        self.state.lock().unwrap().outstanding.insert(p);
    }

    /// May this prime be processed? False when it is vetoed (already
    /// covered by the checkpoint being resumed).
    pub fn begin_prime(&self, p: u64) -> bool {
        p > self.resume_from
    }

    /// Record a prime's completed stats and fold everything below the
    /// smallest still-outstanding prime.
    pub fn finish_prime(&self, p: u64, stats: PrimeStats) {
        let mut s = self.state.lock().unwrap();
        s.outstanding.remove(&p);
        s.pending.insert(p, stats);

        let barrier = s.outstanding.first().copied().unwrap_or(u64::MAX);
        while let Some((&q, _)) = s.pending.first_key_value() {
            if q >= barrier {
                break;
            }
            let st = s.pending.remove(&q).unwrap();
            s.folded.absorb(&st);
            s.watermark = q;
        }

        let shown = self.base.add(&s.folded);
        tracing::debug!(
            p,
            pcnt = shown.pcnt,
            ccnt = shown.ccnt,
            dcnt = shown.dcnt,
            rcnt = shown.rcnt,
            "prime complete"
        );

        if s.last_save.elapsed() >= self.save_every {
            s.last_save = Instant::now();
            let cp = self.snapshot_locked(&s);
            drop(s);
            self.persist(cp);
        }
    }

    fn snapshot_locked(&self, s: &RepState) -> Option<Checkpoint> {
        let (_, key) = self.checkpoint.as_ref()?;
        Some(Checkpoint {
            key: key.clone(),
            last_prime: s.watermark,
            totals: self.base.add(&s.folded),
        })
    }

    fn persist(&self, cp: Option<Checkpoint>) {
        if let (Some((path, _)), Some(cp)) = (self.checkpoint.as_ref(), cp) {
            if let Err(e) = checkpoint::save(path, &cp) {
                tracing::warn!(error = %e, "checkpoint save failed");
            }
        }
    }

    /// Persist final state, marking everything up to `last_prime` done.
    pub fn save_final(&self, last_prime: u64) {
        let cp = {
            let s = self.state.lock().unwrap();
            self.checkpoint.as_ref().map(|(_, key)| Checkpoint {
                key: key.clone(),
                last_prime,
                totals: self.base.add(&s.folded),
            })
        };
        self.persist(cp);
    }

    /// Current totals: checkpoint base + folded + not-yet-folded deltas.
    pub fn totals(&self) -> Totals {
        let s = self.state.lock().unwrap();
        let mut t = self.base.add(&s.folded);
        for st in s.pending.values() {
            t.absorb(st);
        }
        t
    }

    pub fn watermark(&self) -> u64 {
        self.state.lock().unwrap().watermark
    }

    pub fn aborted(&self) -> bool {
        self.abort.load(Ordering::Relaxed)
    }

    pub fn set_abort(&self) {
        self.abort.store(true, Ordering::Relaxed);
    }

    /// Compare final totals against expectations from the command line.
    /// Returns the list of mismatches (empty = all good).
    pub fn cross_check(&self, expected: &ExpectedTotals) -> Vec<String> {
        let t = self.totals();
        let mut bad = Vec::new();
        let mut chk = |name: &str, got: u64, want: Option<u64>| {
            if let Some(w) = want {
                if got != w {
                    bad.push(format!("{}: got {}, expected {}", name, got, w));
                }
            }
        };
        chk("pcnt", t.pcnt, expected.pcnt);
        chk("ccnt", t.ccnt, expected.ccnt);
        chk("dcnt", t.dcnt, expected.dcnt);
        chk("rcnt", t.rcnt, expected.rcnt);
        bad
    }
}

impl ReportSink for Reporter {
    fn hit(&self, x: &Integer, y: &Integer, z: &Integer) {
        tracing::info!(%x, %y, %z, "candidate solution");
    }
}
