//! # Coordinator — Feeder, Pipe, and Worker Supervision
//!
//! One feeder thread runs the segmented sieve and pushes primes into a
//! bounded pipe; N workers block-pop and drive the enumeration. The pipe
//! carries plain u64 primes in strictly increasing order with u64::MAX as
//! the end-of-stream sentinel; the sentinel is left in place so every
//! consumer observes it.
//!
//! Workers share nothing but the read-only tables (behind `Arc` at the
//! call site), the pipe, and the reporter. A panicking worker trips the
//! abort flag and wakes everything blocked on the pipe; surviving workers
//! notice at their next prime boundary, the feeder stops, and the
//! coordinator reports the failure after joining all threads.

use std::collections::VecDeque;
use std::panic::{catch_unwind, resume_unwind, AssertUnwindSafe};
use std::sync::{Condvar, Mutex};
use std::thread;

use anyhow::{bail, Result};

use crate::params::SearchParams;
use crate::report::Reporter;
use crate::sieve::PrimeStream;
use crate::tables::Tables;
use crate::worker::WorkerDriver;
use crate::PRIME_EOS;

/// Default bound on primes buffered between the feeder and the workers.
pub const PIPE_CAPACITY: usize = 1024;

struct PipeState {
    q: VecDeque<u64>,
    aborted: bool,
}

/// Single-producer / N-consumer bounded queue of primes.
pub struct PrimePipe {
    state: Mutex<PipeState>,
    not_empty: Condvar,
    not_full: Condvar,
    cap: usize,
}

impl PrimePipe {
    pub fn new(cap: usize) -> PrimePipe {
        PrimePipe {
            state: Mutex::new(PipeState { q: VecDeque::new(), aborted: false }),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
            cap: cap.max(1),
        }
    }

    /// Block until there is room, then enqueue. Returns false when the
    /// pipe was aborted (the value is dropped).
    pub fn push(&self, p: u64) -> bool {
        let mut s = self.state.lock().unwrap();
        loop {
            if s.aborted {
                return false;
            }
            // The sentinel may always be appended: it must never be lost
            // to backpressure.
            if s.q.len() < self.cap || p == PRIME_EOS {
                break;
            }
            s = self.not_full.wait(s).unwrap();
        }
        s.q.push_back(p);
        if p == PRIME_EOS {
            self.not_empty.notify_all();
        } else {
            self.not_empty.notify_one();
        }
        true
    }

    /// Mark end-of-stream.
    pub fn close(&self) {
        self.push(PRIME_EOS);
    }

    /// Block for the next prime. None at end-of-stream or abort. The
    /// sentinel stays in the queue so sibling consumers see it too.
    pub fn pop(&self) -> Option<u64> {
        let mut s = self.state.lock().unwrap();
        loop {
            if s.aborted {
                return None;
            }
            if let Some(&front) = s.q.front() {
                if front == PRIME_EOS {
                    self.not_empty.notify_all();
                    return None;
                }
                let p = s.q.pop_front().unwrap();
                self.not_full.notify_one();
                return Some(p);
            }
            s = self.not_empty.wait(s).unwrap();
        }
    }

    /// Wake and drain everything; all further push/pop calls fail fast.
    pub fn abort(&self) {
        let mut s = self.state.lock().unwrap();
        s.aborted = true;
        self.not_empty.notify_all();
        self.not_full.notify_all();
    }
}

/// The prime range the feeder will push, honoring subprime capping and a
/// resumed checkpoint.
pub fn feed_range(params: &SearchParams, resume_from: u64) -> (u64, u64) {
    let (lo, hi) = if params.subprime() {
        (params.pmin, params.pmax.min(params.p0))
    } else {
        (params.pmin.max(2), params.pmax)
    };
    (lo.max(resume_from.saturating_add(1)), hi)
}

/// Fork the feeder and N workers, supervise, and propagate the first
/// failure. Blocks until the run completes or aborts.
pub fn run(params: &SearchParams, tables: &Tables, rep: &Reporter) -> Result<()> {
    let pipe = PrimePipe::new(PIPE_CAPACITY);
    let (lo, hi) = feed_range(params, rep_resume(rep));
    let nworkers = params.workers().max(1);
    tracing::info!(lo, hi, workers = nworkers, "starting search");

    let mut worker_panics = 0usize;
    thread::scope(|s| {
        let feeder = s.spawn(|| {
            for p in PrimeStream::new(lo, hi) {
                // Issued before it can be popped: the watermark never
                // folds past a prime a worker is still holding.
                rep.issue(p);
                if !pipe.push(p) {
                    return; // aborted
                }
            }
            pipe.close();
        });

        let handles: Vec<_> = (0..nworkers)
            .map(|_| {
                s.spawn(|| {
                    let result = catch_unwind(AssertUnwindSafe(|| {
                        let mut driver = WorkerDriver::new(tables, params.stage);
                        driver.run(&pipe, rep, rep);
                    }));
                    if let Err(payload) = result {
                        rep.set_abort();
                        pipe.abort();
                        resume_unwind(payload);
                    }
                })
            })
            .collect();

        for h in handles {
            if h.join().is_err() {
                worker_panics += 1;
            }
        }
        if worker_panics > 0 {
            // Unblock the feeder if it is still waiting on a full pipe.
            pipe.abort();
        }
        let _ = feeder.join();
    });

    if worker_panics > 0 {
        bail!("{} worker(s) aborted; counters are incomplete", worker_panics);
    }
    Ok(())
}

fn rep_resume(rep: &Reporter) -> u64 {
    // The reporter's watermark starts at the resume point.
    rep.watermark()
}
