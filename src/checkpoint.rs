//! # Checkpoint — Resumable Run State Persistence
//!
//! Saves and loads run progress as JSON with SHA-256 integrity
//! verification and generational backups. The record stores the full run
//! key (k, prime bounds, subprime outer, dmax, zmax, stage) plus the last
//! prime folded at the contiguous watermark and the counter totals at
//! that point; a resumed run must present the identical key and then
//! continues from last_prime + 1 with the stored totals as its base.
//!
//! ## Atomic Writes
//!
//! Checkpoint files are written atomically: write to a temp file, then
//! rename. This prevents corruption from mid-write crashes.
//!
//! ## Integrity
//!
//! A SHA-256 hash is stored alongside the JSON data. On load, the hash is
//! verified — corrupted checkpoints are detected and skipped, falling
//! back to the most recent valid generation (up to 3 generations kept).

use anyhow::Result;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};

use crate::params::SearchParams;
use crate::report::Totals;

/// Number of backup generations to keep.
const GENERATIONS: usize = 3;

/// The parameters a checkpoint is bound to. Any mismatch on resume is a
/// configuration error: counters from a different run are meaningless.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunKey {
    pub k: u64,
    pub pmin: u64,
    pub pmax: u64,
    pub p0: u64,
    pub dmax: u64,
    /// Serialized as a decimal string: zmax is 128-bit.
    pub zmax: String,
    pub stage: u8,
}

impl RunKey {
    pub fn of(params: &SearchParams) -> RunKey {
        RunKey {
            k: params.k,
            pmin: params.pmin,
            pmax: params.pmax,
            p0: params.p0,
            dmax: params.dmax,
            zmax: params.zmax.to_string(),
            stage: params.stage,
        }
    }
}

#[derive(Serialize, Deserialize)]
pub struct Checkpoint {
    pub key: RunKey,
    /// Largest prime with every smaller prime fully accounted for.
    pub last_prime: u64,
    /// Counter totals at last_prime.
    pub totals: Totals,
}

/// Wrapper that includes a SHA-256 checksum for integrity verification.
#[derive(Serialize, Deserialize)]
struct CheckpointEnvelope {
    checksum: String,
    data: serde_json::Value,
}

fn sha256_hex(data: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Return the path for generation `gen` (0 = current, 1 = .1, 2 = .2).
fn generation_path(base: &Path, gen: usize) -> PathBuf {
    if gen == 0 {
        base.to_path_buf()
    } else {
        let mut p = base.as_os_str().to_os_string();
        p.push(format!(".{}", gen));
        PathBuf::from(p)
    }
}

/// Save a checkpoint with integrity checksum and rotating generations.
///
/// Rotation: current → .1 → .2 (the oldest .2 is discarded). The new
/// checkpoint is written atomically via a .tmp file.
pub fn save(path: &Path, checkpoint: &Checkpoint) -> Result<()> {
    for gen in (1..GENERATIONS).rev() {
        let src = generation_path(path, gen - 1);
        let dst = generation_path(path, gen);
        if src.exists() {
            let _ = fs::rename(&src, &dst);
        }
    }

    let data = serde_json::to_value(checkpoint)?;
    let data_str = serde_json::to_string_pretty(&data)?;
    let checksum = sha256_hex(&data_str);

    let envelope = CheckpointEnvelope { checksum, data };
    let json = serde_json::to_string_pretty(&envelope)?;

    let tmp = path.with_extension("tmp");
    fs::write(&tmp, &json)?;
    fs::rename(&tmp, path)?;

    Ok(())
}

/// Load the newest valid checkpoint, falling back to older generations on
/// corruption.
pub fn load(path: &Path) -> Option<Checkpoint> {
    for gen in 0..GENERATIONS {
        let p = generation_path(path, gen);
        if let Some(cp) = load_single(&p) {
            if gen > 0 {
                tracing::warn!(
                    generation = gen,
                    path = %p.display(),
                    "recovered checkpoint from backup generation"
                );
            }
            return Some(cp);
        }
    }
    None
}

/// Try to load and verify a single checkpoint file.
fn load_single(path: &Path) -> Option<Checkpoint> {
    let raw = fs::read_to_string(path).ok()?;
    let envelope: CheckpointEnvelope = serde_json::from_str(&raw).ok()?;

    let data_str = serde_json::to_string_pretty(&envelope.data).ok()?;
    if sha256_hex(&data_str) != envelope.checksum {
        tracing::warn!(path = %path.display(), "checkpoint integrity check failed");
        return None;
    }

    serde_json::from_value(envelope.data).ok()
}

/// Clear all checkpoint files (current + all generations).
pub fn clear(path: &Path) {
    for gen in 0..GENERATIONS {
        let _ = fs::remove_file(generation_path(path, gen));
    }
    let _ = fs::remove_file(path.with_extension("tmp"));
}
