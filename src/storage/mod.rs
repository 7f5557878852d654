//! Persistence layer.
//!
//! The ledger lives in memory; this module snapshots it to a single JSON
//! file and restores it on startup. Writes go to a sibling temp file that
//! is renamed over the target, so a crash mid-save never leaves a
//! truncated snapshot behind.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

use crate::types::{PaymentBatch, Transaction, UserAccount};

/// Durable form of the whole ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerSnapshot {
    pub users: Vec<UserAccount>,
    pub transactions: Vec<Transaction>,
    pub batches: Vec<PaymentBatch>,
    #[serde(default = "first_batch_id")]
    pub next_batch_id: u64,
    #[serde(default)]
    pub last_reset_date: Option<NaiveDate>,
}

fn first_batch_id() -> u64 {
    1
}

/// Save a snapshot as pretty-printed JSON.
pub fn save_snapshot(snapshot: &LedgerSnapshot, path: &str) -> Result<()> {
    let json = serde_json::to_string_pretty(snapshot)
        .context("Failed to serialise ledger snapshot")?;

    let tmp = format!("{path}.tmp");
    std::fs::write(&tmp, &json)
        .context(format!("Failed to write snapshot to {tmp}"))?;
    std::fs::rename(&tmp, path)
        .context(format!("Failed to move snapshot into place at {path}"))?;

    debug!(
        path,
        users = snapshot.users.len(),
        transactions = snapshot.transactions.len(),
        "Snapshot saved"
    );
    Ok(())
}

/// Load a snapshot. Returns None if the file doesn't exist (fresh start).
pub fn load_snapshot(path: &str) -> Result<Option<LedgerSnapshot>> {
    if !Path::new(path).exists() {
        info!(path, "No snapshot found, starting with an empty ledger");
        return Ok(None);
    }

    let json = std::fs::read_to_string(path)
        .context(format!("Failed to read snapshot from {path}"))?;

    let snapshot: LedgerSnapshot = serde_json::from_str(&json)
        .context(format!("Failed to parse snapshot from {path}"))?;

    info!(
        path,
        users = snapshot.users.len(),
        transactions = snapshot.transactions.len(),
        batches = snapshot.batches.len(),
        "Snapshot loaded from disk"
    );

    Ok(Some(snapshot))
}

/// Delete the snapshot file, if any.
pub fn delete_snapshot(path: &str) -> Result<()> {
    if Path::new(path).exists() {
        std::fs::remove_file(path)
            .context(format!("Failed to delete snapshot {path}"))?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
