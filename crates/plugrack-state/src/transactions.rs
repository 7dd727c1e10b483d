use std::fmt;
use std::fs;
use std::io;
use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use plugrack_core::DataLayout;

/// Decimal-numeral transaction identifier. Ids live on disk as directory
/// names, so ordering during allocation is string comparison with zero
/// padding rather than a parse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrxId(String);

impl TrxId {
    pub fn new(numeral: impl Into<String>) -> Result<Self> {
        let numeral = numeral.into();
        if numeral.is_empty() || !numeral.chars().all(|ch| ch.is_ascii_digit()) {
            bail!("invalid transaction id numeral: '{numeral}'");
        }
        Ok(Self(numeral))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Zero-pads the shorter operand so `"9"` orders below `"10"`.
    pub fn greater_than(&self, other: &TrxId) -> bool {
        let width = self.0.len().max(other.0.len());
        format!("{:0>width$}", self.0) > format!("{:0>width$}", other.0)
    }

    pub fn inc(&self) -> Result<TrxId> {
        let value: u32 = self
            .0
            .parse()
            .with_context(|| format!("invalid transaction id numeral: '{}'", self.0))?;
        let next = value
            .checked_add(1)
            .ok_or_else(|| anyhow!("trx-overflow: transaction id space exhausted at {}", self.0))?;
        Ok(TrxId(next.to_string()))
    }
}

impl fmt::Display for TrxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Directory-locking envelope around one mutating command invocation.
///
/// The provisional `trx/lock` directory is the sole cross-process mutual
/// exclusion: directory creation is atomic on every supported filesystem,
/// unlike check-then-create on a file. Commit renames it to the permanent
/// numeral directory; committed entries form an append-only log and are
/// never pruned here.
#[derive(Debug)]
pub struct Transaction {
    id: TrxId,
    layout: DataLayout,
}

impl Transaction {
    /// Single non-blocking acquisition attempt; no retry or backoff lives in
    /// this layer.
    pub fn start(layout: &DataLayout) -> Result<Self> {
        let trx_dir = layout.trx_dir();
        fs::create_dir_all(&trx_dir)
            .with_context(|| format!("failed to create {}", trx_dir.display()))?;

        let lock_dir = layout.trx_lock_dir();
        match fs::create_dir(&lock_dir) {
            Ok(()) => {}
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
                // A stale lock after a crash is reported, never auto-removed:
                // availability is traded for safety against a live peer.
                bail!(
                    "lock-held: transaction lock directory already exists: {}: \
                     another plugrack invocation may be running against this data \
                     directory; if you are certain none is, remove the directory \
                     by hand and retry",
                    lock_dir.display()
                );
            }
            Err(err) => {
                return Err(err).with_context(|| {
                    format!("failed to create transaction lock: {}", lock_dir.display())
                });
            }
        }

        let id = match next_trx_id(&trx_dir) {
            Ok(id) => id,
            Err(err) => {
                // Release our own freshly-claimed lock; this is not the
                // crash-residue case.
                let _ = fs::remove_dir(&lock_dir);
                return Err(err);
            }
        };

        Ok(Self {
            id,
            layout: layout.clone(),
        })
    }

    pub fn id(&self) -> &TrxId {
        &self.id
    }

    /// Releases the lock without committing, for callers whose mutation
    /// failed. Only removes this transaction's own provisional directory;
    /// crash residue from other processes is never touched.
    pub fn cancel(self) -> Result<()> {
        let lock_dir = self.layout.trx_lock_dir();
        fs::remove_dir_all(&lock_dir).with_context(|| {
            format!(
                "failed to release transaction lock: {}",
                lock_dir.display()
            )
        })
    }

    /// Commit point: atomically renames the provisional lock directory to
    /// the permanent numeral directory.
    pub fn done(self) -> Result<()> {
        let from = self.layout.trx_lock_dir();
        let to = self.layout.trx_entry_dir(self.id.as_str());
        fs::rename(&from, &to).with_context(|| {
            format!(
                "failed to commit transaction {}: {} -> {}",
                self.id,
                from.display(),
                to.display()
            )
        })
    }
}

fn next_trx_id(trx_dir: &Path) -> Result<TrxId> {
    let mut max: Option<TrxId> = None;
    for entry in fs::read_dir(trx_dir)
        .with_context(|| format!("failed reading transaction log: {}", trx_dir.display()))?
    {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        // Non-numeral names (the `lock` directory included) are not log
        // entries.
        let Ok(candidate) = TrxId::new(name) else {
            continue;
        };
        max = match max {
            Some(current) if current.greater_than(&candidate) => Some(current),
            _ => Some(candidate),
        };
    }

    match max {
        Some(id) => id.inc(),
        None => TrxId::new("1"),
    }
}
