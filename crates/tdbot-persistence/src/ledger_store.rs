//! JSON file ledger store.
//!
//! Layout under the root directory, one directory per scope key:
//!
//! ```text
//! <root>/<INSTRUMENT>_<timeframe>/ledger.json  fills + matches, replaced atomically
//! <root>/<INSTRUMENT>_<timeframe>/.lock        advisory lock held by the settling process
//! ```
//!
//! A commit writes the whole snapshot to a temp file, syncs it and renames
//! it over `ledger.json`. A crash leaves either the old snapshot or the new
//! one, never fills from one pass with matches from another. A stray temp
//! file is ignored on load and overwritten by the next commit.

use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tdbot_core::{Fill, LedgerScope, Match, OrderNo};
use tdbot_settlement::{check_unique_pairs, Ledger, LedgerStore, SettlementError, SettlementResult};
use tracing::{debug, trace};

use crate::error::{PersistenceError, PersistenceResult};

pub const LEDGER_FILE: &str = "ledger.json";
pub const LOCK_FILE: &str = ".lock";

#[derive(Debug, Default, Deserialize)]
struct Snapshot {
    fills: Vec<Fill>,
    matches: Vec<Match>,
}

#[derive(Serialize)]
struct SnapshotRef<'a> {
    fills: &'a [Fill],
    matches: &'a [Match],
}

/// OS lock on a scope's lock file. Closing the file releases it.
#[derive(Debug)]
pub struct ScopeFileLock {
    file: File,
    scope: LedgerScope,
}

impl ScopeFileLock {
    pub fn scope(&self) -> &LedgerScope {
        &self.scope
    }
}

impl Drop for ScopeFileLock {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            debug!(scope = %self.scope, error = %e, "Scope unlock failed, released on close");
        }
        trace!(scope = %self.scope, "Scope file lock released");
    }
}

/// Ledger store backed by per-scope JSON files.
pub struct JsonLedgerStore {
    root: PathBuf,
    /// Serializes commits issued through this handle.
    commit_lock: Mutex<()>,
}

impl JsonLedgerStore {
    /// Store rooted at `root`, created if missing.
    pub fn open(root: impl AsRef<Path>) -> PersistenceResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            commit_lock: Mutex::new(()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn scope_dir(&self, scope: &LedgerScope) -> PathBuf {
        self.root.join(scope.key())
    }

    pub fn ledger_path(&self, scope: &LedgerScope) -> PathBuf {
        self.scope_dir(scope).join(LEDGER_FILE)
    }

    fn tmp_path(&self, scope: &LedgerScope) -> PathBuf {
        self.scope_dir(scope).join(format!("{LEDGER_FILE}.tmp"))
    }

    fn read_snapshot(&self, scope: &LedgerScope) -> PersistenceResult<Snapshot> {
        let path = self.ledger_path(scope);
        let file = match File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Snapshot::default()),
            Err(e) => return Err(e.into()),
        };
        serde_json::from_reader(BufReader::new(file)).map_err(|e| PersistenceError::Corrupt {
            path,
            line: e.line(),
            reason: e.to_string(),
        })
    }

    /// Write the snapshot to a temp file, then rename over the old one.
    fn write_snapshot(&self, scope: &LedgerScope, snapshot: &SnapshotRef<'_>) -> PersistenceResult<()> {
        let tmp = self.tmp_path(scope);
        {
            let mut writer = BufWriter::new(File::create(&tmp)?);
            serde_json::to_writer_pretty(&mut writer, snapshot)?;
            writer.flush()?;
            writer.get_ref().sync_all()?;
        }
        fs::rename(&tmp, self.ledger_path(scope))?;
        sync_dir(&self.scope_dir(scope))?;
        Ok(())
    }

    fn lock_scope(&self, scope: &LedgerScope) -> PersistenceResult<Option<ScopeFileLock>> {
        let dir = self.scope_dir(scope);
        fs::create_dir_all(&dir)?;
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(dir.join(LOCK_FILE))?;
        match FileExt::try_lock_exclusive(&file) {
            Ok(()) => {
                trace!(scope = %scope, "Scope file lock acquired");
                Ok(Some(ScopeFileLock {
                    file,
                    scope: scope.clone(),
                }))
            }
            Err(e) if is_contended(&e) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn commit_files(&self, ledger: &Ledger, new_matches: &[Match]) -> SettlementResult<()> {
        let scope = ledger.scope();
        let storage = |e: PersistenceError| storage_error(scope, e);

        fs::create_dir_all(self.scope_dir(scope)).map_err(|e| storage(e.into()))?;
        let mut matches = self.read_snapshot(scope).map_err(storage)?.matches;
        let stored: HashSet<(OrderNo, OrderNo)> = matches.iter().map(Match::pair).collect();
        check_unique_pairs(scope, &stored, new_matches)?;
        matches.extend_from_slice(new_matches);

        self.write_snapshot(
            scope,
            &SnapshotRef {
                fills: ledger.fills(),
                matches: &matches,
            },
        )
        .map_err(storage)?;
        debug!(
            scope = %scope,
            fills = ledger.fills().len(),
            new_matches = new_matches.len(),
            "Ledger committed"
        );
        Ok(())
    }
}

fn is_contended(e: &io::Error) -> bool {
    e.kind() == io::ErrorKind::WouldBlock
        || e.raw_os_error() == fs2::lock_contended_error().raw_os_error()
}

#[cfg(unix)]
fn sync_dir(dir: &Path) -> io::Result<()> {
    File::open(dir)?.sync_all()
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> io::Result<()> {
    Ok(())
}

fn storage_error(scope: &LedgerScope, e: PersistenceError) -> SettlementError {
    SettlementError::Storage {
        scope: scope.to_string(),
        message: e.to_string(),
    }
}

impl LedgerStore for JsonLedgerStore {
    type Lease = ScopeFileLock;

    fn acquire(&self, scope: &LedgerScope) -> SettlementResult<ScopeFileLock> {
        self.lock_scope(scope)
            .map_err(|e| storage_error(scope, e))?
            .ok_or_else(|| SettlementError::LedgerContention {
                scope: scope.to_string(),
            })
    }

    fn load(&self, scope: &LedgerScope) -> SettlementResult<Ledger> {
        let snapshot = self
            .read_snapshot(scope)
            .map_err(|e| storage_error(scope, e))?;
        Ledger::from_parts(scope.clone(), snapshot.fills, snapshot.matches)
    }

    fn commit(&self, ledger: &Ledger, new_matches: &[Match]) -> SettlementResult<()> {
        let _lock = self.commit_lock.lock();
        self.commit_files(ledger, new_matches)
    }
}
