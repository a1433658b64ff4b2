//! Atomic, backed-up storage for named markdown artifacts.
//!
//! Every write goes through a temporary sibling file that is flushed, synced
//! and then renamed over the live file. Before the rename, the previous live
//! content is copied to `backups/<name>.<timestamp>.backup`, and backups
//! beyond the retention limit are pruned oldest-first.

use chrono::Local;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::errors::StoreError;
use crate::util::short_digest;

/// Directory under the artifacts root that holds backups.
pub const BACKUPS_DIR: &str = "backups";

/// Default number of backups kept per artifact.
pub const DEFAULT_BACKUP_RETENTION: usize = 10;

const BACKUP_EXTENSION: &str = "backup";
const TIMESTAMP_FORMAT: &str = "%Y%m%dT%H%M%S%3f";

/// Outcome of a committed write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteReceipt {
    /// Live file that now holds the new content
    pub path: PathBuf,
    /// Backup of the previous content, if there was any
    pub backup: Option<PathBuf>,
    /// Short SHA-256 digest of the new content
    pub digest: String,
}

/// One backup file on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupEntry {
    pub path: PathBuf,
    /// Timestamp portion of the file name, e.g. `20260301T101500123`
    pub stamp: String,
    seq: u32,
}

/// File-backed store of named artifacts under a single root directory.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
    backup_retention: usize,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            backup_retention: DEFAULT_BACKUP_RETENTION,
        }
    }

    /// Set how many backups are kept per artifact. Values below 1 are raised to 1.
    pub fn with_backup_retention(mut self, retention: usize) -> Self {
        self.backup_retention = retention.max(1);
        self
    }

    pub fn backups_dir(&self) -> PathBuf {
        self.root.join(BACKUPS_DIR)
    }

    /// Live file path for an artifact name.
    pub fn path_for(&self, name: &str) -> PathBuf {
        self.root.join(format!("{}.md", name))
    }

    /// Read an artifact. A missing file is `Ok(None)`, never an error.
    pub fn read(&self, name: &str) -> Result<Option<String>, StoreError> {
        let path = self.path_for(name);
        match fs::read_to_string(&path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StoreError::ReadFailed { path, source }),
        }
    }

    /// Atomically replace an artifact, backing up the previous content.
    pub fn write(&self, name: &str, content: &str) -> Result<WriteReceipt, StoreError> {
        self.stage(name, content)?.commit()
    }

    /// Write content to a temporary sibling of the live file without touching
    /// the live file. Call [`StagedWrite::commit`] to publish it; dropping the
    /// stage discards the temporary file.
    pub fn stage(&self, name: &str, content: &str) -> Result<StagedWrite<'_>, StoreError> {
        if content.trim().is_empty() {
            return Err(StoreError::EmptyContent {
                name: name.to_string(),
            });
        }

        let target = self.path_for(name);
        fs::create_dir_all(&self.root).map_err(|source| StoreError::Io {
            path: self.root.clone(),
            source,
        })?;

        let stage_err = |source| StoreError::StageFailed {
            path: target.clone(),
            source,
        };
        let mut temp = NamedTempFile::new_in(&self.root).map_err(stage_err)?;
        temp.write_all(content.as_bytes()).map_err(stage_err)?;
        temp.flush().map_err(stage_err)?;
        temp.as_file().sync_all().map_err(stage_err)?;

        debug!(artifact = name, temp = %temp.path().display(), "Staged artifact write");

        Ok(StagedWrite {
            store: self,
            name: name.to_string(),
            target,
            temp,
            digest: short_digest(content),
        })
    }

    /// Backups of an artifact, newest first.
    pub fn backups(&self, name: &str) -> Result<Vec<BackupEntry>, StoreError> {
        let dir = self.backups_dir();
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => return Err(StoreError::Io { path: dir, source }),
        };

        let prefix = format!("{}.", name);
        let suffix = format!(".{}", BACKUP_EXTENSION);
        let mut backups: Vec<BackupEntry> = entries
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| {
                let file_name = entry.file_name().to_str()?.to_string();
                let middle = file_name.strip_prefix(&prefix)?.strip_suffix(&suffix)?;
                let (stamp, seq) = parse_backup_stamp(middle)?;
                Some(BackupEntry {
                    path: entry.path(),
                    stamp,
                    seq,
                })
            })
            .collect();

        backups.sort_by(|a, b| (&b.stamp, b.seq).cmp(&(&a.stamp, a.seq)));
        Ok(backups)
    }

    /// Copy the live file into the backups directory, then prune.
    fn backup_live(&self, name: &str, live: &Path) -> Result<Option<PathBuf>, StoreError> {
        if !live.exists() {
            return Ok(None);
        }

        let dir = self.backups_dir();
        fs::create_dir_all(&dir).map_err(|source| StoreError::BackupFailed {
            path: live.to_path_buf(),
            source,
        })?;

        let stamp = Local::now().format(TIMESTAMP_FORMAT).to_string();
        let mut backup = dir.join(format!("{}.{}.{}", name, stamp, BACKUP_EXTENSION));
        let mut seq = 0u32;
        // Two writes inside the same millisecond get a sequence suffix.
        while backup.exists() {
            seq += 1;
            backup = dir.join(format!("{}.{}-{}.{}", name, stamp, seq, BACKUP_EXTENSION));
        }

        fs::copy(live, &backup).map_err(|source| StoreError::BackupFailed {
            path: live.to_path_buf(),
            source,
        })?;

        self.prune_backups(name);
        Ok(Some(backup))
    }

    /// Remove backups beyond the retention limit. Failures are logged, not fatal.
    fn prune_backups(&self, name: &str) {
        let backups = match self.backups(name) {
            Ok(backups) => backups,
            Err(e) => {
                warn!(artifact = name, error = %e, "Could not list backups for pruning");
                return;
            }
        };
        for stale in backups.iter().skip(self.backup_retention) {
            if let Err(e) = fs::remove_file(&stale.path) {
                warn!(path = %stale.path.display(), error = %e, "Failed to prune backup");
            } else {
                debug!(path = %stale.path.display(), "Pruned backup");
            }
        }
    }
}

/// A write whose content is on disk in a temporary file but not yet live.
#[derive(Debug)]
pub struct StagedWrite<'a> {
    store: &'a ArtifactStore,
    name: String,
    target: PathBuf,
    temp: NamedTempFile,
    digest: String,
}

impl StagedWrite<'_> {
    pub fn temp_path(&self) -> &Path {
        self.temp.path()
    }

    /// Back up the live file and rename the staged content over it.
    pub fn commit(self) -> Result<WriteReceipt, StoreError> {
        let backup = self.store.backup_live(&self.name, &self.target)?;

        self.temp
            .persist(&self.target)
            .map_err(|e| StoreError::ReplaceFailed {
                path: self.target.clone(),
                source: e.error,
            })?;

        info!(
            artifact = %self.name,
            digest = %self.digest,
            backup = ?backup.as_ref().map(|p| p.display().to_string()),
            "Wrote artifact"
        );

        Ok(WriteReceipt {
            path: self.target,
            backup,
            digest: self.digest,
        })
    }
}

fn parse_backup_stamp(middle: &str) -> Option<(String, u32)> {
    let (stamp, seq) = match middle.split_once('-') {
        Some((stamp, seq)) => (stamp, seq.parse().ok()?),
        None => (middle, 0),
    };
    let well_formed = stamp.len() == 18
        && stamp.as_bytes()[8] == b'T'
        && stamp
            .chars()
            .enumerate()
            .all(|(i, c)| i == 8 || c.is_ascii_digit());
    well_formed.then(|| (stamp.to_string(), seq))
}
