//! Durable ledger of completed downloads.

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// One completed file, as recorded in the ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestEntry {
    /// Descriptor identity (the webdata filename).
    pub filename: String,
    /// Verified size in bytes.
    pub size: u64,
    /// Algorithm the digest was computed with.
    pub algorithm: String,
    /// Verified hex digest.
    pub checksum: String,
    /// When verification completed.
    pub completed_at: DateTime<Utc>,
}

/// Append-only completion ledger.
///
/// One JSON entry per line. The whole file is read at startup to seed the
/// skip-set; afterwards entries are only appended, each flushed and synced
/// before the corresponding task is reported Completed. A crash between a
/// file's finalize and its manifest write is recoverable: the downloader
/// re-verifies the finished file directly on the next run.
///
/// The store is the single writer; concurrent workers append through its
/// lock.
#[derive(Debug)]
pub struct ManifestStore {
    inner: Mutex<Inner>,
}

#[derive(Debug)]
struct Inner {
    entries: HashMap<String, ManifestEntry>,
    writer: Option<File>,
    path: Option<PathBuf>,
}

impl ManifestStore {
    /// Open (or create) the ledger at `path` and load every entry.
    ///
    /// Unparseable lines are skipped with a warning: a torn final line
    /// after a crash must not wedge every future run.
    pub fn open(path: impl Into<PathBuf>) -> std::io::Result<Self> {
        let path = path.into();
        let mut entries = HashMap::new();

        match File::open(&path) {
            Ok(file) => {
                for (number, line) in BufReader::new(file).lines().enumerate() {
                    let line = line?;
                    if line.trim().is_empty() {
                        continue;
                    }
                    match serde_json::from_str::<ManifestEntry>(&line) {
                        Ok(entry) => {
                            entries.insert(entry.filename.clone(), entry);
                        }
                        Err(err) => {
                            warn!(
                                path = %path.display(),
                                line = number + 1,
                                error = %err,
                                "skipping unparseable manifest line"
                            );
                        }
                    }
                }
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => return Err(err),
        }

        let mut writer = OpenOptions::new().create(true).append(true).open(&path)?;
        // A torn append leaves no trailing newline; terminate it so the
        // next entry starts on its own line.
        if !ends_with_newline(&path)? {
            writer.write_all(b"\n")?;
        }
        debug!(path = %path.display(), entries = entries.len(), "manifest loaded");

        Ok(Self {
            inner: Mutex::new(Inner {
                entries,
                writer: Some(writer),
                path: Some(path),
            }),
        })
    }

    /// Ledger kept only in memory; nothing survives the process.
    ///
    /// For coordinator tests that need completion tracking without disk.
    pub fn in_memory() -> Self {
        Self {
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                writer: None,
                path: None,
            }),
        }
    }

    /// Whether this descriptor finished and verified in an earlier run.
    pub fn is_completed(&self, id: &str) -> bool {
        self.inner.lock().entries.contains_key(id)
    }

    /// Number of recorded completions.
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().entries.is_empty()
    }

    /// Look up a recorded completion.
    pub fn get(&self, id: &str) -> Option<ManifestEntry> {
        self.inner.lock().entries.get(id).cloned()
    }

    /// Record a verified completion, durably.
    ///
    /// The entry is appended, flushed and fsynced before this returns, so
    /// the caller may only report the task Completed afterwards.
    pub fn mark_completed(&self, entry: ManifestEntry) -> std::io::Result<()> {
        let mut inner = self.inner.lock();
        if let Some(writer) = inner.writer.as_mut() {
            let mut line = serde_json::to_string(&entry)
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
            line.push('\n');
            writer.write_all(line.as_bytes())?;
            writer.sync_data()?;
        }
        inner.entries.insert(entry.filename.clone(), entry);
        Ok(())
    }

    /// Path of the backing file, if the store is durable.
    pub fn path(&self) -> Option<PathBuf> {
        self.inner.lock().path.clone()
    }
}

fn ends_with_newline(path: &Path) -> std::io::Result<bool> {
    use std::io::{Read, Seek, SeekFrom};

    let mut file = File::open(path)?;
    let len = file.metadata()?.len();
    if len == 0 {
        return Ok(true);
    }
    file.seek(SeekFrom::End(-1))?;
    let mut last = [0u8; 1];
    file.read_exact(&mut last)?;
    Ok(last[0] == b'\n')
}
