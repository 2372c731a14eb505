// src/store.rs
//! Line-delimited JSON record files and their backups.
//!
//! One `PlaceRecord` per line, blank lines ignored. Reads are all-or-nothing:
//! the first undecodable line aborts with `MalformedRecord`. Writes replace the
//! whole file through a sibling temp file + rename, and `rotate` moves an
//! existing file aside (rename, never copy) before a fresh scrape lands on it.

use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDateTime};

use crate::config::consts::{BACKUP_TAG, BACKUP_TIMESTAMP_FMT};
use crate::error::StoreError;
use crate::record::PlaceRecord;

/// Handle on the single record file a run works against.
#[derive(Clone, Debug)]
pub struct RecordStore {
    path: PathBuf,
}

impl RecordStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    pub fn read(&self) -> Result<Vec<PlaceRecord>, StoreError> {
        read_records(&self.path)
    }

    pub fn write(&self, records: &[PlaceRecord]) -> Result<(), StoreError> {
        write_records(&self.path, records)
    }

    pub fn rotate(&self) -> Result<Option<PathBuf>, StoreError> {
        rotate(&self.path)
    }

    /// Create the directory the record file lives in, so a scraper can write there.
    pub fn prepare_dir(&self) -> Result<(), StoreError> {
        create_parent(&self.path)
    }
}

pub fn read_records(path: &Path) -> Result<Vec<PlaceRecord>, StoreError> {
    let file = File::open(path).map_err(|e| StoreError::io(path, e))?;
    let reader = BufReader::new(file);

    let mut out = Vec::new();
    for (i, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| StoreError::io(path, e))?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let record = serde_json::from_str::<PlaceRecord>(trimmed).map_err(|source| {
            StoreError::MalformedRecord {
                path: path.to_path_buf(),
                line_no: i + 1,
                line: trimmed.to_string(),
                source,
            }
        })?;
        out.push(record);
    }

    logd!("Store: Read {} records from {}", out.len(), path.display());
    Ok(out)
}

/// Replace `path` with one compact JSON object per line.
pub fn write_records(path: &Path, records: &[PlaceRecord]) -> Result<(), StoreError> {
    create_parent(path)?;

    let tmp = temp_sibling(path);
    {
        let file = File::create(&tmp).map_err(|e| StoreError::io(&tmp, e))?;
        let mut out = BufWriter::new(file);
        for record in records {
            serde_json::to_writer(&mut out, record).map_err(|source| StoreError::Serialize {
                path: path.to_path_buf(),
                source,
            })?;
            out.write_all(b"\n").map_err(|e| StoreError::io(&tmp, e))?;
        }
        out.flush().map_err(|e| StoreError::io(&tmp, e))?;
    }
    fs::rename(&tmp, path).map_err(|e| StoreError::io(path, e))?;

    logd!("Store: Wrote {} records to {}", records.len(), path.display());
    Ok(())
}

/// Move an existing file to `<base>_backup_<YYYY-MM-DD_HH-MM><ext>`.
/// Returns the backup path, or `None` when there was nothing to move.
pub fn rotate(path: &Path) -> Result<Option<PathBuf>, StoreError> {
    rotate_at(path, Local::now().naive_local())
}

pub fn rotate_at(path: &Path, now: NaiveDateTime) -> Result<Option<PathBuf>, StoreError> {
    if !path.is_file() {
        return Ok(None);
    }
    let backup = free_backup_path(path, now);
    fs::rename(path, &backup).map_err(|e| StoreError::io(path, e))?;
    logf!("Store: Rotated {} → {}", path.display(), backup.display());
    Ok(Some(backup))
}

/// Backup name for `path` at `now`, without collision handling.
pub fn backup_path(path: &Path, now: NaiveDateTime) -> PathBuf {
    backup_path_numbered(path, now, 1)
}

// Two rotations inside the same minute must not clobber each other:
// "<stem>_backup_<ts>.jsonl", then "<stem>_backup_<ts>_2.jsonl", ...
fn free_backup_path(path: &Path, now: NaiveDateTime) -> PathBuf {
    let mut n = 1usize;
    loop {
        let candidate = backup_path_numbered(path, now, n);
        if !candidate.exists() {
            return candidate;
        }
        n += 1;
    }
}

fn backup_path_numbered(path: &Path, now: NaiveDateTime, n: usize) -> PathBuf {
    let stem = path.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
    let ext = path
        .extension()
        .map(|e| join!(".", &e.to_string_lossy()))
        .unwrap_or_default();
    let ts = now.format(BACKUP_TIMESTAMP_FMT).to_string();

    let name = if n == 1 {
        join!(&stem, BACKUP_TAG, &ts, &ext)
    } else {
        join!(&stem, BACKUP_TAG, &ts, &format!("_{n}"), &ext)
    };
    path.with_file_name(name)
}

fn create_parent(path: &Path) -> Result<(), StoreError> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))
        }
        _ => Ok(()),
    }
}

fn temp_sibling(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|s| s.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
