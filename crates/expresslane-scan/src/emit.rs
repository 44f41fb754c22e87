//! JSON-lines emission and post-hoc dedup.
//!
//! Each row is written and flushed before the next is built, so a killed run
//! leaves only complete rows (plus at most one torn line). In append mode the
//! hashes already on disk are loaded first and never written again.

use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::error::ScanError;
use crate::row::OutputRow;

pub struct JsonlEmitter {
    path: PathBuf,
    writer: BufWriter<File>,
    seen: HashSet<String>,
    written: u64,
    duplicates: u64,
}

impl JsonlEmitter {
    /// Open `path` for writing. `append` keeps existing rows and preloads
    /// their hashes; otherwise the file is truncated.
    pub fn create(path: impl AsRef<Path>, append: bool) -> Result<Self, ScanError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let mut seen = HashSet::new();
        let file = if append && path.exists() {
            for line in read_lines(&path)? {
                if let Some(hash) = row_hash(&line) {
                    seen.insert(hash);
                }
            }
            let mut file = OpenOptions::new().read(true).append(true).open(&path)?;
            if !ends_with_newline(&mut file)? {
                file.write_all(b"\n")?;
            }
            file
        } else {
            File::create(&path)?
        };

        if !seen.is_empty() {
            tracing::info!(path = %path.display(), existing = seen.len(), "resuming output");
        }
        Ok(Self {
            path,
            writer: BufWriter::new(file),
            seen,
            written: 0,
            duplicates: 0,
        })
    }

    /// Write one row and flush. Returns `false` if its hash was already emitted.
    pub fn emit(&mut self, row: &OutputRow) -> Result<bool, ScanError> {
        if !self.seen.insert(row.tx_hash.to_ascii_lowercase()) {
            self.duplicates += 1;
            tracing::debug!(tx = %row.tx_hash, "duplicate row skipped");
            return Ok(false);
        }
        serde_json::to_writer(&mut self.writer, row)?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        self.written += 1;
        Ok(true)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Rows written by this emitter.
    pub fn written(&self) -> u64 {
        self.written
    }

    /// Rows rejected as already present.
    pub fn duplicates(&self) -> u64 {
        self.duplicates
    }
}

/// Outcome of [`dedup_file`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DedupReport {
    pub kept: u64,
    pub dropped: u64,
    /// Lines that were not a JSON object with a `txHash`.
    pub malformed: u64,
}

/// Rewrite `input` into `output` keeping the first line per `txHash`.
/// `output` may equal `input`. Kept lines are copied verbatim.
pub fn dedup_file(input: &Path, output: &Path) -> Result<DedupReport, ScanError> {
    let mut report = DedupReport::default();
    let mut seen = HashSet::new();
    let mut kept = Vec::new();
    for line in read_lines(input)? {
        match row_hash(&line) {
            Some(hash) => {
                if seen.insert(hash) {
                    kept.push(line);
                    report.kept += 1;
                } else {
                    report.dropped += 1;
                }
            }
            None => report.malformed += 1,
        }
    }

    let mut writer = BufWriter::new(File::create(output)?);
    for line in &kept {
        writer.write_all(line.as_bytes())?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    Ok(report)
}

/// Parse every non-empty line as JSON. Torn or invalid lines are skipped with
/// a warning.
pub fn read_rows(path: &Path) -> Result<Vec<Value>, ScanError> {
    let mut rows = Vec::new();
    for (n, line) in read_lines(path)?.into_iter().enumerate() {
        match serde_json::from_str(&line) {
            Ok(value) => rows.push(value),
            Err(e) => tracing::warn!(line = n + 1, error = %e, "skipping unreadable row"),
        }
    }
    Ok(rows)
}

fn read_lines(path: &Path) -> Result<Vec<String>, ScanError> {
    let reader = BufReader::new(File::open(path)?);
    let mut lines = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if !line.trim().is_empty() {
            lines.push(line);
        }
    }
    Ok(lines)
}

fn row_hash(line: &str) -> Option<String> {
    let value: Value = serde_json::from_str(line).ok()?;
    value.get("txHash")?.as_str().map(str::to_ascii_lowercase)
}

fn ends_with_newline(file: &mut File) -> Result<bool, ScanError> {
    if file.metadata()?.len() == 0 {
        return Ok(true);
    }
    file.seek(SeekFrom::End(-1))?;
    let mut last = [0u8; 1];
    file.read_exact(&mut last)?;
    Ok(last[0] == b'\n')
}
