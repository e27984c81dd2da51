use colored::*;
use log::{debug, info};
use serde_json::Value;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

use crate::error::{Result, StopwatchError};
use crate::format::format_seconds;
use crate::record::BuildRun;

/// Append-only storage for build runs.
pub trait HistoryStore {
    fn append(&mut self, run: &BuildRun) -> Result<()>;
    fn read_all(&self) -> Result<Vec<BuildRun>>;
}

/// History kept as one pretty-printed JSON array on disk.
///
/// Appends are read-modify-write followed by an atomic rename. There is no
/// locking: two collectors appending to the same file at once can lose one
/// of the runs.
#[derive(Debug, Clone)]
pub struct JsonFileHistory {
    path: PathBuf,
}

impl JsonFileHistory {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Existing entries as raw JSON, so rewriting the file never reshapes
    /// records written by other versions.
    fn load_raw(&self) -> Result<Vec<Value>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        serde_json::from_str(&content).map_err(|source| StopwatchError::MalformedHistory {
            path: self.path.clone(),
            source,
        })
    }

    fn write_atomic(&self, entries: &[Value]) -> Result<()> {
        let parent = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&parent)?;
        let mut tmp = NamedTempFile::new_in(&parent)?;
        serde_json::to_writer_pretty(&mut tmp, entries)?;
        tmp.write_all(b"\n")?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| StopwatchError::Io(e.error))?;
        Ok(())
    }
}

impl HistoryStore for JsonFileHistory {
    fn append(&mut self, run: &BuildRun) -> Result<()> {
        let mut entries = self.load_raw()?;
        let before = entries.len();
        entries.push(serde_json::to_value(run)?);
        self.write_atomic(&entries)?;
        info!(
            "appended run #{} to {}",
            before + 1,
            self.path.display()
        );
        Ok(())
    }

    fn read_all(&self) -> Result<Vec<BuildRun>> {
        let raw = self.load_raw()?;
        debug!("loaded {} history entries from {}", raw.len(), self.path.display());
        raw.into_iter()
            .map(|value| {
                serde_json::from_value(value).map_err(|source| StopwatchError::MalformedHistory {
                    path: self.path.clone(),
                    source,
                })
            })
            .collect()
    }
}

#[derive(Debug, Default, Clone)]
pub struct MemoryHistory {
    runs: Vec<BuildRun>,
}

impl MemoryHistory {
    pub fn new() -> Self {
        Self::default()
    }
}

impl HistoryStore for MemoryHistory {
    fn append(&mut self, run: &BuildRun) -> Result<()> {
        self.runs.push(run.clone());
        Ok(())
    }

    fn read_all(&self) -> Result<Vec<BuildRun>> {
        Ok(self.runs.clone())
    }
}

/// Most recent earlier run of the same command, used as the trend baseline.
pub fn previous_run_of<'a>(history: &'a [BuildRun], command: &str) -> Option<&'a BuildRun> {
    history.iter().rev().find(|run| run.command == command)
}

pub fn show_history<W: Write>(out: &mut W, history: &[BuildRun], limit: usize) -> io::Result<()> {
    if history.is_empty() {
        writeln!(out, "No build history found.")?;
        return Ok(());
    }
    writeln!(out, "{}", "=== Build History ===".blue().bold())?;
    writeln!(
        out,
        "{} of {} recorded runs, newest first",
        limit.min(history.len()),
        history.len()
    )?;
    for run in history.iter().rev().take(limit) {
        let cache = if run.cache_hit { "warm" } else { "cold" };
        let speedup = run
            .speedup()
            .map(|s| format!(" ({:.2}x)", s))
            .unwrap_or_default();
        writeln!(
            out,
            "  {}  {}  wall {}  modules {}{}  threads {}  cache {}",
            run.timestamp.format("%Y-%m-%d %H:%M:%S").to_string().dimmed(),
            run.command.cyan(),
            format_seconds(run.total_time_seconds),
            format_seconds(run.summed_module_seconds()),
            speedup,
            run.parallel_threads,
            cache
        )?;
    }
    Ok(())
}
