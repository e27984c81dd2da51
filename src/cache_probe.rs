//! Best-effort cache-warmth signal.
//!
//! A run counts as a cache hit when anything under the build output
//! directory was modified inside the window. That says nothing about whether
//! the build tool actually reused those artifacts: a file touched by an
//! unrelated process gives a false positive, and a tool that skips work
//! without touching outputs gives a false negative.

use log::{debug, trace};
use std::path::Path;
use std::time::{Duration, SystemTime};
use walkdir::WalkDir;

pub const DEFAULT_WINDOW: Duration = Duration::from_secs(60 * 60);

pub fn is_cache_warm(output_dir: &Path, window: Duration) -> bool {
    is_cache_warm_at(output_dir, window, SystemTime::now())
}

pub fn is_cache_warm_at(output_dir: &Path, window: Duration, now: SystemTime) -> bool {
    if !output_dir.is_dir() {
        debug!("cache probe: {} does not exist", output_dir.display());
        return false;
    }
    let cutoff = now.checked_sub(window).unwrap_or(SystemTime::UNIX_EPOCH);
    for entry in WalkDir::new(output_dir).into_iter().filter_map(|e| e.ok()) {
        if !entry.file_type().is_file() {
            continue;
        }
        let modified = match entry.metadata().ok().and_then(|m| m.modified().ok()) {
            Some(modified) => modified,
            None => continue,
        };
        if modified >= cutoff {
            trace!("cache probe: fresh artifact {}", entry.path().display());
            return true;
        }
    }
    false
}
