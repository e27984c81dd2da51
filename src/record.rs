use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::extractor::ModuleTimes;

/// One collector invocation as stored in the history file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildRun {
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "build_command")]
    pub command: String,
    pub total_time_seconds: f64,
    pub modules: ModuleTimes,
    /// Best-effort: derived from output-directory freshness, not from the
    /// build tool. Do not treat it as proof of artifact reuse.
    pub cache_hit: bool,
    pub parallel_threads: usize,
}

impl BuildRun {
    /// Every input comes from another stage of the pipeline, so out-of-range
    /// values are bugs and panic rather than returning an error.
    pub fn new(
        timestamp: DateTime<Utc>,
        command: String,
        total_time_seconds: f64,
        modules: ModuleTimes,
        cache_hit: bool,
        parallel_threads: usize,
    ) -> Self {
        assert!(
            total_time_seconds.is_finite() && total_time_seconds >= 0.0,
            "total time must be a non-negative number of seconds, got {}",
            total_time_seconds
        );
        assert!(
            modules.values().all(|s| s.is_finite() && *s >= 0.0),
            "module times must be non-negative"
        );
        assert!(parallel_threads >= 1, "thread count must be at least 1");
        Self {
            timestamp,
            command,
            total_time_seconds,
            modules,
            cache_hit,
            parallel_threads,
        }
    }

    pub fn summed_module_seconds(&self) -> f64 {
        self.modules.values().sum()
    }

    /// Summed module time over wall-clock time, only when the modules
    /// overlapped (summed strictly greater than wall-clock).
    pub fn speedup(&self) -> Option<f64> {
        speedup(self.summed_module_seconds(), self.total_time_seconds)
    }
}

pub fn speedup(summed_seconds: f64, wall_seconds: f64) -> Option<f64> {
    if wall_seconds > 0.0 && summed_seconds > wall_seconds {
        Some(summed_seconds / wall_seconds)
    } else {
        None
    }
}
