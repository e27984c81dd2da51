use chrono::Utc;
use colored::*;
use log::{debug, info, warn};
use std::io::Write;
use std::path::Path;
use std::thread;
use std::time::Duration;

use crate::cache_probe;
use crate::config::Config;
use crate::error::{Result, StopwatchError};
use crate::extractor::ModuleTimeExtractor;
use crate::format::format_seconds;
use crate::history::{previous_run_of, HistoryStore};
use crate::parallelism;
use crate::record::BuildRun;
use crate::runner::{self, BuildCommand};
use crate::summary;

/// Signals read from the invocation before the build starts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunSignals {
    pub parallel_threads: usize,
    pub cache_hit: bool,
}

/// The cache probe walks the output directory on its own thread while the
/// thread directive is parsed; the two do not depend on each other.
pub fn resolve_signals(goals: &[String], output_dir: &Path, window: Duration) -> RunSignals {
    thread::scope(|scope| {
        let probe = scope.spawn(|| cache_probe::is_cache_warm(output_dir, window));
        let parallel_threads = parallelism::resolve_threads(goals);
        let cache_hit = probe.join().unwrap_or_else(|_| {
            warn!("cache probe panicked; assuming a cold cache");
            false
        });
        RunSignals {
            parallel_threads,
            cache_hit,
        }
    })
}

#[derive(Debug)]
pub enum CollectOutcome {
    /// The build succeeded; `persisted` is false under `--no-history`.
    Recorded { run: BuildRun, persisted: bool },
    /// The build ran and failed; nothing was recorded.
    BuildFailed { exit_code: i32, elapsed: Duration },
}

impl CollectOutcome {
    pub fn exit_code(&self) -> i32 {
        match self {
            CollectOutcome::Recorded { .. } => 0,
            CollectOutcome::BuildFailed { exit_code, .. } => *exit_code,
        }
    }
}

pub struct Collector<S: HistoryStore> {
    config: Config,
    store: S,
    extractor: ModuleTimeExtractor,
}

impl<S: HistoryStore> Collector<S> {
    pub fn new(config: Config, store: S) -> Self {
        Self {
            config,
            store,
            extractor: ModuleTimeExtractor::default(),
        }
    }

    pub fn with_extractor(mut self, extractor: ModuleTimeExtractor) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Runs the build once and records it. Summary and banners go to `out`;
    /// the build's own output goes straight to the console.
    pub fn collect<W: Write>(&mut self, goals: &[String], out: &mut W) -> Result<CollectOutcome> {
        if goals.is_empty() {
            return Err(StopwatchError::NoGoals);
        }
        let timestamp = Utc::now();
        let signals = resolve_signals(goals, &self.config.output_dir, self.config.cache_window);
        debug!("run signals: {:?}", signals);

        let command = BuildCommand::new(&self.config.tool, goals, &self.config.project_root);
        let outcome = runner::run_build(&command, self.config.echo_output)?;

        if !outcome.success() {
            let exit_code = outcome.exit_code();
            writeln!(out)?;
            writeln!(
                out,
                "{}",
                format!(
                    "❌ BUILD FAILED after {} (exit code {})",
                    format_seconds(outcome.elapsed.as_secs_f64()),
                    exit_code
                )
                .red()
                .bold()
            )?;
            info!("build failed; no run recorded");
            return Ok(CollectOutcome::BuildFailed {
                exit_code,
                elapsed: outcome.elapsed,
            });
        }

        let modules = self.extractor.extract_file(outcome.capture.path())?;
        let wall_seconds = outcome.elapsed.as_secs_f64();
        drop(outcome);
        if modules.is_empty() {
            warn!("no module timing lines matched; recording wall-clock time only");
        }

        let run = BuildRun::new(
            timestamp,
            command.display(),
            wall_seconds,
            modules,
            signals.cache_hit,
            signals.parallel_threads,
        );
        summary::render_summary(out, &run.modules, run.total_time_seconds)?;
        writeln!(
            out,
            "Threads: {}  Cache: {}",
            run.parallel_threads,
            if run.cache_hit { "warm (heuristic)" } else { "cold (heuristic)" }
        )?;

        if !self.config.persist {
            return Ok(CollectOutcome::Recorded {
                run,
                persisted: false,
            });
        }
        let history = self.store.read_all()?;
        if let Some(previous) = previous_run_of(&history, &run.command) {
            summary::render_trend(out, previous, &run)?;
        }
        self.store.append(&run)?;
        Ok(CollectOutcome::Recorded {
            run,
            persisted: true,
        })
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::history::MemoryHistory;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::TempDir;
    /// The fake build is a script run through `sh`, so the script path is
    /// the first goal.
    fn fake_tool(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join("fake-build");
        fs::write(&path, format!("{}\n", body)).unwrap();
        path
    }
    fn config(dir: &Path) -> Config {
        Config {
            tool: "sh".to_string(),
            project_root: dir.to_path_buf(),
            output_dir: dir.join("target"),
            history_file: dir.join("history.json"),
            cache_window: cache_probe::DEFAULT_WINDOW,
            persist: true,
            echo_output: false,
        }
    }
    fn goals(script: &Path, raw: &[&str]) -> Vec<String> {
        std::iter::once(script.display().to_string())
            .chain(raw.iter().map(|s| s.to_string()))
            .collect()
    }
    #[test]
    fn test_successful_build_is_recorded() {
        colored::control::set_override(false);
        let dir = TempDir::new().unwrap();
        let tool = fake_tool(
            dir.path(),
            "echo '[INFO] core ..... SUCCESS [ 1.500 s]'\necho '[INFO] web ..... SUCCESS [ 0:02 min]'",
        );
        let mut collector = Collector::new(config(dir.path()), MemoryHistory::new());
        let mut out = Vec::new();
        let outcome = collector.collect(&goals(&tool, &["install", "-T", "3"]), &mut out).unwrap();
        assert_eq!(outcome.exit_code(), 0);
        let runs = collector.store().read_all().unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].modules["core"], 1.5);
        assert_eq!(runs[0].modules["web"], 2.0);
        assert_eq!(runs[0].parallel_threads, 3);
        assert!(!runs[0].cache_hit);
        assert!(runs[0].command.ends_with("fake-build install -T 3"));
        assert!(String::from_utf8(out).unwrap().contains("Total module time"));
    }
    #[test]
    fn test_failed_build_records_nothing() {
        let dir = TempDir::new().unwrap();
        let tool = fake_tool(dir.path(), "echo '[INFO] core ..... SUCCESS [ 1.500 s]'\nexit 1");
        let mut collector = Collector::new(config(dir.path()), MemoryHistory::new());
        let mut out = Vec::new();
        let outcome = collector.collect(&goals(&tool, &["install"]), &mut out).unwrap();
        assert_eq!(outcome.exit_code(), 1);
        assert!(collector.store().read_all().unwrap().is_empty());
        assert!(String::from_utf8(out).unwrap().contains("BUILD FAILED"));
    }
    #[test]
    fn test_no_matching_lines_records_empty_modules() {
        let dir = TempDir::new().unwrap();
        let tool = fake_tool(dir.path(), "echo 'nothing useful here'");
        let mut collector = Collector::new(config(dir.path()), MemoryHistory::new());
        let outcome = collector.collect(&goals(&tool, &["validate"]), &mut Vec::new()).unwrap();
        assert_eq!(outcome.exit_code(), 0);
        let runs = collector.store().read_all().unwrap();
        assert_eq!(runs.len(), 1);
        assert!(runs[0].modules.is_empty());
    }
    #[test]
    fn test_no_history_skips_the_store() {
        let dir = TempDir::new().unwrap();
        let tool = fake_tool(dir.path(), "true");
        let mut cfg = config(dir.path());
        cfg.persist = false;
        let mut collector = Collector::new(cfg, MemoryHistory::new());
        let outcome = collector.collect(&goals(&tool, &["install"]), &mut Vec::new()).unwrap();
        assert!(matches!(outcome, CollectOutcome::Recorded { persisted: false, .. }));
        assert!(collector.store().read_all().unwrap().is_empty());
    }
    #[test]
    fn test_timestamp_marks_the_start_of_the_invocation() {
        let dir = TempDir::new().unwrap();
        let tool = fake_tool(dir.path(), "sleep 0.3");
        let mut collector = Collector::new(config(dir.path()), MemoryHistory::new());
        let before = Utc::now();
        collector.collect(&goals(&tool, &["install"]), &mut Vec::new()).unwrap();
        let after = Utc::now();
        let runs = collector.store().read_all().unwrap();
        let started = runs[0].timestamp;
        assert!(started >= before);
        assert!(after - started >= chrono::Duration::milliseconds(300));
    }
    #[test]
    fn test_empty_goals_rejected() {
        let dir = TempDir::new().unwrap();
        let mut collector = Collector::new(config(dir.path()), MemoryHistory::new());
        let err = collector.collect(&[], &mut Vec::new()).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }
    #[test]
    fn test_signals_see_fresh_output_dir() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("target")).unwrap();
        fs::write(dir.path().join("target").join("app.jar"), b"jar").unwrap();
        let signals = resolve_signals(
            &["-T".to_string(), "2".to_string()],
            &dir.path().join("target"),
            cache_probe::DEFAULT_WINDOW,
        );
        assert_eq!(signals, RunSignals { parallel_threads: 2, cache_hit: true });
    }
}
