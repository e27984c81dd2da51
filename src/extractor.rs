//! Per-module timing extraction from captured build output.
//!
//! Each [`TimingPattern`] turns one log line into an optional
//! [`ModuleTiming`]. The extractor tries its patterns in order and stops at
//! the first hit, so a line is never counted twice. New output formats are
//! added by pushing another pattern, the pipeline does not change.

use indexmap::IndexMap;
use log::{debug, trace};
use regex::Regex;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::OnceLock;

use crate::error::Result;

/// Module name to elapsed seconds, in the order modules were first seen.
pub type ModuleTimes = IndexMap<String, f64>;

#[derive(Debug, Clone, PartialEq)]
pub struct ModuleTiming {
    pub module: String,
    pub seconds: f64,
}

pub trait TimingPattern {
    fn name(&self) -> &'static str;
    fn match_line(&self, line: &str) -> Option<ModuleTiming>;
}

fn ansi_escape() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\x1b\[[0-9;]*[A-Za-z]").expect("ansi escape pattern is valid"))
}

fn seconds_line() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"^\s*(?:\[[A-Z]+\]\s+)?(?P<name>\S.*?)[\s.]*\sSUCCESS\s*\[\s*(?P<secs>\d+(?:\.\d+)?)\s*s\]",
        )
        .expect("seconds pattern is valid")
    })
}

fn minutes_line() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"^\s*(?:\[[A-Z]+\]\s+)?(?P<name>\S.*?)[\s.]*\sSUCCESS\s*\[\s*(?P<mins>\d+):(?P<secs>\d+)(?:\.\d+)?\s*min\]",
        )
        .expect("minutes pattern is valid")
    })
}

/// Replaces interior whitespace and hyphens with underscores so the name is a
/// stable JSON key: `Billing - API` becomes `Billing___API`.
pub fn normalize_module_name(raw: &str) -> String {
    raw.trim()
        .chars()
        .map(|c| if c.is_whitespace() || c == '-' { '_' } else { c })
        .collect()
}

/// `Module_X ........ SUCCESS [ 12.345 s]`
pub struct SecondsPattern;

impl TimingPattern for SecondsPattern {
    fn name(&self) -> &'static str {
        "seconds"
    }
    fn match_line(&self, line: &str) -> Option<ModuleTiming> {
        let caps = seconds_line().captures(line)?;
        let seconds: f64 = caps.name("secs")?.as_str().parse().ok()?;
        if !seconds.is_finite() {
            return None;
        }
        Some(ModuleTiming {
            module: normalize_module_name(caps.name("name")?.as_str()),
            seconds,
        })
    }
}

/// `Module_Y ........ SUCCESS [ 1:05 min]`
pub struct MinutesPattern;

impl TimingPattern for MinutesPattern {
    fn name(&self) -> &'static str {
        "minutes"
    }
    fn match_line(&self, line: &str) -> Option<ModuleTiming> {
        let caps = minutes_line().captures(line)?;
        let minutes: u64 = caps.name("mins")?.as_str().parse().ok()?;
        let seconds: u64 = caps.name("secs")?.as_str().parse().ok()?;
        let total = minutes.checked_mul(60)?.checked_add(seconds)?;
        Some(ModuleTiming {
            module: normalize_module_name(caps.name("name")?.as_str()),
            seconds: total as f64,
        })
    }
}

pub struct ModuleTimeExtractor {
    patterns: Vec<Box<dyn TimingPattern>>,
}

impl Default for ModuleTimeExtractor {
    fn default() -> Self {
        Self::empty().with_pattern(SecondsPattern).with_pattern(MinutesPattern)
    }
}

impl ModuleTimeExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// An extractor with no patterns; it matches nothing until some are added.
    pub fn empty() -> Self {
        Self { patterns: Vec::new() }
    }

    pub fn with_pattern<P: TimingPattern + 'static>(mut self, pattern: P) -> Self {
        self.patterns.push(Box::new(pattern));
        self
    }

    pub fn match_line(&self, line: &str) -> Option<ModuleTiming> {
        let cleaned = ansi_escape().replace_all(line, "");
        self.patterns.iter().find_map(|pattern| {
            let timing = pattern.match_line(&cleaned)?;
            trace!("{} pattern matched {} = {}s", pattern.name(), timing.module, timing.seconds);
            Some(timing)
        })
    }

    /// Later lines for the same module overwrite earlier ones; the module
    /// keeps the position where it was first seen.
    pub fn extract_lines<I, S>(&self, lines: I) -> ModuleTimes
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut modules = ModuleTimes::new();
        for line in lines {
            if let Some(timing) = self.match_line(line.as_ref()) {
                if let Some(previous) = modules.insert(timing.module.clone(), timing.seconds) {
                    debug!(
                        "module {} reported twice ({}s then {}s), keeping the later value",
                        timing.module, previous, timing.seconds
                    );
                }
            }
        }
        modules
    }

    /// Reads line by line; invalid UTF-8 is replaced rather than rejected so
    /// one garbled line cannot hide the rest of the capture.
    pub fn extract_reader<R: BufRead>(&self, mut reader: R) -> Result<ModuleTimes> {
        let mut lines = Vec::new();
        let mut buf = Vec::new();
        loop {
            buf.clear();
            if reader.read_until(b'\n', &mut buf)? == 0 {
                break;
            }
            lines.push(String::from_utf8_lossy(&buf).into_owned());
        }
        Ok(self.extract_lines(lines))
    }

    pub fn extract_file(&self, path: &Path) -> Result<ModuleTimes> {
        let file = File::open(path)?;
        self.extract_reader(BufReader::new(file))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    #[test]
    fn test_seconds_line() {
        let modules = ModuleTimeExtractor::new()
            .extract_lines(["Module_X .......... SUCCESS [ 12.345 s]"]);
        assert_eq!(modules.len(), 1);
        assert_eq!(modules["Module_X"], 12.345);
    }
    #[test]
    fn test_minutes_line() {
        let modules = ModuleTimeExtractor::new()
            .extract_lines(["Module_Y .......... SUCCESS [ 1:05 min]"]);
        assert_eq!(modules["Module_Y"], 65.0);
    }
    #[test]
    fn test_maven_reactor_summary() {
        let capture = "\
[INFO] Reactor Summary for Shop 1.0-SNAPSHOT:
[INFO]
[INFO] Shop Parent ........................................ SUCCESS [  0.412 s]
[INFO] shop-core .......................................... SUCCESS [ 14.020 s]
[INFO] Shop Web API ....................................... SUCCESS [01:12 min]
[INFO] ------------------------------------------------------------------------
[INFO] BUILD SUCCESS
[INFO] Total time:  01:27 min
";
        let modules = ModuleTimeExtractor::new()
            .extract_reader(Cursor::new(capture))
            .unwrap();
        let names: Vec<_> = modules.keys().cloned().collect();
        assert_eq!(names, vec!["Shop_Parent", "shop_core", "Shop_Web_API"]);
        assert_eq!(modules["shop_core"], 14.02);
        assert_eq!(modules["Shop_Web_API"], 72.0);
    }
    #[test]
    fn test_duplicate_module_last_value_wins() {
        let modules = ModuleTimeExtractor::new().extract_lines([
            "[INFO] engine ........ SUCCESS [ 3.000 s]",
            "[INFO] api ........ SUCCESS [ 1.000 s]",
            "[INFO] engine ........ SUCCESS [ 5.500 s]",
        ]);
        assert_eq!(modules.len(), 2);
        assert_eq!(modules["engine"], 5.5);
        assert_eq!(modules.get_index(0).map(|(k, _)| k.as_str()), Some("engine"));
    }
    #[test]
    fn test_non_success_lines_ignored() {
        let modules = ModuleTimeExtractor::new().extract_lines([
            "[INFO] engine ........ FAILURE [ 3.000 s]",
            "[INFO] api ........ SKIPPED",
            "[INFO] BUILD SUCCESS",
            "random chatter",
        ]);
        assert!(modules.is_empty());
    }
    #[test]
    fn test_ansi_colour_codes_are_stripped() {
        let line = "[\x1b[1;34mINFO\x1b[m] core ..... \x1b[1;32mSUCCESS\x1b[m [  2.500 s]";
        let modules = ModuleTimeExtractor::new().extract_lines([line]);
        assert_eq!(modules["core"], 2.5);
    }
    #[test]
    fn test_out_of_range_timings_are_skipped() {
        let huge_seconds = format!("[INFO] core ..... SUCCESS [ {} s]", "9".repeat(400));
        let huge_minutes = format!("[INFO] web ..... SUCCESS [ {}:00 min]", u64::MAX / 10);
        let extractor = ModuleTimeExtractor::new();
        assert_eq!(extractor.match_line(&huge_seconds), None);
        assert_eq!(extractor.match_line(&huge_minutes), None);
        let modules = extractor.extract_lines([
            huge_seconds.as_str(),
            huge_minutes.as_str(),
            "[INFO] api ..... SUCCESS [ 2.000 s]",
        ]);
        assert_eq!(modules.len(), 1);
        assert_eq!(modules["api"], 2.0);
    }
    #[test]
    fn test_normalize_module_name() {
        assert_eq!(normalize_module_name("  my module-name "), "my_module_name");
        assert_eq!(normalize_module_name("Plain"), "Plain");
    }
    #[test]
    fn test_custom_pattern_extends_extractor() {
        struct Gradle;
        impl TimingPattern for Gradle {
            fn name(&self) -> &'static str {
                "gradle"
            }
            fn match_line(&self, line: &str) -> Option<ModuleTiming> {
                let rest = line.strip_prefix("TASK ")?;
                let (module, secs) = rest.split_once(' ')?;
                Some(ModuleTiming {
                    module: module.to_string(),
                    seconds: secs.trim_end_matches('s').parse().ok()?,
                })
            }
        }
        let extractor = ModuleTimeExtractor::empty().with_pattern(Gradle);
        let modules = extractor.extract_lines(["TASK :app 4.5s", "app ... SUCCESS [ 1.0 s]"]);
        assert_eq!(modules.len(), 1);
        assert_eq!(modules[":app"], 4.5);
    }
}
