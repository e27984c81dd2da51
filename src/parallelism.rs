//! Resolves the build tool's `-T` concurrency directive into a thread count.
//!
//! Reactor builds accept either an explicit count (`-T 4`) or a per-core
//! multiplier (`-T 2C`, `-T 1.5C`). Anything unrecognised falls back to a
//! single thread; this never fails.

use log::debug;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ThreadSpec {
    Fixed(usize),
    PerCore(f64),
}

impl ThreadSpec {
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if let Some(multiplier) = raw.strip_suffix('C').or_else(|| raw.strip_suffix('c')) {
            let multiplier: f64 = multiplier.parse().ok()?;
            if multiplier.is_finite() && multiplier > 0.0 {
                return Some(ThreadSpec::PerCore(multiplier));
            }
            return None;
        }
        raw.parse::<usize>().ok().filter(|n| *n > 0).map(ThreadSpec::Fixed)
    }

    pub fn resolve(self, cores: usize) -> usize {
        match self {
            ThreadSpec::Fixed(n) => n,
            ThreadSpec::PerCore(m) => ((cores.max(1) as f64) * m).ceil().max(1.0) as usize,
        }
    }
}

/// Finds the last concurrency directive in `args`. Accepts `-T <spec>`,
/// `-T<spec>`, `--threads <spec>` and `--threads=<spec>`.
pub fn find_directive(args: &[String]) -> Option<ThreadSpec> {
    let mut found = None;
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        let raw = match arg.as_str() {
            "-T" | "--threads" => iter.next().map(String::as_str),
            other => other
                .strip_prefix("--threads=")
                .or_else(|| other.strip_prefix("-T").filter(|rest| !rest.is_empty())),
        };
        if let Some(spec) = raw.and_then(ThreadSpec::parse) {
            found = Some(spec);
        }
    }
    found
}

pub fn resolve_threads_with_cores(args: &[String], cores: usize) -> usize {
    match find_directive(args) {
        Some(spec) => {
            let threads = spec.resolve(cores);
            debug!("concurrency directive {:?} on {} cores -> {} threads", spec, cores, threads);
            threads
        }
        None => 1,
    }
}

/// Thread count for `args` on this host.
pub fn resolve_threads(args: &[String]) -> usize {
    resolve_threads_with_cores(args, num_cpus::get())
}
