use colored::*;
use std::cmp::Ordering;
use std::io::{self, Write};

use crate::extractor::ModuleTimes;
use crate::format::{format_seconds, percent_change};
use crate::record::{speedup, BuildRun};

/// Modules that got slower than this against the previous run are called out.
pub const REGRESSION_THRESHOLD_PERCENT: f64 = 10.0;

#[derive(Debug, Clone, PartialEq)]
pub struct ModuleShare {
    pub module: String,
    pub seconds: f64,
    pub percent: f64,
}

/// Each module's share of the summed module time, slowest first.
pub fn module_shares(modules: &ModuleTimes) -> Vec<ModuleShare> {
    let total: f64 = modules.values().sum();
    let mut shares: Vec<ModuleShare> = modules
        .iter()
        .map(|(module, seconds)| ModuleShare {
            module: module.clone(),
            seconds: *seconds,
            percent: if total > 0.0 { seconds / total * 100.0 } else { 0.0 },
        })
        .collect();
    shares.sort_by(|a, b| b.seconds.partial_cmp(&a.seconds).unwrap_or(Ordering::Equal));
    shares
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModuleRegression {
    pub module: String,
    pub before: f64,
    pub after: f64,
    pub percent: f64,
}

pub fn module_regressions(previous: &ModuleTimes, current: &ModuleTimes) -> Vec<ModuleRegression> {
    let mut regressions: Vec<ModuleRegression> = current
        .iter()
        .filter_map(|(module, after)| {
            let before = *previous.get(module)?;
            let percent = percent_change(before, *after)?;
            (percent > REGRESSION_THRESHOLD_PERCENT).then(|| ModuleRegression {
                module: module.clone(),
                before,
                after: *after,
                percent,
            })
        })
        .collect();
    regressions.sort_by(|a, b| b.percent.partial_cmp(&a.percent).unwrap_or(Ordering::Equal));
    regressions
}

pub fn render_summary<W: Write>(
    out: &mut W,
    modules: &ModuleTimes,
    wall_seconds: f64,
) -> io::Result<()> {
    writeln!(out)?;
    writeln!(out, "{}", "=== Build Timing Summary ===".blue().bold())?;
    if modules.is_empty() {
        writeln!(
            out,
            "{}",
            "⚠️  No per-module timings found in the build output; reporting wall-clock time only."
                .yellow()
        )?;
        writeln!(out, "Wall-clock time: {}", format_seconds(wall_seconds).bold())?;
        return Ok(());
    }
    let shares = module_shares(modules);
    let width = shares
        .iter()
        .map(|s| s.module.chars().count())
        .max()
        .unwrap_or(0)
        .max("Module".len());
    writeln!(
        out,
        "{}",
        format!("{:<width$}  {:>12}  {:>7}", "Module", "Time", "Share", width = width).bold()
    )?;
    writeln!(out, "{}", "-".repeat(width + 23))?;
    for (index, share) in shares.iter().enumerate() {
        let row = format!(
            "{:<width$}  {:>12}  {:>6.1}%",
            share.module,
            format_seconds(share.seconds),
            share.percent,
            width = width
        );
        if index == 0 && shares.len() > 1 {
            writeln!(out, "{}", row.red())?;
        } else {
            writeln!(out, "{}", row)?;
        }
    }
    writeln!(out, "{}", "-".repeat(width + 23))?;
    let summed: f64 = modules.values().sum();
    writeln!(out, "Total module time: {}", format_seconds(summed).bold())?;
    writeln!(out, "Wall-clock time:   {}", format_seconds(wall_seconds).bold())?;
    if let Some(ratio) = speedup(summed, wall_seconds) {
        writeln!(out, "Parallel speedup:  {}", format!("{:.2}x", ratio).green().bold())?;
    }
    Ok(())
}

/// Wall-clock and per-module comparison against the previous run of the same
/// command.
pub fn render_trend<W: Write>(out: &mut W, previous: &BuildRun, current: &BuildRun) -> io::Result<()> {
    let Some(change) = percent_change(previous.total_time_seconds, current.total_time_seconds) else {
        return Ok(());
    };
    let delta = format!("{:+.1}%", change);
    let delta = if change > REGRESSION_THRESHOLD_PERCENT {
        delta.red()
    } else if change < 0.0 {
        delta.green()
    } else {
        delta.normal()
    };
    writeln!(
        out,
        "vs previous run ({}): {} → {} ({})",
        previous.timestamp.format("%Y-%m-%d %H:%M:%S").to_string().dimmed(),
        format_seconds(previous.total_time_seconds),
        format_seconds(current.total_time_seconds),
        delta
    )?;
    let regressions = module_regressions(&previous.modules, &current.modules);
    if !regressions.is_empty() {
        writeln!(out, "{}", "📈 Slower modules:".yellow())?;
        for r in regressions {
            writeln!(
                out,
                "   {}: {} → {} (+{:.1}%)",
                r.module.cyan(),
                format_seconds(r.before),
                format_seconds(r.after),
                r.percent
            )?;
        }
    }
    Ok(())
}
