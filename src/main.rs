use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use colored::*;
use log::debug;
use std::io;
use std::path::PathBuf;

use reactor_stopwatch::config::{Config, Overrides};
use reactor_stopwatch::history::{self, HistoryStore, JsonFileHistory};
use reactor_stopwatch::{Collector, StopwatchError};

#[derive(Parser, Debug)]
#[command(name = "rsw")]
#[command(
    about = "⏱️  Reactor Stopwatch - times every module of a multi-module build",
    long_about = "Runs the build tool with the given goals, prints a per-module timing table \
                  and appends the run to a JSON history file.\n\n\
                  Put rsw's own options before the goals, or separate them with `--`."
)]
#[command(version, author, disable_help_subcommand = true)]
struct Args {
    #[command(subcommand)]
    command: Option<Commands>,
    /// Build tool to run (default: mvn)
    #[arg(long, global = true)]
    tool: Option<String>,
    /// Directory the build runs in (default: current directory)
    #[arg(long, global = true)]
    project_root: Option<PathBuf>,
    /// Build output directory probed for cache warmth (default: target)
    #[arg(long, global = true)]
    output_dir: Option<PathBuf>,
    /// History file (default: .build-history.json)
    #[arg(long, global = true)]
    history_file: Option<PathBuf>,
    /// Do not append this run to the history file
    #[arg(long)]
    no_history: bool,
    /// Capture the build output without echoing it
    #[arg(short, long)]
    quiet: bool,
    /// More diagnostic logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
    /// Goals and flags passed verbatim to the build tool
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    goals: Vec<String>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show recorded runs, newest first
    History {
        #[arg(long, default_value = "20")]
        limit: usize,
    },
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default))
        .format_timestamp(None)
        .init();
}

fn main() {
    let code = match run() {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{} {:#}", "❌ Error:".red().bold(), e);
            e.downcast_ref::<StopwatchError>()
                .map(StopwatchError::exit_code)
                .unwrap_or(1)
        }
    };
    std::process::exit(code);
}

fn run() -> Result<i32> {
    let args = Args::parse();
    init_logging(args.verbose);
    debug!("rsw {} args: {:?}", reactor_stopwatch::get_version(), args);

    let config = Config::load(Overrides {
        tool: args.tool,
        project_root: args.project_root,
        output_dir: args.output_dir,
        history_file: args.history_file,
        no_history: args.no_history,
        quiet: args.quiet,
    })
    .context("Failed to load configuration")?;

    if let Some(Commands::History { limit }) = args.command {
        return handle_history(&config, limit);
    }

    if args.goals.is_empty() {
        eprintln!("{}", "❌ No build goals supplied.".red());
        eprintln!("{}", Args::command().render_usage());
        return Ok(StopwatchError::NoGoals.exit_code());
    }

    let store = JsonFileHistory::new(&config.history_file);
    let mut collector = Collector::new(config, store);
    let mut stdout = io::stdout();
    let outcome = collector.collect(&args.goals, &mut stdout)?;
    Ok(outcome.exit_code())
}

fn handle_history(config: &Config, limit: usize) -> Result<i32> {
    let store = JsonFileHistory::new(&config.history_file);
    let runs = store
        .read_all()
        .with_context(|| format!("Could not read {}", store.path().display()))?;
    history::show_history(&mut io::stdout(), &runs, limit)?;
    Ok(0)
}
