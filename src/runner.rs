//! Runs the wrapped build and tees its output.
//!
//! Both pipes are echoed to the matching console stream as lines arrive and
//! appended, line by line, to one capture file. The capture is a
//! [`NamedTempFile`], so it is deleted whenever the outcome is dropped,
//! whichever way the run ends.

use log::{debug, warn};
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Read, Write};
use std::path::PathBuf;
use std::process::{Command, ExitStatus, Stdio};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};
use tempfile::NamedTempFile;

use crate::error::{Result, StopwatchError};

#[derive(Debug, Clone)]
pub struct BuildCommand {
    pub program: String,
    pub args: Vec<String>,
    pub working_dir: PathBuf,
}

impl BuildCommand {
    pub fn new(program: impl Into<String>, args: &[String], working_dir: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: args.to_vec(),
            working_dir: working_dir.into(),
        }
    }

    /// Shell-quoted form, as stored in the run record.
    pub fn display(&self) -> String {
        shell_words::join(std::iter::once(&self.program).chain(self.args.iter()))
    }
}

#[derive(Debug)]
pub struct RunOutcome {
    pub status: ExitStatus,
    pub capture: NamedTempFile,
    pub elapsed: Duration,
}

impl RunOutcome {
    pub fn success(&self) -> bool {
        self.status.success()
    }

    /// Exit code to hand back to our own caller; a build killed by a signal
    /// has no code and reports 1.
    pub fn exit_code(&self) -> i32 {
        self.status.code().unwrap_or(1)
    }
}

#[derive(Clone, Copy)]
enum Echo {
    Stdout,
    Stderr,
    Off,
}

type Sink = Arc<Mutex<BufWriter<File>>>;

fn echo_line(echo: Echo, line: &[u8]) -> io::Result<()> {
    match echo {
        Echo::Stdout => {
            let mut out = io::stdout().lock();
            out.write_all(line)?;
            out.flush()
        }
        Echo::Stderr => {
            let mut err = io::stderr().lock();
            err.write_all(line)?;
            err.flush()
        }
        Echo::Off => Ok(()),
    }
}

/// Drains `source` to EOF even after a write fails, so the child never blocks
/// on a full pipe. The first write error is returned at the end.
fn pump<R: Read>(source: R, sink: &Sink, mut echo: Echo) -> io::Result<()> {
    let mut reader = BufReader::new(source);
    let mut line = Vec::new();
    let mut first_error = None;
    loop {
        line.clear();
        if reader.read_until(b'\n', &mut line)? == 0 {
            break;
        }
        let captured = sink
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .write_all(&line);
        if let Err(e) = captured {
            first_error.get_or_insert(e);
        }
        if let Err(e) = echo_line(echo, &line) {
            echo = Echo::Off;
            first_error.get_or_insert(e);
        }
    }
    first_error.map_or(Ok(()), Err)
}

pub fn run_build(command: &BuildCommand, echo_output: bool) -> Result<RunOutcome> {
    let capture = tempfile::Builder::new()
        .prefix("rsw-capture-")
        .suffix(".log")
        .tempfile()?;
    let sink: Sink = Arc::new(Mutex::new(BufWriter::new(capture.as_file().try_clone()?)));
    debug!(
        "running `{}` in {} (capture {})",
        command.display(),
        command.working_dir.display(),
        capture.path().display()
    );

    let start = Instant::now();
    let spawned = Command::new(&command.program)
        .args(&command.args)
        .current_dir(&command.working_dir)
        .stdin(Stdio::inherit())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn();
    let mut child = match spawned {
        Ok(child) => child,
        Err(source) => {
            return Err(StopwatchError::Spawn {
                program: command.program.clone(),
                elapsed: start.elapsed(),
                source,
            })
        }
    };

    let (out_echo, err_echo) = if echo_output {
        (Echo::Stdout, Echo::Stderr)
    } else {
        (Echo::Off, Echo::Off)
    };
    let err_handle = child.stderr.take().map(|stderr| {
        let sink = Arc::clone(&sink);
        thread::spawn(move || pump(stderr, &sink, err_echo))
    });
    let out_result = match child.stdout.take() {
        Some(stdout) => pump(stdout, &sink, out_echo),
        None => Ok(()),
    };
    let err_result = match err_handle {
        Some(handle) => handle
            .join()
            .unwrap_or_else(|_| Err(io::Error::new(io::ErrorKind::Other, "stderr reader panicked"))),
        None => Ok(()),
    };
    let status = child.wait()?;
    let elapsed = start.elapsed();
    debug!("build exited with {} after {:.3}s", status, elapsed.as_secs_f64());

    if let Err(e) = out_result.and(err_result) {
        warn!("lost part of the build output while capturing: {}", e);
    }
    sink.lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .flush()?;

    Ok(RunOutcome {
        status,
        capture,
        elapsed,
    })
}
