//! Manual-test command-line surface (§6.1): reads newline-delimited JSON
//! commands from stdin, drives a single `DebugSession`, and writes
//! newline-delimited JSON events to stdout. Not DAP wire framing — that
//! remains an external collaborator's job.

use clap::Parser;
use std::io::{self, BufRead, Write};
use std::sync::{Arc, Mutex};
use xdbg::{Command, DebugSession, Error, Event};
use xdbg_types::LogLevel;

#[derive(Parser)]
#[command(about = "Manual-test harness for the xdbg debugger core")]
struct Args {
    /// Process-wide logging filter. Independent of a `start` command's own
    /// `logLevel`, which only gates the instrumentation diagnostics emitted
    /// as `output` events, never instrumentation decisions themselves.
    #[arg(long, value_enum, default_value_t = CliLogLevel::None)]
    log_level: CliLogLevel,
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum CliLogLevel {
    None,
    Log,
    Trace,
    TraceAll,
}

impl From<CliLogLevel> for LogLevel {
    fn from(level: CliLogLevel) -> Self {
        match level {
            CliLogLevel::None => LogLevel::None,
            CliLogLevel::Log => LogLevel::Log,
            CliLogLevel::Trace => LogLevel::Trace,
            CliLogLevel::TraceAll => LogLevel::TraceAll,
        }
    }
}

fn main() -> Result<(), Error> {
    let args = Args::parse();
    env_logger::Builder::new()
        .filter_level(LogLevel::from(args.log_level).as_level_filter())
        .init();

    let stdout = Arc::new(Mutex::new(io::stdout()));
    let session = Arc::new(DebugSession::new());

    for line in io::stdin().lock().lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let command: Command = serde_json::from_str(&line)?;
        dispatch(&session, &stdout, command)?;
    }

    session.join();
    Ok(())
}

fn dispatch(session: &Arc<DebugSession>, stdout: &Arc<Mutex<io::Stdout>>, command: Command) -> Result<(), Error> {
    match command {
        Command::Start(options) => {
            let stdout = stdout.clone();
            session.start(options, move |event| emit(&stdout, &event))?;
        }
        Command::SetBreakpoints { file, lines } => {
            session.set_breakpoints(&file, lines)?;
        }
        Command::Continue => session.continue_()?,
        Command::StepIn => session.step_in()?,
        Command::StepOver => session.step_over()?,
        Command::StepOut => session.step_out()?,
        Command::Terminate => session.terminate()?,
    }
    Ok(())
}

fn emit(stdout: &Arc<Mutex<io::Stdout>>, event: &Event) {
    let line = match serde_json::to_string(event) {
        Ok(line) => line,
        Err(err) => {
            log::error!("failed to serialize event: {err}");
            return;
        }
    };
    let mut handle = stdout.lock().unwrap();
    let _ = writeln!(handle, "{line}");
    let _ = handle.flush();
}
