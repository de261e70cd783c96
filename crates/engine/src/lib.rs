//! The engine abstraction (component G): the single facade an adapter
//! drives, hiding the split between the legacy and modern backends behind
//! one `start`/`setBreakpoints`/`continue`/... surface over a `SessionState`.

mod error;

pub use error::EngineError;

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use xdbg_dom::Dom;
use xdbg_instrument::instrument;
use xdbg_session::{SessionState, SessionStatus};
use xdbg_types::{BreakpointStatus, EngineKind, Event, ExitCode, Line, StartOptions};

struct Active {
    session: Arc<SessionState>,
    handle: Option<JoinHandle<()>>,
}

/// Owns at most one running transform at a time. Constructed once per debug
/// session by the adapter (§9: no process-wide statics); `start` spawns the
/// transforming thread, everything else forwards to the `SessionState` it
/// created.
pub struct DebugSession {
    active: Mutex<Option<Active>>,
}

impl Default for DebugSession {
    fn default() -> Self {
        Self::new()
    }
}

impl DebugSession {
    pub fn new() -> Self {
        DebugSession {
            active: Mutex::new(None),
        }
    }

    /// Starts a transform in a background thread. `on_event` is called from
    /// that thread for every event the run produces, including the final
    /// `Terminated`.
    pub fn start(
        &self,
        options: StartOptions,
        on_event: impl Fn(Event) + Send + Sync + 'static,
    ) -> Result<(), EngineError> {
        let mut guard = self.active.lock().unwrap();
        if guard.is_some() {
            return Err(EngineError::AlreadyRunning);
        }
        let session = SessionState::new(options.stop_on_entry, on_event);
        let thread_session = session.clone();
        let handle = std::thread::spawn(move || run_transform(thread_session, options));
        *guard = Some(Active {
            session,
            handle: Some(handle),
        });
        Ok(())
    }

    fn with_session<T>(&self, f: impl FnOnce(&Arc<SessionState>) -> T) -> Result<T, EngineError> {
        let guard = self.active.lock().unwrap();
        match guard.as_ref() {
            Some(active) => Ok(f(&active.session)),
            None => Err(EngineError::NoActiveSession),
        }
    }

    pub fn set_breakpoints(&self, file: &str, lines: Vec<Line>) -> Result<Vec<BreakpointStatus>, EngineError> {
        self.with_session(|s| s.set_breakpoints(file, lines))
    }

    pub fn continue_(&self) -> Result<(), EngineError> {
        self.with_session(|s| s.continue_())
    }

    pub fn step_in(&self) -> Result<(), EngineError> {
        self.with_session(|s| s.step_in())
    }

    pub fn step_over(&self) -> Result<(), EngineError> {
        self.with_session(|s| s.step_over())
    }

    pub fn step_out(&self) -> Result<(), EngineError> {
        self.with_session(|s| s.step_out())
    }

    pub fn terminate(&self) -> Result<(), EngineError> {
        self.with_session(|s| s.terminate())
    }

    pub fn status(&self) -> SessionStatus {
        self.active
            .lock()
            .unwrap()
            .as_ref()
            .map(|a| a.session.status())
            .unwrap_or(SessionStatus::Idle)
    }

    /// Blocks until the current transform's background thread finishes.
    /// A no-op if no session is active.
    pub fn join(&self) {
        let handle = {
            let mut guard = self.active.lock().unwrap();
            guard.as_mut().and_then(|a| a.handle.take())
        };
        if let Some(handle) = handle {
            let _ = handle.join();
        }
    }
}

fn run_transform(session: Arc<SessionState>, options: StartOptions) {
    session.begin_run(&options.stylesheet_path);
    let result = run_transform_inner(&session, &options);
    let code = match result {
        Ok(()) if session.is_terminate_requested() => ExitCode::TerminatedByUser,
        Ok(()) => ExitCode::Success,
        Err(err) if session.is_terminate_requested() => {
            log::debug!("transform failed after termination was requested: {err}");
            ExitCode::TerminatedByUser
        }
        Err(err) => {
            session.emit_output(err.to_string());
            err.exit_code()
        }
    };
    session.mark_terminated(code);
}

fn run_transform_inner(session: &Arc<SessionState>, options: &StartOptions) -> Result<(), EngineError> {
    let stylesheet_src = read_file(&options.stylesheet_path)?;
    let mut dom = Dom::parse(&stylesheet_src)?;

    let report = instrument(&mut dom, options.engine)?;
    for diagnostic in &report.diagnostics {
        session.emit_output(diagnostic.clone());
    }
    session.emit_output(format!(
        "[debug] Instrumenting {} variable declaration(s)",
        report.variables_captured
    ));
    log::debug!(
        "instrumented {} probe(s), {} variable capture(s)",
        report.probes_inserted,
        report.variables_captured
    );

    session.record_instrumented_lines(&options.stylesheet_path, collect_instrumented_lines(&dom));

    let input_src = read_file(&options.input_path)?;

    let session_ref: &SessionState = session.as_ref();
    let mut on_output = |text: &str| session.emit_output(text.to_string());

    let output = match options.engine {
        EngineKind::Legacy => xdbg_backend_legacy::run(&dom, &input_src, session_ref, session_ref, &mut on_output)?,
        EngineKind::Modern => xdbg_backend_modern::run(&dom, &input_src, session_ref, session_ref, &mut on_output)?,
    };

    let output_path = options.resolved_output_path();
    std::fs::write(&output_path, output).map_err(|source| EngineError::WriteOutput {
        path: output_path.clone(),
        source,
    })?;
    Ok(())
}

fn read_file(path: &str) -> Result<String, EngineError> {
    std::fs::read_to_string(path).map_err(|source| EngineError::ReadFile {
        path: path.to_string(),
        source,
    })
}

/// Every element the instrumentation pass marked with `dbg:probe`, by
/// source line, for `SessionState::record_instrumented_lines`. A requested
/// breakpoint line that doesn't land in this set can never verify (§4.5).
fn collect_instrumented_lines(dom: &Dom) -> BTreeSet<Line> {
    let mut lines = BTreeSet::new();
    for id in dom.elements_in_document_order() {
        let node = dom.get(id);
        let is_probe = node
            .attributes
            .iter()
            .any(|attr| attr.name.prefix.as_deref() == Some("dbg") && attr.name.local == "probe");
        if is_probe {
            lines.insert(node.line);
        }
    }
    lines
}
