//! Session state (component E) and its rendezvous with the step controller
//! (component F): the part of the design that turns probe calls into
//! `stopped` events and back.

use crate::breakpoints::BreakpointTable;
use crate::step::{StepController, StepMode};
use crate::variables::VariableStore;
use std::sync::{Arc, Condvar, Mutex};
use xdbg_protocol::{FrameSink, ProbeEvent, ProbeSink};
use xdbg_types::{BreakpointStatus, Event, ExitCode, Line, StopReason};

#[derive(Debug, Clone, PartialEq)]
pub enum SessionStatus {
    Idle,
    Running,
    Paused {
        file: String,
        line: Line,
        reason: StopReason,
    },
    Terminated(i32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PendingCommand {
    Continue,
    StepIn,
    StepOver,
    StepOut,
    Terminate,
}

struct Inner {
    status: SessionStatus,
    breakpoints: BreakpointTable,
    variables: VariableStore,
    frame: u64,
    step: StepController,
    stop_on_entry: bool,
    entry_pause_done: bool,
    pending: Option<PendingCommand>,
    terminate_requested: bool,
    current_file: String,
}

/// Holds the breakpoint table, variable store, frame counter, the pending
/// step command, and the single-slot resume rendezvous (§4.5). One
/// `SessionState` is constructed fresh per debug session and owned by its
/// caller (§9: no process-wide statics).
pub struct SessionState {
    inner: Mutex<Inner>,
    cond: Condvar,
    on_event: Box<dyn Fn(Event) + Send + Sync>,
}

impl SessionState {
    pub fn new(stop_on_entry: bool, on_event: impl Fn(Event) + Send + Sync + 'static) -> Arc<Self> {
        Arc::new(SessionState {
            inner: Mutex::new(Inner {
                status: SessionStatus::Idle,
                breakpoints: BreakpointTable::new(),
                variables: VariableStore::new(),
                frame: 0,
                step: StepController::new(),
                stop_on_entry,
                entry_pause_done: false,
                pending: None,
                terminate_requested: false,
                current_file: String::new(),
            }),
            cond: Condvar::new(),
            on_event: Box::new(on_event),
        })
    }

    /// Called by the engine once the stylesheet is loaded, before
    /// transformation begins.
    pub fn begin_run(&self, primary_file: &str) {
        let mut inner = self.inner.lock().unwrap();
        inner.status = SessionStatus::Running;
        inner.current_file = primary_file.to_string();
        inner.variables.clear();
        inner.frame = 0;
        inner.entry_pause_done = false;
    }

    pub fn record_instrumented_lines(&self, file: &str, lines: std::collections::BTreeSet<Line>) {
        self.inner
            .lock()
            .unwrap()
            .breakpoints
            .record_instrumented_lines(file, lines);
    }

    pub fn set_breakpoints(&self, file: &str, lines: Vec<Line>) -> Vec<BreakpointStatus> {
        let statuses = self.inner.lock().unwrap().breakpoints.set(file, lines);
        (self.on_event)(Event::BreakpointsResolved {
            file: file.to_string(),
            breakpoints: statuses.clone(),
        });
        statuses
    }

    pub fn status(&self) -> SessionStatus {
        self.inner.lock().unwrap().status.clone()
    }

    pub fn variables_snapshot(&self) -> Vec<(String, String)> {
        self.inner.lock().unwrap().variables.snapshot()
    }

    pub fn frame(&self) -> u64 {
        self.inner.lock().unwrap().frame
    }

    pub fn is_terminate_requested(&self) -> bool {
        self.inner.lock().unwrap().terminate_requested
    }

    pub fn emit_output(&self, text: impl Into<String>) {
        (self.on_event)(Event::Output { text: text.into() });
    }

    pub fn mark_terminated(&self, code: ExitCode) {
        let mut inner = self.inner.lock().unwrap();
        inner.status = SessionStatus::Terminated(code.as_i32());
        drop(inner);
        (self.on_event)(Event::terminated(code));
    }

    fn issue_command(&self, cmd: PendingCommand) {
        let mut inner = self.inner.lock().unwrap();
        let is_paused = matches!(inner.status, SessionStatus::Paused { .. });
        if cmd == PendingCommand::Terminate {
            inner.terminate_requested = true;
            inner.pending = Some(cmd);
            self.cond.notify_all();
            return;
        }
        if !is_paused {
            drop(inner);
            self.emit_output("command ignored: session is not paused");
            return;
        }
        inner.pending = Some(cmd);
        self.cond.notify_all();
    }

    pub fn continue_(&self) {
        self.issue_command(PendingCommand::Continue);
    }
    pub fn step_in(&self) {
        self.issue_command(PendingCommand::StepIn);
    }
    pub fn step_over(&self) {
        self.issue_command(PendingCommand::StepOver);
    }
    pub fn step_out(&self) {
        self.issue_command(PendingCommand::StepOut);
    }
    pub fn terminate(&self) {
        self.issue_command(PendingCommand::Terminate);
    }
}

impl ProbeSink for SessionState {
    fn on_break(&self, event: ProbeEvent) {
        let mut inner = self.inner.lock().unwrap();
        if inner.terminate_requested {
            return;
        }

        let frame = inner.frame;
        let breakpoint_hit = inner.breakpoints.contains(&inner.current_file, event.line);
        let is_entry = inner.stop_on_entry && !inner.entry_pause_done;
        let should_pause = is_entry || inner.step.should_pause(breakpoint_hit, frame);
        inner.entry_pause_done = true;

        if !should_pause {
            return;
        }

        let reason = if breakpoint_hit {
            StopReason::Breakpoint
        } else if is_entry {
            StopReason::Entry
        } else {
            StopReason::Step
        };

        let file = inner.current_file.clone();
        inner.status = SessionStatus::Paused {
            file: file.clone(),
            line: event.line,
            reason,
        };
        drop(inner);
        (self.on_event)(Event::Stopped {
            file,
            line: event.line,
            reason,
            frame,
        });

        let mut inner = self.inner.lock().unwrap();
        loop {
            if inner.terminate_requested {
                break;
            }
            if let Some(cmd) = inner.pending.take() {
                let current_frame = inner.frame;
                match cmd {
                    PendingCommand::Continue => inner.step.set_mode(StepMode::Continue),
                    PendingCommand::StepIn => inner.step.set_mode(StepMode::StepIn),
                    PendingCommand::StepOver => {
                        inner.step.set_mode(StepMode::StepOver(current_frame))
                    }
                    PendingCommand::StepOut => {
                        inner.step.set_mode(StepMode::StepOut(current_frame))
                    }
                    PendingCommand::Terminate => {
                        inner.step.set_mode(StepMode::Continue);
                        break;
                    }
                }
                inner.status = SessionStatus::Running;
                break;
            }
            inner = self.cond.wait(inner).unwrap();
        }
    }

    fn on_variable(&self, name: &str, value: &str) {
        self.inner.lock().unwrap().variables.capture(name, value);
        (self.on_event)(Event::VariableCaptured {
            name: name.to_string(),
            value: value.to_string(),
        });
    }
}

impl FrameSink for SessionState {
    fn on_template_enter(&self) {
        self.inner.lock().unwrap().frame += 1;
    }

    fn on_template_exit(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.frame = inner.frame.saturating_sub(1);
    }
}
