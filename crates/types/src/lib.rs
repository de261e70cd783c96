//! Vocabulary shared by every other crate in the workspace: the command/event
//! surface the engine presents to an adapter (§6 of the design), the launch
//! configuration (§9), and the small value types that travel between them.

pub mod command;
pub mod config;
pub mod event;

pub use command::Command;
pub use config::{EngineKind, LogLevel, StartOptions};
pub use event::{Event, StopReason};

/// A 1-based source line number in a stylesheet file.
pub type Line = u32;

/// A normalized absolute file path, used as the breakpoint table's key.
pub type FilePath = String;

/// A single requested breakpoint line together with whether the
/// instrumentation pass actually mapped it to an instrumented element.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct BreakpointStatus {
    pub line: Line,
    pub verified: bool,
}

/// Process exit codes, per §6: 0 success, 1 compilation error, 2 runtime
/// error, 130 terminated by user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[repr(i32)]
pub enum ExitCode {
    Success = 0,
    CompilationError = 1,
    RuntimeError = 2,
    TerminatedByUser = 130,
}

impl ExitCode {
    pub fn as_i32(self) -> i32 {
        self as i32
    }
}
