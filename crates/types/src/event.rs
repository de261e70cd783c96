use crate::{BreakpointStatus, ExitCode, FilePath, Line};
use serde::{Deserialize, Serialize};

/// Why the transforming thread paused, surfaced on a `stopped` event (§3, §4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StopReason {
    Entry,
    Breakpoint,
    Step,
    Exception,
}

/// The adapter-facing event vocabulary (§6): everything the engine emits
/// back, in the order it happens. A DAP server maps these 1:1 onto DAP
/// events; the manual-test CLI (§6.1) just prints them as ndjson.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum Event {
    #[serde(rename_all = "camelCase")]
    Stopped {
        file: FilePath,
        line: Line,
        reason: StopReason,
        frame: u64,
    },
    Output {
        text: String,
    },
    #[serde(rename_all = "camelCase")]
    Terminated {
        exit_code: i32,
    },
    #[serde(rename_all = "camelCase")]
    VariableCaptured {
        name: String,
        value: String,
    },
    #[serde(rename_all = "camelCase")]
    BreakpointsResolved {
        file: FilePath,
        breakpoints: Vec<BreakpointStatus>,
    },
}

impl Event {
    pub fn terminated(code: ExitCode) -> Self {
        Event::Terminated {
            exit_code: code.as_i32(),
        }
    }
}
