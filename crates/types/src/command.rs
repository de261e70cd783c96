use crate::config::StartOptions;
use crate::{FilePath, Line};
use serde::{Deserialize, Serialize};

/// The adapter-facing command vocabulary (§6). These are the only operations
/// an external collaborator (a DAP server, or the manual-test CLI of §6.1)
/// may issue against a running `DebugSession`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "camelCase")]
pub enum Command {
    Start(StartOptions),
    #[serde(rename_all = "camelCase")]
    SetBreakpoints {
        file: FilePath,
        lines: Vec<Line>,
    },
    Continue,
    StepIn,
    StepOver,
    StepOut,
    Terminate,
}
