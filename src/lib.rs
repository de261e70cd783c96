//! Root aggregate for the `xdbg` binary (§7.1): re-exports the pieces an
//! adapter actually drives, and rolls every crate's own error type into one
//! top-level `Error`.

pub use xdbg_engine::{DebugSession, EngineError};
pub use xdbg_types::{BreakpointStatus, Command, Event, StartOptions};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed command: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Engine(#[from] EngineError),
}
