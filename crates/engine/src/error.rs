use thiserror::Error;
use xdbg_types::ExitCode;

/// Errors an adapter can see, split between synchronous facade misuse
/// (`NoActiveSession`, `IllegalCommand`) and the pipeline failures that a
/// running transform reports as `terminated(exitCode)` instead of returning
/// directly (§7).
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("no active debug session")]
    NoActiveSession,

    #[error("a session is already running")]
    AlreadyRunning,

    #[error("failed to read '{path}': {source}")]
    ReadFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    StylesheetParse(#[from] xdbg_dom::DomError),

    #[error(transparent)]
    Instrument(#[from] xdbg_instrument::InstrumentError),

    #[error(transparent)]
    Legacy(#[from] xdbg_backend_legacy::LegacyBackendError),

    #[error(transparent)]
    Modern(#[from] xdbg_backend_modern::ModernBackendError),

    #[error("failed to write output to '{path}': {source}")]
    WriteOutput {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl EngineError {
    /// Classifies a pipeline failure into the exit code §6 promises:
    /// 1 for anything that kept the stylesheet from running at all
    /// (stylesheet parse, instrumentation, or interpreter compilation),
    /// 2 for everything else (I/O, a genuine runtime failure mid-transform).
    pub fn exit_code(&self) -> ExitCode {
        match self {
            EngineError::StylesheetParse(_) | EngineError::Instrument(_) => ExitCode::CompilationError,
            EngineError::Legacy(xdbg_backend_legacy::LegacyBackendError::Interp(
                xdbg_interp::InterpError::Compilation { .. },
            )) => ExitCode::CompilationError,
            EngineError::Modern(xdbg_backend_modern::ModernBackendError::Interp(
                xdbg_interp::InterpError::Compilation { .. },
            )) => ExitCode::CompilationError,
            _ => ExitCode::RuntimeError,
        }
    }
}
