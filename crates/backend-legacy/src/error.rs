use thiserror::Error;

#[derive(Debug, Error)]
pub enum LegacyBackendError {
    #[error(transparent)]
    Interp(#[from] xdbg_interp::InterpError),

    #[error("input document parse error: {0}")]
    InputParse(#[from] roxmltree::Error),
}
