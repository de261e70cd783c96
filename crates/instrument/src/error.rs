use thiserror::Error;

#[derive(Error, Debug)]
pub enum InstrumentError {
    #[error("stylesheet has no root element")]
    NoRootElement,

    #[error("legacy backend refuses a stylesheet declaring version=\"{0}\"")]
    UnsupportedVersionForLegacy(String),
}
