use thiserror::Error;

#[derive(Error, Debug)]
pub enum DomError {
    #[error("I/O error reading stylesheet: {0}")]
    Io(#[from] std::io::Error),

    #[error("quick-xml error at byte {pos}: {source}")]
    QuickXml {
        pos: usize,
        #[source]
        source: quick_xml::Error,
    },

    #[error("malformed attribute on element at line {line}: {message}")]
    Attribute { line: u32, message: String },

    #[error("UTF-8 decoding error: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    #[error("document has no root element")]
    EmptyDocument,

    #[error("unbalanced end tag </{name}> at line {line}")]
    UnbalancedEndTag { name: String, line: u32 },
}
