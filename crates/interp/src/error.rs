use thiserror::Error;

#[derive(Error, Debug)]
pub enum InterpError {
    #[error("compilation error at line {line}: {message}")]
    Compilation { line: u32, message: String },

    #[error("XPath error: {0}")]
    XPath(#[from] xdbg_xpath1::XPathError),

    #[error("input document parse error: {0}")]
    InputParse(#[from] roxmltree::Error),

    #[error("no template matches context node and no built-in rule applies")]
    NoMatchingTemplate,

    #[error("call-template references undefined template '{0}'")]
    UndefinedTemplate(String),

    #[error("execution cancelled by terminate request")]
    Cancelled,
}
