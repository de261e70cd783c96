//! The instruction AST compiled from an instrumented stylesheet DOM (§4.8.1):
//! the instruction subset this debugger core needs to execute a transform and
//! produce plain-XML output.

use xdbg_xpath1::Expression;

#[derive(Debug, Clone, Default)]
pub struct PreparsedTemplate(pub Vec<Instruction>);

#[derive(Debug, Clone)]
pub enum Instruction {
    Text(String),
    ContentTag {
        name: String,
        attrs: Vec<(String, String)>,
        body: PreparsedTemplate,
    },
    ValueOf {
        select: Expression,
    },
    Variable {
        name: String,
        select: Expression,
    },
    ApplyTemplates {
        select: Option<Expression>,
        mode: Option<String>,
    },
    CallTemplate {
        name: String,
        params: Vec<WithParam>,
    },
    ForEach {
        select: Expression,
        body: PreparsedTemplate,
    },
    If {
        test: Expression,
        body: PreparsedTemplate,
    },
    Choose {
        whens: Vec<When>,
        otherwise: Option<PreparsedTemplate>,
    },
    Element {
        name: String,
        body: PreparsedTemplate,
    },
    Attribute {
        name: String,
        body: PreparsedTemplate,
    },
    Copy {
        body: PreparsedTemplate,
    },
    CopyOf {
        select: Expression,
    },
    /// `xsl:message`. `select_items` holds a comma-separated expression list
    /// (the modern-only sequence form used for variable capture, §4.8.1);
    /// when absent the message text is `body`'s literal/value-of content.
    Message {
        select_items: Option<Vec<Expression>>,
        body: PreparsedTemplate,
    },
}

#[derive(Debug, Clone)]
pub struct When {
    pub test: Expression,
    pub body: PreparsedTemplate,
}

#[derive(Debug, Clone)]
pub struct Param {
    pub name: String,
    pub default_value: Option<Expression>,
}

#[derive(Debug, Clone)]
pub struct WithParam {
    pub name: String,
    pub select: Expression,
}

#[derive(Debug, Clone)]
pub struct Template {
    pub match_pattern: Option<String>,
    pub name: Option<String>,
    pub mode: Option<String>,
    pub priority: Option<f64>,
    pub params: Vec<Param>,
    pub body: PreparsedTemplate,
}

#[derive(Debug, Clone, Default)]
pub struct Stylesheet {
    pub matched_templates: Vec<Template>,
    pub named_templates: std::collections::HashMap<String, Template>,
}
