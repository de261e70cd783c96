//! Shared instruction-execution core (components G/H/I's common dependency):
//! compiles an instrumented stylesheet DOM into a [`ast::Stylesheet`] and runs
//! it over an input document, reporting breakpoints, variables, and template
//! frames to a debug session as it goes.

pub mod ast;
pub mod compiler;
pub mod error;
pub mod executor;
pub mod output;
pub mod pattern;
pub mod xmlnode;

pub use ast::{Instruction, PreparsedTemplate, Stylesheet, Template};
pub use compiler::compile_stylesheet;
pub use error::InterpError;
pub use executor::Executor;
pub use output::{OutputBuilder, XmlStringBuilder};
pub use pattern::Pattern;
pub use xmlnode::XmlNode;

#[cfg(test)]
mod tests {
    use super::*;
    use xdbg_dom::Dom;

    /// Runs a tiny instrumented-free stylesheet end to end: compile, then
    /// execute against a plain input document, with no probe/frame sinks
    /// attached (mirrors how `xdbg-backend-legacy`/`-modern` drive this
    /// crate, minus the debug-session wiring).
    #[test]
    fn compiles_and_executes_a_simple_stylesheet() {
        let stylesheet_src = r#"<xsl:stylesheet xmlns:xsl="http://www.w3.org/1999/XSL/Transform" version="1.0">
            <xsl:template match="/">
                <out><xsl:apply-templates/></out>
            </xsl:template>
            <xsl:template match="item">
                <li><xsl:value-of select="."/></li>
            </xsl:template>
        </xsl:stylesheet>"#;
        let dom = Dom::parse(stylesheet_src).unwrap();
        let stylesheet = compile_stylesheet(&dom, xdbg_types::EngineKind::Legacy).unwrap();

        let input_src = "<items><item>a</item><item>b</item></items>";
        let doc = roxmltree::Document::parse(input_src).unwrap();
        let root = XmlNode::Node(doc.root());

        let mut executor = Executor::new(&stylesheet, root, None, None, false).unwrap();
        let mut builder = XmlStringBuilder::new();
        executor.run(&mut builder).unwrap();
        assert_eq!(builder.into_string(), "<out><li>a</li><li>b</li></out>");
    }

    #[test]
    fn falls_back_to_built_in_template_rule_for_unmatched_text() {
        let stylesheet_src = r#"<xsl:stylesheet xmlns:xsl="http://www.w3.org/1999/XSL/Transform" version="1.0">
            <xsl:template match="/"><xsl:apply-templates/></xsl:template>
        </xsl:stylesheet>"#;
        let dom = Dom::parse(stylesheet_src).unwrap();
        let stylesheet = compile_stylesheet(&dom, xdbg_types::EngineKind::Legacy).unwrap();

        let input_src = "<root>hello</root>";
        let doc = roxmltree::Document::parse(input_src).unwrap();
        let root = XmlNode::Node(doc.root());

        let mut executor = Executor::new(&stylesheet, root, None, None, false).unwrap();
        let mut builder = XmlStringBuilder::new();
        executor.run(&mut builder).unwrap();
        assert_eq!(builder.into_string(), "hello");
    }

    #[test]
    fn call_template_passes_with_param_values() {
        let stylesheet_src = r#"<xsl:stylesheet xmlns:xsl="http://www.w3.org/1999/XSL/Transform" version="1.0">
            <xsl:template match="/">
                <xsl:call-template name="greet">
                    <xsl:with-param name="who" select="'world'"/>
                </xsl:call-template>
            </xsl:template>
            <xsl:template name="greet">
                <xsl:param name="who"/>
                <out><xsl:value-of select="$who"/></out>
            </xsl:template>
        </xsl:stylesheet>"#;
        let dom = Dom::parse(stylesheet_src).unwrap();
        let stylesheet = compile_stylesheet(&dom, xdbg_types::EngineKind::Legacy).unwrap();

        let doc = roxmltree::Document::parse("<root/>").unwrap();
        let root = XmlNode::Node(doc.root());

        let mut executor = Executor::new(&stylesheet, root, None, None, false).unwrap();
        let mut builder = XmlStringBuilder::new();
        executor.run(&mut builder).unwrap();
        assert_eq!(builder.into_string(), "<out>world</out>");
    }
}
