//! Modern XSLT 2.0/3.0 backend (component I): drives the same shared
//! interpreter core (`xdbg-interp`) as the legacy backend, but variable
//! captures ride the native diagnostic-message channel (`xsl:message` with a
//! `select` sequence, §4.4) instead of a direct extension-function call.
//! Every message that reaches [`xdbg_interp::OutputBuilder::message`]
//! therefore needs one decode attempt before being either folded into a
//! variable capture or passed straight through as plain output.

mod error;

pub use error::ModernBackendError;

use xdbg_dom::Dom;
use xdbg_interp::{compile_stylesheet, Executor, XmlNode, XmlStringBuilder};
use xdbg_protocol::{decode_diagnostic_line, FrameSink, ProbeSink};
use xdbg_types::EngineKind;

/// Compiles `dom` and runs it over `input_source`. Identical contract to
/// `xdbg_backend_legacy::run`, except messages are first tried as `[DBG] var
/// NAME VALUE` captures before falling back to plain output.
pub fn run(
    dom: &Dom,
    input_source: &str,
    probe_sink: &dyn ProbeSink,
    frame_sink: &dyn FrameSink,
    on_output: &mut dyn FnMut(&str),
) -> Result<String, ModernBackendError> {
    let stylesheet = compile_stylesheet(dom, EngineKind::Modern)?;
    let input_doc = roxmltree::Document::parse(input_source)?;
    let root = XmlNode::Node(input_doc.root());

    let mut executor = Executor::new(&stylesheet, root, Some(probe_sink), Some(frame_sink), false)?;
    let mut builder = XmlStringBuilder::new();
    executor.run(&mut builder)?;

    for message in &builder.messages {
        match decode_diagnostic_line(message) {
            Some(decoded) => probe_sink.on_variable(&decoded.name, &decoded.value),
            None => on_output(message),
        }
    }
    Ok(builder.into_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use xdbg_protocol::ProbeEvent;

    #[derive(Default)]
    struct RecordingSink {
        vars: Mutex<Vec<(String, String)>>,
    }
    impl ProbeSink for RecordingSink {
        fn on_break(&self, _event: ProbeEvent) {}
        fn on_variable(&self, name: &str, value: &str) {
            self.vars.lock().unwrap().push((name.to_string(), value.to_string()));
        }
    }
    impl FrameSink for RecordingSink {
        fn on_template_enter(&self) {}
        fn on_template_exit(&self) {}
    }

    #[test]
    fn decodes_variable_capture_messages_and_passes_the_rest_through() {
        let dom = Dom::parse(
            r#"<xsl:stylesheet version="2.0" xmlns:xsl="http://www.w3.org/1999/XSL/Transform">
  <xsl:template match="/">
    <xsl:variable name="n" select="2"/>
    <xsl:message select="('[DBG]', 'var', 'n', string($n))"/>
    <xsl:message>plain note</xsl:message>
    <out><xsl:value-of select="$n"/></out>
  </xsl:template>
</xsl:stylesheet>"#,
        )
        .unwrap();
        let sink = RecordingSink::default();
        let mut lines = Vec::new();
        let mut on_output = |line: &str| lines.push(line.to_string());
        let output = run(&dom, "<root/>", &sink, &sink, &mut on_output).unwrap();
        assert_eq!(output, "<out>2</out>");
        assert_eq!(sink.vars.lock().unwrap().as_slice(), &[("n".to_string(), "2".to_string())]);
        assert_eq!(lines, vec!["plain note".to_string()]);
    }
}
