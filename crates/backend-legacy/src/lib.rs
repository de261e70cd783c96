//! Legacy XSLT 1.0 backend (component H): drives the shared interpreter core
//! (`xdbg-interp`) over an instrumented stylesheet DOM. The instrumentation
//! pass already refuses `version="2.0"`/`"3.0"` stylesheets before a `Dom`
//! ever reaches this crate, so this module has no version check of its own.
//! Variable captures here ride the `dbg:var` extension-function fallback
//! (§4.4), not the native message channel, so any text that does reach
//! [`xdbg_interp::OutputBuilder::message`] is a genuine `xsl:message` call
//! from the stylesheet author and is passed straight through as output.

mod error;

pub use error::LegacyBackendError;

use xdbg_dom::Dom;
use xdbg_interp::{compile_stylesheet, Executor, XmlNode, XmlStringBuilder};
use xdbg_protocol::{FrameSink, ProbeSink};
use xdbg_types::EngineKind;

/// Compiles `dom` and runs it over `input_source`, reporting breakpoints,
/// variable captures, and template frames through `probe_sink`/`frame_sink`,
/// and forwarding genuine `xsl:message` output lines through `on_output`.
/// Returns the serialized transformation result.
pub fn run(
    dom: &Dom,
    input_source: &str,
    probe_sink: &dyn ProbeSink,
    frame_sink: &dyn FrameSink,
    on_output: &mut dyn FnMut(&str),
) -> Result<String, LegacyBackendError> {
    let stylesheet = compile_stylesheet(dom, EngineKind::Legacy)?;
    let input_doc = roxmltree::Document::parse(input_source)?;
    let root = XmlNode::Node(input_doc.root());

    let mut executor = Executor::new(&stylesheet, root, Some(probe_sink), Some(frame_sink), false)?;
    let mut builder = XmlStringBuilder::new();
    executor.run(&mut builder)?;

    for message in &builder.messages {
        on_output(message);
    }
    Ok(builder.into_string())
}
