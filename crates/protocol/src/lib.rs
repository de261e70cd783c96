//! The probe protocol (component D): the `dbg:break`/`dbg:var` extension
//! function contract, and the decoder for the diagnostic-message channel
//! the modern backend uses for variable captures.

use xdbg_xpath1::{ExtensionSink, XPathError};

/// What a running backend reports back through `dbg:break`. The context
/// value is the XPath `string()` of the context node, carried opaquely per
/// §3 ("the context node is carried opaquely").
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeEvent {
    pub line: u32,
    pub context_value: String,
    /// Present only for template-entry markers (§4.3 step 4): the
    /// template's `match` pattern or `name`.
    pub template_label: Option<String>,
}

/// The session-side contract a running transform's probes call into.
/// Implemented by `xdbg-session::SessionState` (or a thin adapter over it).
/// Both methods are synchronous and may block the calling thread: `on_break`
/// is where the transforming thread rendezvous with the step controller.
pub trait ProbeSink: Send + Sync {
    fn on_break(&self, event: ProbeEvent);
    fn on_variable(&self, name: &str, value: &str);
}

/// Bridges a [`ProbeSink`] into the XPath evaluator's generic extension-function
/// hook, dispatching by name to a real callback instead of returning a stub
/// value.
pub struct ProbeExtensionSink<'a> {
    sink: &'a dyn ProbeSink,
}

impl<'a> ProbeExtensionSink<'a> {
    pub fn new(sink: &'a dyn ProbeSink) -> Self {
        ProbeExtensionSink { sink }
    }
}

impl<'a> ExtensionSink for ProbeExtensionSink<'a> {
    fn call(&self, name: &str, args: &[String]) -> Result<String, XPathError> {
        match name {
            "break" => {
                let line = args
                    .first()
                    .and_then(|s| s.trim().parse().ok())
                    .unwrap_or(0);
                let context_value = args.get(1).cloned().unwrap_or_default();
                let template_label = args
                    .get(2)
                    .and_then(|s| s.strip_prefix("template:"))
                    .map(|s| s.to_string());
                self.sink.on_break(ProbeEvent {
                    line,
                    context_value,
                    template_label,
                });
                Ok(String::new())
            }
            "var" => {
                let name = args.first().cloned().unwrap_or_default();
                let value = args.get(1).cloned().unwrap_or_default();
                self.sink.on_variable(&name, &value);
                Ok(String::new())
            }
            other => Err(XPathError::FunctionError {
                function: format!("dbg:{other}"),
                message: "unknown debugger extension function".to_string(),
            }),
        }
    }
}

/// Template entry/exit frame bookkeeping (§3 frame counter, §4.6). Unlike
/// `dbg:break`/`dbg:var`, this is not an XPath extension function: the shared
/// interpreter core (`xdbg-interp`) is not a black box, so it reports
/// template call/return boundaries directly to the session instead of
/// relying on probe-depth heuristics (see DESIGN.md).
pub trait FrameSink: Send + Sync {
    fn on_template_enter(&self);
    fn on_template_exit(&self);
}

/// A variable capture decoded off the modern backend's diagnostic-message
/// channel (§4.4, §6): lines of the form `[DBG] var NAME VALUE`.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedVariable {
    pub name: String,
    pub value: String,
}

/// Parses one line of backend diagnostic output. Returns `None` for lines
/// that are not a variable capture — those are passed through as plain
/// `output` events by the caller.
pub fn decode_diagnostic_line(line: &str) -> Option<DecodedVariable> {
    let mut parts = line.splitn(4, ' ');
    if parts.next()? != "[DBG]" {
        return None;
    }
    if parts.next()? != "var" {
        return None;
    }
    let name = parts.next()?.to_string();
    let value = parts.next().unwrap_or("").to_string();
    Some(DecodedVariable { name, value })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSink {
        breaks: Mutex<Vec<ProbeEvent>>,
        vars: Mutex<Vec<(String, String)>>,
    }

    impl ProbeSink for RecordingSink {
        fn on_break(&self, event: ProbeEvent) {
            self.breaks.lock().unwrap().push(event);
        }
        fn on_variable(&self, name: &str, value: &str) {
            self.vars.lock().unwrap().push((name.to_string(), value.to_string()));
        }
    }

    #[test]
    fn dispatches_break_with_template_label() {
        let sink = RecordingSink::default();
        let ext = ProbeExtensionSink::new(&sink);
        ext.call(
            "break",
            &["12".to_string(), "root".to_string(), "template:main".to_string()],
        )
        .unwrap();
        let breaks = sink.breaks.lock().unwrap();
        assert_eq!(breaks.len(), 1);
        assert_eq!(breaks[0].line, 12);
        assert_eq!(breaks[0].template_label.as_deref(), Some("main"));
    }

    #[test]
    fn dispatches_var() {
        let sink = RecordingSink::default();
        let ext = ProbeExtensionSink::new(&sink);
        ext.call("var", &["itemCount".to_string(), "2".to_string()]).unwrap();
        assert_eq!(sink.vars.lock().unwrap()[0], ("itemCount".to_string(), "2".to_string()));
    }

    #[test]
    fn decodes_variable_capture_line() {
        let decoded = decode_diagnostic_line("[DBG] var itemCount 2").unwrap();
        assert_eq!(decoded.name, "itemCount");
        assert_eq!(decoded.value, "2");
    }

    #[test]
    fn passes_through_non_capture_lines() {
        assert!(decode_diagnostic_line("some other output").is_none());
    }
}
