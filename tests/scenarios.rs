//! Cross-crate scenario tests (§8 Concrete Scenarios): each test drives a
//! full `DebugSession` over a small inline stylesheet/input pair and asserts
//! on the event stream and the written output file.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{mpsc, Arc};
use std::time::Duration;

use xdbg::{DebugSession, Event, StartOptions};
use xdbg_types::{EngineKind, LogLevel, StopReason};

static COUNTER: AtomicU32 = AtomicU32::new(0);

fn write_temp(name: &str, content: &str) -> PathBuf {
    let n = COUNTER.fetch_add(1, Ordering::SeqCst);
    let mut path = std::env::temp_dir();
    path.push(format!("xdbg-scenario-{}-{n}-{name}", std::process::id()));
    std::fs::write(&path, content).unwrap();
    path
}

fn cleanup(paths: &[PathBuf]) {
    for path in paths {
        let _ = std::fs::remove_file(path);
    }
}

/// Starts a session over an inline stylesheet/input pair, returning the
/// session plus every path involved and a receiver for the event stream.
fn start_session(
    stylesheet: &str,
    input: &str,
    stop_on_entry: bool,
    engine: EngineKind,
) -> (Arc<DebugSession>, PathBuf, PathBuf, PathBuf, mpsc::Receiver<Event>) {
    let stylesheet_path = write_temp("stylesheet.xsl", stylesheet);
    let input_path = write_temp("input.xml", input);
    let output_path = stylesheet_path.with_extension("out.xml");
    let (tx, rx) = mpsc::channel();

    let session = Arc::new(DebugSession::new());
    session
        .start(
            StartOptions {
                stylesheet_path: stylesheet_path.to_string_lossy().into_owned(),
                input_path: input_path.to_string_lossy().into_owned(),
                output_path: Some(output_path.to_string_lossy().into_owned()),
                engine,
                stop_on_entry,
                log_level: LogLevel::None,
            },
            move |event| {
                let _ = tx.send(event);
            },
        )
        .unwrap();

    (session, stylesheet_path, input_path, output_path, rx)
}

fn recv(rx: &mpsc::Receiver<Event>) -> Event {
    rx.recv_timeout(Duration::from_secs(5)).expect("event before timeout")
}

/// Scenario 1: stopping on entry and stepping in repeatedly through nested
/// templates must produce at least two pauses before a clean exit.
#[test]
fn simple_nested_templates_step_in_sequence() {
    let stylesheet = r#"<xsl:stylesheet version="1.0" xmlns:xsl="http://www.w3.org/1999/XSL/Transform">
  <xsl:template match="/">
    <out><xsl:apply-templates select="root/item"/></out>
  </xsl:template>
  <xsl:template match="item">
    <leaf><xsl:value-of select="@id"/></leaf>
  </xsl:template>
</xsl:stylesheet>"#;
    let input = r#"<root><item id="1"/><item id="2"/></root>"#;

    let (session, stylesheet_path, input_path, output_path, rx) =
        start_session(stylesheet, input, true, EngineKind::Legacy);

    let mut stopped_count = 0;
    let mut exit_code = None;
    for _ in 0..200 {
        match recv(&rx) {
            Event::Stopped { .. } => {
                stopped_count += 1;
                session.step_in().unwrap();
            }
            Event::Terminated { exit_code: code } => {
                exit_code = Some(code);
                break;
            }
            _ => {}
        }
    }
    session.join();

    assert!(stopped_count >= 2, "expected at least two template-entry pauses, got {stopped_count}");
    assert_eq!(exit_code, Some(0));

    cleanup(&[stylesheet_path, input_path, output_path]);
}

/// Scenario 2: a captured variable's value is visible in the variable
/// store after the declaration executes.
#[test]
fn variable_capture_reports_item_count() {
    let stylesheet = r#"<xsl:stylesheet version="1.0" xmlns:xsl="http://www.w3.org/1999/XSL/Transform">
  <xsl:template match="/">
    <xsl:variable name="itemCount" select="count(/items/item)"/>
    <out><xsl:value-of select="$itemCount"/></out>
  </xsl:template>
</xsl:stylesheet>"#;
    let input = r#"<items><item/><item/></items>"#;

    let (session, stylesheet_path, input_path, output_path, rx) =
        start_session(stylesheet, input, false, EngineKind::Legacy);

    let mut captured = None;
    loop {
        match recv(&rx) {
            Event::VariableCaptured { name, value } if name == "itemCount" => captured = Some(value),
            Event::Terminated { exit_code } => {
                assert_eq!(exit_code, 0);
                break;
            }
            _ => {}
        }
    }
    session.join();

    assert_eq!(captured.as_deref(), Some("2"));
    let output = std::fs::read_to_string(&output_path).unwrap();
    assert!(output.contains('2'));

    cleanup(&[stylesheet_path, input_path, output_path]);
}

/// Scenario 3: a variable declared directly inside `xsl:attribute` is
/// refused instrumentation with a diagnostic, while an unrelated safe
/// variable is still captured.
#[test]
fn unsafe_variable_in_attribute_is_skipped_but_safe_ones_are_captured() {
    let stylesheet = r#"<xsl:stylesheet version="1.0" xmlns:xsl="http://www.w3.org/1999/XSL/Transform">
  <xsl:template match="/">
    <xsl:variable name="safeVar" select="'ok'"/>
    <out>
      <xsl:attribute name="id">
        <xsl:variable name="unsafe1" select="/root/@id"/>
        <xsl:value-of select="/root/@id"/>
      </xsl:attribute>
    </out>
  </xsl:template>
</xsl:stylesheet>"#;
    let input = r#"<root id="5"/>"#;

    let (session, stylesheet_path, input_path, output_path, rx) =
        start_session(stylesheet, input, false, EngineKind::Legacy);

    let mut safe_captured = None;
    let mut skip_diagnostic_seen = false;
    loop {
        match recv(&rx) {
            Event::VariableCaptured { name, value } if name == "safeVar" => safe_captured = Some(value),
            Event::Output { text } if text.contains("Skipped unsafe instrumentation: $unsafe1") => {
                skip_diagnostic_seen = true;
            }
            Event::Terminated { exit_code } => {
                assert_eq!(exit_code, 0);
                break;
            }
            _ => {}
        }
    }
    session.join();

    assert_eq!(safe_captured.as_deref(), Some("ok"));
    assert!(skip_diagnostic_seen, "expected the unsafe-instrumentation diagnostic");

    let output = std::fs::read_to_string(&output_path).unwrap();
    assert_eq!(output, r#"<out id="5"/>"#);
    assert!(!output.contains("dbg"));

    cleanup(&[stylesheet_path, input_path, output_path]);
}

/// Scenario 4: a breakpoint inside a `for-each` body fires once per
/// iteration, always at the same line and the same (loop-baseline) frame.
#[test]
fn breakpoint_inside_for_each_fires_once_per_iteration_at_consistent_frame() {
    let stylesheet = r#"<xsl:stylesheet version="1.0" xmlns:xsl="http://www.w3.org/1999/XSL/Transform">
  <xsl:template match="/">
    <xsl:for-each select="items/item">
      <leaf>
        <xsl:value-of select="@id"/>
      </leaf>
    </xsl:for-each>
  </xsl:template>
</xsl:stylesheet>"#;
    let input = r#"<items><item id="1"/><item id="2"/><item id="3"/></items>"#;

    let (session, stylesheet_path, input_path, output_path, rx) =
        start_session(stylesheet, input, true, EngineKind::Legacy);

    // The entry stop arrives before any breakpoint can race ahead of the
    // table being populated.
    match recv(&rx) {
        Event::Stopped { reason: StopReason::Entry, .. } => {}
        other => panic!("expected the entry stop first, got {other:?}"),
    }
    session
        .set_breakpoints(&stylesheet_path.to_string_lossy(), vec![4])
        .unwrap();
    session.continue_().unwrap();

    let mut hits = Vec::new();
    loop {
        match recv(&rx) {
            Event::Stopped { reason: StopReason::Breakpoint, line, frame, .. } => {
                hits.push((line, frame));
                session.continue_().unwrap();
            }
            Event::Terminated { exit_code } => {
                assert_eq!(exit_code, 0);
                break;
            }
            _ => {}
        }
    }
    session.join();

    assert_eq!(hits.len(), 3, "expected exactly three breakpoint hits, got {hits:?}");
    assert!(hits.iter().all(|&(line, _)| line == 4));
    let baseline = hits[0].1;
    assert!(hits.iter().all(|&(_, frame)| frame == baseline), "frame should stay constant across iterations: {hits:?}");

    cleanup(&[stylesheet_path, input_path, output_path]);
}

/// Scenario 5: a stylesheet that fails to compile reports exit code 1 with
/// a diagnostic naming the original source line, and never writes output.
#[test]
fn stylesheet_syntax_error_reports_compilation_failure() {
    let stylesheet = r#"<xsl:stylesheet version="1.0" xmlns:xsl="http://www.w3.org/1999/XSL/Transform">
  <xsl:template match="/"><xsl:value-of/></xsl:template>
</xsl:stylesheet>"#;
    let input = "<root/>";

    let (session, stylesheet_path, input_path, output_path, rx) =
        start_session(stylesheet, input, false, EngineKind::Legacy);

    let mut saw_compilation_error = false;
    let mut exit_code = None;
    loop {
        match recv(&rx) {
            Event::Output { text } if text.contains("compilation error") => saw_compilation_error = true,
            Event::Terminated { exit_code: code } => {
                exit_code = Some(code);
                break;
            }
            _ => {}
        }
    }
    session.join();

    assert!(saw_compilation_error);
    assert_eq!(exit_code, Some(1));
    assert!(!output_path.exists(), "no output should be written on a failed compile");

    cleanup(&[stylesheet_path, input_path]);
}

/// Scenario 6: instrumenting a stylesheet that builds an attribute's value
/// via `xsl:attribute`/`xsl:value-of` must never insert anything inside the
/// attribute, and the rendered attribute value must be untouched.
#[test]
fn attribute_content_is_preserved_exactly_and_never_instrumented() {
    let stylesheet = r#"<xsl:stylesheet version="1.0" xmlns:xsl="http://www.w3.org/1999/XSL/Transform">
  <xsl:template match="/">
    <out>
      <xsl:attribute name="id"><xsl:value-of select="/root/@id"/></xsl:attribute>
    </out>
  </xsl:template>
</xsl:stylesheet>"#;
    let input = r#"<root id="99"/>"#;

    let (session, stylesheet_path, input_path, output_path, rx) =
        start_session(stylesheet, input, false, EngineKind::Modern);

    loop {
        if let Event::Terminated { exit_code } = recv(&rx) {
            assert_eq!(exit_code, 0);
            break;
        }
    }
    session.join();

    let output = std::fs::read_to_string(&output_path).unwrap();
    assert_eq!(output, r#"<out id="99"/>"#);

    cleanup(&[stylesheet_path, input_path, output_path]);
}

/// Universal property: the instrumentation pass never changes what the
/// stylesheet produces (§3 invariant 1), checked by running the same
/// stylesheet through the interpreter core with and without instrumentation.
#[test]
fn instrumented_transform_output_matches_uninstrumented_transform() {
    let source = r#"<xsl:stylesheet version="1.0" xmlns:xsl="http://www.w3.org/1999/XSL/Transform">
  <xsl:template match="/">
    <out><xsl:value-of select="/root/@id"/></out>
  </xsl:template>
</xsl:stylesheet>"#;
    let input = r#"<root id="7"/>"#;

    let plain_dom = xdbg_dom::Dom::parse(source).unwrap();
    let plain_output = run_plain(&plain_dom, input, EngineKind::Legacy);

    let mut instrumented_dom = xdbg_dom::Dom::parse(source).unwrap();
    xdbg_instrument::instrument(&mut instrumented_dom, EngineKind::Legacy).unwrap();
    let instrumented_output = run_plain(&instrumented_dom, input, EngineKind::Legacy);

    assert_eq!(plain_output, instrumented_output);
}

/// Universal property: a second instrumentation pass is a complete no-op
/// on the already-instrumented DOM's serialized form.
#[test]
fn instrumenting_twice_is_idempotent() {
    let source = r#"<xsl:stylesheet version="1.0" xmlns:xsl="http://www.w3.org/1999/XSL/Transform">
  <xsl:template match="/">
    <xsl:variable name="n" select="1"/>
    <out><xsl:value-of select="$n"/></out>
  </xsl:template>
</xsl:stylesheet>"#;
    let mut dom = xdbg_dom::Dom::parse(source).unwrap();
    xdbg_instrument::instrument(&mut dom, EngineKind::Modern).unwrap();
    let first_pass = dom.serialize();
    xdbg_instrument::instrument(&mut dom, EngineKind::Modern).unwrap();
    assert_eq!(dom.serialize(), first_pass);
}

fn run_plain(dom: &xdbg_dom::Dom, input: &str, engine: EngineKind) -> String {
    let stylesheet = xdbg_interp::compile_stylesheet(dom, engine).unwrap();
    let input_doc = roxmltree::Document::parse(input).unwrap();
    let root = xdbg_interp::XmlNode::root(&input_doc);
    let mut executor = xdbg_interp::Executor::new(&stylesheet, root, None, None, false).unwrap();
    let mut builder = xdbg_interp::XmlStringBuilder::new();
    executor.run(&mut builder).unwrap();
    builder.into_string()
}
