//! The instrumentation pass (component C): rewrites a stylesheet DOM in
//! place, inserting probe calls and variable captures per the fragility
//! classifier's decisions.

use crate::classify::{self, Decision};
use crate::error::InstrumentError;
use xdbg_dom::{Dom, NodeId, QName, DBG_NAMESPACE};
use xdbg_types::EngineKind;

#[derive(Debug, Clone, Default)]
pub struct InstrumentReport {
    pub diagnostics: Vec<String>,
    pub probes_inserted: usize,
    pub variables_captured: usize,
}

/// Runs the full pass (§4.3, steps 1-4). Deterministic and order-preserving:
/// two runs over the same DOM produce identical output (idempotency is
/// achieved by marking every inserted node with a `dbg:*` attribute that the
/// classifier recognizes and skips on a later pass).
pub fn instrument(dom: &mut Dom, engine: EngineKind) -> Result<InstrumentReport, InstrumentError> {
    let root = dom.root_element().ok_or(InstrumentError::NoRootElement)?;

    if engine == EngineKind::Legacy {
        if let Some(version) = dom.attribute(root, "version") {
            if version == "2.0" || version == "3.0" {
                return Err(InstrumentError::UnsupportedVersionForLegacy(version.to_string()));
            }
        }
    }

    // Step 1.
    dom.ensure_dbg_namespace();

    let mut report = InstrumentReport::default();

    // Snapshot element ids before any mutation so inserted probes are never
    // themselves revisited within this same pass.
    let elements = dom.elements_in_document_order();

    // Step 2: ordinary probe-call instrumentation.
    for &id in &elements {
        match classify::classify(dom, id) {
            Decision::Skip => continue,
            decision => {
                insert_probe(dom, id, decision, None);
                report.probes_inserted += 1;
            }
        }
    }

    // Step 3: variable/param value captures.
    for &id in &elements {
        let is_var_decl = dom.is_xsl(id, "variable") || dom.is_xsl(id, "param");
        if !is_var_decl {
            continue;
        }
        let Some(name) = dom.attribute(id, "name").map(|s| s.to_string()) else {
            continue;
        };
        if already_captured(dom, id) {
            continue;
        }
        if !classify::is_safe_to_instrument_variable(dom, id) {
            report
                .diagnostics
                .push(format!("Skipped unsafe instrumentation: ${name}"));
            continue;
        }
        insert_variable_capture(dom, id, &name, engine);
        report.variables_captured += 1;
    }

    // Step 4: template-entry markers.
    for &id in &elements {
        if !dom.is_xsl(id, "template") {
            continue;
        }
        if classify::already_instrumented_first_child(dom, id) {
            continue;
        }
        let label = dom
            .attribute(id, "match")
            .or_else(|| dom.attribute(id, "name"))
            .unwrap_or("")
            .to_string();
        insert_probe(dom, id, Decision::InstrumentFirstChild, Some(&label));
    }

    Ok(report)
}

fn xpath_string_literal(s: &str) -> String {
    if s.contains('\'') {
        format!("\"{}\"", s.replace('"', "&quot;"))
    } else {
        format!("'{s}'")
    }
}

/// Inserts `<xsl:value-of select="dbg:break(L, ., LABEL?)"/>` next to
/// (or as first child of) `anchor`, marked with `dbg:probe` so a later pass
/// recognizes and skips it.
fn insert_probe(dom: &mut Dom, anchor: NodeId, decision: Decision, label: Option<&str>) {
    let line = dom.get(anchor).line;
    let select = match label {
        Some(l) => format!("dbg:break({line}, ., {})", xpath_string_literal(&format!("template:{l}"))),
        None => format!("dbg:break({line}, .)"),
    };
    let node = dom.new_element(
        QName::prefixed("xsl", "value-of"),
        Some(xdbg_dom::XSL_NAMESPACE),
        vec![
            (QName::unprefixed("select"), select.as_str()),
            (QName::prefixed("dbg", "probe"), "1"),
        ],
        line,
    );
    mark_namespace(dom, node, "probe", DBG_NAMESPACE);
    match decision {
        Decision::InstrumentFirstChild => dom.insert_first_child(anchor, node),
        Decision::InstrumentSibling => dom.insert_sibling_before(anchor, node),
        Decision::Skip => unreachable!("insert_probe called with Skip decision"),
    }
}

/// Inserts a variable-capture instruction immediately after `decl`. The
/// modern backend captures via its native diagnostic-message channel
/// (`xsl:message` with a `select` sequence, a 2.0/3.0-only content-model
/// feature); the legacy backend falls back to the `dbg:var` extension
/// function, since XSLT 1.0 `xsl:message` has no `select` attribute.
fn insert_variable_capture(dom: &mut Dom, decl: NodeId, name: &str, engine: EngineKind) {
    let line = dom.get(decl).line;
    let node = match engine {
        EngineKind::Modern => {
            let select = format!("('[DBG]', 'var', '{name}', string(${name}))");
            dom.new_element(
                QName::prefixed("xsl", "message"),
                Some(xdbg_dom::XSL_NAMESPACE),
                vec![
                    (QName::unprefixed("select"), select.as_str()),
                    (QName::prefixed("dbg", "capture"), "1"),
                ],
                line,
            )
        }
        EngineKind::Legacy => {
            let select = format!("dbg:var('{name}', string(${name}))");
            dom.new_element(
                QName::prefixed("xsl", "value-of"),
                Some(xdbg_dom::XSL_NAMESPACE),
                vec![
                    (QName::unprefixed("select"), select.as_str()),
                    (QName::prefixed("dbg", "capture"), "1"),
                ],
                line,
            )
        }
    };
    mark_namespace(dom, node, "capture", DBG_NAMESPACE);
    dom.insert_sibling_after(decl, node);
}

fn mark_namespace(dom: &mut Dom, node: NodeId, attr_local: &str, ns: &str) {
    if let Some(attr) = dom
        .get_mut(node)
        .attributes
        .iter_mut()
        .find(|a| a.name.local == attr_local && a.name.prefix.as_deref() == Some("dbg"))
    {
        attr.namespace_uri = Some(ns.to_string());
    }
}

fn already_captured(dom: &Dom, decl: NodeId) -> bool {
    let Some(parent) = dom.parent(decl) else {
        return false;
    };
    let siblings = dom.children(parent);
    let Some(pos) = siblings.iter().position(|&c| c == decl) else {
        return false;
    };
    siblings
        .get(pos + 1)
        .is_some_and(|&next| classify::already_instrumented(dom, next))
}
