//! The fragility classifier (component B): decides, for a given DOM node,
//! whether a probe may be inserted and how.

use xdbg_dom::{Dom, NodeId};

/// Local names of top-level XSLT declarations that never execute, hence
/// are never instrumented directly (§4.2 rule 1). `function` is included
/// per §9: instrumenting function bodies is an open growth point, not part
/// of the base design.
const ALWAYS_SKIP: &[&str] = &[
    "stylesheet",
    "transform",
    "output",
    "import",
    "include",
    "key",
    "decimal-format",
    "namespace-alias",
    "attribute-set",
    "preserve-space",
    "strip-space",
    "param",
    "variable",
    "with-param",
    "sort",
    "accumulator",
    "character-map",
    "import-schema",
    "function",
];

/// Nearest-XSLT-ancestor names whose content model forbids an inserted
/// element child (§4.2 rule 2).
const FRAGILE_ANCESTORS: &[&str] = &[
    "attribute",
    "comment",
    "processing-instruction",
    "namespace",
    "sort",
    "with-param",
    "function",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    InstrumentSibling,
    InstrumentFirstChild,
    Skip,
}

/// Finds the nearest ancestor that is itself an XSLT element, if any.
fn nearest_xsl_ancestor(dom: &Dom, id: NodeId) -> Option<NodeId> {
    dom.ancestors(id).into_iter().find(|&a| dom.is_xsl_element(a))
}

/// True iff `id` already carries a `dbg:*`-prefixed attribute, meaning a
/// prior instrumentation pass already visited it. This is what makes
/// `instrument(instrument(S)) == instrument(S)` hold (§8): a second pass
/// recognizes and skips everything the first pass inserted or marked.
pub fn already_instrumented(dom: &Dom, id: NodeId) -> bool {
    dom.get(id)
        .attributes
        .iter()
        .any(|a| a.name.prefix.as_deref() == Some("dbg"))
}

/// True iff `template`'s first child is already a probe marker, meaning a
/// prior pass already inserted the template-entry marker.
pub fn already_instrumented_first_child(dom: &Dom, template: NodeId) -> bool {
    dom.children(template)
        .first()
        .is_some_and(|&first| already_instrumented(dom, first))
}

/// Classifies element `id` for probe-call instrumentation (§4.2).
pub fn classify(dom: &Dom, id: NodeId) -> Decision {
    if already_instrumented(dom, id) {
        return Decision::Skip;
    }

    let Some(parent) = dom.parent(id) else {
        return Decision::Skip;
    };

    // Rule 1: always-skip top-level, non-executable declarations.
    if dom.is_xsl_element(id) {
        if let Some(local) = dom.local_name(id) {
            if ALWAYS_SKIP.contains(&local) {
                return Decision::Skip;
            }
        }
    }

    // Rule 2: descendant of a fragile-content-model ancestor.
    if let Some(ancestor) = nearest_xsl_ancestor(dom, id) {
        if let Some(local) = dom.local_name(ancestor) {
            if FRAGILE_ANCESTORS.contains(&local) {
                return Decision::Skip;
            }
        }
    }

    // Rule 3: direct child of `xsl:choose` that is not `when`/`otherwise`.
    if dom.is_xsl(parent, "choose") {
        let local = dom.local_name(id);
        if local != Some("when") && local != Some("otherwise") {
            return Decision::Skip;
        }
    }

    // Rule 4: otherwise instrument. First-child iff parent is the
    // stylesheet root (no executable sibling slot there).
    if Some(parent) == dom.root_element() {
        Decision::InstrumentFirstChild
    } else {
        Decision::InstrumentSibling
    }
}

/// `isSafeToInstrumentVariable` (§4.2): governs variable-value capture,
/// distinct from (and stricter than) ordinary probe placement.
pub fn is_safe_to_instrument_variable(dom: &Dom, id: NodeId) -> bool {
    if already_instrumented(dom, id) {
        return false;
    }

    // (i) no fragile ancestor.
    if let Some(ancestor) = nearest_xsl_ancestor(dom, id) {
        if let Some(local) = dom.local_name(ancestor) {
            if FRAGILE_ANCESTORS.contains(&local) {
                return false;
            }
        }
    }

    // (ii) parent must not itself be one of these (capture is inserted as a
    // sibling immediately after the declaration).
    if let Some(parent) = dom.parent(id) {
        if let Some(local) = dom.local_name(parent) {
            if matches!(
                local,
                "attribute" | "comment" | "processing-instruction" | "namespace" | "sequence"
            ) {
                return false;
            }
        }
    }

    // (iii) inside a function body, only the `select` form (no child
    // content) may be captured.
    let inside_function = dom
        .ancestors(id)
        .into_iter()
        .any(|a| dom.is_xsl(a, "function"));
    if inside_function {
        let has_select = dom.attribute(id, "select").is_some();
        let has_children = !dom.children(id).is_empty();
        if !has_select || has_children {
            return false;
        }
    }

    true
}
