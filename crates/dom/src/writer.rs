//! Recursive serializer back to XSLT source text — the only interface the
//! underlying XSLT processor is defined to accept (§4.1, §4.8).

use crate::{Dom, NodeId, NodeKind};

pub fn serialize(dom: &Dom) -> String {
    let mut out = String::new();
    for &child in dom.children(dom.document()) {
        write_node(dom, child, &mut out);
    }
    out
}

fn write_node(dom: &Dom, id: NodeId, out: &mut String) {
    let node = dom.get(id);
    match node.kind {
        NodeKind::Document => {}
        NodeKind::Text => out.push_str(&escape_text(&node.text)),
        NodeKind::Comment => {
            out.push_str("<!--");
            out.push_str(&node.text);
            out.push_str("-->");
        }
        NodeKind::ProcessingInstruction => {
            out.push_str("<?");
            out.push_str(&node.text);
            out.push_str("?>");
        }
        NodeKind::Element => {
            let name = node.name.as_ref().expect("element must have a name");
            out.push('<');
            out.push_str(&name.display());
            for (prefix, uri) in &node.declared_namespaces {
                out.push(' ');
                match prefix {
                    Some(p) => out.push_str(&format!("xmlns:{p}=\"{uri}\"")),
                    None => out.push_str(&format!("xmlns=\"{uri}\"")),
                }
            }
            for attr in &node.attributes {
                out.push(' ');
                out.push_str(&attr.name.display());
                out.push_str("=\"");
                out.push_str(&escape_attr(&attr.value));
                out.push('"');
            }
            if node.children.is_empty() {
                out.push_str("/>");
            } else {
                out.push('>');
                for &child in &node.children {
                    write_node(dom, child, out);
                }
                out.push_str("</");
                out.push_str(&name.display());
                out.push('>');
            }
        }
    }
}

fn escape_text(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

fn escape_attr(s: &str) -> String {
    escape_text(s).replace('"', "&quot;")
}
