//! A "dumb" XML driver that reads stylesheet source and builds the retained
//! [`Dom`] arena via a streaming SAX pass; the builder populates a mutable
//! tree instead of compiling straight to an AST.

use crate::error::DomError;
use crate::{Attribute, Dom, NodeData, NodeId, NodeKind, QName};
use quick_xml::events::Event as XmlEvent;
use quick_xml::name::ResolveResult;
use quick_xml::reader::NsReader;

/// Byte-offset -> line-number lookup, built once per document.
struct LineIndex {
    /// Byte offset of the start of each line (line 0 starts at offset 0).
    line_starts: Vec<usize>,
}

impl LineIndex {
    fn new(source: &str) -> Self {
        let mut line_starts = vec![0];
        for (i, b) in source.bytes().enumerate() {
            if b == b'\n' {
                line_starts.push(i + 1);
            }
        }
        LineIndex { line_starts }
    }

    /// 1-based line number containing byte offset `pos`.
    fn line_at(&self, pos: usize) -> u32 {
        match self.line_starts.binary_search(&pos) {
            Ok(idx) => idx as u32 + 1,
            Err(idx) => idx as u32, // idx-1 is the containing line (0-based) -> +1 for 1-based
        }
    }
}

pub fn parse(source: &str) -> Result<Dom, DomError> {
    let lines = LineIndex::new(source);
    let mut reader = NsReader::from_str(source);
    reader.config_mut().trim_text(false);

    let document = NodeData {
        kind: NodeKind::Document,
        name: None,
        namespace_uri: None,
        declared_namespaces: Vec::new(),
        attributes: Vec::new(),
        text: String::new(),
        line: 1,
        parent: None,
        children: Vec::new(),
    };
    let mut dom = Dom {
        nodes: vec![document],
        document: NodeId(0),
    };

    let mut stack: Vec<NodeId> = vec![dom.document];
    let mut buf = Vec::new();

    loop {
        let pos = reader.buffer_position() as usize;
        let line = lines.line_at(pos);
        let (resolved, event) = reader
            .read_resolved_event_into(&mut buf)
            .map_err(|source| DomError::QuickXml { pos, source })?;

        match event {
            XmlEvent::Start(e) => {
                let node = build_element(&reader, &e, resolved, line)?;
                let id = push_child(&mut dom, *stack.last().unwrap(), node);
                stack.push(id);
            }
            XmlEvent::Empty(e) => {
                let node = build_element(&reader, &e, resolved, line)?;
                push_child(&mut dom, *stack.last().unwrap(), node);
            }
            XmlEvent::End(e) => {
                let closing = stack.pop().ok_or_else(|| DomError::UnbalancedEndTag {
                    name: String::from_utf8_lossy(e.name().as_ref()).into_owned(),
                    line,
                })?;
                debug_assert!(dom.get(closing).kind == NodeKind::Element);
            }
            XmlEvent::Text(e) => {
                let raw = e.unescape().map_err(|source| DomError::QuickXml { pos, source })?;
                let node = NodeData::leaf(NodeKind::Text, raw.into_owned(), line);
                push_child(&mut dom, *stack.last().unwrap(), node);
            }
            XmlEvent::Comment(e) => {
                let text = std::str::from_utf8(e.as_ref())?.to_string();
                let node = NodeData::leaf(NodeKind::Comment, text, line);
                push_child(&mut dom, *stack.last().unwrap(), node);
            }
            XmlEvent::PI(e) => {
                let text = std::str::from_utf8(e.as_ref())?.to_string();
                let mut node = NodeData::leaf(NodeKind::ProcessingInstruction, text, line);
                node.kind = NodeKind::ProcessingInstruction;
                push_child(&mut dom, *stack.last().unwrap(), node);
            }
            XmlEvent::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    if dom.root_element().is_none() {
        return Err(DomError::EmptyDocument);
    }

    Ok(dom)
}

fn push_child(dom: &mut Dom, parent: NodeId, mut node: NodeData) -> NodeId {
    node.parent = Some(parent);
    dom.nodes.push(node);
    let id = NodeId(dom.nodes.len() - 1);
    dom.nodes[parent.0].children.push(id);
    id
}

fn build_element(
    reader: &NsReader<&[u8]>,
    e: &quick_xml::events::BytesStart,
    resolved: ResolveResult,
    line: u32,
) -> Result<NodeData, DomError> {
    let (prefix, local) = split_qname(e.name().as_ref());
    let namespace_uri = match resolved {
        ResolveResult::Bound(ns) => Some(String::from_utf8_lossy(ns.as_ref()).into_owned()),
        _ => None,
    };

    let mut declared_namespaces = Vec::new();
    let mut attributes = Vec::new();

    for attr in e.attributes() {
        let attr = attr.map_err(|err| DomError::Attribute {
            line,
            message: err.to_string(),
        })?;
        let key = attr.key.as_ref();
        let value = attr
            .decode_and_unescape_value(reader.decoder())
            .map_err(|err| DomError::Attribute {
                line,
                message: err.to_string(),
            })?
            .into_owned();

        if key == b"xmlns" {
            declared_namespaces.push((None, value));
            continue;
        }
        if let Some(stripped) = key.strip_prefix(b"xmlns:") {
            declared_namespaces.push((Some(String::from_utf8_lossy(stripped).into_owned()), value));
            continue;
        }

        let (a_prefix, a_local) = split_qname(key);
        let (a_resolved, _) = reader.resolve_attribute(attr.key);
        let a_namespace = match a_resolved {
            ResolveResult::Bound(ns) => Some(String::from_utf8_lossy(ns.as_ref()).into_owned()),
            _ => None,
        };
        attributes.push(Attribute {
            name: QName {
                prefix: a_prefix,
                local: a_local,
            },
            namespace_uri: a_namespace,
            value,
        });
    }

    Ok(NodeData {
        kind: NodeKind::Element,
        name: Some(QName {
            prefix,
            local,
        }),
        namespace_uri,
        declared_namespaces,
        attributes,
        text: String::new(),
        line,
        parent: None,
        children: Vec::new(),
    })
}

fn split_qname(raw: &[u8]) -> (Option<String>, String) {
    let s = String::from_utf8_lossy(raw);
    match s.split_once(':') {
        Some((prefix, local)) => (Some(prefix.to_string()), local.to_string()),
        None => (None, s.into_owned()),
    }
}
