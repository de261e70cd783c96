//! A line-aware, mutable XML DOM for stylesheets (component A).
//!
//! A SAX pass populates a retained arena (`Vec<NodeData>`, indices as
//! handles) that the instrumentation pass can mutate before handing the
//! tree to a backend.

mod error;
mod parser;
mod writer;

pub use error::DomError;

pub const XSL_NAMESPACE: &str = "http://www.w3.org/1999/XSL/Transform";
pub const DBG_NAMESPACE: &str = "urn:xslt-debugger";
pub const DBG_PREFIX: &str = "dbg";

/// An index into the arena. Stable across insertions (the arena never
/// reallocates existing entries, only appends).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Document,
    Element,
    Text,
    Comment,
    ProcessingInstruction,
}

/// A qualified name: an optional prefix plus a local part.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QName {
    pub prefix: Option<String>,
    pub local: String,
}

impl QName {
    pub fn unprefixed(local: impl Into<String>) -> Self {
        QName {
            prefix: None,
            local: local.into(),
        }
    }

    pub fn prefixed(prefix: impl Into<String>, local: impl Into<String>) -> Self {
        QName {
            prefix: Some(prefix.into()),
            local: local.into(),
        }
    }

    pub fn display(&self) -> String {
        match &self.prefix {
            Some(p) => format!("{p}:{}", self.local),
            None => self.local.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Attribute {
    pub name: QName,
    pub namespace_uri: Option<String>,
    pub value: String,
}

#[derive(Debug, Clone)]
pub struct NodeData {
    pub kind: NodeKind,
    pub name: Option<QName>,
    /// Resolved namespace URI of `name`, if any (elements/PIs in a namespace).
    pub namespace_uri: Option<String>,
    /// `xmlns`/`xmlns:prefix` declarations made directly on this element.
    /// `None` prefix denotes the default namespace.
    pub declared_namespaces: Vec<(Option<String>, String)>,
    pub attributes: Vec<Attribute>,
    /// Text content for `Text`/`Comment` nodes, or data for a PI.
    pub text: String,
    /// 1-based source line of the opening tag (or the node itself, for
    /// text/comment/PI). Synthetic nodes inherit the line of their anchor
    /// per §7: probes must never introduce new line numbers into diagnostics.
    pub line: u32,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
}

impl NodeData {
    fn leaf(kind: NodeKind, text: String, line: u32) -> Self {
        NodeData {
            kind,
            name: None,
            namespace_uri: None,
            declared_namespaces: Vec::new(),
            attributes: Vec::new(),
            text,
            line,
            parent: None,
            children: Vec::new(),
        }
    }
}

pub struct Dom {
    nodes: Vec<NodeData>,
    document: NodeId,
}

impl Dom {
    pub fn parse(source: &str) -> Result<Dom, DomError> {
        parser::parse(source)
    }

    pub fn root_element(&self) -> Option<NodeId> {
        self.get(self.document)
            .children
            .iter()
            .copied()
            .find(|&c| self.get(c).kind == NodeKind::Element)
    }

    pub fn document(&self) -> NodeId {
        self.document
    }

    pub fn get(&self, id: NodeId) -> &NodeData {
        &self.nodes[id.0]
    }

    pub fn get_mut(&mut self, id: NodeId) -> &mut NodeData {
        &mut self.nodes[id.0]
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.get(id).parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.get(id).children
    }

    /// Ancestors of `id`, nearest first, not including `id` itself.
    pub fn ancestors(&self, id: NodeId) -> Vec<NodeId> {
        let mut result = Vec::new();
        let mut current = self.get(id).parent;
        while let Some(a) = current {
            result.push(a);
            current = self.get(a).parent;
        }
        result
    }

    /// All `Element` nodes reachable from the root, in document order.
    pub fn elements_in_document_order(&self) -> Vec<NodeId> {
        let mut result = Vec::new();
        if let Some(root) = self.root_element() {
            self.collect_elements(root, &mut result);
        }
        result
    }

    fn collect_elements(&self, id: NodeId, out: &mut Vec<NodeId>) {
        if self.get(id).kind == NodeKind::Element {
            out.push(id);
        }
        for &child in &self.get(id).children {
            self.collect_elements(child, out);
        }
    }

    pub fn local_name(&self, id: NodeId) -> Option<&str> {
        self.get(id).name.as_ref().map(|n| n.local.as_str())
    }

    /// True iff `id` is an element in the XSLT namespace.
    pub fn is_xsl_element(&self, id: NodeId) -> bool {
        let node = self.get(id);
        node.kind == NodeKind::Element && node.namespace_uri.as_deref() == Some(XSL_NAMESPACE)
    }

    /// True iff `id` is an XSLT element with the given local name, e.g.
    /// `is_xsl(id, "choose")`.
    pub fn is_xsl(&self, id: NodeId, local_name: &str) -> bool {
        self.is_xsl_element(id) && self.local_name(id) == Some(local_name)
    }

    pub fn attribute(&self, id: NodeId, local_name: &str) -> Option<&str> {
        self.get(id)
            .attributes
            .iter()
            .find(|a| a.name.local == local_name)
            .map(|a| a.value.as_str())
    }

    /// Creates a detached element node (not yet attached to the tree). The
    /// caller inserts it with [`insert_first_child`](Self::insert_first_child)
    /// or [`insert_sibling_before`](Self::insert_sibling_before).
    pub fn new_element(
        &mut self,
        name: QName,
        namespace_uri: Option<&str>,
        attributes: Vec<(QName, &str)>,
        line: u32,
    ) -> NodeId {
        let node = NodeData {
            kind: NodeKind::Element,
            name: Some(name),
            namespace_uri: namespace_uri.map(|s| s.to_string()),
            declared_namespaces: Vec::new(),
            attributes: attributes
                .into_iter()
                .map(|(name, value)| Attribute {
                    name,
                    namespace_uri: None,
                    value: value.to_string(),
                })
                .collect(),
            text: String::new(),
            line,
            parent: None,
            children: Vec::new(),
        };
        self.nodes.push(node);
        NodeId(self.nodes.len() - 1)
    }

    pub fn insert_first_child(&mut self, parent: NodeId, child: NodeId) {
        self.get_mut(child).parent = Some(parent);
        self.get_mut(parent).children.insert(0, child);
    }

    pub fn insert_sibling_before(&mut self, anchor: NodeId, new_node: NodeId) {
        let parent = self
            .parent(anchor)
            .expect("insert_sibling_before requires anchor to have a parent");
        self.get_mut(new_node).parent = Some(parent);
        let siblings = &mut self.get_mut(parent).children;
        let pos = siblings
            .iter()
            .position(|&c| c == anchor)
            .expect("anchor must be a child of its own parent");
        siblings.insert(pos, new_node);
    }

    pub fn insert_sibling_after(&mut self, anchor: NodeId, new_node: NodeId) {
        let parent = self
            .parent(anchor)
            .expect("insert_sibling_after requires anchor to have a parent");
        self.get_mut(new_node).parent = Some(parent);
        let siblings = &mut self.get_mut(parent).children;
        let pos = siblings
            .iter()
            .position(|&c| c == anchor)
            .expect("anchor must be a child of its own parent");
        siblings.insert(pos + 1, new_node);
    }

    /// Idempotently ensures an `xmlns:dbg` declaration bound to
    /// [`DBG_NAMESPACE`] exists on the stylesheet root (§4.1).
    pub fn ensure_dbg_namespace(&mut self) {
        let Some(root) = self.root_element() else {
            return;
        };
        let already_declared = self
            .get(root)
            .declared_namespaces
            .iter()
            .any(|(prefix, uri)| prefix.as_deref() == Some(DBG_PREFIX) && uri == DBG_NAMESPACE);
        if !already_declared {
            self.get_mut(root)
                .declared_namespaces
                .push((Some(DBG_PREFIX.to_string()), DBG_NAMESPACE.to_string()));
        }
    }

    pub fn serialize(&self) -> String {
        writer::serialize(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STYLESHEET: &str = r#"<xsl:stylesheet version="1.0" xmlns:xsl="http://www.w3.org/1999/XSL/Transform">
  <xsl:template match="/">
    <out><xsl:value-of select="."/></out>
  </xsl:template>
</xsl:stylesheet>"#;

    #[test]
    fn parses_root_and_resolves_xsl_namespace() {
        let dom = Dom::parse(STYLESHEET).unwrap();
        let root = dom.root_element().unwrap();
        assert_eq!(dom.local_name(root), Some("stylesheet"));
        assert!(dom.is_xsl_element(root));
        assert_eq!(dom.attribute(root, "version"), Some("1.0"));
    }

    #[test]
    fn tracks_line_numbers() {
        let dom = Dom::parse(STYLESHEET).unwrap();
        let template = dom
            .elements_in_document_order()
            .into_iter()
            .find(|&id| dom.is_xsl(id, "template"))
            .unwrap();
        assert_eq!(dom.get(template).line, 2);
    }

    #[test]
    fn ensure_dbg_namespace_is_idempotent() {
        let mut dom = Dom::parse(STYLESHEET).unwrap();
        dom.ensure_dbg_namespace();
        dom.ensure_dbg_namespace();
        let root = dom.root_element().unwrap();
        let count = dom
            .get(root)
            .declared_namespaces
            .iter()
            .filter(|(p, _)| p.as_deref() == Some(DBG_PREFIX))
            .count();
        assert_eq!(count, 1);
    }

    #[test]
    fn serialize_round_trips_structure() {
        let dom = Dom::parse(STYLESHEET).unwrap();
        let out = dom.serialize();
        assert!(out.contains("xsl:template"));
        assert!(out.contains("xsl:value-of"));
    }
}
