//! Wraps `roxmltree` as a [`DataSourceNode`]: the XPath and interpreter code
//! are written only against the trait, so the input document's actual
//! representation stays an implementation detail of this one module.

use std::cmp::Ordering;
use std::hash::{Hash, Hasher};
use xdbg_xpath1::{DataSourceNode, NodeType, QName};

/// roxmltree has no first-class attribute node, so this wraps either a real
/// element/text/comment/PI node, or a synthetic attribute reference
/// (owning element + attribute index).
#[derive(Debug, Clone, Copy)]
pub enum XmlNode<'a> {
    Node(roxmltree::Node<'a, 'a>),
    Attr {
        owner: roxmltree::Node<'a, 'a>,
        index: usize,
    },
}

impl<'a> XmlNode<'a> {
    pub fn root(doc: &'a roxmltree::Document<'a>) -> Self {
        XmlNode::Node(doc.root())
    }

    fn identity(&self) -> (roxmltree::NodeId, usize) {
        match self {
            XmlNode::Node(n) => (n.id(), usize::MAX),
            XmlNode::Attr { owner, index } => (owner.id(), *index),
        }
    }
}

impl<'a> PartialEq for XmlNode<'a> {
    fn eq(&self, other: &Self) -> bool {
        self.identity() == other.identity()
    }
}
impl<'a> Eq for XmlNode<'a> {}

impl<'a> PartialOrd for XmlNode<'a> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl<'a> Ord for XmlNode<'a> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.identity().cmp(&other.identity())
    }
}
impl<'a> Hash for XmlNode<'a> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.identity().hash(state);
    }
}

impl<'a> DataSourceNode<'a> for XmlNode<'a> {
    fn node_type(&self) -> NodeType {
        match self {
            XmlNode::Attr { .. } => NodeType::Attribute,
            XmlNode::Node(n) => match n.node_type() {
                roxmltree::NodeType::Root => NodeType::Root,
                roxmltree::NodeType::Element => NodeType::Element,
                roxmltree::NodeType::Text => NodeType::Text,
                roxmltree::NodeType::Comment => NodeType::Comment,
                roxmltree::NodeType::PI => NodeType::ProcessingInstruction,
            },
        }
    }

    fn name(&self) -> Option<QName<'a>> {
        match self {
            XmlNode::Attr { owner, index } => owner
                .attributes()
                .nth(*index)
                .map(|a| unprefixed(a.name())),
            XmlNode::Node(n) if n.is_element() => Some(unprefixed(n.tag_name().name())),
            XmlNode::Node(n) if n.is_pi() => n.pi().map(|pi| unprefixed(pi.target)),
            _ => None,
        }
    }

    fn string_value(&self) -> String {
        match self {
            XmlNode::Attr { owner, index } => owner
                .attributes()
                .nth(*index)
                .map(|a| a.value().to_string())
                .unwrap_or_default(),
            XmlNode::Node(n) => match n.node_type() {
                roxmltree::NodeType::Text | roxmltree::NodeType::Comment => {
                    n.text().unwrap_or_default().to_string()
                }
                roxmltree::NodeType::PI => {
                    n.pi().and_then(|pi| pi.value).unwrap_or_default().to_string()
                }
                _ => n
                    .descendants()
                    .filter(|d| d.is_text())
                    .filter_map(|d| d.text())
                    .collect(),
            },
        }
    }

    fn attributes(&self) -> Box<dyn Iterator<Item = Self> + 'a> {
        match self {
            XmlNode::Node(n) if n.is_element() => {
                let owner = *n;
                let count = n.attributes().len();
                Box::new((0..count).map(move |index| XmlNode::Attr { owner, index }))
            }
            _ => Box::new(std::iter::empty()),
        }
    }

    fn children(&self) -> Box<dyn Iterator<Item = Self> + 'a> {
        match self {
            XmlNode::Node(n) => Box::new(n.children().map(XmlNode::Node)),
            XmlNode::Attr { .. } => Box::new(std::iter::empty()),
        }
    }

    fn parent(&self) -> Option<Self> {
        match self {
            XmlNode::Node(n) => n.parent().map(XmlNode::Node),
            XmlNode::Attr { owner, .. } => Some(XmlNode::Node(*owner)),
        }
    }
}

fn unprefixed(local: &str) -> QName<'_> {
    QName {
        prefix: None,
        local_part: local,
    }
}
