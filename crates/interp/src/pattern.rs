//! XSLT match-pattern parsing and matching. A pattern is a restricted subset
//! of XPath location paths, so this reuses `xdbg_xpath1::parser::node_test`
//! directly instead of introducing a second expression grammar for
//! overlapping syntax.

use crate::error::InterpError;
use nom::IResult;
use nom::branch::alt;
use nom::bytes::complete::tag;
use nom::combinator::map;
use nom::multi::{separated_list0, separated_list1};
use nom::sequence::preceded;
use std::fmt;
use xdbg_xpath1::{DataSourceNode, NodeType, NodeTest, NodeTypeTest};
use xdbg_xpath1::parser as xpath_parser;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MatchAxis {
    Child,
    Attribute,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct MatchStep {
    axis: MatchAxis,
    node_test: NodeTest,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct LocationPathPattern {
    is_absolute: bool,
    steps: Vec<MatchStep>,
}

/// A compiled match pattern, possibly a union of several location paths
/// (`"para|note"`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    paths: Vec<LocationPathPattern>,
    original_text: String,
    /// Default priority derived from the pattern shape, per the XSLT
    /// specificity rules: a plain name test is more specific than a
    /// wildcard or node-type test.
    default_priority: f64,
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.original_text)
    }
}

impl Pattern {
    pub fn matches<'a, N: DataSourceNode<'a>>(&self, node: N, root: N) -> bool {
        self.paths.iter().any(|path| path.matches(node, root))
    }

    pub fn default_priority(&self) -> f64 {
        self.default_priority
    }
}

impl LocationPathPattern {
    fn matches<'a, N: DataSourceNode<'a>>(&self, node: N, root: N) -> bool {
        if self.is_absolute && self.steps.is_empty() {
            return node == root;
        }

        let mut current_node = Some(node);
        for step in self.steps.iter().rev() {
            match current_node {
                Some(cn) if step.matches(cn) => current_node = cn.parent(),
                _ => return false,
            }
        }

        if self.is_absolute {
            current_node == Some(root)
        } else {
            true
        }
    }

    fn priority(&self) -> f64 {
        match self.steps.last() {
            Some(step) => match &step.node_test {
                NodeTest::Name(_) => 0.0,
                NodeTest::Wildcard => -0.5,
                NodeTest::NodeType(_) => -0.5,
            },
            None => 0.5, // `/`
        }
    }
}

impl MatchStep {
    fn matches<'a, N: DataSourceNode<'a>>(&self, node: N) -> bool {
        let node_type = node.node_type();
        let name = node.name();

        match self.axis {
            MatchAxis::Attribute => {
                if node_type != NodeType::Attribute {
                    return false;
                }
            }
            MatchAxis::Child => {
                if node_type != NodeType::Element
                    && node_type != NodeType::Text
                    && node_type != NodeType::Root
                {
                    return false;
                }
            }
        }

        match &self.node_test {
            NodeTest::Wildcard => {
                if self.axis == MatchAxis::Child {
                    node_type == NodeType::Element
                } else {
                    true
                }
            }
            NodeTest::Name(test_name) => name.is_some_and(|q| q.local_part == test_name),
            NodeTest::NodeType(ntt) => match ntt {
                NodeTypeTest::Text => node_type == NodeType::Text,
                NodeTypeTest::Comment => node_type == NodeType::Comment,
                NodeTypeTest::ProcessingInstruction => node_type == NodeType::ProcessingInstruction,
                NodeTypeTest::Node => true,
            },
        }
    }
}

pub fn parse(text: &str) -> Result<Pattern, InterpError> {
    match pattern_parser(text.trim()) {
        Ok(("", paths)) => {
            let default_priority = paths
                .iter()
                .map(|p| p.priority())
                .fold(f64::NEG_INFINITY, f64::max);
            Ok(Pattern {
                paths,
                original_text: text.to_string(),
                default_priority,
            })
        }
        Ok((rem, _)) => Err(InterpError::Compilation {
            line: 0,
            message: format!("unconsumed input in pattern '{text}': {rem}"),
        }),
        Err(e) => Err(InterpError::Compilation {
            line: 0,
            message: format!("pattern parse error in '{text}': {e}"),
        }),
    }
}

fn step_parser(input: &str) -> IResult<&str, MatchStep> {
    let (remaining_input, (node_test, axis)) = alt((
        map(preceded(tag("@"), xpath_parser::node_test), |nt| {
            (nt, MatchAxis::Attribute)
        }),
        map(xpath_parser::node_test, |nt| (nt, MatchAxis::Child)),
    ))(input)?;

    Ok((remaining_input, MatchStep { axis, node_test }))
}

fn path_parser(input: &str) -> IResult<&str, LocationPathPattern> {
    let (remaining, is_absolute) =
        if let Ok((rem, _)) = tag::<&str, &str, nom::error::Error<&str>>("/")(input) {
            (rem, true)
        } else {
            (input, false)
        };

    let (remaining, steps) = if is_absolute {
        separated_list0(tag("/"), step_parser)(remaining)?
    } else {
        separated_list1(tag("/"), step_parser)(remaining)?
    };

    Ok((remaining, LocationPathPattern { is_absolute, steps }))
}

fn pattern_parser(input: &str) -> IResult<&str, Vec<LocationPathPattern>> {
    separated_list1(tag("|"), path_parser)(input)
}
