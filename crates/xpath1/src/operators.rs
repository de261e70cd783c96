//! Implements the semantics of XPath 1.0 binary operators over `XPathValue`.

use super::ast::BinaryOperator;
use super::engine::XPathValue;
use crate::datasource::DataSourceNode;
use crate::error::XPathError;

/// Evaluates a binary operator against two already-evaluated operands.
///
/// Node-set comparisons follow the XPath 1.0 rule of "true if any pair of
/// values from the two sides satisfies the comparison"; all other
/// combinations fall back to string, number, or boolean coercion depending
/// on the operator.
pub fn evaluate<'a, N>(
    op: BinaryOperator,
    left: XPathValue<N>,
    right: XPathValue<N>,
) -> Result<XPathValue<N>, XPathError>
where
    N: DataSourceNode<'a> + 'a,
{
    match op {
        BinaryOperator::Or => Ok(XPathValue::Boolean(left.to_bool() || right.to_bool())),
        BinaryOperator::And => Ok(XPathValue::Boolean(left.to_bool() && right.to_bool())),

        BinaryOperator::Equals => Ok(XPathValue::Boolean(compare_equality(&left, &right, true))),
        BinaryOperator::NotEquals => {
            Ok(XPathValue::Boolean(compare_equality(&left, &right, false)))
        }

        BinaryOperator::LessThan => Ok(XPathValue::Boolean(compare_relational(
            &left,
            &right,
            |a, b| a < b,
        ))),
        BinaryOperator::LessThanOrEqual => Ok(XPathValue::Boolean(compare_relational(
            &left,
            &right,
            |a, b| a <= b,
        ))),
        BinaryOperator::GreaterThan => Ok(XPathValue::Boolean(compare_relational(
            &left,
            &right,
            |a, b| a > b,
        ))),
        BinaryOperator::GreaterThanOrEqual => Ok(XPathValue::Boolean(compare_relational(
            &left,
            &right,
            |a, b| a >= b,
        ))),

        BinaryOperator::Plus => Ok(XPathValue::Number(left.to_number() + right.to_number())),
        BinaryOperator::Minus => Ok(XPathValue::Number(left.to_number() - right.to_number())),
        BinaryOperator::Multiply => Ok(XPathValue::Number(left.to_number() * right.to_number())),
        BinaryOperator::Divide => Ok(XPathValue::Number(left.to_number() / right.to_number())),
        BinaryOperator::Modulo => Ok(XPathValue::Number(left.to_number() % right.to_number())),

        BinaryOperator::Union => match (left, right) {
            (XPathValue::NodeSet(mut a), XPathValue::NodeSet(b)) => {
                for node in b {
                    if !a.contains(&node) {
                        a.push(node);
                    }
                }
                Ok(XPathValue::NodeSet(a))
            }
            _ => Err(XPathError::TypeError(
                "union operator requires both operands to be node-sets".to_string(),
            )),
        },
    }
}

/// Implements XPath 1.0 `=` / `!=` semantics, including the node-set
/// existential-comparison rule (4.2 in the spec).
fn compare_equality<'a, N>(left: &XPathValue<N>, right: &XPathValue<N>, want_equal: bool) -> bool
where
    N: DataSourceNode<'a> + 'a,
{
    use XPathValue::*;
    match (left, right) {
        (NodeSet(a), NodeSet(b)) => a.iter().any(|n1| {
            let s1 = n1.string_value();
            b.iter()
                .any(|n2| (s1 == n2.string_value()) == want_equal)
        }),
        (NodeSet(_), Boolean(_)) | (Boolean(_), NodeSet(_)) => {
            (left.to_bool() == right.to_bool()) == want_equal
        }
        (NodeSet(nodes), other) | (other, NodeSet(nodes)) => match other {
            Number(n) => nodes.iter().any(|node| {
                (node.string_value().trim().parse::<f64>().unwrap_or(f64::NAN) == *n) == want_equal
            }),
            String(s) => nodes
                .iter()
                .any(|node| (&node.string_value() == s) == want_equal),
            NodeSet(_) | Boolean(_) => unreachable!(),
        },
        (Boolean(_), _) | (_, Boolean(_)) => (left.to_bool() == right.to_bool()) == want_equal,
        (Number(_), _) | (_, Number(_)) => (left.to_number() == right.to_number()) == want_equal,
        (String(a), String(b)) => (a == b) == want_equal,
    }
}

/// Implements XPath 1.0 `<`, `<=`, `>`, `>=` semantics: both operands are
/// coerced to numbers unless one side is a node-set, in which case the
/// comparison holds if it holds for any member.
fn compare_relational<'a, N>(
    left: &XPathValue<N>,
    right: &XPathValue<N>,
    cmp: impl Fn(f64, f64) -> bool,
) -> bool
where
    N: DataSourceNode<'a> + 'a,
{
    use XPathValue::*;
    match (left, right) {
        (NodeSet(a), NodeSet(b)) => a.iter().any(|n1| {
            let v1 = n1.string_value().trim().parse::<f64>().unwrap_or(f64::NAN);
            b.iter().any(|n2| {
                let v2 = n2.string_value().trim().parse::<f64>().unwrap_or(f64::NAN);
                cmp(v1, v2)
            })
        }),
        (NodeSet(nodes), _) => nodes.iter().any(|node| {
            let v1 = node.string_value().trim().parse::<f64>().unwrap_or(f64::NAN);
            cmp(v1, right.to_number())
        }),
        (_, NodeSet(nodes)) => nodes.iter().any(|node| {
            let v2 = node.string_value().trim().parse::<f64>().unwrap_or(f64::NAN);
            cmp(left.to_number(), v2)
        }),
        _ => cmp(left.to_number(), right.to_number()),
    }
}
