//! Compiles a (typically already-instrumented) stylesheet [`Dom`] into the
//! executable [`ast::Stylesheet`], one handler per element kind. Walks an
//! already-materialized `xdbg_dom::Dom` — the same tree the instrumentation
//! pass just rewrote — so there is no separate streaming builder state
//! machine to maintain.

use crate::ast::{Instruction, Param, PreparsedTemplate, Stylesheet, Template, When, WithParam};
use crate::error::InterpError;
use xdbg_dom::{Dom, NodeId, NodeKind};
use xdbg_types::EngineKind;
use xdbg_xpath1::{parse_expression, Expression};

pub fn compile_stylesheet(dom: &Dom, engine: EngineKind) -> Result<Stylesheet, InterpError> {
    let root = dom.root_element().ok_or(InterpError::Compilation {
        line: 0,
        message: "stylesheet has no root element".to_string(),
    })?;

    let mut stylesheet = Stylesheet::default();
    for &child in dom.children(root) {
        if dom.is_xsl(child, "template") {
            let template = compile_template(dom, child, engine)?;
            match &template.name {
                Some(name) => {
                    stylesheet.named_templates.insert(name.clone(), template);
                }
                None => stylesheet.matched_templates.push(template),
            }
        }
        // Other top-level declarations (xsl:output, xsl:key, ...) fall
        // outside the instruction subset of §4.8.1 and are ignored.
    }
    Ok(stylesheet)
}

fn required_attr(dom: &Dom, id: NodeId, name: &str, tag: &str) -> Result<String, InterpError> {
    dom.attribute(id, name)
        .map(str::to_string)
        .ok_or_else(|| InterpError::Compilation {
            line: dom.get(id).line,
            message: format!("<{tag}> is missing required attribute '{name}'"),
        })
}

fn parse_xpath(dom: &Dom, id: NodeId, expr: &str) -> Result<Expression, InterpError> {
    parse_expression(expr).map_err(|e| InterpError::Compilation {
        line: dom.get(id).line,
        message: format!("XPath parse error in '{expr}': {e}"),
    })
}

fn compile_template(dom: &Dom, id: NodeId, engine: EngineKind) -> Result<Template, InterpError> {
    let match_pattern = dom.attribute(id, "match").map(str::to_string);
    let name = dom.attribute(id, "name").map(str::to_string);
    let mode = dom.attribute(id, "mode").map(str::to_string);
    let priority = dom.attribute(id, "priority").and_then(|s| s.parse().ok());

    let mut params = Vec::new();
    let mut body_children = Vec::new();
    for &child in dom.children(id) {
        if dom.is_xsl(child, "param") {
            params.push(compile_param(dom, child)?);
        } else {
            body_children.push(child);
        }
    }

    Ok(Template {
        match_pattern,
        name,
        mode,
        priority,
        params,
        body: compile_body(dom, &body_children, engine)?,
    })
}

fn compile_param(dom: &Dom, id: NodeId) -> Result<Param, InterpError> {
    let name = required_attr(dom, id, "name", "xsl:param")?;
    let default_value = dom
        .attribute(id, "select")
        .map(|s| parse_xpath(dom, id, s))
        .transpose()?;
    Ok(Param { name, default_value })
}

fn compile_with_param(dom: &Dom, id: NodeId) -> Result<WithParam, InterpError> {
    let name = required_attr(dom, id, "name", "xsl:with-param")?;
    let select = required_attr(dom, id, "select", "xsl:with-param")?;
    Ok(WithParam {
        name,
        select: parse_xpath(dom, id, &select)?,
    })
}

fn compile_body(dom: &Dom, children: &[NodeId], engine: EngineKind) -> Result<PreparsedTemplate, InterpError> {
    let mut instructions = Vec::new();
    for &id in children {
        if let Some(instr) = compile_node(dom, id, engine)? {
            instructions.push(instr);
        }
    }
    Ok(PreparsedTemplate(instructions))
}

fn compile_node(dom: &Dom, id: NodeId, engine: EngineKind) -> Result<Option<Instruction>, InterpError> {
    match dom.get(id).kind {
        NodeKind::Comment | NodeKind::ProcessingInstruction | NodeKind::Document => Ok(None),
        NodeKind::Text => {
            let text = &dom.get(id).text;
            if text.trim().is_empty() {
                Ok(None)
            } else {
                Ok(Some(Instruction::Text(text.clone())))
            }
        }
        NodeKind::Element => {
            if dom.is_xsl_element(id) {
                compile_xsl_instruction(dom, id, engine)
            } else {
                compile_literal_element(dom, id, engine).map(Some)
            }
        }
    }
}

fn compile_literal_element(dom: &Dom, id: NodeId, engine: EngineKind) -> Result<Instruction, InterpError> {
    let node = dom.get(id);
    let name = node.name.as_ref().map(|n| n.display()).unwrap_or_default();
    let attrs = node
        .attributes
        .iter()
        .map(|a| (a.name.display(), a.value.clone()))
        .collect();
    Ok(Instruction::ContentTag {
        name,
        attrs,
        body: compile_body(dom, dom.children(id), engine)?,
    })
}

fn compile_xsl_instruction(dom: &Dom, id: NodeId, engine: EngineKind) -> Result<Option<Instruction>, InterpError> {
    let local = dom.local_name(id).unwrap_or_default().to_string();
    match local.as_str() {
        "value-of" => {
            let select = required_attr(dom, id, "select", "xsl:value-of")?;
            Ok(Some(Instruction::ValueOf {
                select: parse_xpath(dom, id, &select)?,
            }))
        }
        "variable" => {
            let name = required_attr(dom, id, "name", "xsl:variable")?;
            let select = required_attr(dom, id, "select", "xsl:variable")?;
            Ok(Some(Instruction::Variable {
                name,
                select: parse_xpath(dom, id, &select)?,
            }))
        }
        "apply-templates" => {
            let select = dom
                .attribute(id, "select")
                .map(|s| parse_xpath(dom, id, s))
                .transpose()?;
            let mode = dom.attribute(id, "mode").map(str::to_string);
            Ok(Some(Instruction::ApplyTemplates { select, mode }))
        }
        "call-template" => {
            let name = required_attr(dom, id, "name", "xsl:call-template")?;
            let mut params = Vec::new();
            for &child in dom.children(id) {
                if dom.is_xsl(child, "with-param") {
                    params.push(compile_with_param(dom, child)?);
                }
            }
            Ok(Some(Instruction::CallTemplate { name, params }))
        }
        "for-each" => {
            let select = required_attr(dom, id, "select", "xsl:for-each")?;
            let body_children: Vec<NodeId> = dom
                .children(id)
                .iter()
                .copied()
                .filter(|&c| !dom.is_xsl(c, "sort"))
                .collect();
            Ok(Some(Instruction::ForEach {
                select: parse_xpath(dom, id, &select)?,
                body: compile_body(dom, &body_children, engine)?,
            }))
        }
        "if" => {
            let test = required_attr(dom, id, "test", "xsl:if")?;
            Ok(Some(Instruction::If {
                test: parse_xpath(dom, id, &test)?,
                body: compile_body(dom, dom.children(id), engine)?,
            }))
        }
        "choose" => {
            let mut whens = Vec::new();
            let mut otherwise = None;
            for &child in dom.children(id) {
                if dom.is_xsl(child, "when") {
                    let test = required_attr(dom, child, "test", "xsl:when")?;
                    whens.push(When {
                        test: parse_xpath(dom, child, &test)?,
                        body: compile_body(dom, dom.children(child), engine)?,
                    });
                } else if dom.is_xsl(child, "otherwise") {
                    otherwise = Some(compile_body(dom, dom.children(child), engine)?);
                }
            }
            Ok(Some(Instruction::Choose { whens, otherwise }))
        }
        "element" => {
            let name = required_attr(dom, id, "name", "xsl:element")?;
            Ok(Some(Instruction::Element {
                name,
                body: compile_body(dom, dom.children(id), engine)?,
            }))
        }
        "attribute" => {
            let name = required_attr(dom, id, "name", "xsl:attribute")?;
            Ok(Some(Instruction::Attribute {
                name,
                body: compile_body(dom, dom.children(id), engine)?,
            }))
        }
        "copy" => Ok(Some(Instruction::Copy {
            body: compile_body(dom, dom.children(id), engine)?,
        })),
        "copy-of" => {
            let select = required_attr(dom, id, "select", "xsl:copy-of")?;
            Ok(Some(Instruction::CopyOf {
                select: parse_xpath(dom, id, &select)?,
            }))
        }
        "text" => {
            let text: String = dom
                .children(id)
                .iter()
                .map(|&c| dom.get(c).text.clone())
                .collect();
            Ok(Some(Instruction::Text(text)))
        }
        "message" => compile_message(dom, id, engine).map(Some),
        // xsl:param/with-param/sort are consumed by their parent's handler
        // above; any other top-level XSLT element is outside the subset.
        _ => Ok(None),
    }
}

/// `xsl:message` either carries a `select` sequence (modern-only, §4.8.1 —
/// used for variable-capture instrumentation) or plain template-body
/// content, mirroring real XSLT 1.0 vs 2.0/3.0 content-model differences.
/// The legacy backend has no sequence-valued `xsl:message`, so a `select`
/// form reaching it is a compilation error.
fn compile_message(dom: &Dom, id: NodeId, engine: EngineKind) -> Result<Instruction, InterpError> {
    if let Some(select) = dom.attribute(id, "select") {
        if engine == EngineKind::Legacy {
            return Err(InterpError::Compilation {
                line: dom.get(id).line,
                message: "xsl:message with a 'select' attribute is not supported by the legacy backend".to_string(),
            });
        }
        let items = split_top_level_commas(select)
            .into_iter()
            .map(|s| parse_xpath(dom, id, s.trim()))
            .collect::<Result<Vec<_>, _>>()?;
        return Ok(Instruction::Message {
            select_items: Some(items),
            body: PreparsedTemplate::default(),
        });
    }
    Ok(Instruction::Message {
        select_items: None,
        body: compile_body(dom, dom.children(id), engine)?,
    })
}

/// Splits an XPath 1.0 expression grammar has no comma operator for, so a
/// `select="(a, b, c)"` sequence literal is split by hand, respecting
/// quoting and parenthesis nesting.
fn split_top_level_commas(input: &str) -> Vec<&str> {
    let trimmed = input.trim();
    let inner = trimmed
        .strip_prefix('(')
        .and_then(|s| s.strip_suffix(')'))
        .unwrap_or(trimmed);

    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut quote: Option<char> = None;
    let mut start = 0usize;
    for (i, ch) in inner.char_indices() {
        match quote {
            Some(q) if ch == q => quote = None,
            Some(_) => {}
            None => match ch {
                '\'' | '"' => quote = Some(ch),
                '(' | '[' => depth += 1,
                ')' | ']' => depth -= 1,
                ',' if depth == 0 => {
                    parts.push(&inner[start..i]);
                    start = i + ch.len_utf8();
                }
                _ => {}
            },
        }
    }
    parts.push(&inner[start..]);
    parts
}

#[cfg(test)]
mod tests {
    use super::*;
    use xdbg_dom::Dom;

    #[test]
    fn compiles_matched_and_named_templates() {
        let dom = Dom::parse(
            r#"<xsl:stylesheet version="1.0" xmlns:xsl="http://www.w3.org/1999/XSL/Transform">
  <xsl:template match="/"><out><xsl:apply-templates/></out></xsl:template>
  <xsl:template name="greet"><xsl:text>hi</xsl:text></xsl:template>
</xsl:stylesheet>"#,
        )
        .unwrap();
        let stylesheet = compile_stylesheet(&dom, EngineKind::Legacy).unwrap();
        assert_eq!(stylesheet.matched_templates.len(), 1);
        assert!(stylesheet.named_templates.contains_key("greet"));
    }

    #[test]
    fn splits_message_sequence_respecting_quotes() {
        let parts = split_top_level_commas("('[DBG]', 'var', 'n', string($n))");
        assert_eq!(parts.len(), 4);
        assert_eq!(parts[0].trim(), "'[DBG]'");
        assert_eq!(parts[3].trim(), "string($n)");
    }

    #[test]
    fn compiles_choose_and_for_each() {
        let dom = Dom::parse(
            r#"<xsl:stylesheet version="1.0" xmlns:xsl="http://www.w3.org/1999/XSL/Transform">
  <xsl:template match="/">
    <xsl:for-each select="items/item">
      <xsl:choose>
        <xsl:when test="@flag='1'"><a/></xsl:when>
        <xsl:otherwise><b/></xsl:otherwise>
      </xsl:choose>
    </xsl:for-each>
  </xsl:template>
</xsl:stylesheet>"#,
        )
        .unwrap();
        let stylesheet = compile_stylesheet(&dom, EngineKind::Legacy).unwrap();
        let body = &stylesheet.matched_templates[0].body.0;
        assert!(matches!(body[0], Instruction::ForEach { .. }));
    }

    #[test]
    fn missing_required_attribute_is_a_compilation_error() {
        let dom = Dom::parse(
            r#"<xsl:stylesheet version="1.0" xmlns:xsl="http://www.w3.org/1999/XSL/Transform">
  <xsl:template match="/"><xsl:value-of/></xsl:template>
</xsl:stylesheet>"#,
        )
        .unwrap();
        assert!(compile_stylesheet(&dom, EngineKind::Legacy).is_err());
    }

    #[test]
    fn message_select_is_rejected_by_the_legacy_backend() {
        let dom = Dom::parse(
            r#"<xsl:stylesheet version="1.0" xmlns:xsl="http://www.w3.org/1999/XSL/Transform">
  <xsl:template match="/">
    <xsl:variable name="n" select="1"/>
    <xsl:message select="('[DBG]', 'var', 'n', string($n))"/>
  </xsl:template>
</xsl:stylesheet>"#,
        )
        .unwrap();
        let err = compile_stylesheet(&dom, EngineKind::Legacy).unwrap_err();
        assert!(matches!(err, InterpError::Compilation { .. }));
    }

    #[test]
    fn message_select_compiles_under_the_modern_backend() {
        let dom = Dom::parse(
            r#"<xsl:stylesheet version="2.0" xmlns:xsl="http://www.w3.org/1999/XSL/Transform">
  <xsl:template match="/">
    <xsl:variable name="n" select="1"/>
    <xsl:message select="('[DBG]', 'var', 'n', string($n))"/>
  </xsl:template>
</xsl:stylesheet>"#,
        )
        .unwrap();
        assert!(compile_stylesheet(&dom, EngineKind::Modern).is_ok());
    }
}
