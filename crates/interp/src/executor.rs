//! The instruction executor (§4.8.1): template matching, scoped variables,
//! and instruction dispatch against an [`OutputBuilder`] that serializes
//! plain XML. `dbg:break`/`dbg:var` reach the session through
//! `EvaluationContext`'s extension-function hook, while template call/return
//! boundaries report directly to a [`FrameSink`], since this interpreter
//! (unlike the backends it sits under) is not a black box.

use crate::ast::{Instruction, PreparsedTemplate, Stylesheet, Template};
use crate::error::InterpError;
use crate::output::OutputBuilder;
use crate::pattern::{self, Pattern};
use std::collections::HashMap;
use xdbg_protocol::{FrameSink, ProbeExtensionSink, ProbeSink};
use xdbg_xpath1::{evaluate, DataSourceNode, EvaluationContext, ExtensionSink, FunctionRegistry, NodeType, XPathValue};

pub struct Executor<'s, 'a, N: DataSourceNode<'a>> {
    stylesheet: &'s Stylesheet,
    matched: Vec<(Pattern, &'s Template)>,
    root_node: N,
    scopes: Vec<HashMap<String, XPathValue<N>>>,
    functions: FunctionRegistry,
    key_indexes: HashMap<String, HashMap<String, Vec<N>>>,
    extension: Option<ProbeExtensionSink<'s>>,
    frame_sink: Option<&'s dyn FrameSink>,
    strict: bool,
    _marker: std::marker::PhantomData<&'a ()>,
}

impl<'s, 'a, N: DataSourceNode<'a> + 'a> Executor<'s, 'a, N> {
    pub fn new(
        stylesheet: &'s Stylesheet,
        root_node: N,
        probe_sink: Option<&'s dyn ProbeSink>,
        frame_sink: Option<&'s dyn FrameSink>,
        strict: bool,
    ) -> Result<Self, InterpError> {
        let mut matched = Vec::with_capacity(stylesheet.matched_templates.len());
        for template in &stylesheet.matched_templates {
            let text = template.match_pattern.as_deref().ok_or_else(|| InterpError::Compilation {
                line: 0,
                message: "template has neither 'match' nor 'name'".to_string(),
            })?;
            matched.push((pattern::parse(text)?, template));
        }
        Ok(Executor {
            stylesheet,
            matched,
            root_node,
            scopes: vec![HashMap::new()],
            functions: FunctionRegistry::default(),
            key_indexes: HashMap::new(),
            extension: probe_sink.map(ProbeExtensionSink::new),
            frame_sink,
            strict,
            _marker: std::marker::PhantomData,
        })
    }

    pub fn run(&mut self, builder: &mut dyn OutputBuilder) -> Result<(), InterpError> {
        let root = self.root_node;
        self.apply_templates_to_nodes(&[root], None, builder)
    }

    fn push_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    fn pop_scope(&mut self) {
        self.scopes.pop();
    }

    fn set_variable(&mut self, name: String, value: XPathValue<N>) {
        self.scopes
            .last_mut()
            .expect("at least one scope always present")
            .insert(name, value);
    }

    fn merged_variables(&self) -> HashMap<String, XPathValue<N>> {
        let mut merged = HashMap::new();
        for scope in &self.scopes {
            for (k, v) in scope {
                merged.insert(k.clone(), v.clone());
            }
        }
        merged
    }

    fn eval_ctx<'v>(
        &self,
        node: N,
        position: usize,
        size: usize,
        vars: &'v HashMap<String, XPathValue<N>>,
    ) -> EvaluationContext<'a, 'v, N>
    where
        's: 'v,
    {
        let mut e_ctx = EvaluationContext::new(
            node,
            self.root_node,
            &self.functions,
            position,
            size,
            vars,
            &self.key_indexes,
            self.strict,
        );
        if let Some(ext) = &self.extension {
            e_ctx = e_ctx.with_extension_sink(ext as &dyn ExtensionSink);
        }
        e_ctx
    }

    fn on_template_enter(&self) {
        if let Some(sink) = self.frame_sink {
            sink.on_template_enter();
        }
    }

    fn on_template_exit(&self) {
        if let Some(sink) = self.frame_sink {
            sink.on_template_exit();
        }
    }

    fn find_best_template(&self, node: N, mode: Option<&str>) -> Option<&'s Template> {
        self.matched
            .iter()
            .filter(|(p, t)| t.mode.as_deref() == mode && p.matches(node, self.root_node))
            .max_by(|(pa, ta), (pb, tb)| {
                let prio_a = ta.priority.unwrap_or_else(|| pa.default_priority());
                let prio_b = tb.priority.unwrap_or_else(|| pb.default_priority());
                prio_a.partial_cmp(&prio_b).unwrap_or(std::cmp::Ordering::Equal)
            })
            .map(|(_, t)| *t)
    }

    pub fn apply_templates_to_nodes(
        &mut self,
        nodes: &[N],
        mode: Option<&str>,
        builder: &mut dyn OutputBuilder,
    ) -> Result<(), InterpError> {
        let size = nodes.len();
        for (i, &node) in nodes.iter().enumerate() {
            self.apply_templates_to_node(node, i + 1, size, mode, builder)?;
        }
        Ok(())
    }

    fn apply_templates_to_node(
        &mut self,
        node: N,
        position: usize,
        size: usize,
        mode: Option<&str>,
        builder: &mut dyn OutputBuilder,
    ) -> Result<(), InterpError> {
        match self.find_best_template(node, mode) {
            Some(template) => {
                self.push_scope();
                self.bind_declared_params(template, &HashMap::new(), node, position, size)?;
                self.on_template_enter();
                let result = self.execute_template(&template.body, node, position, size, builder);
                self.on_template_exit();
                self.pop_scope();
                result
            }
            None => self.apply_built_in_rule(node, position, size, mode, builder),
        }
    }

    /// The XSLT built-in template rule: elements and the root recurse into
    /// children, text/attribute nodes copy their string value, everything
    /// else (comments, PIs) produces nothing.
    fn apply_built_in_rule(
        &mut self,
        node: N,
        _position: usize,
        _size: usize,
        mode: Option<&str>,
        builder: &mut dyn OutputBuilder,
    ) -> Result<(), InterpError> {
        match node.node_type() {
            NodeType::Root | NodeType::Element => {
                let children: Vec<N> = node.children().collect();
                self.apply_templates_to_nodes(&children, mode, builder)
            }
            NodeType::Text | NodeType::Attribute => {
                builder.add_text(&node.string_value());
                Ok(())
            }
            NodeType::Comment | NodeType::ProcessingInstruction => Ok(()),
        }
    }

    fn bind_declared_params(
        &mut self,
        template: &Template,
        passed: &HashMap<String, XPathValue<N>>,
        node: N,
        position: usize,
        size: usize,
    ) -> Result<(), InterpError> {
        for param in &template.params {
            let value = if let Some(v) = passed.get(&param.name) {
                v.clone()
            } else if let Some(default) = &param.default_value {
                let vars = self.merged_variables();
                let v = evaluate(default, &self.eval_ctx(node, position, size, &vars))?;
                v
            } else {
                XPathValue::String(String::new())
            };
            self.set_variable(param.name.clone(), value);
        }
        Ok(())
    }

    pub fn execute_template(
        &mut self,
        body: &PreparsedTemplate,
        node: N,
        position: usize,
        size: usize,
        builder: &mut dyn OutputBuilder,
    ) -> Result<(), InterpError> {
        for instruction in &body.0 {
            self.execute_instruction(instruction, node, position, size, builder)?;
        }
        Ok(())
    }

    fn execute_instruction(
        &mut self,
        instruction: &Instruction,
        node: N,
        position: usize,
        size: usize,
        builder: &mut dyn OutputBuilder,
    ) -> Result<(), InterpError> {
        match instruction {
            Instruction::Text(text) => {
                builder.add_text(text);
                Ok(())
            }
            Instruction::ContentTag { name, attrs, body } => {
                builder.start_element(name);
                for (k, v) in attrs {
                    builder.set_attribute(k, v);
                }
                self.execute_template(body, node, position, size, builder)?;
                builder.end_element(name);
                Ok(())
            }
            Instruction::ValueOf { select } => {
                let vars = self.merged_variables();
                let value = evaluate(select, &self.eval_ctx(node, position, size, &vars))?;
                builder.add_text(&value.to_string());
                Ok(())
            }
            Instruction::Variable { name, select } => {
                let vars = self.merged_variables();
                let value = evaluate(select, &self.eval_ctx(node, position, size, &vars))?;
                self.set_variable(name.clone(), value);
                Ok(())
            }
            Instruction::ApplyTemplates { select, mode } => {
                let nodes = match select {
                    Some(expr) => {
                        let vars = self.merged_variables();
                        match evaluate(expr, &self.eval_ctx(node, position, size, &vars))? {
                            XPathValue::NodeSet(nodes) => nodes,
                            _ => vec![],
                        }
                    }
                    None => node.children().collect(),
                };
                self.apply_templates_to_nodes(&nodes, mode.as_deref(), builder)
            }
            Instruction::CallTemplate { name, params } => {
                self.execute_call_template(name, params, node, position, size, builder)
            }
            Instruction::ForEach { select, body } => {
                let vars = self.merged_variables();
                let result = evaluate(select, &self.eval_ctx(node, position, size, &vars))?;
                if let XPathValue::NodeSet(nodes) = result {
                    let inner_size = nodes.len();
                    for (i, inner_node) in nodes.into_iter().enumerate() {
                        self.push_scope();
                        let r = self.execute_template(body, inner_node, i + 1, inner_size, builder);
                        self.pop_scope();
                        r?;
                    }
                }
                Ok(())
            }
            Instruction::If { test, body } => {
                let vars = self.merged_variables();
                let cond = evaluate(test, &self.eval_ctx(node, position, size, &vars))?.to_bool();
                if cond {
                    self.execute_template(body, node, position, size, builder)?;
                }
                Ok(())
            }
            Instruction::Choose { whens, otherwise } => {
                for when in whens {
                    let vars = self.merged_variables();
                    let matched = evaluate(&when.test, &self.eval_ctx(node, position, size, &vars))?.to_bool();
                    if matched {
                        return self.execute_template(&when.body, node, position, size, builder);
                    }
                }
                if let Some(otherwise) = otherwise {
                    self.execute_template(otherwise, node, position, size, builder)?;
                }
                Ok(())
            }
            Instruction::Element { name, body } => {
                builder.start_element(name);
                self.execute_template(body, node, position, size, builder)?;
                builder.end_element(name);
                Ok(())
            }
            Instruction::Attribute { name, body } => {
                let mut collector = TextCollector::default();
                self.execute_template(body, node, position, size, &mut collector)?;
                builder.set_attribute(name, &collector.0);
                Ok(())
            }
            Instruction::Copy { body } => self.execute_copy(body, node, position, size, builder),
            Instruction::CopyOf { select } => {
                let vars = self.merged_variables();
                let result = evaluate(select, &self.eval_ctx(node, position, size, &vars))?;
                match result {
                    XPathValue::NodeSet(nodes) => {
                        for n in nodes {
                            copy_data_source_node(n, builder);
                        }
                    }
                    other => builder.add_text(&other.to_string()),
                }
                Ok(())
            }
            Instruction::Message { select_items, body } => {
                if let Some(items) = select_items {
                    let vars = self.merged_variables();
                    let mut rendered = Vec::with_capacity(items.len());
                    for item in items {
                        let v = evaluate(item, &self.eval_ctx(node, position, size, &vars))?;
                        rendered.push(v.to_string());
                    }
                    builder.message(&rendered.join(" "));
                } else {
                    let mut collector = TextCollector::default();
                    self.execute_template(body, node, position, size, &mut collector)?;
                    builder.message(&collector.0);
                }
                Ok(())
            }
        }
    }

    fn execute_call_template(
        &mut self,
        name: &str,
        params: &[crate::ast::WithParam],
        node: N,
        position: usize,
        size: usize,
        builder: &mut dyn OutputBuilder,
    ) -> Result<(), InterpError> {
        let template = self
            .stylesheet
            .named_templates
            .get(name)
            .ok_or_else(|| InterpError::UndefinedTemplate(name.to_string()))?;

        let passed = {
            let vars = self.merged_variables();
            let e_ctx = self.eval_ctx(node, position, size, &vars);
            let mut passed = HashMap::with_capacity(params.len());
            for param in params {
                passed.insert(param.name.clone(), evaluate(&param.select, &e_ctx)?);
            }
            passed
        };

        self.push_scope();
        self.bind_declared_params(template, &passed, node, position, size)?;
        self.on_template_enter();
        let result = self.execute_template(&template.body, node, position, size, builder);
        self.on_template_exit();
        self.pop_scope();
        result
    }

    fn execute_copy(
        &mut self,
        body: &PreparsedTemplate,
        node: N,
        position: usize,
        size: usize,
        builder: &mut dyn OutputBuilder,
    ) -> Result<(), InterpError> {
        match node.node_type() {
            NodeType::Element => {
                let tag = node.name().map(|q| q.local_part.to_string()).unwrap_or_default();
                builder.start_element(&tag);
                self.execute_template(body, node, position, size, builder)?;
                builder.end_element(&tag);
                Ok(())
            }
            NodeType::Text | NodeType::Attribute => {
                let text = node.string_value();
                if !text.trim().is_empty() {
                    builder.add_text(&text);
                }
                Ok(())
            }
            NodeType::Root => self.execute_template(body, node, position, size, builder),
            NodeType::Comment | NodeType::ProcessingInstruction => Ok(()),
        }
    }
}

/// Recursively renders a `DataSourceNode` straight from the input tree
/// (`xsl:copy-of`'s target), independent of the compiled AST.
fn copy_data_source_node<'a, N: DataSourceNode<'a>>(node: N, builder: &mut dyn OutputBuilder) {
    match node.node_type() {
        NodeType::Element => {
            let tag = node.name().map(|q| q.local_part.to_string()).unwrap_or_default();
            builder.start_element(&tag);
            for attr in node.attributes() {
                if let Some(name) = attr.name() {
                    builder.set_attribute(name.local_part, &attr.string_value());
                }
            }
            for child in node.children() {
                copy_data_source_node(child, builder);
            }
            builder.end_element(&tag);
        }
        NodeType::Text => {
            let text = node.string_value();
            if !text.trim().is_empty() {
                builder.add_text(&text);
            }
        }
        NodeType::Root => {
            for child in node.children() {
                copy_data_source_node(child, builder);
            }
        }
        NodeType::Attribute | NodeType::Comment | NodeType::ProcessingInstruction => {}
    }
}

#[derive(Default)]
struct TextCollector(String);

impl OutputBuilder for TextCollector {
    fn start_element(&mut self, _name: &str) {}
    fn end_element(&mut self, _name: &str) {}
    fn set_attribute(&mut self, _name: &str, _value: &str) {}
    fn add_text(&mut self, text: &str) {
        self.0.push_str(text);
    }
    fn message(&mut self, _text: &str) {}
}
