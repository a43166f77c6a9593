/// Type-specific node processors
///
/// A node's type plus its `data` bag is resolved into a closed `NodeProcessor`
/// before anything runs, so configuration mistakes (an unknown tool kind, say)
/// surface as that node's error like any other processing failure.

use crate::config::LlmConfig;
use crate::runtime::expr::{self, Scope};
use crate::runtime::llm::{CompletionProvider, CompletionRequest, DEFAULT_SYSTEM_PROMPT};
use crate::runtime::template::{display_value, render, INPUT_MARKER};
use crate::workflow::types::{Node, NodeType};
use anyhow::{Context, Result};
use serde_json::{json, Value};
use std::str::FromStr;

/// Iteration cap applied when a loop node does not set one
pub const DEFAULT_MAX_ITERATIONS: usize = 10;

/// Built-in tool integrations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolKind {
    Calculator,
    WebSearch,
    ApiCall,
    CodeExecutor,
}

impl FromStr for ToolKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "calculator" => Ok(ToolKind::Calculator),
            "web-search" => Ok(ToolKind::WebSearch),
            "api-call" => Ok(ToolKind::ApiCall),
            "code-executor" => Ok(ToolKind::CodeExecutor),
            other => Err(anyhow::anyhow!("Unknown tool type: {}", other)),
        }
    }
}

/// Data transforms; an unknown kind passes its input through
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransformKind {
    JsonParse,
    ExtractField(Option<String>),
    FormatText(String),
    Filter(String),
    PassThrough,
}

/// LLM node settings as written on the node
#[derive(Debug, Clone, PartialEq)]
pub struct LlmSettings {
    pub prompt: String,
    pub model: Option<String>,
    pub temperature: Option<f64>,
    pub max_tokens: Option<u32>,
}

/// Resolved processing behavior for one node
#[derive(Debug, Clone, PartialEq)]
pub enum NodeProcessor {
    Input,
    Llm(LlmSettings),
    Tool(ToolKind),
    Router { condition: String },
    Loop { max_iterations: usize },
    Transform(TransformKind),
    Output,
}

impl NodeProcessor {
    /// Resolve the processor for `node`
    pub fn from_node(node: &Node) -> Result<Self> {
        let data = &node.data;

        let processor = match node.node_type {
            NodeType::Input => NodeProcessor::Input,
            NodeType::Output => NodeProcessor::Output,
            NodeType::Llm => NodeProcessor::Llm(LlmSettings {
                prompt: data.prompt.clone().unwrap_or_default(),
                model: data.model.clone(),
                temperature: data.temperature,
                max_tokens: data.max_tokens,
            }),
            NodeType::Tool => {
                let kind = data.tool_type.as_deref().unwrap_or("none");
                NodeProcessor::Tool(kind.parse()?)
            }
            NodeType::Router => NodeProcessor::Router {
                condition: data.condition.clone().unwrap_or_else(|| "true".to_string()),
            },
            NodeType::Loop => NodeProcessor::Loop {
                max_iterations: match data.max_iterations {
                    Some(0) | None => DEFAULT_MAX_ITERATIONS,
                    Some(n) => usize::try_from(n).unwrap_or(usize::MAX),
                },
            },
            NodeType::Transform => {
                let kind = match data.transform_type.as_deref() {
                    Some("json-parse") => TransformKind::JsonParse,
                    Some("extract-field") => {
                        TransformKind::ExtractField(data.config_str("field").map(String::from))
                    }
                    Some("format-text") => TransformKind::FormatText(
                        data.config_str("template").unwrap_or(INPUT_MARKER).to_string(),
                    ),
                    Some("filter") => {
                        TransformKind::Filter(data.config_str("condition").unwrap_or("true").to_string())
                    }
                    _ => TransformKind::PassThrough,
                };
                NodeProcessor::Transform(kind)
            }
        };

        Ok(processor)
    }

    /// Run the processor against the gathered input
    pub async fn process(
        &self,
        input: &Value,
        provider: &dyn CompletionProvider,
        llm: &LlmConfig,
    ) -> Result<Value> {
        match self {
            NodeProcessor::Input | NodeProcessor::Output => Ok(input.clone()),
            NodeProcessor::Llm(settings) => {
                let request = CompletionRequest {
                    prompt: render(&settings.prompt, input),
                    model: settings.model.clone().unwrap_or_else(|| llm.default_model.clone()),
                    temperature: settings.temperature.unwrap_or(llm.temperature),
                    max_tokens: settings.max_tokens.unwrap_or(llm.max_tokens),
                    system: DEFAULT_SYSTEM_PROMPT.to_string(),
                };
                let text = provider.complete(request).await?;
                Ok(Value::String(text))
            }
            NodeProcessor::Tool(kind) => run_tool(*kind, input),
            NodeProcessor::Router { condition } => Ok(route(condition, input)),
            NodeProcessor::Loop { max_iterations } => Ok(match input {
                Value::Array(items) => Value::Array(items.iter().take(*max_iterations).cloned().collect()),
                other => Value::Array(vec![other.clone()]),
            }),
            NodeProcessor::Transform(kind) => transform(kind, input),
        }
    }
}

fn run_tool(kind: ToolKind, input: &Value) -> Result<Value> {
    match kind {
        ToolKind::Calculator => calculate(&display_value(input))
            .map_err(|e| anyhow::anyhow!("Calculator error: {}", e)),
        ToolKind::WebSearch => Ok(Value::String(format!(
            "Search results for: {}",
            display_value(input)
        ))),
        ToolKind::ApiCall => Ok(json!({"status": "ok", "data": input})),
        ToolKind::CodeExecutor => Ok(Value::String(format!(
            "Code execution result for: {}",
            display_value(input)
        ))),
    }
}

/// Arithmetic over digits, whitespace and `+-*/.()` only
fn calculate(expression: &str) -> Result<Value> {
    let allowed = |c: char| c.is_ascii_digit() || c.is_whitespace() || "+-*/.()".contains(c);
    if expression.is_empty() || !expression.chars().all(allowed) {
        anyhow::bail!("Invalid expression");
    }

    let value = expr::parse(expression)?.evaluate(Scope::empty())?;
    Ok(value)
}

/// Tag `input` with the branch chosen by `condition`
///
/// Rendering or evaluation failures select the false branch.
fn route(condition: &str, input: &Value) -> Value {
    let rendered = render(condition, input);
    let taken = match expr::evaluate_condition(&rendered, Scope::with("input", input)) {
        Ok(taken) => taken,
        Err(e) => {
            tracing::warn!("⚠️ Router condition '{}' failed, taking false branch: {}", rendered, e);
            false
        }
    };

    json!({
        "branch": if taken { "true" } else { "false" },
        "value": input,
    })
}

fn transform(kind: &TransformKind, input: &Value) -> Result<Value> {
    match kind {
        TransformKind::JsonParse => match input {
            Value::String(text) => serde_json::from_str(text).context("Invalid JSON input"),
            other => Ok(other.clone()),
        },
        TransformKind::ExtractField(Some(field)) => match input {
            Value::Object(map) => Ok(map.get(field).cloned().unwrap_or(Value::Null)),
            other => Ok(other.clone()),
        },
        TransformKind::ExtractField(None) | TransformKind::PassThrough => Ok(input.clone()),
        TransformKind::FormatText(template) => Ok(Value::String(render(template, input))),
        TransformKind::Filter(condition) => match input {
            Value::Array(items) => Ok(Value::Array(
                items
                    .iter()
                    .filter(|item| keep_item(condition, item))
                    .cloned()
                    .collect(),
            )),
            other => Ok(other.clone()),
        },
    }
}

fn keep_item(condition: &str, item: &Value) -> bool {
    let rendered = render(condition, item);
    match expr::evaluate_condition(&rendered, Scope::with("item", item)) {
        Ok(keep) => keep,
        Err(e) => {
            tracing::warn!("⚠️ Filter condition '{}' failed, dropping item: {}", rendered, e);
            false
        }
    }
}
