use agentflow::config::LlmConfig;
use agentflow::runtime::{CompletionProvider, CompletionRequest, ExecutionEngine, NodeExecutor};
use agentflow::workflow::{Edge, ExecuteRequest, Node, NodeResult, NodeStatus};
use anyhow::Result;
use async_trait::async_trait;
use futures::StreamExt;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};

/// Echoes the rendered prompt and remembers every request
#[derive(Default)]
struct EchoProvider {
    requests: Mutex<Vec<CompletionRequest>>,
}

#[async_trait]
impl CompletionProvider for EchoProvider {
    async fn complete(&self, request: CompletionRequest) -> Result<String> {
        let reply = format!("echo: {}", request.prompt);
        self.requests.lock().unwrap().push(request);
        Ok(reply)
    }
}

struct FailingProvider;

#[async_trait]
impl CompletionProvider for FailingProvider {
    async fn complete(&self, _request: CompletionRequest) -> Result<String> {
        anyhow::bail!("Completion provider returned HTTP 529: overloaded")
    }
}

fn engine_with(provider: Arc<dyn CompletionProvider>) -> ExecutionEngine {
    ExecutionEngine::new(Arc::new(NodeExecutor::new(provider, LlmConfig::default())))
}

fn engine() -> ExecutionEngine {
    engine_with(Arc::new(EchoProvider::default()))
}

fn node(id: &str, node_type: &str, data: Value) -> Node {
    serde_json::from_value(json!({"id": id, "type": node_type, "data": data})).unwrap()
}

fn edge(source: &str, target: &str) -> Edge {
    serde_json::from_value(json!({
        "id": format!("{}->{}", source, target),
        "source": source,
        "target": target
    }))
    .unwrap()
}

fn request(nodes: Vec<Node>, edges: Vec<Edge>, input: Value) -> ExecuteRequest {
    ExecuteRequest { nodes, edges, input }
}

fn ids(results: &[NodeResult]) -> Vec<&str> {
    results.iter().map(|r| r.node_id.as_str()).collect()
}

fn position(results: &[NodeResult], id: &str) -> usize {
    results.iter().position(|r| r.node_id == id).unwrap()
}

#[tokio::test]
async fn single_input_node_passes_input_through() {
    let response = engine()
        .run(request(vec![node("input-1", "input", json!({"label": "Input"}))], vec![], json!("Hello World")))
        .await;

    assert!(response.success);
    assert_eq!(response.results.len(), 1);
    assert_eq!(response.results[0].output, Some(json!("Hello World")));
    assert_eq!(response.final_output, Some(json!("Hello World")));
}

#[tokio::test]
async fn empty_graph_succeeds_with_no_results() {
    let response = engine().run(request(vec![], vec![], json!("ignored"))).await;

    assert!(response.success);
    assert!(response.results.is_empty());
    assert_eq!(response.final_output, None);
}

#[tokio::test]
async fn linear_chain_runs_in_dependency_order() {
    let nodes = vec![
        node("output-1", "output", json!({})),
        node("llm-1", "llm", json!({"prompt": "Say hello to {{input}}"})),
        node("input-1", "input", json!({})),
    ];
    let edges = vec![edge("input-1", "llm-1"), edge("llm-1", "output-1")];

    let response = engine().run(request(nodes, edges, json!("World"))).await;

    assert!(response.success);
    assert_eq!(ids(&response.results), vec!["input-1", "llm-1", "output-1"]);
    assert_eq!(response.final_output, Some(json!("echo: Say hello to World")));
}

#[tokio::test]
async fn llm_request_uses_node_settings_and_defaults() {
    let provider = Arc::new(EchoProvider::default());
    let engine = engine_with(provider.clone());
    let nodes = vec![
        node("a", "llm", json!({"prompt": "one", "model": "claude-4-opus", "temperature": 0.0, "maxTokens": 64})),
        node("b", "llm", json!({})),
    ];

    engine.execute(nodes, vec![], Value::Null).await.unwrap();

    let requests = provider.requests.lock().unwrap();
    assert_eq!(requests[0].model, "claude-4-opus");
    assert_eq!(requests[0].temperature, 0.0);
    assert_eq!(requests[0].max_tokens, 64);
    assert_eq!(requests[1].prompt, "");
    assert_eq!(requests[1].model, "claude-4-sonnet");
    assert_eq!(requests[1].temperature, 0.7);
    assert_eq!(requests[1].max_tokens, 1024);
    assert_eq!(requests[1].system, "You are a helpful AI assistant.");
}

#[tokio::test]
async fn diamond_join_receives_map_keyed_by_dependency() {
    let nodes = vec![
        node("in", "input", json!({})),
        node("search", "tool", json!({"toolType": "web-search"})),
        node("api", "tool", json!({"toolType": "api-call"})),
        node("join", "output", json!({})),
    ];
    let edges = vec![
        edge("in", "search"),
        edge("in", "api"),
        edge("search", "join"),
        edge("api", "join"),
    ];

    let results = engine().execute(nodes, edges, json!("rust")).await.unwrap();

    assert_eq!(results.len(), 4);
    let join = &results[position(&results, "join")];
    assert!(position(&results, "join") > position(&results, "search"));
    assert!(position(&results, "join") > position(&results, "api"));
    assert_eq!(
        join.output,
        Some(json!({
            "search": "Search results for: rust",
            "api": {"status": "ok", "data": "rust"}
        }))
    );
}

#[tokio::test]
async fn every_start_node_receives_the_run_input() {
    let nodes = vec![node("a", "input", json!({})), node("b", "output", json!({}))];

    let results = engine().execute(nodes, vec![], json!({"k": 1})).await.unwrap();

    assert!(results.iter().all(|r| r.input == Some(json!({"k": 1}))));
}

#[tokio::test]
async fn failure_is_isolated_and_downstream_sees_null() {
    let nodes = vec![
        node("in", "input", json!({})),
        node("calc", "tool", json!({"toolType": "calculator"})),
        node("out", "output", json!({})),
        node("side", "transform", json!({"transformType": "format-text", "config": {"template": "got {{input}}"}})),
    ];
    let edges = vec![edge("in", "calc"), edge("calc", "out"), edge("in", "side")];

    let response = engine().run(request(nodes, edges, json!("rm -rf /"))).await;

    assert!(!response.success);
    assert_eq!(response.results.len(), 4);

    let calc = &response.results[position(&response.results, "calc")];
    assert_eq!(calc.status, NodeStatus::Error);
    assert_eq!(calc.error.as_deref(), Some("Calculator error: Invalid expression"));
    assert!(calc.duration.is_some());

    let out = &response.results[position(&response.results, "out")];
    assert_eq!(out.status, NodeStatus::Success);
    assert_eq!(out.output, Some(Value::Null));

    assert_eq!(response.final_output, Some(json!("got rm -rf /")));
}

#[tokio::test]
async fn provider_failure_is_a_node_error() {
    let engine = engine_with(Arc::new(FailingProvider));
    let nodes = vec![node("in", "input", json!({})), node("llm", "llm", json!({"prompt": "hi"}))];

    let response = engine.run(request(nodes, vec![edge("in", "llm")], json!("x"))).await;

    assert!(!response.success);
    assert_eq!(response.results[1].status, NodeStatus::Error);
    assert!(response.results[1].error.as_deref().unwrap().contains("HTTP 529"));
    assert_eq!(response.final_output, Some(json!("x")));
}

#[tokio::test]
async fn calculator_chain() {
    let nodes = vec![
        node("in", "input", json!({})),
        node("calc", "tool", json!({"toolType": "calculator"})),
    ];

    for (expression, expected) in [("2 + 2", json!(4)), ("2+2*3", json!(8))] {
        let response = engine()
            .run(request(nodes.clone(), vec![edge("in", "calc")], json!(expression)))
            .await;
        assert_eq!(response.final_output, Some(expected));
    }
}

#[tokio::test]
async fn parse_route_and_filter_pipeline() {
    let nodes = vec![
        node("in", "input", json!({})),
        node("parse", "transform", json!({"transformType": "json-parse"})),
        node("scores", "transform", json!({"transformType": "extract-field", "config": {"field": "scores"}})),
        node("high", "transform", json!({"transformType": "filter", "config": {"condition": "item >= 50"}})),
        node("first", "loop", json!({"maxIterations": 2})),
        node("route", "router", json!({"condition": "len(input) == 2"})),
    ];
    let edges = vec![
        edge("in", "parse"),
        edge("parse", "scores"),
        edge("scores", "high"),
        edge("high", "first"),
        edge("first", "route"),
    ];

    let response = engine()
        .run(request(nodes, edges, json!(r#"{"scores": [10, 55, 80, 99]}"#)))
        .await;

    assert!(response.success);
    assert_eq!(response.final_output, Some(json!({"branch": "true", "value": [55, 80]})));
}

fn constant(id: &str, text: &str) -> Node {
    node(id, "transform", json!({"transformType": "format-text", "config": {"template": text}}))
}

#[tokio::test]
async fn trace_follows_fifo_queue_order() {
    let nodes = vec![
        constant("a", "A"),
        constant("x", "X"),
        constant("b", "B"),
        constant("d", "D"),
        constant("y", "Y"),
    ];
    let edges = vec![edge("a", "d"), edge("b", "d"), edge("x", "y")];

    let response = engine().run(request(nodes, edges, Value::Null)).await;

    assert!(response.success);
    assert_eq!(ids(&response.results), vec!["a", "x", "b", "d", "y"]);
    assert_eq!(response.final_output, Some(json!("Y")));
}

#[tokio::test]
async fn waiting_join_is_requeued_behind_its_last_dependency() {
    let nodes = vec![
        node("in", "input", json!({})),
        constant("slow", "S"),
        constant("fast", "F"),
        node("join", "transform", json!({"transformType": "format-text"})),
    ];
    let edges = vec![
        edge("in", "join"),
        edge("in", "slow"),
        edge("slow", "fast"),
        edge("fast", "join"),
    ];

    let response = engine().run(request(nodes, edges, json!("seed"))).await;

    assert_eq!(ids(&response.results), vec!["in", "slow", "fast", "join"]);
    assert_eq!(response.final_output, Some(json!(r#"{"in":"seed","fast":"F"}"#)));
}

#[tokio::test]
async fn deep_calculator_input_fails_only_that_node() {
    let depth = 10_000;
    let expression = format!("{}1{}", "(".repeat(depth), ")".repeat(depth));
    let nodes = vec![
        node("in", "input", json!({})),
        node("calc", "tool", json!({"toolType": "calculator"})),
    ];

    let response = engine().run(request(nodes, vec![edge("in", "calc")], json!(expression))).await;

    assert!(!response.success);
    assert_eq!(response.results[1].status, NodeStatus::Error);
    assert_eq!(
        response.results[1].error.as_deref(),
        Some("Calculator error: Expression nested deeper than 100 levels")
    );
}

#[tokio::test]
async fn dangling_edge_is_a_run_level_error() {
    let nodes = vec![node("in", "input", json!({}))];

    let response = engine().run(request(nodes, vec![edge("in", "ghost")], json!(1))).await;

    assert!(!response.success);
    assert_eq!(response.results.len(), 1);
    assert_eq!(response.results[0].node_id, "error");
    assert_eq!(
        response.results[0].error.as_deref(),
        Some("Edge 'in->ghost' references unknown node 'ghost'")
    );
    assert_eq!(response.final_output, None);
}

#[tokio::test]
async fn cyclic_nodes_are_never_executed() {
    let nodes = vec![
        node("in", "input", json!({})),
        node("a", "output", json!({})),
        node("b", "output", json!({})),
        node("c", "output", json!({})),
    ];
    let edges = vec![edge("in", "a"), edge("a", "b"), edge("b", "a"), edge("b", "c")];

    let response = engine().run(request(nodes, edges, json!(1))).await;

    assert!(response.success);
    assert_eq!(ids(&response.results), vec!["in"]);
}

#[tokio::test]
async fn runs_are_idempotent() {
    let nodes = vec![
        node("in", "input", json!({})),
        node("fmt", "transform", json!({"transformType": "format-text", "config": {"template": "[{{input}}]"}})),
        node("out", "output", json!({})),
    ];
    let edges = vec![edge("in", "fmt"), edge("fmt", "out")];

    let first = engine().run(request(nodes.clone(), edges.clone(), json!("x"))).await;
    let second = engine().run(request(nodes, edges, json!("x"))).await;

    let strip = |results: &[NodeResult]| -> Vec<NodeResult> {
        results
            .iter()
            .cloned()
            .map(|mut r| {
                r.duration = None;
                r
            })
            .collect()
    };
    assert_eq!(strip(&first.results), strip(&second.results));
    assert_eq!(first.final_output, second.final_output);
}

#[tokio::test]
async fn stream_yields_same_sequence_as_buffered_run() {
    let nodes = vec![
        node("in", "input", json!({})),
        node("search", "tool", json!({"toolType": "web-search"})),
        node("out", "output", json!({})),
    ];
    let edges = vec![edge("in", "search"), edge("search", "out")];
    let engine = engine();

    let buffered = engine.execute(nodes.clone(), edges.clone(), json!("q")).await.unwrap();
    let streamed: Vec<NodeResult> = engine
        .execute_stream(nodes, edges, json!("q"))
        .map(|item| item.unwrap())
        .collect()
        .await;

    assert_eq!(ids(&buffered), ids(&streamed));
    assert_eq!(buffered.last().unwrap().output, streamed.last().unwrap().output);
}

#[tokio::test]
async fn stream_reports_run_level_error_once() {
    let items: Vec<_> = engine()
        .execute_stream(vec![], vec![edge("a", "b")], Value::Null)
        .collect()
        .await;

    assert_eq!(items.len(), 1);
    assert!(items[0].is_err());
}
