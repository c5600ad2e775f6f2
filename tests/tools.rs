//! The HTTP tool API and the MCP endpoint against a live server.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use airflow_docs::config::Config;
use airflow_docs::fetch::LocalFetcher;
use airflow_docs::ingest::Indexer;
use airflow_docs::models::Source;
use airflow_docs::server::router;
use airflow_docs::sources::spec_for;
use airflow_docs::store::DocumentStore;
use airflow_docs::tools::ToolRegistry;
use serde_json::{json, Value};
use tempfile::TempDir;

fn write(root: &Path, rel: &str, body: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, body).unwrap();
}

/// Index a small core checkout into a fresh store.
async fn indexed_config(tmp: &TempDir) -> Config {
    let docs = tmp.path().join("core");
    write(
        &docs,
        "core-concepts/dags.rst",
        "DAGs\n====\n\nA DAG is a collection of tasks organised with dependencies.\n",
    );
    write(
        &docs,
        "administration/pools.rst",
        "Pools\n=====\n\nPools limit execution parallelism for sets of tasks.\n",
    );

    let mut config = Config::default();
    config.db.path = tmp.path().join("docs.db");
    let mut spec = spec_for(&config, Source::Core);
    spec.local_path = Some(docs);

    let store = DocumentStore::open(&config.db.path).await.unwrap();
    Indexer::new(&store, &LocalFetcher)
        .index_source(&spec, "main", false)
        .await
        .unwrap();
    store.close().await;
    config
}

async fn spawn_server(config: Config) -> String {
    let app = router(Arc::new(config), Arc::new(ToolRegistry::with_builtins()));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

async fn call(base: &str, tool: &str, params: Value) -> (u16, Value) {
    let resp = reqwest::Client::new()
        .post(format!("{}/tools/{}", base, tool))
        .json(&params)
        .send()
        .await
        .unwrap();
    let status = resp.status().as_u16();
    (status, resp.json().await.unwrap())
}

#[tokio::test]
async fn health_and_tool_list() {
    let tmp = TempDir::new().unwrap();
    let base = spawn_server(indexed_config(&tmp).await).await;
    let client = reqwest::Client::new();

    let health: Value = client
        .get(format!("{}/health", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["status"], "ok");

    let list: Value = client
        .get(format!("{}/tools/list", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let names: Vec<&str> = list["tools"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["name"].as_str().unwrap())
        .collect();
    assert_eq!(
        names,
        vec![
            "search_documentation",
            "read_documentation",
            "get_sections",
            "get_statistics"
        ]
    );
    assert_eq!(list["tools"][0]["parameters"]["required"], json!(["query"]));
}

#[tokio::test]
async fn search_documentation() {
    let tmp = TempDir::new().unwrap();
    let base = spawn_server(indexed_config(&tmp).await).await;

    let (status, body) = call(&base, "search_documentation", json!({ "query": "parallelism" })).await;
    assert_eq!(status, 200);
    assert_eq!(body["result"]["count"], 1);
    let hit = &body["result"]["results"][0];
    assert_eq!(hit["title"], "Pools");
    assert_eq!(hit["source"], "airflow-core");
    assert_eq!(hit["section"], "Administration");
    assert!(hit["snippet"].as_str().unwrap().contains("<mark>"));

    let (status, body) = call(
        &base,
        "search_documentation",
        json!({ "query": "tasks", "section": "Core Concepts", "limit": 5 }),
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(body["result"]["count"], 1);

    let (status, body) = call(&base, "search_documentation", json!({ "query": "(" })).await;
    assert_eq!(status, 200);
    assert_eq!(body["result"]["count"], 0);

    let (status, body) = call(
        &base,
        "search_documentation",
        json!({ "query": "pools\u{0}parallelism" }),
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(body["result"]["count"], 1);
}

#[tokio::test]
async fn bad_parameters_are_400() {
    let tmp = TempDir::new().unwrap();
    let base = spawn_server(indexed_config(&tmp).await).await;

    let (status, body) = call(&base, "search_documentation", json!({})).await;
    assert_eq!(status, 400);
    assert_eq!(body["error"]["code"], "bad_request");
    assert!(body["error"]["message"]
        .as_str()
        .unwrap()
        .contains("missing required parameter: query"));

    let (status, body) = call(
        &base,
        "search_documentation",
        json!({ "query": "dag", "source": "providers" }),
    )
    .await;
    assert_eq!(status, 400);
    assert!(body["error"]["message"]
        .as_str()
        .unwrap()
        .contains("unknown source"));

    let (status, _) = call(&base, "search_documentation", json!({ "query": 5 })).await;
    assert_eq!(status, 400);

    let (status, body) = call(&base, "nonexistent", json!({})).await;
    assert_eq!(status, 404);
    assert_eq!(body["error"]["code"], "not_found");
}

#[tokio::test]
async fn read_documentation_found_and_not_found() {
    let tmp = TempDir::new().unwrap();
    let base = spawn_server(indexed_config(&tmp).await).await;

    let (status, body) = call(
        &base,
        "read_documentation",
        json!({ "source": "core", "path": "core-concepts/dags.rst" }),
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(body["result"]["found"], true);
    assert_eq!(body["result"]["document"]["title"], "DAGs");
    assert!(body["result"]["document"]["content"]
        .as_str()
        .unwrap()
        .contains("collection of tasks"));

    let (status, body) = call(
        &base,
        "read_documentation",
        json!({ "source": "airflow-core", "path": "nope.rst" }),
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(body["result"]["found"], false);
    assert!(body["result"]["message"].as_str().unwrap().contains("nope.rst"));
}

#[tokio::test]
async fn sections_and_statistics() {
    let tmp = TempDir::new().unwrap();
    let base = spawn_server(indexed_config(&tmp).await).await;

    let (status, body) = call(&base, "get_sections", json!({})).await;
    assert_eq!(status, 200);
    assert_eq!(
        body["result"]["sections"],
        json!(["Administration", "Core Concepts"])
    );

    let (_, body) = call(&base, "get_sections", json!({ "source": "client" })).await;
    assert_eq!(body["result"]["sections"], json!([]));

    let (status, body) = call(&base, "get_statistics", json!({})).await;
    assert_eq!(status, 200);
    assert_eq!(body["result"]["total"], 2);
    assert_eq!(body["result"]["per_source"]["airflow-core"], 2);
    assert_eq!(body["result"]["per_source"]["airflow-python-client"], 0);
}

#[tokio::test]
async fn missing_store_is_reported_not_crashed() {
    let tmp = TempDir::new().unwrap();
    let mut config = Config::default();
    config.db.path = tmp.path().join("never-built.db");
    let base = spawn_server(config).await;

    let (status, body) = call(&base, "get_statistics", json!({})).await;
    assert_eq!(status, 503);
    assert_eq!(body["error"]["code"], "store_unavailable");
    assert!(body["error"]["message"]
        .as_str()
        .unwrap()
        .contains("airflow-docs index"));

    let health = reqwest::get(format!("{}/health", base)).await.unwrap();
    assert_eq!(health.status().as_u16(), 200);
}

/// Minimal Streamable HTTP MCP client: JSON-RPC over POST, responses read
/// from the SSE stream (or a plain JSON body) until the matching id.
struct McpClient {
    http: reqwest::Client,
    url: String,
    session: Option<String>,
}

impl McpClient {
    async fn connect(base: &str) -> Self {
        let mut client = Self {
            http: reqwest::Client::new(),
            url: format!("{}/mcp", base),
            session: None,
        };
        let init = client
            .request(
                1,
                "initialize",
                json!({
                    "protocolVersion": "2025-03-26",
                    "capabilities": {},
                    "clientInfo": { "name": "airflow-docs-tests", "version": "0.0.0" }
                }),
            )
            .await;
        assert_eq!(init["result"]["serverInfo"]["name"], "airflow-docs");
        assert!(init["result"]["capabilities"]["tools"].is_object());
        client.notify("notifications/initialized").await;
        client
    }

    fn post(&self, body: &Value) -> reqwest::RequestBuilder {
        let mut req = self
            .http
            .post(&self.url)
            .header("Accept", "application/json, text/event-stream")
            .json(body);
        if let Some(ref session) = self.session {
            req = req.header("Mcp-Session-Id", session);
        }
        req
    }

    async fn notify(&self, method: &str) {
        let resp = self
            .post(&json!({ "jsonrpc": "2.0", "method": method }))
            .send()
            .await
            .unwrap();
        assert!(resp.status().is_success(), "{} -> {}", method, resp.status());
    }

    async fn request(&mut self, id: i64, method: &str, params: Value) -> Value {
        let body = json!({ "jsonrpc": "2.0", "id": id, "method": method, "params": params });
        let mut resp = self.post(&body).send().await.unwrap();
        assert!(resp.status().is_success(), "{} -> {}", method, resp.status());

        if let Some(session) = resp.headers().get("mcp-session-id") {
            self.session = Some(session.to_str().unwrap().to_string());
        }
        let is_json = resp
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("application/json"));
        if is_json {
            return resp.json().await.unwrap();
        }

        let read = async {
            let mut buf = String::new();
            while let Some(chunk) = resp.chunk().await.unwrap() {
                buf.push_str(&String::from_utf8_lossy(&chunk));
                for line in buf.lines() {
                    let Some(data) = line.strip_prefix("data:") else {
                        continue;
                    };
                    if let Ok(msg) = serde_json::from_str::<Value>(data.trim()) {
                        if msg["id"] == json!(id) {
                            return msg;
                        }
                    }
                }
            }
            panic!("stream ended without a response to {}: {}", method, buf);
        };
        tokio::time::timeout(std::time::Duration::from_secs(10), read)
            .await
            .unwrap_or_else(|_| panic!("no response to {} within 10s", method))
    }
}

fn text_of(call: &Value) -> String {
    call["result"]["content"][0]["text"]
        .as_str()
        .unwrap_or_default()
        .to_string()
}

#[tokio::test]
async fn mcp_lists_and_calls_tools() {
    let tmp = TempDir::new().unwrap();
    let base = spawn_server(indexed_config(&tmp).await).await;
    let mut mcp = McpClient::connect(&base).await;

    let list = mcp.request(2, "tools/list", json!({})).await;
    let names: Vec<&str> = list["result"]["tools"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["name"].as_str().unwrap())
        .collect();
    assert_eq!(names.len(), 4);
    assert!(names.contains(&"read_documentation"));

    let call = mcp
        .request(
            3,
            "tools/call",
            json!({ "name": "get_statistics", "arguments": {} }),
        )
        .await;
    assert_ne!(call["result"]["isError"], json!(true));
    let stats: Value = serde_json::from_str(&text_of(&call)).unwrap();
    assert_eq!(stats["total"], 2);
    assert_eq!(stats["per_source"]["airflow-core"], 2);

    let call = mcp
        .request(
            4,
            "tools/call",
            json!({ "name": "search_documentation", "arguments": { "query": "xyzzy\u{0}plugh(" } }),
        )
        .await;
    assert_ne!(call["result"]["isError"], json!(true));
    let found: Value = serde_json::from_str(&text_of(&call)).unwrap();
    assert_eq!(found["count"], 0);
}

#[tokio::test]
async fn mcp_unknown_tool_is_method_not_found() {
    let tmp = TempDir::new().unwrap();
    let base = spawn_server(indexed_config(&tmp).await).await;
    let mut mcp = McpClient::connect(&base).await;

    let call = mcp
        .request(2, "tools/call", json!({ "name": "drop_tables", "arguments": {} }))
        .await;
    assert!(call.get("result").is_none());
    assert_eq!(call["error"]["code"], -32601);
    assert!(call["error"]["message"]
        .as_str()
        .unwrap()
        .contains("drop_tables"));
}

#[tokio::test]
async fn mcp_tool_failure_is_an_error_result() {
    let tmp = TempDir::new().unwrap();
    let mut config = Config::default();
    config.db.path = tmp.path().join("never-built.db");
    let base = spawn_server(config).await;
    let mut mcp = McpClient::connect(&base).await;

    let call = mcp
        .request(
            2,
            "tools/call",
            json!({ "name": "get_statistics", "arguments": {} }),
        )
        .await;
    assert_eq!(call["result"]["isError"], true);
    let text = text_of(&call);
    assert!(text.starts_with("get_statistics: "));
    assert!(text.contains("run `airflow-docs index`"));
}
