// SPDX-License-Identifier: MIT OR Apache-2.0

//! MCP server support for mantic (stdio JSON-RPC).
//!
//! Tool calls dispatch straight into the search pipeline and session
//! store; nothing shells out.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use crate::pipeline::{record_views, run_search, SearchRequest, TypeFilter};
use crate::session::{boost_candidates, SessionStore};

const PROTOCOL_VERSION: &str = "2024-11-05";

// Keep harness guidance close to the server so every MCP host gets the
// same behavior.
const HARNESS_INSTRUCTIONS: &str = "\
mantic MCP harness (structural file ranking).\n\
\n\
Use mantic tools to decide WHICH files matter before reading them.\n\
\n\
Recommended workflow:\n\
1) search_files for a ranked, explained candidate list\n\
2) analyze_intent to inspect how a query will be interpreted\n\
3) session_start + session_record_view to bias follow-up queries\n\
4) includeImpact on search_files before risky edits\n\
\n\
Harness rules:\n\
- Results are deterministic JSON; identical queries return identical rankings.\n\
- Scores rank files by path structure and cached identifiers; file contents are not searched.\n\
- This server never mutates repository files.";

pub fn run() -> io::Result<()> {
    let stdin = io::stdin();
    let stdout = io::stdout();
    let mut stdout = stdout.lock();

    for line in stdin.lock().lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        let req = match serde_json::from_str::<JsonRpcRequest>(&line) {
            Ok(req) => req,
            Err(err) => {
                write_error(&mut stdout, None, -32700, &format!("parse error: {}", err))?;
                continue;
            }
        };

        // JSON-RPC notifications have no id; no response needed.
        if req.id.is_none() {
            continue;
        }

        let resp = handle_request(&req);
        serde_json::to_writer(&mut stdout, &resp)?;
        stdout.write_all(b"\n")?;
        stdout.flush()?;
    }

    Ok(())
}

#[derive(Debug, Deserialize)]
struct JsonRpcRequest {
    #[serde(rename = "jsonrpc")]
    _jsonrpc: String,
    id: Option<Value>,
    method: String,
    #[serde(default)]
    params: Value,
}

#[derive(Debug, Serialize)]
struct JsonRpcResponse {
    jsonrpc: &'static str,
    id: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<JsonRpcError>,
}

#[derive(Debug, Serialize)]
struct JsonRpcError {
    code: i32,
    message: String,
}

fn handle_request(req: &JsonRpcRequest) -> JsonRpcResponse {
    match req.method.as_str() {
        "initialize" => JsonRpcResponse {
            jsonrpc: "2.0",
            id: req.id.clone(),
            result: Some(json!({
                "protocolVersion": PROTOCOL_VERSION,
                "capabilities": {
                    "tools": {}
                },
                "serverInfo": {
                    "name": "mantic",
                    "version": env!("CARGO_PKG_VERSION")
                },
                "instructions": HARNESS_INSTRUCTIONS
            })),
            error: None,
        },
        "ping" => JsonRpcResponse {
            jsonrpc: "2.0",
            id: req.id.clone(),
            result: Some(json!({})),
            error: None,
        },
        "tools/list" => JsonRpcResponse {
            jsonrpc: "2.0",
            id: req.id.clone(),
            result: Some(json!({
                "tools": tool_definitions()
            })),
            error: None,
        },
        "tools/call" => handle_tool_call(req),
        _ => JsonRpcResponse {
            jsonrpc: "2.0",
            id: req.id.clone(),
            result: None,
            error: Some(JsonRpcError {
                code: -32601,
                message: format!("method not found: {}", req.method),
            }),
        },
    }
}

fn handle_tool_call(req: &JsonRpcRequest) -> JsonRpcResponse {
    let params = &req.params;
    let tool_name = params
        .get("name")
        .and_then(Value::as_str)
        .unwrap_or_default();
    let args = params.get("arguments").unwrap_or(&Value::Null);

    let result = dispatch_tool(tool_name, args);
    match result {
        Ok(output) => JsonRpcResponse {
            jsonrpc: "2.0",
            id: req.id.clone(),
            result: Some(json!({
                "content": [{
                    "type": "text",
                    "text": output
                }]
            })),
            error: None,
        },
        Err(err) => JsonRpcResponse {
            jsonrpc: "2.0",
            id: req.id.clone(),
            result: Some(json!({
                "content": [{
                    "type": "text",
                    "text": err
                }],
                "isError": true
            })),
            error: None,
        },
    }
}

fn dispatch_tool(tool: &str, args: &Value) -> Result<String, String> {
    match tool {
        "search_files" => tool_search_files(args),
        "analyze_intent" => tool_analyze_intent(args),
        "session_start" => tool_session_start(args),
        "session_list" => tool_session_list(args),
        "session_info" => tool_session_info(args),
        "session_end" => tool_session_end(args),
        "session_record_view" => tool_session_record_view(args),
        _ => Err(format!("unknown tool: {}", tool)),
    }
}

fn tool_search_files(args: &Value) -> Result<String, String> {
    let query = required_str(args, "query")?;
    let root = resolve_cwd(args);

    let mut request = SearchRequest::new(query, &root);
    request.filter = match opt_str(args, "filter") {
        Some("code") => Some(TypeFilter::Code),
        Some("config") => Some(TypeFilter::Config),
        Some("test") => Some(TypeFilter::Test),
        Some(other) => return Err(format!("unknown filter: {}", other)),
        None => None,
    };
    request.max_files = opt_u64(args, "maxResults").map(|v| v as usize);
    request.impact = opt_bool(args, "includeImpact");
    request.session = opt_str(args, "session").map(str::to_string);

    let response = run_search(&request).map_err(|e| format!("{e:#}"))?;
    serde_json::to_string(&response).map_err(|e| e.to_string())
}

fn tool_analyze_intent(args: &Value) -> Result<String, String> {
    let query = required_str(args, "query")?;
    let intent = crate::intent::analyze(query);
    serde_json::to_string(&intent).map_err(|e| e.to_string())
}

fn tool_session_start(args: &Value) -> Result<String, String> {
    let root = resolve_cwd(args);
    let store = SessionStore::new(&root);
    let session = store
        .start(opt_str(args, "name"), opt_str(args, "intent"))
        .map_err(|e| format!("{e:#}"))?;
    serde_json::to_string(&session.meta).map_err(|e| e.to_string())
}

fn tool_session_list(args: &Value) -> Result<String, String> {
    let root = resolve_cwd(args);
    let store = SessionStore::new(&root);
    let sessions = store.list().map_err(|e| format!("{e:#}"))?;
    let metas: Vec<_> = sessions.iter().map(|s| &s.meta).collect();
    serde_json::to_string(&metas).map_err(|e| e.to_string())
}

fn tool_session_info(args: &Value) -> Result<String, String> {
    let id = required_str(args, "id")?;
    let root = resolve_cwd(args);
    let store = SessionStore::new(&root);
    let session = store.load_required(id).map_err(|e| format!("{e:#}"))?;
    let boosts = boost_candidates(&session);
    let payload = json!({
        "session": session,
        "boostCandidates": boosts,
    });
    serde_json::to_string(&payload).map_err(|e| e.to_string())
}

fn tool_session_end(args: &Value) -> Result<String, String> {
    let id = required_str(args, "id")?;
    let root = resolve_cwd(args);
    let store = SessionStore::new(&root);
    let mut session = store.load_required(id).map_err(|e| format!("{e:#}"))?;
    store.end(&mut session).map_err(|e| format!("{e:#}"))?;
    serde_json::to_string(&session.meta).map_err(|e| e.to_string())
}

fn tool_session_record_view(args: &Value) -> Result<String, String> {
    let id = required_str(args, "session")?;
    let root = resolve_cwd(args);
    let files = args
        .get("files")
        .and_then(Value::as_array)
        .map(|vals| {
            vals.iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();
    if files.is_empty() {
        return Err("missing required parameter: files".to_string());
    }

    let recorded = record_views(&root, id, &files).map_err(|e| format!("{e:#}"))?;
    Ok(json!({ "recorded": recorded }).to_string())
}

fn required_str<'a>(args: &'a Value, key: &str) -> Result<&'a str, String> {
    args.get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| format!("missing required parameter: {}", key))
}

fn opt_str<'a>(args: &'a Value, key: &str) -> Option<&'a str> {
    args.get(key).and_then(Value::as_str)
}

fn opt_u64(args: &Value, key: &str) -> Option<u64> {
    args.get(key).and_then(Value::as_u64)
}

fn opt_bool(args: &Value, key: &str) -> bool {
    args.get(key).and_then(Value::as_bool).unwrap_or(false)
}

fn resolve_cwd(args: &Value) -> PathBuf {
    opt_str(args, "cwd")
        .filter(|value| !value.trim().is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")))
}

fn tool_definitions() -> Vec<Value> {
    vec![
        json!({
            "name": "search_files",
            "description": "Rank repository files by structural relevance to a query.",
            "inputSchema": {
                "type": "object",
                "required": ["query"],
                "properties": {
                    "query": { "type": "string" },
                    "cwd": { "type": "string" },
                    "filter": { "type": "string", "enum": ["code", "config", "test"] },
                    "maxResults": { "type": "number" },
                    "includeImpact": { "type": "boolean" },
                    "session": { "type": "string" }
                }
            }
        }),
        json!({
            "name": "analyze_intent",
            "description": "Show how a query is interpreted: category, keywords, entities.",
            "inputSchema": {
                "type": "object",
                "required": ["query"],
                "properties": {
                    "query": { "type": "string" }
                }
            }
        }),
        json!({
            "name": "session_start",
            "description": "Start a named search session for context carryover.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "name": { "type": "string" },
                    "intent": { "type": "string" },
                    "cwd": { "type": "string" }
                }
            }
        }),
        json!({
            "name": "session_list",
            "description": "List known sessions, most recently active first.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "cwd": { "type": "string" }
                }
            }
        }),
        json!({
            "name": "session_info",
            "description": "Full session document plus current boost candidates.",
            "inputSchema": {
                "type": "object",
                "required": ["id"],
                "properties": {
                    "id": { "type": "string" },
                    "cwd": { "type": "string" }
                }
            }
        }),
        json!({
            "name": "session_end",
            "description": "Mark a session as ended.",
            "inputSchema": {
                "type": "object",
                "required": ["id"],
                "properties": {
                    "id": { "type": "string" },
                    "cwd": { "type": "string" }
                }
            }
        }),
        json!({
            "name": "session_record_view",
            "description": "Record viewed files into a session to bias future queries.",
            "inputSchema": {
                "type": "object",
                "required": ["session", "files"],
                "properties": {
                    "session": { "type": "string" },
                    "files": {
                        "type": "array",
                        "items": { "type": "string" }
                    },
                    "cwd": { "type": "string" }
                }
            }
        }),
    ]
}

fn write_error(w: &mut impl Write, id: Option<Value>, code: i32, message: &str) -> io::Result<()> {
    let resp = JsonRpcResponse {
        jsonrpc: "2.0",
        id,
        result: None,
        error: Some(JsonRpcError {
            code,
            message: message.to_string(),
        }),
    };
    serde_json::to_writer(&mut *w, &resp)?;
    w.write_all(b"\n")?;
    w.flush()
}
