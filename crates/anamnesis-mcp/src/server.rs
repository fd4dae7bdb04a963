// ABOUTME: Stdio JSON-RPC dispatch loop: one line in, one line out. Grounded on
// ABOUTME: codegraph-mcp/src/server.rs's request/response control flow (trimmed to
// ABOUTME: the methods spec.md §6.1 requires) plus message.rs/protocol.rs's shapes.

use std::io::Write as _;

use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{error, info, warn};

use anamnesis_core::error::AnamnesisError;
use anamnesis_extract::DetectedPattern;
use anamnesis_services::{
    convert::storage_pattern_to_detected, CodebaseService, IntelligenceService, LearningOptions, LearningService, SessionManager,
};
use anamnesis_storage::sync::SyncStorage;

use crate::message::{JsonRpcError, JsonRpcInbound, JsonRpcResponse};
use crate::protocol::{InitializeResult, ToolCallParams, ToolCallResult, METHOD_INITIALIZE, METHOD_INITIALIZED, METHOD_TOOLS_CALL, METHOD_TOOLS_LIST};
use crate::tools::tool_list;

pub struct McpServer {
    backend: SyncStorage,
    version: String,
}

impl McpServer {
    pub fn new(backend: SyncStorage, version: impl Into<String>) -> Self {
        Self { backend, version: version.into() }
    }

    /// Runs the read-eval-print loop over stdio until stdin closes. Malformed input
    /// lines produce a JSON-RPC parse-error response rather than aborting the loop.
    pub async fn run(&self) -> crate::error::Result<()> {
        let stdin = tokio::io::stdin();
        let mut reader = BufReader::new(stdin).lines();
        let mut stdout = tokio::io::stdout();

        while let Some(line) = reader.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }
            if let Some(response) = self.handle_line(&line) {
                stdout.write_all(response.as_bytes()).await?;
                stdout.write_all(b"\n").await?;
                stdout.flush().await?;
            }
        }
        Ok(())
    }

    fn handle_line(&self, line: &str) -> Option<String> {
        let inbound: JsonRpcInbound = match serde_json::from_str(line) {
            Ok(msg) => msg,
            Err(e) => {
                warn!(error = %e, "failed to parse inbound JSON-RPC line");
                return Some(serde_json::to_string(&JsonRpcResponse::error(Value::Null, JsonRpcError::parse_error())).unwrap());
            }
        };

        match inbound {
            JsonRpcInbound::Notification(notif) => {
                if notif.method == METHOD_INITIALIZED {
                    info!("client confirmed initialization");
                }
                None
            }
            JsonRpcInbound::Request(req) => {
                let response = match self.dispatch(&req.method, req.params.unwrap_or(Value::Null)) {
                    Ok(result) => JsonRpcResponse::success(req.id, result),
                    Err(e) => JsonRpcResponse::error(req.id, e),
                };
                Some(serde_json::to_string(&response).unwrap())
            }
        }
    }

    fn dispatch(&self, method: &str, params: Value) -> Result<Value, JsonRpcError> {
        match method {
            METHOD_INITIALIZE => Ok(serde_json::to_value(InitializeResult::new(&self.version)).unwrap()),
            METHOD_TOOLS_LIST => Ok(json!({ "tools": tool_list() })),
            METHOD_TOOLS_CALL => {
                let call: ToolCallParams = serde_json::from_value(params).map_err(|e| JsonRpcError::invalid_params(e.to_string()))?;
                let result = self.call_tool(&call.name, call.arguments);
                Ok(serde_json::to_value(result).unwrap())
            }
            other => Err(JsonRpcError::method_not_found(other)),
        }
    }

    fn call_tool(&self, name: &str, args: Value) -> ToolCallResult {
        match self.run_tool(name, args) {
            Ok(payload) => ToolCallResult::ok(&payload),
            Err(ToolError::Unknown) => ToolCallResult::failed(&format!("unknown tool: {name}")),
            Err(ToolError::Service(e)) => {
                error!(tool = name, error = %e, "tool call failed");
                ToolCallResult::failed(&e.user_message())
            }
        }
    }

    fn run_tool(&self, name: &str, args: Value) -> Result<Value, ToolError> {
        let backend = &self.backend;
        match name {
            "health_check" => {
                let path = arg_str(&args, "path").unwrap_or_default();
                let healthy = std::path::Path::new(&path).exists();
                Ok(json!({ "healthy": healthy, "checks": { "path_exists": healthy }, "issues": if healthy { vec![] as Vec<String> } else { vec!["path does not exist".to_string()] } }))
            }
            "learn_codebase_intelligence" => {
                let path = arg_str(&args, "path").unwrap_or_default();
                let force = arg_bool(&args, "force").unwrap_or(false);
                let service = LearningService::new(Some(backend));
                let result = service.learn_from_codebase(std::path::Path::new(&path), &LearningOptions { force, ..Default::default() }, None);
                Ok(json!({
                    "success": result.success,
                    "concepts_learned": result.concepts_learned,
                    "patterns_learned": result.patterns_learned,
                    "insights": result.insights,
                    "error": result.error,
                }))
            }
            "auto_learn_if_needed" => {
                let path = arg_str(&args, "path").unwrap_or_default();
                let skip = arg_bool(&args, "skip_learning").unwrap_or(false);
                if skip {
                    return Ok(json!({ "status": "skipped", "action_taken": "none" }));
                }
                let force = arg_bool(&args, "force").unwrap_or(false);
                let service = LearningService::new(Some(backend));
                let result = service.learn_from_codebase(std::path::Path::new(&path), &LearningOptions { force, ..Default::default() }, None);
                let already = result.insights.iter().any(|i| i.contains("existing intelligence"));
                Ok(json!({
                    "status": if already { "already_learned" } else { "learned" },
                    "action_taken": if already { "none" } else { "learn_codebase_intelligence" },
                    "insights": result.insights,
                }))
            }
            "get_project_blueprint" => {
                let path = arg_str(&args, "path").unwrap_or_default();
                let service = IntelligenceService::new(Some(backend));
                let blueprint = service.get_project_blueprint(&path)?;
                Ok(json!({
                    "project_path": blueprint.project_path,
                    "tech_stack": blueprint.languages,
                    "learning_status": { "has_intelligence": blueprint.total_concepts > 0 },
                    "total_concepts": blueprint.total_concepts,
                    "total_patterns": blueprint.total_patterns,
                }))
            }
            "get_semantic_insights" => {
                let query = arg_str(&args, "query").unwrap_or_default();
                let concept_type = arg_str(&args, "concept_type");
                let limit = arg_u64(&args, "limit").unwrap_or(10) as usize;
                let service = IntelligenceService::new(Some(backend));
                service.load_from_backend()?;
                let (insights, total) = service.get_semantic_insights(&query, concept_type.as_deref(), limit);
                Ok(json!({ "insights": insights.iter().map(insight_to_json).collect::<Vec<_>>(), "total": total }))
            }
            "get_pattern_recommendations" => {
                let description = arg_str(&args, "problem_description").unwrap_or_default();
                let service = IntelligenceService::new(Some(backend));
                service.load_from_backend()?;
                let recommendations = service.get_pattern_recommendations(&description, 5);
                Ok(json!({
                    "recommendations": recommendations.iter().map(|r| json!({
                        "kind": format!("{:?}", r.kind),
                        "score": r.score,
                        "reasoning": r.reasoning,
                        "example_files": r.example_files,
                    })).collect::<Vec<_>>(),
                    "reasoning": "ranked by keyword overlap with learned pattern frequency",
                    "problem_description": description,
                }))
            }
            "predict_coding_approach" => {
                let description = arg_str(&args, "problem_description").unwrap_or_default();
                let routing = args.get("context").and_then(|c| c.get("file_routing")).and_then(|v| v.as_array()).map(|a| a.iter().filter_map(|v| v.as_str().map(str::to_string)).collect());
                let service = IntelligenceService::new(Some(backend));
                let prediction = service.predict_coding_approach(&description, routing);
                Ok(json!({
                    "approach": prediction.approach,
                    "confidence": prediction.confidence,
                    "reasoning": prediction.reasoning,
                    "suggested_patterns": prediction.suggested_patterns,
                    "estimated_complexity": format!("{:?}", prediction.estimated_complexity),
                }))
            }
            "get_developer_profile" => {
                let patterns: Vec<DetectedPattern> = backend.list_patterns()?.iter().filter_map(storage_pattern_to_detected).collect();
                let service = IntelligenceService::new(Some(backend));
                let profile = service.get_developer_profile(&patterns, Vec::new(), None);
                Ok(json!({
                    "preferred_patterns": profile.most_used_patterns.iter().map(|(k, n)| json!({"kind": format!("{:?}", k), "count": n})).collect::<Vec<_>>(),
                    "coding_style": profile.preferred_naming_convention.map(|k| format!("{k:?}")),
                    "expertise_areas": profile.expertise_areas.iter().map(|a| json!({"module_prefix": a.module_prefix, "file_count": a.file_count})).collect::<Vec<_>>(),
                }))
            }
            "contribute_insights" => {
                let insight_type = arg_str(&args, "insight_type").unwrap_or_default();
                let content = arg_str(&args, "content").unwrap_or_default();
                let confidence = args.get("confidence").and_then(Value::as_f64).unwrap_or(0.5);
                let source_agent = arg_str(&args, "source_agent").unwrap_or_default();
                let service = IntelligenceService::new(Some(backend));
                let insight = service.contribute_insight(&insight_type, &content, &content, Vec::new(), confidence, "", &source_agent)?;
                Ok(json!({ "success": true, "insight_id": insight.id, "message": "insight recorded" }))
            }
            "get_system_status" => Ok(json!({ "status": "healthy", "services": { "storage": "connected" } })),
            "get_intelligence_metrics" => {
                let total_concepts = backend.count_concepts_by_file_prefix("")?;
                let total_patterns = backend.list_patterns()?.len();
                Ok(json!({ "total_concepts": total_concepts, "total_patterns": total_patterns, "has_intelligence": total_concepts > 0 }))
            }
            "get_performance_status" => Ok(json!({ "status": "healthy", "metrics": {} })),
            "search_codebase" => {
                let query = arg_str(&args, "query").unwrap_or_default();
                let search_type = arg_str(&args, "search_type").unwrap_or_else(|| "semantic".to_string());
                let concepts = backend.search_concepts(&query)?;
                Ok(json!({ "results": concepts.iter().map(|c| json!({"name": c.name, "concept_type": c.concept_type, "file_path": c.file_path})).collect::<Vec<_>>(), "query": query, "search_type": search_type }))
            }
            "analyze_codebase" => {
                let path = arg_str(&args, "path").unwrap_or_default();
                let service = CodebaseService::new();
                let source = std::fs::read_to_string(&path).map_err(AnamnesisError::from)?;
                let analysis = service.analyze_file(std::path::Path::new(&path), &source, false);
                Ok(json!({ "path": path, "analysis": analysis.map(|a| json!({"language": a.language, "symbol_count": a.symbols.len(), "import_count": a.imports.len()})) }))
            }
            "start_session" => {
                let manager = SessionManager::new(backend);
                let name = arg_str(&args, "name").unwrap_or_default();
                let feature = arg_str(&args, "feature").unwrap_or_default();
                let files = arg_str_vec(&args, "files");
                let tasks = arg_str_vec(&args, "tasks");
                let session = manager.start_session(&name, &feature, files, tasks, "")?;
                Ok(json!({ "success": true, "session": session }))
            }
            "end_session" => {
                let manager = SessionManager::new(backend);
                let session_id = arg_str(&args, "session_id");
                let ended = manager.end_session(session_id.as_deref())?;
                Ok(json!({ "success": ended }))
            }
            "get_session" => {
                let manager = SessionManager::new(backend);
                let session_id = arg_str(&args, "session_id").unwrap_or_default();
                let session = manager.get_session(&session_id)?;
                Ok(json!({ "success": session.is_some(), "session": session }))
            }
            "list_sessions" => {
                let manager = SessionManager::new(backend);
                let limit = arg_u64(&args, "limit").unwrap_or(20) as i64;
                let sessions = manager.get_recent_sessions(limit)?;
                Ok(json!({ "success": true, "count": sessions.len(), "sessions": sessions }))
            }
            "record_decision" => {
                let manager = SessionManager::new(backend);
                let decision = arg_str(&args, "decision").unwrap_or_default();
                let context = arg_str(&args, "context").unwrap_or_default();
                let rationale = arg_str(&args, "rationale").unwrap_or_default();
                let session_id = arg_str(&args, "session_id");
                let related_files = arg_str_vec(&args, "related_files");
                let tags = arg_str_vec(&args, "tags");
                let recorded = manager.record_decision(&decision, &context, &rationale, session_id.as_deref(), related_files, tags)?;
                Ok(json!({ "success": true, "decision": recorded }))
            }
            "get_decisions" => {
                let manager = SessionManager::new(backend);
                let limit = arg_u64(&args, "limit").unwrap_or(20) as i64;
                let decisions = if let Some(session_id) = arg_str(&args, "session_id") { manager.get_decisions_by_session(&session_id)? } else { manager.get_recent_decisions(limit)? };
                Ok(json!({ "success": true, "count": decisions.len(), "decisions": decisions }))
            }
            _ => Err(ToolError::Unknown),
        }
    }
}

enum ToolError {
    Unknown,
    Service(AnamnesisError),
}

impl From<AnamnesisError> for ToolError {
    fn from(e: AnamnesisError) -> Self {
        ToolError::Service(e)
    }
}

fn arg_str(args: &Value, key: &str) -> Option<String> {
    args.get(key).and_then(Value::as_str).map(str::to_string)
}

fn arg_bool(args: &Value, key: &str) -> Option<bool> {
    args.get(key).and_then(Value::as_bool)
}

fn arg_u64(args: &Value, key: &str) -> Option<u64> {
    args.get(key).and_then(Value::as_u64)
}

fn arg_str_vec(args: &Value, key: &str) -> Vec<String> {
    args.get(key).and_then(Value::as_array).map(|a| a.iter().filter_map(|v| v.as_str().map(str::to_string)).collect()).unwrap_or_default()
}

fn insight_to_json(insight: &anamnesis_services::intelligence::SemanticInsight) -> Value {
    json!({
        "concept_id": insight.concept.concept_id,
        "name": insight.concept.name,
        "file_path": insight.concept.file_path,
        "similarity": insight.concept.similarity,
        "relationships": insight.relationships.iter().map(|r| json!({"type": r.kind, "target": r.target})).collect::<Vec<_>>(),
        "usage": { "session_count": insight.usage.session_count, "session_names": insight.usage.session_names },
        "evolution": {
            "created_at": insight.evolution.created_at.to_rfc3339(),
            "updated_at": insight.evolution.updated_at.to_rfc3339(),
            "revised_since_creation": insight.evolution.revised_since_creation,
        },
    })
}

/// Flushes stderr immediately on startup so a wrapping process sees the banner
/// even if stdout is fully consumed by JSON-RPC traffic.
pub fn announce_startup(version: &str) {
    let _ = writeln!(std::io::stderr(), "anamnesis tool-server v{version} ready (stdio, line-delimited JSON-RPC)");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn server() -> McpServer {
        McpServer::new(SyncStorage::connect_in_memory().unwrap(), "0.1.0-test")
    }

    #[test]
    fn initialize_returns_server_info() {
        let server = server();
        let result = server.dispatch(METHOD_INITIALIZE, Value::Null).unwrap();
        assert_eq!(result["serverInfo"]["name"], "anamnesis");
    }

    #[test]
    fn tools_list_includes_learn_codebase_intelligence() {
        let server = server();
        let result = server.dispatch(METHOD_TOOLS_LIST, Value::Null).unwrap();
        let names: Vec<&str> = result["tools"].as_array().unwrap().iter().map(|t| t["name"].as_str().unwrap()).collect();
        assert!(names.contains(&"learn_codebase_intelligence"));
    }

    #[test]
    fn unknown_method_is_a_protocol_error() {
        let server = server();
        assert!(server.dispatch("not_a_real_method", Value::Null).is_err());
    }

    #[test]
    fn tools_call_for_unknown_tool_is_a_tool_level_error() {
        let server = server();
        let params = json!({ "name": "does_not_exist", "arguments": {} });
        let result = server.dispatch(METHOD_TOOLS_CALL, params).unwrap();
        assert_eq!(result["isError"], true);
    }

    #[test]
    fn start_and_end_session_round_trip_through_tools_call() {
        let server = server();
        let start = server.dispatch(METHOD_TOOLS_CALL, json!({ "name": "start_session", "arguments": { "name": "s1", "feature": "f1" } })).unwrap();
        let text = start["content"][0]["text"].as_str().unwrap();
        let payload: Value = serde_json::from_str(text).unwrap();
        let session_id = payload["session"]["session_id"].as_str().unwrap().to_string();

        let end = server.dispatch(METHOD_TOOLS_CALL, json!({ "name": "end_session", "arguments": { "session_id": session_id } })).unwrap();
        let end_text = end["content"][0]["text"].as_str().unwrap();
        let end_payload: Value = serde_json::from_str(end_text).unwrap();
        assert_eq!(end_payload["success"], true);
    }

    #[test]
    fn learn_then_blueprint_reports_intelligence_present() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.py"), "def f():\n    return 1\n").unwrap();
        let path = dir.path().to_string_lossy().to_string();

        let server = server();
        let learn = server.dispatch(METHOD_TOOLS_CALL, json!({ "name": "learn_codebase_intelligence", "arguments": { "path": path, "force": true } })).unwrap();
        let learn_payload: Value = serde_json::from_str(learn["content"][0]["text"].as_str().unwrap()).unwrap();
        assert_eq!(learn_payload["success"], true);

        let blueprint = server.dispatch(METHOD_TOOLS_CALL, json!({ "name": "get_project_blueprint", "arguments": { "path": path } })).unwrap();
        let blueprint_payload: Value = serde_json::from_str(blueprint["content"][0]["text"].as_str().unwrap()).unwrap();
        assert_eq!(blueprint_payload["learning_status"]["has_intelligence"], true);
    }
}
