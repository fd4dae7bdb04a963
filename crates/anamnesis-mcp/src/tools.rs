// ABOUTME: Tool registry and JSON-Schema descriptors for `tools/list`.
// ABOUTME: Grounded on codegraph-mcp/src/tools_schema.rs's `json!` table idiom;
// ABOUTME: the tool set itself is the table in spec.md §6.1.

use serde_json::{json, Value};

/// Returns the `tools/list` payload: one entry per tool this server exposes.
pub fn tool_list() -> Value {
    json!([
        {
            "name": "health_check",
            "description": "Check whether the analyzed project's intelligence store is reachable and healthy",
            "inputSchema": {
                "type": "object",
                "properties": { "path": { "type": "string", "description": "Project root path" } },
                "required": ["path"]
            }
        },
        {
            "name": "learn_codebase_intelligence",
            "description": "Crawl a codebase and persist concepts, patterns, and insights",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "path": { "type": "string" },
                    "force": { "type": "boolean", "default": false }
                },
                "required": ["path"]
            }
        },
        {
            "name": "auto_learn_if_needed",
            "description": "Learn a codebase only if intelligence isn't already present",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "path": { "type": "string" },
                    "force": { "type": "boolean", "default": false },
                    "skip_learning": { "type": "boolean", "default": false },
                    "include_progress": { "type": "boolean", "default": false },
                    "include_setup_steps": { "type": "boolean", "default": false }
                },
                "required": ["path"]
            }
        },
        {
            "name": "get_project_blueprint",
            "description": "Summarize a project's tech stack, architecture, and learning status",
            "inputSchema": {
                "type": "object",
                "properties": { "path": { "type": "string" } }
            }
        },
        {
            "name": "get_semantic_insights",
            "description": "Search learned concepts by name or type",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "query": { "type": "string" },
                    "concept_type": { "type": "string" },
                    "limit": { "type": "integer", "default": 10, "minimum": 1 }
                }
            }
        },
        {
            "name": "get_pattern_recommendations",
            "description": "Recommend learned patterns for a described problem",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "problem_description": { "type": "string" },
                    "current_file": { "type": "string" }
                },
                "required": ["problem_description"]
            }
        },
        {
            "name": "predict_coding_approach",
            "description": "Predict a likely implementation approach for a described problem",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "problem_description": { "type": "string" },
                    "context": { "type": "object" }
                },
                "required": ["problem_description"]
            }
        },
        {
            "name": "get_developer_profile",
            "description": "Summarize observed naming conventions, patterns, and expertise areas",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "include_recent_activity": { "type": "boolean", "default": false },
                    "include_work_context": { "type": "boolean", "default": false }
                }
            }
        },
        {
            "name": "contribute_insights",
            "description": "Record an externally-generated insight (e.g. from a linting agent)",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "insight_type": { "type": "string" },
                    "content": { "type": "string" },
                    "confidence": { "type": "number", "minimum": 0, "maximum": 1 },
                    "source_agent": { "type": "string" },
                    "session_update": { "type": "object" }
                },
                "required": ["insight_type", "content", "confidence", "source_agent"]
            }
        },
        {
            "name": "get_system_status",
            "description": "Report overall service health",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "include_metrics": { "type": "boolean", "default": false },
                    "include_diagnostics": { "type": "boolean", "default": false }
                }
            }
        },
        {
            "name": "get_intelligence_metrics",
            "description": "Report total learned concepts and patterns",
            "inputSchema": {
                "type": "object",
                "properties": { "include_breakdown": { "type": "boolean", "default": false } }
            }
        },
        {
            "name": "get_performance_status",
            "description": "Report service performance metrics, optionally running a benchmark",
            "inputSchema": {
                "type": "object",
                "properties": { "run_benchmark": { "type": "boolean", "default": false } }
            }
        },
        {
            "name": "search_codebase",
            "description": "Search learned concepts with an explicit search strategy",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "query": { "type": "string" },
                    "search_type": { "type": "string", "enum": ["semantic", "exact"], "default": "semantic" }
                },
                "required": ["query"]
            }
        },
        {
            "name": "analyze_codebase",
            "description": "Analyze a single file or directory without persisting results",
            "inputSchema": {
                "type": "object",
                "properties": { "path": { "type": "string" } },
                "required": ["path"]
            }
        },
        {
            "name": "start_session",
            "description": "Start a work session",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "name": { "type": "string" },
                    "feature": { "type": "string" },
                    "files": { "type": "array", "items": { "type": "string" } },
                    "tasks": { "type": "array", "items": { "type": "string" } }
                },
                "required": ["name"]
            }
        },
        {
            "name": "end_session",
            "description": "End a work session",
            "inputSchema": {
                "type": "object",
                "properties": { "session_id": { "type": "string" } }
            }
        },
        {
            "name": "get_session",
            "description": "Fetch a work session by id",
            "inputSchema": {
                "type": "object",
                "properties": { "session_id": { "type": "string" } },
                "required": ["session_id"]
            }
        },
        {
            "name": "list_sessions",
            "description": "List active or recent work sessions",
            "inputSchema": {
                "type": "object",
                "properties": { "limit": { "type": "integer", "default": 20 } }
            }
        },
        {
            "name": "record_decision",
            "description": "Record a project decision, optionally linked to the active session",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "decision": { "type": "string" },
                    "context": { "type": "string" },
                    "rationale": { "type": "string" },
                    "session_id": { "type": "string" },
                    "related_files": { "type": "array", "items": { "type": "string" } },
                    "tags": { "type": "array", "items": { "type": "string" } }
                },
                "required": ["decision"]
            }
        },
        {
            "name": "get_decisions",
            "description": "List recorded decisions, optionally scoped to a session",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "session_id": { "type": "string" },
                    "limit": { "type": "integer", "default": 20 }
                }
            }
        }
    ])
}

/// The bare names of every tool in [`tool_list`], used to validate `tools/call` targets.
pub fn known_tool_names() -> Vec<&'static str> {
    tool_list().as_array().expect("tool_list always returns an array").iter().map(|t| t["name"].as_str().expect("every tool entry has a name")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_list_has_twenty_entries() {
        assert_eq!(tool_list().as_array().unwrap().len(), 20);
    }

    #[test]
    fn every_tool_has_a_name_description_and_schema() {
        for tool in tool_list().as_array().unwrap() {
            assert!(tool["name"].is_string());
            assert!(tool["description"].is_string());
            assert_eq!(tool["inputSchema"]["type"], "object");
        }
    }

    #[test]
    fn known_tool_names_includes_learn_codebase_intelligence() {
        assert!(known_tool_names().contains(&"learn_codebase_intelligence"));
    }
}
