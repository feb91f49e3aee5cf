use once_cell::sync::Lazy;
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use super::parse_arguments;
use crate::knowledge::session::KnowledgeBase;
use crate::mcp::types::{CallToolResult, ToolAnnotations, ToolDefinition};
use crate::render::render_excerpts;

pub static FIND_RELEVANT_TOOL_DEFINITION: Lazy<ToolDefinition> = Lazy::new(|| ToolDefinition {
    name: "find-relevant".to_string(),
    description: "Rank the knowledge base documents by keyword relevance and return the best excerpts (top 3)".to_string(),
    input_schema: json!({
        "type": "object",
        "properties": {
            "query": {
                "type": "string",
                "description": "Free-text query"
            }
        },
        "required": ["query"]
    }),
    annotations: Some(ToolAnnotations {
        title: Some("Find Relevant Documents".to_string()),
        read_only_hint: Some(true),
        destructive_hint: None,
        open_world_hint: Some(false),
    }),
});

#[derive(Debug, Deserialize)]
struct FindRelevantParams {
    query: String,
}

pub struct FindRelevantTool;

impl FindRelevantTool {
    pub fn new() -> Self {
        Self
    }

    pub fn execute(&self, kb: &KnowledgeBase, arguments: Option<serde_json::Value>) -> CallToolResult {
        let params: FindRelevantParams = match parse_arguments("find-relevant", arguments) {
            Ok(params) => params,
            Err(result) => return result,
        };

        info!("Ranking documents for query: {}", params.query);
        match kb.find(&params.query) {
            Ok(excerpts) => CallToolResult::success(render_excerpts(&excerpts, false)),
            Err(e) => CallToolResult::error(e.to_string()),
        }
    }
}
