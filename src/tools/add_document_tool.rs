use once_cell::sync::Lazy;
use serde::Deserialize;
use serde_json::json;
use std::path::PathBuf;
use tracing::{info, warn};

use super::parse_arguments;
use crate::knowledge::session::KnowledgeBase;
use crate::mcp::types::{CallToolResult, ToolAnnotations, ToolDefinition};
use crate::utils::content_guard::build_error_payload;

pub static ADD_DOCUMENT_TOOL_DEFINITION: Lazy<ToolDefinition> = Lazy::new(|| ToolDefinition {
    name: "add-document".to_string(),
    description: "Add a local .txt or .pdf file (up to 10MB) to the knowledge base".to_string(),
    input_schema: json!({
        "type": "object",
        "properties": {
            "path": {
                "type": "string",
                "description": "Path of the file to add"
            }
        },
        "required": ["path"]
    }),
    annotations: Some(ToolAnnotations {
        title: Some("Add Document".to_string()),
        read_only_hint: Some(false),
        destructive_hint: Some(false),
        open_world_hint: Some(false),
    }),
});

#[derive(Debug, Deserialize)]
struct AddDocumentParams {
    path: PathBuf,
}

pub struct AddDocumentTool;

impl AddDocumentTool {
    pub fn new() -> Self {
        Self
    }

    pub fn execute(
        &self,
        kb: &mut KnowledgeBase,
        arguments: Option<serde_json::Value>,
    ) -> CallToolResult {
        let params: AddDocumentParams = match parse_arguments("add-document", arguments) {
            Ok(params) => params,
            Err(result) => return result,
        };

        info!("Adding document from {}", params.path.display());
        match kb.add_file(&params.path) {
            Ok(doc) => CallToolResult::success(format!(
                "Added {}\nid: {}",
                doc.summary_line(),
                doc.id
            )),
            Err(e) => {
                warn!("Could not add {}: {}", params.path.display(), e);
                CallToolResult::error(build_error_payload(
                    e.code(),
                    &e.to_string(),
                    json!({ "path": params.path.display().to_string() }),
                ))
            }
        }
    }
}
