use once_cell::sync::Lazy;
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use super::parse_arguments;
use crate::knowledge::session::KnowledgeBase;
use crate::knowledge::store::StoreError;
use crate::mcp::types::{CallToolResult, ToolAnnotations, ToolDefinition};
use crate::utils::content_guard::build_error_payload;

pub static REMOVE_DOCUMENT_TOOL_DEFINITION: Lazy<ToolDefinition> = Lazy::new(|| ToolDefinition {
    name: "remove-document".to_string(),
    description: "Remove a document from the knowledge base by id".to_string(),
    input_schema: json!({
        "type": "object",
        "properties": {
            "id": {
                "type": "string",
                "description": "Document id as shown by list-documents"
            }
        },
        "required": ["id"]
    }),
    annotations: Some(ToolAnnotations {
        title: Some("Remove Document".to_string()),
        read_only_hint: Some(false),
        destructive_hint: Some(true),
        open_world_hint: Some(false),
    }),
});

#[derive(Debug, Deserialize)]
struct RemoveDocumentParams {
    id: String,
}

pub struct RemoveDocumentTool;

impl RemoveDocumentTool {
    pub fn new() -> Self {
        Self
    }

    pub fn execute(
        &self,
        kb: &mut KnowledgeBase,
        arguments: Option<serde_json::Value>,
    ) -> CallToolResult {
        let params: RemoveDocumentParams = match parse_arguments("remove-document", arguments) {
            Ok(params) => params,
            Err(result) => return result,
        };

        match kb.remove(&params.id) {
            Ok(doc) => {
                info!("Removed document {} ({})", doc.name, doc.id);
                CallToolResult::success(format!("Document removed: {}", doc.name))
            }
            Err(StoreError::NotFound(id)) => CallToolResult::error(build_error_payload(
                "ERR_DOCUMENT_NOT_FOUND",
                "Document not found",
                json!({ "id": id, "hint": "Use list-documents to see valid ids." }),
            )),
            Err(e) => CallToolResult::error(build_error_payload(
                "ERR_STORE",
                &e.to_string(),
                json!({ "id": params.id }),
            )),
        }
    }
}
