use once_cell::sync::Lazy;
use serde_json::json;

use crate::knowledge::document::format_file_size;
use crate::knowledge::session::KnowledgeBase;
use crate::mcp::types::{CallToolResult, ToolAnnotations, ToolDefinition};

pub static LIST_DOCUMENTS_TOOL_DEFINITION: Lazy<ToolDefinition> = Lazy::new(|| ToolDefinition {
    name: "list-documents".to_string(),
    description: "List the documents in the knowledge base with their ids".to_string(),
    input_schema: json!({
        "type": "object",
        "properties": {}
    }),
    annotations: Some(ToolAnnotations {
        title: Some("List Documents".to_string()),
        read_only_hint: Some(true),
        destructive_hint: None,
        open_world_hint: Some(false),
    }),
});

pub struct ListDocumentsTool;

impl ListDocumentsTool {
    pub fn new() -> Self {
        Self
    }

    pub fn execute(&self, kb: &KnowledgeBase) -> CallToolResult {
        let documents = kb.documents();
        if documents.is_empty() {
            return CallToolResult::success("No documents uploaded yet");
        }

        let total: u64 = documents.iter().map(|d| d.size).sum();
        let mut out = format!(
            "## Documents ({}, {})\n\n",
            documents.len(),
            format_file_size(total)
        );
        for doc in documents {
            out.push_str(&format!("- {}\n  id: {}\n", doc.summary_line(), doc.id));
        }
        CallToolResult::success(out)
    }
}
