use once_cell::sync::Lazy;
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info};

use super::parse_arguments;
use crate::knowledge::session::{KnowledgeBase, QueryError};
use crate::mcp::types::{CallToolResult, ToolAnnotations, ToolDefinition};
use crate::utils::content_guard::build_error_payload;

pub static ASK_DOCUMENTS_TOOL_DEFINITION: Lazy<ToolDefinition> = Lazy::new(|| ToolDefinition {
    name: "ask-documents".to_string(),
    description: "Answer a question using only the documents in the knowledge base, via Google Gemini. The answer cites sources as [Document: filename].".to_string(),
    input_schema: json!({
        "type": "object",
        "properties": {
            "question": {
                "type": "string",
                "description": "The question to answer"
            },
            "model": {
                "type": "string",
                "description": "Gemini model to use (default: the configured model)"
            }
        },
        "required": ["question"]
    }),
    annotations: Some(ToolAnnotations {
        title: Some("Ask Documents".to_string()),
        read_only_hint: Some(true),
        destructive_hint: None,
        open_world_hint: Some(true),
    }),
});

#[derive(Debug, Deserialize)]
struct AskDocumentsParams {
    question: String,
    #[serde(default)]
    model: Option<String>,
}

pub struct AskDocumentsTool;

impl AskDocumentsTool {
    pub fn new() -> Self {
        Self
    }

    pub async fn execute(
        &self,
        kb: &KnowledgeBase,
        arguments: Option<serde_json::Value>,
    ) -> CallToolResult {
        let params: AskDocumentsParams = match parse_arguments("ask-documents", arguments) {
            Ok(params) => params,
            Err(result) => return result,
        };

        let model = params
            .model
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .unwrap_or(kb.model())
            .to_string();

        info!("Answering question with {}: {}", model, params.question);
        match kb.ask_with_model(&params.question, &model).await {
            Ok(answer) => {
                let sources = if answer.documents.is_empty() {
                    "none".to_string()
                } else {
                    answer.documents.join(", ")
                };
                CallToolResult::success(format!(
                    "{}\n\n---\nModel: {}\nDocuments analyzed: {}",
                    answer.text, answer.model, sources
                ))
            }
            Err(QueryError::Generation(e)) => {
                error!("Gemini request failed: {}", e);
                CallToolResult::error(build_error_payload(
                    "ERR_GENERATION",
                    "Error processing your query. Please try again.",
                    json!({ "model": model, "error": e.to_string() }),
                ))
            }
            Err(e) => CallToolResult::error(e.to_string()),
        }
    }
}
