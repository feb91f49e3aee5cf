pub mod add_document_tool;
pub mod ask_documents_tool;
pub mod find_relevant_tool;
pub mod list_documents_tool;
pub mod remove_document_tool;

use serde::de::DeserializeOwned;
use tracing::error;

use crate::mcp::types::CallToolResult;

/// Decodes tool arguments, producing the error result to return on failure.
pub(crate) fn parse_arguments<T: DeserializeOwned>(
    tool: &str,
    arguments: Option<serde_json::Value>,
) -> Result<T, CallToolResult> {
    match arguments {
        Some(args) => serde_json::from_value::<T>(args).map_err(|e| {
            error!("Invalid {} parameters: {}", tool, e);
            CallToolResult::error(format!("Invalid parameters: {}", e))
        }),
        None => Err(CallToolResult::error("Missing required parameters")),
    }
}
