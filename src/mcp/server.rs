use anyhow::Result;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, info, warn};

use super::transport::LineTransport;
use super::types::*;
use crate::knowledge::session::KnowledgeBase;
use crate::tools::{
    add_document_tool::{AddDocumentTool, ADD_DOCUMENT_TOOL_DEFINITION},
    ask_documents_tool::{AskDocumentsTool, ASK_DOCUMENTS_TOOL_DEFINITION},
    find_relevant_tool::{FindRelevantTool, FIND_RELEVANT_TOOL_DEFINITION},
    list_documents_tool::{ListDocumentsTool, LIST_DOCUMENTS_TOOL_DEFINITION},
    remove_document_tool::{RemoveDocumentTool, REMOVE_DOCUMENT_TOOL_DEFINITION},
};

pub const PROTOCOL_VERSION: &str = "2024-11-05";

pub struct McpServer {
    kb: KnowledgeBase,
    initialized: bool,
}

impl McpServer {
    pub fn new(kb: KnowledgeBase) -> Self {
        Self {
            kb,
            initialized: false,
        }
    }

    pub async fn serve<R, W>(&mut self, transport: &mut LineTransport<R, W>) -> Result<()>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        info!("MCP server started and listening");

        loop {
            match transport.read_message().await? {
                Some(McpMessage::Request(request)) => {
                    let response = self.handle_request(request).await;
                    transport.write_response(response).await?;
                }
                Some(McpMessage::Notification(notification)) => {
                    self.handle_notification(notification);
                }
                None => {
                    info!("Client disconnected");
                    break;
                }
            }
        }

        Ok(())
    }

    async fn handle_request(&mut self, request: McpRequest) -> McpResponse {
        let id = Self::ensure_valid_id(request.id);

        match request.method.as_str() {
            "initialize" => Self::handle_initialize(id, request.params),
            "tools/list" => self.handle_list_tools(id),
            "tools/call" => self.handle_call_tool(id, request.params).await,
            "ping" => McpResponse::result(id, serde_json::json!({})),
            _ => McpResponse::failure(id, METHOD_NOT_FOUND, "Method not found"),
        }
    }

    fn handle_notification(&mut self, notification: McpNotification) {
        debug!("Received notification: {}", notification.method);

        match notification.method.as_str() {
            "notifications/initialized" => {
                info!("Client initialization completed");
                self.initialized = true;
            }
            "notifications/cancelled" => {
                debug!("Request cancelled notification received");
            }
            _ => {
                warn!("Unknown notification method: {}", notification.method);
            }
        }
    }

    fn ensure_valid_id(id: Option<serde_json::Value>) -> serde_json::Value {
        match id {
            Some(serde_json::Value::Null) | None => serde_json::Value::String("0".to_string()),
            Some(value) => value,
        }
    }

    fn handle_initialize(id: serde_json::Value, params: Option<serde_json::Value>) -> McpResponse {
        let Some(params) = params else {
            return McpResponse::failure(id, INVALID_PARAMS, "Missing params");
        };
        if let Err(e) = serde_json::from_value::<InitializeParams>(params) {
            return McpResponse::failure(id, INVALID_PARAMS, format!("Invalid params: {}", e));
        }

        let result = InitializeResult {
            protocol_version: PROTOCOL_VERSION.to_string(),
            server_info: ServerInfo {
                name: "kb-search".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                description: Some(
                    "Ask questions about your own text and PDF files, answered by Google Gemini"
                        .to_string(),
                ),
            },
            capabilities: ServerCapabilities {
                tools: Some(ToolsCapability {
                    list_changed: Some(false),
                }),
                logging: Some(serde_json::json!({})),
            },
        };
        McpResponse::from_serializable(id, &result)
    }

    fn handle_list_tools(&self, id: serde_json::Value) -> McpResponse {
        let mut tools = vec![
            ADD_DOCUMENT_TOOL_DEFINITION.clone(),
            LIST_DOCUMENTS_TOOL_DEFINITION.clone(),
            REMOVE_DOCUMENT_TOOL_DEFINITION.clone(),
            FIND_RELEVANT_TOOL_DEFINITION.clone(),
        ];

        // Answering needs an API key
        if self.kb.can_answer() {
            tools.push(ASK_DOCUMENTS_TOOL_DEFINITION.clone());
        }

        McpResponse::from_serializable(id, &ListToolsResult { tools })
    }

    async fn handle_call_tool(
        &mut self,
        id: serde_json::Value,
        params: Option<serde_json::Value>,
    ) -> McpResponse {
        let Some(params) = params else {
            return McpResponse::failure(id, INVALID_PARAMS, "Missing params");
        };
        match serde_json::from_value::<CallToolParams>(params) {
            Ok(call_params) => {
                let result = self.execute_tool(call_params).await;
                McpResponse::from_serializable(id, &result)
            }
            Err(e) => McpResponse::failure(id, INVALID_PARAMS, format!("Invalid params: {}", e)),
        }
    }

    async fn execute_tool(&mut self, params: CallToolParams) -> CallToolResult {
        match params.name.as_str() {
            "add-document" => AddDocumentTool::new().execute(&mut self.kb, params.arguments),
            "list-documents" => ListDocumentsTool::new().execute(&self.kb),
            "remove-document" => RemoveDocumentTool::new().execute(&mut self.kb, params.arguments),
            "find-relevant" => FindRelevantTool::new().execute(&self.kb, params.arguments),
            "ask-documents" => {
                AskDocumentsTool::new()
                    .execute(&self.kb, params.arguments)
                    .await
            }
            _ => CallToolResult::error(format!("Tool not found: {}", params.name)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::store::Store;
    use crate::utils::gemini::{AnswerGenerator, GeminiError};
    use async_trait::async_trait;
    use serde_json::{json, Value};

    struct EchoGenerator;

    #[async_trait]
    impl AnswerGenerator for EchoGenerator {
        async fn generate(&self, model: &str, _prompt: &str) -> Result<String, GeminiError> {
            Ok(format!("answered by {}", model))
        }
    }

    async fn run(server: &mut McpServer, lines: &[Value]) -> Vec<Value> {
        let input: String = lines.iter().map(|l| format!("{}\n", l)).collect();
        let mut transport = LineTransport::new(input.as_bytes(), Vec::new());
        server.serve(&mut transport).await.unwrap();
        String::from_utf8(transport.into_writer())
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    fn call(id: u64, name: &str, arguments: Value) -> Value {
        json!({"jsonrpc": "2.0", "id": id, "method": "tools/call",
               "params": {"name": name, "arguments": arguments}})
    }

    fn text_of(response: &Value) -> &str {
        response["result"]["content"][0]["text"].as_str().unwrap()
    }

    #[tokio::test]
    async fn initialize_list_and_unknown_method() {
        let data = tempfile::tempdir().unwrap();
        let kb = KnowledgeBase::with_generator(Store::open(data.path()).unwrap(), "m", None);
        let mut server = McpServer::new(kb);

        let out = run(
            &mut server,
            &[
                json!({"jsonrpc": "2.0", "id": 1, "method": "initialize",
                       "params": {"protocolVersion": PROTOCOL_VERSION,
                                  "clientInfo": {"name": "t", "version": "1"}}}),
                json!({"jsonrpc": "2.0", "method": "notifications/initialized"}),
                json!({"jsonrpc": "2.0", "id": 2, "method": "tools/list"}),
                json!({"jsonrpc": "2.0", "id": 3, "method": "bogus"}),
            ],
        )
        .await;

        assert_eq!(out.len(), 3);
        assert_eq!(out[0]["result"]["serverInfo"]["name"], "kb-search");
        let names: Vec<&str> = out[1]["result"]["tools"]
            .as_array()
            .unwrap()
            .iter()
            .map(|t| t["name"].as_str().unwrap())
            .collect();
        assert_eq!(
            names,
            vec!["add-document", "list-documents", "remove-document", "find-relevant"]
        );
        assert_eq!(out[2]["error"]["code"], METHOD_NOT_FOUND);
        assert!(server.initialized);
    }

    #[tokio::test]
    async fn document_lifecycle_through_tools() {
        let files = tempfile::tempdir().unwrap();
        let data = tempfile::tempdir().unwrap();
        let path = files.path().join("apple.txt");
        std::fs::write(&path, "The apple is red and crunchy.").unwrap();

        let kb = KnowledgeBase::with_generator(
            Store::open(data.path()).unwrap(),
            "gemini-2.5-flash",
            Some(Box::new(EchoGenerator)),
        );
        let mut server = McpServer::new(kb);

        let out = run(
            &mut server,
            &[
                call(1, "add-document", json!({"path": path})),
                call(2, "add-document", json!({"path": path})),
                call(3, "find-relevant", json!({"query": "apple"})),
                call(4, "ask-documents", json!({"question": "What colour?", "model": "gemini-2.5-pro"})),
            ],
        )
        .await;

        assert!(text_of(&out[0]).starts_with("Added apple.txt [TXT]"));
        assert_eq!(out[1]["result"]["isError"], true);
        assert!(text_of(&out[1]).contains("ERR_INGEST_DUPLICATE"));
        assert!(text_of(&out[2]).starts_with("1. apple.txt (TXT)"));
        assert!(text_of(&out[3]).starts_with("answered by gemini-2.5-pro"));

        let id = server.kb.documents()[0].id.clone();
        let out = run(
            &mut server,
            &[
                call(5, "remove-document", json!({"id": id})),
                call(6, "remove-document", json!({"id": id})),
                call(7, "list-documents", json!({})),
            ],
        )
        .await;
        assert_eq!(text_of(&out[0]), "Document removed: apple.txt");
        assert!(text_of(&out[1]).contains("ERR_DOCUMENT_NOT_FOUND"));
        assert_eq!(text_of(&out[2]), "No documents uploaded yet");
    }

    #[tokio::test]
    async fn bad_tool_arguments_are_tool_errors() {
        let data = tempfile::tempdir().unwrap();
        let kb = KnowledgeBase::with_generator(Store::open(data.path()).unwrap(), "m", None);
        let mut server = McpServer::new(kb);

        let out = run(
            &mut server,
            &[
                call(1, "find-relevant", json!({"wrong": 1})),
                call(2, "no-such-tool", json!({})),
                json!({"jsonrpc": "2.0", "id": 3, "method": "tools/call"}),
            ],
        )
        .await;
        assert!(text_of(&out[0]).starts_with("Invalid parameters"));
        assert_eq!(text_of(&out[1]), "Tool not found: no-such-tool");
        assert_eq!(out[2]["error"]["code"], INVALID_PARAMS);
    }
}
