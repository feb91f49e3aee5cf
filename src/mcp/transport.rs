use anyhow::{anyhow, Result};
use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite, BufReader};
use tokio_util::codec::{FramedRead, FramedWrite, LinesCodec};
use tracing::{debug, error};

use super::types::{McpMessage, McpNotification, McpRequest, McpResponse};

/// Newline-delimited JSON-RPC over any async reader/writer pair.
pub struct LineTransport<R, W> {
    reader: FramedRead<BufReader<R>, LinesCodec>,
    writer: FramedWrite<W, LinesCodec>,
}

pub type StdioTransport = LineTransport<tokio::io::Stdin, tokio::io::Stdout>;

impl StdioTransport {
    pub fn stdio() -> Self {
        LineTransport::new(tokio::io::stdin(), tokio::io::stdout())
    }
}

impl<R, W> LineTransport<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            reader: FramedRead::new(BufReader::new(reader), LinesCodec::new()),
            writer: FramedWrite::new(writer, LinesCodec::new()),
        }
    }

    /// Reads the next message; `Ok(None)` on EOF. Blank lines are skipped.
    pub async fn read_message(&mut self) -> Result<Option<McpMessage>> {
        loop {
            let line = match self.reader.next().await {
                Some(Ok(line)) => line,
                Some(Err(e)) => {
                    error!("Error reading from input: {}", e);
                    return Err(anyhow!("Transport error: {}", e));
                }
                None => {
                    debug!("EOF reached");
                    return Ok(None);
                }
            };
            if line.trim().is_empty() {
                continue;
            }
            debug!("Received: {}", line);
            return parse_message(&line).map(Some);
        }
    }

    pub async fn write_response(&mut self, response: McpResponse) -> Result<()> {
        let json = serde_json::to_string(&response)?;
        debug!("Sending: {}", json);
        self.writer.send(json).await?;
        Ok(())
    }

    #[cfg(test)]
    pub fn into_writer(self) -> W {
        self.writer.into_inner()
    }
}

/// Messages with an `id` are requests, everything else is a notification.
fn parse_message(line: &str) -> Result<McpMessage> {
    let value: serde_json::Value =
        serde_json::from_str(line).map_err(|e| anyhow!("Invalid JSON: {}", e))?;

    let obj = value
        .as_object()
        .ok_or_else(|| anyhow!("Invalid JSON-RPC message structure"))?;

    if obj.contains_key("id") {
        serde_json::from_value::<McpRequest>(value)
            .map(McpMessage::Request)
            .map_err(|e| anyhow!("Invalid JSON-RPC request: {}", e))
    } else {
        serde_json::from_value::<McpNotification>(value)
            .map(McpMessage::Notification)
            .map_err(|e| anyhow!("Invalid JSON-RPC notification: {}", e))
    }
}
