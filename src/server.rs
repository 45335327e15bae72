//! Line-delimited JSON tool server on stdin/stdout.
//!
//! Each input line is a request `{"id": ..., "tool": "...", "args": {...}}`;
//! each output line is the matching response `{"id": ..., "ok": bool, "text": "..."}`.
//! Requests are handled one at a time, in order.

use color_eyre::{eyre::eyre, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, info, warn};

use crate::tools::{self, ToolCall};
use crate::ynab::cached_client::CachedYnabClient;

#[derive(Debug, Deserialize)]
struct Request {
  #[serde(default)]
  id: Value,
  #[serde(flatten)]
  call: ToolCall,
}

#[derive(Debug, PartialEq, Serialize)]
struct Response {
  id: Value,
  ok: bool,
  text: String,
}

impl Response {
  fn from_result(id: Value, result: Result<String>) -> Self {
    match result {
      Ok(text) => Self { id, ok: true, text },
      Err(e) => Self {
        id,
        ok: false,
        text: format!("{:#}", e),
      },
    }
  }
}

/// Serve tool calls until stdin closes.
pub async fn serve(client: CachedYnabClient, default_budget: String) -> Result<()> {
  let mut lines = BufReader::new(tokio::io::stdin()).lines();
  let mut stdout = tokio::io::stdout();
  info!("Serving tools on stdin (default budget {})", default_budget);

  while let Some(line) = lines
    .next_line()
    .await
    .map_err(|e| eyre!("Failed to read request: {}", e))?
  {
    if line.trim().is_empty() {
      continue;
    }

    let response = match serde_json::from_str::<Request>(&line) {
      Ok(request) => {
        debug!("Tool call {} {:?}", request.call.tool, request.id);
        let result = tools::dispatch(&client, &default_budget, &request.call).await;
        if let Err(e) = &result {
          warn!("Tool {} failed: {:#}", request.call.tool, e);
        }
        Response::from_result(request.id, result)
      }
      Err(e) => Response::from_result(Value::Null, Err(eyre!("Malformed request: {}", e))),
    };

    write_response(&mut stdout, &response).await?;
  }

  info!("Input closed, shutting down");
  Ok(())
}

async fn write_response<W: AsyncWrite + Unpin>(out: &mut W, response: &Response) -> Result<()> {
  let mut line =
    serde_json::to_vec(response).map_err(|e| eyre!("Failed to encode response: {}", e))?;
  line.push(b'\n');
  out
    .write_all(&line)
    .await
    .map_err(|e| eyre!("Failed to write response: {}", e))?;
  out
    .flush()
    .await
    .map_err(|e| eyre!("Failed to write response: {}", e))
}
