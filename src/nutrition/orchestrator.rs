use std::sync::Arc;

use tracing::{debug, info, instrument};

use super::tools::{catalog, Tool, ToolRegistry};
use crate::error::Result;
use crate::llm::{ChatBackend, ChatMessage, ChatRequest, ToolChoice};

/// Runs one chat exchange with at most a single round of tool calls.
///
/// Round one offers the tool catalog with `auto` choice. A reply without tool
/// calls is the answer. Otherwise every requested call is executed in order,
/// the results are appended after the assistant message that asked for them,
/// and a second request without tools produces the final answer.
pub struct ToolDispatchOrchestrator {
    backend: Arc<dyn ChatBackend>,
    tools: ToolRegistry,
    model: String,
}

impl ToolDispatchOrchestrator {
    pub fn new(backend: Arc<dyn ChatBackend>, model: impl Into<String>, tools: ToolRegistry) -> Self {
        Self {
            backend,
            tools,
            model: model.into(),
        }
    }

    #[instrument(skip_all)]
    pub async fn run(&self, system_prompt: String, user_input: &str) -> Result<String> {
        let mut messages = vec![
            ChatMessage::system(system_prompt),
            ChatMessage::user(user_input),
        ];

        let request = ChatRequest::new(self.model.clone(), messages.clone())
            .with_tools(catalog(), ToolChoice::Auto);
        let reply = self.backend.complete(request).await?;

        if reply.tool_calls.is_empty() {
            debug!("answered without tools");
            return Ok(reply.content.unwrap_or_default());
        }

        let calls = reply.tool_calls.clone();
        info!(count = calls.len(), "model requested tool calls");
        messages.push(reply.into_message());

        for call in &calls {
            let tool = Tool::from_name(&call.name)?;
            let invocation = tool.parse_arguments(&call.arguments)?;
            debug!(id = %call.id, tool = tool.name(), "dispatching tool call");
            let content = self.tools.execute(invocation).await?;
            messages.push(ChatMessage::Tool {
                tool_call_id: call.id.clone(),
                name: tool.name().to_string(),
                content,
            });
        }

        let final_reply = self
            .backend
            .complete(ChatRequest::new(self.model.clone(), messages))
            .await?;
        Ok(final_reply.content.unwrap_or_default())
    }
}
