use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use super::{ChatBackend, ChatMessage, ChatReply, ChatRequest, ToolCall, ToolDefinition};
use crate::config::LlmConfig;
use crate::error::{AssistantError, Result};

const RETRY_BASE_DELAY: Duration = Duration::from_millis(500);

// --- wire format ---

#[derive(Debug, Serialize)]
struct WireRequest {
    model: String,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<WireTool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<WireResponseFormat>,
}

#[derive(Debug, Serialize)]
struct WireResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Serialize)]
struct WireTool {
    #[serde(rename = "type")]
    kind: &'static str,
    function: WireFunction,
}

#[derive(Debug, Serialize)]
struct WireFunction {
    name: String,
    description: String,
    parameters: Value,
}

#[derive(Debug, Serialize)]
struct WireMessage {
    role: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<WireToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireToolCall {
    id: String,
    #[serde(rename = "type", default = "function_kind")]
    kind: String,
    function: WireFunctionCall,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireFunctionCall {
    name: String,
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct WireResponse {
    choices: Vec<WireChoice>,
}

#[derive(Debug, Deserialize)]
struct WireChoice {
    message: WireReplyMessage,
}

#[derive(Debug, Deserialize)]
struct WireReplyMessage {
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<WireToolCall>>,
}

fn function_kind() -> String {
    "function".into()
}

impl From<&ToolCall> for WireToolCall {
    fn from(c: &ToolCall) -> Self {
        Self {
            id: c.id.clone(),
            kind: function_kind(),
            function: WireFunctionCall {
                name: c.name.clone(),
                arguments: c.arguments.clone(),
            },
        }
    }
}

impl From<WireToolCall> for ToolCall {
    fn from(c: WireToolCall) -> Self {
        Self {
            id: c.id,
            name: c.function.name,
            arguments: c.function.arguments,
        }
    }
}

impl From<&ToolDefinition> for WireTool {
    fn from(t: &ToolDefinition) -> Self {
        Self {
            kind: "function",
            function: WireFunction {
                name: t.name.clone(),
                description: t.description.clone(),
                parameters: t.parameters.clone(),
            },
        }
    }
}

impl From<&ChatMessage> for WireMessage {
    fn from(m: &ChatMessage) -> Self {
        let mut wire = WireMessage {
            role: m.role(),
            content: None,
            tool_calls: None,
            tool_call_id: None,
            name: None,
        };
        match m {
            ChatMessage::System { content } | ChatMessage::User { content } => {
                wire.content = Some(content.clone());
            }
            ChatMessage::Assistant { content, tool_calls } => {
                wire.content = content.clone();
                if !tool_calls.is_empty() {
                    wire.tool_calls = Some(tool_calls.iter().map(WireToolCall::from).collect());
                }
            }
            ChatMessage::Tool {
                tool_call_id,
                name,
                content,
            } => {
                wire.tool_call_id = Some(tool_call_id.clone());
                wire.name = Some(name.clone());
                wire.content = Some(content.clone());
            }
        }
        wire
    }
}

impl From<&ChatRequest> for WireRequest {
    fn from(r: &ChatRequest) -> Self {
        Self {
            model: r.model.clone(),
            messages: r.messages.iter().map(WireMessage::from).collect(),
            tools: r
                .tools
                .as_ref()
                .map(|tools| tools.iter().map(WireTool::from).collect()),
            tool_choice: r.tool_choice.map(|c| c.as_str()),
            response_format: r
                .json_output
                .then_some(WireResponseFormat { kind: "json_object" }),
        }
    }
}

// --- client ---

enum Failure {
    Transient(String),
    Fatal(String),
}

impl Failure {
    fn from_reqwest(stage: &str, e: reqwest::Error) -> Self {
        let msg = format!("{stage}: {e}");
        if e.is_timeout() || e.is_connect() {
            Failure::Transient(msg)
        } else {
            Failure::Fatal(msg)
        }
    }

    fn into_message(self) -> String {
        match self {
            Failure::Transient(m) | Failure::Fatal(m) => m,
        }
    }
}

/// Chat-completions client for OpenAI and compatible endpoints.
pub struct OpenAiBackend {
    client: Client,
    config: LlmConfig,
}

impl OpenAiBackend {
    pub fn new(config: LlmConfig) -> anyhow::Result<Self> {
        anyhow::ensure!(!config.api_key.is_empty(), "OPENAI_API_KEY is empty");
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("build http client")?;
        Ok(Self { client, config })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        )
    }

    async fn send_once(&self, body: &WireRequest) -> std::result::Result<WireResponse, Failure> {
        let mut req = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.config.api_key)
            .json(body);
        if let Some(org) = &self.config.organization {
            req = req.header("OpenAI-Organization", org);
        }

        let response = req
            .send()
            .await
            .map_err(|e| Failure::from_reqwest("send chat completion", e))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let msg = format!("chat completion returned {status}: {text}");
            return Err(
                if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
                    Failure::Transient(msg)
                } else {
                    Failure::Fatal(msg)
                },
            );
        }

        response
            .json::<WireResponse>()
            .await
            .map_err(|e| Failure::from_reqwest("decode chat completion envelope", e))
    }
}

#[async_trait]
impl ChatBackend for OpenAiBackend {
    async fn complete(&self, request: ChatRequest) -> Result<ChatReply> {
        let body = WireRequest::from(&request);
        debug!(
            model = %body.model,
            messages = body.messages.len(),
            tools = body.tools.as_ref().map_or(0, Vec::len),
            json_output = request.json_output,
            "sending chat completion"
        );

        let mut attempt: u32 = 0;
        let resp = loop {
            match self.send_once(&body).await {
                Ok(resp) => break resp,
                Err(Failure::Transient(msg)) if attempt < self.config.max_retries => {
                    let delay = RETRY_BASE_DELAY * 2u32.pow(attempt);
                    warn!(attempt, delay_ms = delay.as_millis() as u64, error = %msg, "retrying chat completion");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(failure) => return Err(AssistantError::Backend(failure.into_message())),
            }
        };

        let message = resp
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| AssistantError::Backend("chat completion had no choices".into()))?
            .message;

        Ok(ChatReply {
            content: message.content,
            tool_calls: message
                .tool_calls
                .unwrap_or_default()
                .into_iter()
                .map(ToolCall::from)
                .collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ToolChoice;
    use mockito::Matcher;
    use serde_json::json;

    fn config(base_url: String, max_retries: u32) -> LlmConfig {
        LlmConfig {
            api_key: "sk-test".into(),
            organization: Some("org-test".into()),
            base_url,
            model: "gpt-test".into(),
            timeout_secs: 5,
            max_retries,
        }
    }

    fn tool() -> ToolDefinition {
        ToolDefinition {
            name: "generate_log_entry".into(),
            description: "log a meal".into(),
            parameters: json!({"type": "object"}),
        }
    }

    #[test]
    fn new_rejects_empty_api_key() {
        let mut cfg = config("http://localhost".into(), 0);
        cfg.api_key = String::new();
        assert!(OpenAiBackend::new(cfg).is_err());
    }

    #[test]
    fn wire_request_carries_tools_and_json_flag() {
        let req = ChatRequest::new("m", vec![ChatMessage::system("s"), ChatMessage::user("u")])
            .with_tools(vec![tool()], ToolChoice::Auto);
        let wire = serde_json::to_value(WireRequest::from(&req)).unwrap();
        assert_eq!(wire["tool_choice"], "auto");
        assert_eq!(wire["tools"][0]["type"], "function");
        assert_eq!(wire["tools"][0]["function"]["name"], "generate_log_entry");
        assert!(wire.get("response_format").is_none());
        assert_eq!(wire["messages"][1]["role"], "user");

        let req = ChatRequest::new("m", vec![ChatMessage::user("u")]).with_json_output();
        let wire = serde_json::to_value(WireRequest::from(&req)).unwrap();
        assert_eq!(wire["response_format"]["type"], "json_object");
        assert!(wire.get("tools").is_none());
        assert!(wire.get("tool_choice").is_none());
    }

    #[test]
    fn wire_messages_for_tool_round() {
        let call = ToolCall {
            id: "call_1".into(),
            name: "generate_log_entry".into(),
            arguments: r#"{"meal_id":"x","notes":"y"}"#.into(),
        };
        let assistant = ChatReply::with_tool_calls(vec![call]).into_message();
        let wire = serde_json::to_value(WireMessage::from(&assistant)).unwrap();
        assert_eq!(wire["role"], "assistant");
        assert!(wire.get("content").is_none());
        assert_eq!(wire["tool_calls"][0]["id"], "call_1");
        assert_eq!(wire["tool_calls"][0]["function"]["arguments"], r#"{"meal_id":"x","notes":"y"}"#);

        let result = ChatMessage::Tool {
            tool_call_id: "call_1".into(),
            name: "generate_log_entry".into(),
            content: "{}".into(),
        };
        let wire = serde_json::to_value(WireMessage::from(&result)).unwrap();
        assert_eq!(wire["role"], "tool");
        assert_eq!(wire["tool_call_id"], "call_1");
        assert_eq!(wire["name"], "generate_log_entry");
    }

    #[tokio::test]
    async fn complete_parses_tool_calls() {
        let mut server = mockito::Server::new_async().await;
        let body = json!({
            "choices": [{
                "index": 0,
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": "call_abc",
                        "type": "function",
                        "function": {"name": "generate_log_entry", "arguments": "{\"meal_id\":\"lunch\",\"notes\":\"salad\"}"}
                    }]
                },
                "finish_reason": "tool_calls"
            }]
        });
        let mock = server
            .mock("POST", "/chat/completions")
            .match_header("authorization", "Bearer sk-test")
            .match_header("openai-organization", "org-test")
            .match_body(Matcher::PartialJson(json!({"model": "gpt-test", "tool_choice": "auto"})))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(body.to_string())
            .create_async()
            .await;

        let backend = OpenAiBackend::new(config(server.url(), 0)).unwrap();
        let req = ChatRequest::new("gpt-test", vec![ChatMessage::user("I ate a salad")])
            .with_tools(vec![tool()], ToolChoice::Auto);
        let reply = backend.complete(req).await.unwrap();

        mock.assert_async().await;
        assert_eq!(reply.content, None);
        assert_eq!(reply.tool_calls.len(), 1);
        assert_eq!(reply.tool_calls[0].id, "call_abc");
        assert_eq!(reply.tool_calls[0].name, "generate_log_entry");
    }

    #[tokio::test]
    async fn complete_maps_client_error_to_backend_error() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/chat/completions")
            .with_status(401)
            .with_body(r#"{"error":{"message":"bad key"}}"#)
            .expect(1)
            .create_async()
            .await;

        let backend = OpenAiBackend::new(config(server.url(), 3)).unwrap();
        let err = backend
            .complete(ChatRequest::new("gpt-test", vec![ChatMessage::user("hi")]))
            .await
            .unwrap_err();

        mock.assert_async().await;
        assert!(matches!(err, AssistantError::Backend(ref m) if m.contains("401")));
    }

    #[tokio::test]
    async fn complete_retries_server_errors_up_to_limit() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/chat/completions")
            .with_status(503)
            .expect(2)
            .create_async()
            .await;

        let backend = OpenAiBackend::new(config(server.url(), 1)).unwrap();
        let err = backend
            .complete(ChatRequest::new("gpt-test", vec![ChatMessage::user("hi")]))
            .await
            .unwrap_err();

        mock.assert_async().await;
        assert!(matches!(err, AssistantError::Backend(_)));
    }

    #[tokio::test]
    async fn complete_recovers_after_rate_limit() {
        let mut server = mockito::Server::new_async().await;
        // Mocks are tried in creation order while they still owe hits.
        let limited = server
            .mock("POST", "/chat/completions")
            .with_status(429)
            .with_body(r#"{"error":{"message":"slow down"}}"#)
            .expect(1)
            .create_async()
            .await;
        let answered = server
            .mock("POST", "/chat/completions")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"choices":[{"index":0,"message":{"role":"assistant","content":"hello"}}]}"#)
            .expect(1)
            .create_async()
            .await;

        let backend = OpenAiBackend::new(config(server.url(), 1)).unwrap();
        let reply = backend
            .complete(ChatRequest::new("gpt-test", vec![ChatMessage::user("hi")]))
            .await
            .unwrap();

        limited.assert_async().await;
        answered.assert_async().await;
        assert_eq!(reply.content.as_deref(), Some("hello"));
    }

    #[tokio::test]
    async fn complete_gives_up_on_rate_limit_without_retries() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/chat/completions")
            .with_status(429)
            .expect(1)
            .create_async()
            .await;

        let backend = OpenAiBackend::new(config(server.url(), 0)).unwrap();
        let err = backend
            .complete(ChatRequest::new("gpt-test", vec![ChatMessage::user("hi")]))
            .await
            .unwrap_err();

        mock.assert_async().await;
        assert!(matches!(err, AssistantError::Backend(ref m) if m.contains("429")));
    }

    #[tokio::test]
    async fn complete_times_out_as_backend_error() {
        // Accepts the connection and never answers.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let silent = tokio::spawn(async move {
            let (_socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(30)).await;
        });

        let mut cfg = config(format!("http://{addr}"), 0);
        cfg.timeout_secs = 1;
        let backend = OpenAiBackend::new(cfg).unwrap();
        let err = backend
            .complete(ChatRequest::new("gpt-test", vec![ChatMessage::user("hi")]))
            .await
            .unwrap_err();

        silent.abort();
        assert!(matches!(err, AssistantError::Backend(ref m) if m.starts_with("send chat completion")));
    }

    #[tokio::test]
    async fn complete_maps_refused_connection_to_backend_error() {
        let addr = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap()
        };

        let backend = OpenAiBackend::new(config(format!("http://{addr}"), 1)).unwrap();
        let err = backend
            .complete(ChatRequest::new("gpt-test", vec![ChatMessage::user("hi")]))
            .await
            .unwrap_err();

        assert!(matches!(err, AssistantError::Backend(ref m) if m.starts_with("send chat completion")));
    }

    #[tokio::test]
    async fn complete_rejects_empty_choices() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/chat/completions")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"choices":[]}"#)
            .create_async()
            .await;

        let backend = OpenAiBackend::new(config(server.url(), 0)).unwrap();
        let err = backend
            .complete(ChatRequest::new("gpt-test", vec![ChatMessage::user("hi")]))
            .await
            .unwrap_err();
        assert!(matches!(err, AssistantError::Backend(ref m) if m.contains("no choices")));
    }
}
