//! OpenAI 兼容 API 客户端
//!
//! 纯文本补全通过 async_openai 调用任意 OpenAI 兼容端点（可配置 base_url）；
//! 带工具目录的补全直接以 OpenAI function-calling JSON 经 reqwest 发送，工具 schema 原样透传。

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_openai::config::OpenAIConfig;
use async_openai::types::chat::{
    ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
    ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
    CreateChatCompletionRequestArgs,
};
use async_openai::Client;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::core::LlmError;
use crate::llm::{Completion, LlmClient, ToolInvocation, ToolSpec};
use crate::memory::{Message, Role};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Token 使用统计（累计值）
#[derive(Debug, Clone, Default)]
pub struct TokenUsage {
    pub prompt_tokens: Arc<AtomicU64>,
    pub completion_tokens: Arc<AtomicU64>,
    pub total_tokens: Arc<AtomicU64>,
}

impl TokenUsage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, prompt: u64, completion: u64) {
        self.prompt_tokens.fetch_add(prompt, Ordering::Relaxed);
        self.completion_tokens.fetch_add(completion, Ordering::Relaxed);
        self.total_tokens.fetch_add(prompt + completion, Ordering::Relaxed);
    }

    pub fn get(&self) -> (u64, u64, u64) {
        (
            self.prompt_tokens.load(Ordering::Relaxed),
            self.completion_tokens.load(Ordering::Relaxed),
            self.total_tokens.load(Ordering::Relaxed),
        )
    }
}

/// 生成参数：模型、最大 token、温度、请求超时
#[derive(Debug, Clone)]
pub struct CompletionSettings {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub request_timeout_secs: u64,
}

impl Default for CompletionSettings {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            max_tokens: 200,
            temperature: 0.7,
            request_timeout_secs: 60,
        }
    }
}

/// OpenAI 兼容客户端
pub struct OpenAiClient {
    client: Client<OpenAIConfig>,
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    settings: CompletionSettings,
    /// 累计 token 使用统计
    usage: TokenUsage,
}

impl OpenAiClient {
    pub fn new(base_url: Option<&str>, api_key: Option<&str>, settings: CompletionSettings) -> Self {
        let api_key = api_key
            .map(String::from)
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
            .unwrap_or_else(|| "sk-placeholder".to_string());
        let base_url = base_url
            .unwrap_or(DEFAULT_BASE_URL)
            .trim_end_matches('/')
            .to_string();

        let config = OpenAIConfig::new()
            .with_api_base(base_url.clone())
            .with_api_key(api_key.clone());
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .build()
            .unwrap_or_default();

        Self {
            // 两条路径共用同一个带超时的 HTTP 客户端
            client: Client::with_config(config).with_http_client(http.clone()),
            http,
            base_url,
            api_key,
            settings,
            usage: TokenUsage::new(),
        }
    }

    fn to_openai_messages(
        &self,
        messages: &[Message],
    ) -> Result<Vec<ChatCompletionRequestMessage>, LlmError> {
        messages
            .iter()
            .map(|m| {
                let built = match m.role {
                    Role::System => ChatCompletionRequestSystemMessageArgs::default()
                        .content(m.content.clone())
                        .build()
                        .map(ChatCompletionRequestMessage::System),
                    Role::User => ChatCompletionRequestUserMessageArgs::default()
                        .content(m.content.clone())
                        .build()
                        .map(ChatCompletionRequestMessage::User),
                    Role::Assistant => ChatCompletionRequestAssistantMessageArgs::default()
                        .content(m.content.clone())
                        .build()
                        .map(ChatCompletionRequestMessage::Assistant),
                };
                built.map_err(|e| LlmError::Request(e.to_string()))
            })
            .collect()
    }

    fn function_calling_body(&self, messages: &[Message], tools: &[ToolSpec]) -> Value {
        let messages: Vec<Value> = messages
            .iter()
            .map(|m| {
                let role = match m.role {
                    Role::System => "system",
                    Role::User => "user",
                    Role::Assistant => "assistant",
                };
                json!({ "role": role, "content": m.content })
            })
            .collect();
        let mut body = json!({
            "model": self.settings.model,
            "messages": messages,
            "max_tokens": self.settings.max_tokens,
            "temperature": self.settings.temperature,
        });
        if !tools.is_empty() {
            let tools: Vec<Value> = tools
                .iter()
                .map(|t| {
                    json!({
                        "type": "function",
                        "function": {
                            "name": t.name,
                            "description": t.description,
                            "parameters": t.parameters,
                        }
                    })
                })
                .collect();
            body["tools"] = Value::Array(tools);
            body["tool_choice"] = json!("auto");
        }
        body
    }
}

#[derive(Debug, Deserialize)]
struct WireResponse {
    #[serde(default)]
    choices: Vec<WireChoice>,
    usage: Option<WireUsage>,
}

#[derive(Debug, Deserialize)]
struct WireChoice {
    message: WireMessage,
}

#[derive(Debug, Deserialize)]
struct WireMessage {
    content: Option<String>,
    /// 部分兼容端点会返回 null
    #[serde(default)]
    tool_calls: Option<Vec<WireToolCall>>,
}

#[derive(Debug, Deserialize)]
struct WireToolCall {
    function: WireFunction,
}

#[derive(Debug, Deserialize)]
struct WireFunction {
    name: String,
    #[serde(default)]
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct WireUsage {
    prompt_tokens: u64,
    completion_tokens: u64,
}

#[async_trait]
impl LlmClient for OpenAiClient {
    fn token_usage(&self) -> (u64, u64, u64) {
        self.usage.get()
    }

    async fn complete(&self, messages: &[Message]) -> Result<String, LlmError> {
        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.settings.model)
            .messages(self.to_openai_messages(messages)?)
            .max_completion_tokens(self.settings.max_tokens)
            .temperature(self.settings.temperature)
            .build()
            .map_err(|e| LlmError::Request(e.to_string()))?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e| LlmError::Request(e.to_string()))?;

        if let Some(usage) = &response.usage {
            self.usage
                .add(usage.prompt_tokens as u64, usage.completion_tokens as u64);
        }

        response
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .ok_or(LlmError::EmptyResponse)
    }

    async fn complete_with_tools(
        &self,
        messages: &[Message],
        tools: &[ToolSpec],
    ) -> Result<Completion, LlmError> {
        let body = self.function_calling_body(messages, tools);
        let resp = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::Request(e.to_string()))?;

        let status = resp.status();
        if status.as_u16() == 429 {
            return Err(LlmError::RateLimited);
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(LlmError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: WireResponse = resp
            .json()
            .await
            .map_err(|e| LlmError::Request(e.to_string()))?;
        if let Some(u) = &parsed.usage {
            self.usage.add(u.prompt_tokens, u.completion_tokens);
        }

        let message = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message)
            .ok_or(LlmError::EmptyResponse)?;

        // 只取第一个工具调用：回合内工具串行执行
        if let Some(call) = message.tool_calls.unwrap_or_default().into_iter().next() {
            return Ok(Completion::ToolCall(ToolInvocation::new(
                call.function.name,
                call.function.arguments,
            )));
        }
        Ok(Completion::Text(message.content.unwrap_or_default()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> OpenAiClient {
        OpenAiClient::new(
            Some("http://localhost:9/v1/"),
            Some("sk-test"),
            CompletionSettings::default(),
        )
    }

    #[test]
    fn test_body_without_tools_has_no_tool_choice() {
        let body = client().function_calling_body(&[Message::user("hi")], &[]);
        assert!(body.get("tools").is_none());
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(body["max_tokens"], 200);
    }

    #[test]
    fn test_body_carries_catalog_verbatim() {
        let spec = ToolSpec {
            name: "get_current_time".to_string(),
            description: "Get the current system time.".to_string(),
            parameters: json!({"type": "object", "properties": {}}),
        };
        let body = client().function_calling_body(&[Message::system("s")], &[spec]);
        assert_eq!(body["tools"][0]["function"]["name"], "get_current_time");
        assert_eq!(body["tool_choice"], "auto");
    }

    /// 接受连接但从不回应的本地端点
    async fn silent_endpoint() -> (String, tokio::task::JoinHandle<()>) {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((sock, _)) = listener.accept().await {
                held.push(sock);
            }
        });
        (format!("http://{addr}/v1"), handle)
    }

    #[tokio::test]
    async fn test_plain_completion_honours_request_timeout() {
        let (base, server) = silent_endpoint().await;
        let settings = CompletionSettings {
            request_timeout_secs: 1,
            ..CompletionSettings::default()
        };
        let client = OpenAiClient::new(Some(&base), Some("sk-test"), settings);

        let outcome = tokio::time::timeout(
            Duration::from_secs(10),
            client.complete(&[Message::user("hello")]),
        )
        .await;
        server.abort();
        assert!(matches!(outcome, Ok(Err(LlmError::Request(_)))));
    }

    #[tokio::test]
    async fn test_tool_completion_honours_request_timeout() {
        let (base, server) = silent_endpoint().await;
        let settings = CompletionSettings {
            request_timeout_secs: 1,
            ..CompletionSettings::default()
        };
        let client = OpenAiClient::new(Some(&base), Some("sk-test"), settings);

        let outcome = tokio::time::timeout(
            Duration::from_secs(10),
            client.complete_with_tools(&[Message::user("hello")], &[]),
        )
        .await;
        server.abort();
        assert!(matches!(outcome, Ok(Err(LlmError::Request(_)))));
    }

    /// 读完一个请求后返回固定 JSON 的本地端点
    async fn canned_endpoint(body: &'static str) -> (String, tokio::task::JoinHandle<()>) {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            while let Ok((mut sock, _)) = listener.accept().await {
                let mut buf = Vec::new();
                let mut chunk = [0u8; 4096];
                loop {
                    let n = sock.read(&mut chunk).await.unwrap_or(0);
                    if n == 0 {
                        break;
                    }
                    buf.extend_from_slice(&chunk[..n]);
                    let text = String::from_utf8_lossy(&buf).to_string();
                    if let Some(end) = text.find("\r\n\r\n") {
                        let len = text[..end]
                            .lines()
                            .find_map(|l| {
                                let (k, v) = l.split_once(':')?;
                                k.eq_ignore_ascii_case("content-length")
                                    .then(|| v.trim().parse::<usize>().ok())
                                    .flatten()
                            })
                            .unwrap_or(0);
                        if buf.len() >= end + 4 + len {
                            break;
                        }
                    }
                }
                let response = format!(
                    "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                    body.len(),
                    body
                );
                let _ = sock.write_all(response.as_bytes()).await;
                let _ = sock.shutdown().await;
            }
        });
        (format!("http://{addr}/v1"), handle)
    }

    #[tokio::test]
    async fn test_tool_completion_accumulates_token_usage() {
        let (base, server) = canned_endpoint(
            r#"{"choices":[{"message":{"content":"Hello, sir.","tool_calls":null}}],"usage":{"prompt_tokens":12,"completion_tokens":5,"total_tokens":17}}"#,
        )
        .await;
        let client = OpenAiClient::new(Some(&base), Some("sk-test"), CompletionSettings::default());
        assert_eq!(client.token_usage(), (0, 0, 0));

        for _ in 0..2 {
            let reply = client
                .complete_with_tools(&[Message::user("hello")], &[])
                .await
                .unwrap();
            assert!(matches!(reply, Completion::Text(ref t) if t == "Hello, sir."));
        }
        server.abort();
        assert_eq!(client.token_usage(), (24, 10, 34));
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        assert_eq!(client().base_url, "http://localhost:9/v1");
    }

    #[test]
    fn test_wire_response_tool_call_parses() {
        let raw = r#"{"choices":[{"message":{"content":null,"tool_calls":[{"id":"c1","type":"function","function":{"name":"simple_calculator","arguments":"{\"expression\":\"2+2\"}"}}]}}]}"#;
        let parsed: WireResponse = serde_json::from_str(raw).unwrap();
        let calls = parsed.choices[0].message.tool_calls.as_deref().unwrap_or_default();
        assert_eq!(calls[0].function.name, "simple_calculator");
    }

    #[test]
    fn test_wire_response_null_tool_calls() {
        let raw = r#"{"choices":[{"message":{"content":"Hello, sir.","tool_calls":null}}]}"#;
        let parsed: WireResponse = serde_json::from_str(raw).unwrap();
        assert!(parsed.choices[0].message.tool_calls.is_none());
    }
}
