//! Mock LLM 客户端（用于测试，无需 API）
//!
//! 按脚本依次返回预设的文本 / 工具调用 / 错误；脚本耗尽后回显最后一条 User 消息。
//! 记录每次请求的消息与工具目录，便于测试断言 prompt 内容。

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::core::LlmError;
use crate::llm::{Completion, LlmClient, ToolInvocation, ToolSpec};
use crate::memory::{Message, Role};

/// 一次被记录的请求
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub messages: Vec<Message>,
    /// None 表示纯文本补全
    pub tool_names: Option<Vec<String>>,
}

/// Mock 客户端：脚本化回复
#[derive(Debug, Default)]
pub struct MockLlmClient {
    texts: Mutex<VecDeque<Result<String, LlmError>>>,
    completions: Mutex<VecDeque<Result<Completion, LlmError>>>,
    /// 工具补全脚本耗尽后始终返回此结果
    repeat: Option<Completion>,
    requests: Mutex<Vec<RecordedRequest>>,
    /// 每次请求计入的 (prompt, completion) token 数
    per_request_usage: (u64, u64),
    usage: Mutex<(u64, u64)>,
}

fn last_user(messages: &[Message]) -> String {
    messages
        .iter()
        .rev()
        .find(|m| m.role == Role::User)
        .map(|m| m.content.clone())
        .unwrap_or_else(|| "(no input)".to_string())
}

impl MockLlmClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加一条纯文本补全回复
    pub fn with_text(self, text: impl Into<String>) -> Self {
        self.push_text(Ok(text.into()));
        self
    }

    pub fn with_text_error(self, err: LlmError) -> Self {
        self.push_text(Err(err));
        self
    }

    /// 追加一条工具调用回复
    pub fn with_tool_call(self, name: &str, arguments: serde_json::Value) -> Self {
        self.push_completion(Ok(Completion::ToolCall(ToolInvocation::new(
            name,
            arguments.to_string(),
        ))));
        self
    }

    /// 追加一条参数为任意原始文本的工具调用（用于构造非法 JSON）
    pub fn with_raw_tool_call(self, name: &str, raw_arguments: &str) -> Self {
        self.push_completion(Ok(Completion::ToolCall(ToolInvocation::new(
            name,
            raw_arguments,
        ))));
        self
    }

    /// 追加一条带工具目录请求的文本回复
    pub fn with_reply(self, text: impl Into<String>) -> Self {
        self.push_completion(Ok(Completion::Text(text.into())));
        self
    }

    pub fn with_completion_error(self, err: LlmError) -> Self {
        self.push_completion(Err(err));
        self
    }

    /// 工具补全脚本耗尽后一直返回同一个工具调用
    pub fn repeating_tool_call(mut self, name: &str, arguments: serde_json::Value) -> Self {
        self.repeat = Some(Completion::ToolCall(ToolInvocation::new(
            name,
            arguments.to_string(),
        )));
        self
    }

    /// 每次请求按固定 token 数累计用量
    pub fn with_token_usage(mut self, prompt: u64, completion: u64) -> Self {
        self.per_request_usage = (prompt, completion);
        self
    }

    fn push_text(&self, reply: Result<String, LlmError>) {
        if let Ok(mut q) = self.texts.lock() {
            q.push_back(reply);
        }
    }

    fn push_completion(&self, reply: Result<Completion, LlmError>) {
        if let Ok(mut q) = self.completions.lock() {
            q.push_back(reply);
        }
    }

    fn record(&self, messages: &[Message], tools: Option<&[ToolSpec]>) {
        if let Ok(mut r) = self.requests.lock() {
            r.push(RecordedRequest {
                messages: messages.to_vec(),
                tool_names: tools.map(|t| t.iter().map(|s| s.name.clone()).collect()),
            });
        }
        if let Ok(mut u) = self.usage.lock() {
            u.0 += self.per_request_usage.0;
            u.1 += self.per_request_usage.1;
        }
    }

    /// 已收到的全部请求（按时间顺序）
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    /// 带工具目录的请求次数
    pub fn tool_request_count(&self) -> usize {
        self.requests()
            .iter()
            .filter(|r| r.tool_names.is_some())
            .count()
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    fn token_usage(&self) -> (u64, u64, u64) {
        let (prompt, completion) = self.usage.lock().map(|u| *u).unwrap_or_default();
        (prompt, completion, prompt + completion)
    }

    async fn complete(&self, messages: &[Message]) -> Result<String, LlmError> {
        self.record(messages, None);
        let next = self.texts.lock().ok().and_then(|mut q| q.pop_front());
        match next {
            Some(reply) => reply,
            None => Ok(format!("Echo from Mock: {}", last_user(messages))),
        }
    }

    async fn complete_with_tools(
        &self,
        messages: &[Message],
        tools: &[ToolSpec],
    ) -> Result<Completion, LlmError> {
        self.record(messages, Some(tools));
        let next = self.completions.lock().ok().and_then(|mut q| q.pop_front());
        match (next, &self.repeat) {
            (Some(reply), _) => reply,
            (None, Some(repeat)) => Ok(repeat.clone()),
            (None, None) => Ok(Completion::Text(format!(
                "Echo from Mock: {}",
                last_user(messages)
            ))),
        }
    }
}
