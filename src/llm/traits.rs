//! LLM 客户端抽象
//!
//! 所有后端（OpenAI 兼容 / Mock）实现 LlmClient：complete（纯文本）、complete_with_tools（可返回工具调用）。

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::LlmError;
use crate::memory::Message;

/// 工具目录中的一项：发给 LLM 的名称、描述与参数 JSON Schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// LLM 请求调用的工具；arguments 为原始 JSON 文本，由调用方解码
#[derive(Debug, Clone, PartialEq)]
pub struct ToolInvocation {
    pub name: String,
    pub arguments: String,
}

impl ToolInvocation {
    pub fn new(name: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            arguments: arguments.into(),
        }
    }

    /// 解码参数；空串视为无参数
    pub fn decode_arguments(&self) -> Result<Value, serde_json::Error> {
        if self.arguments.trim().is_empty() {
            return Ok(Value::Object(Default::default()));
        }
        serde_json::from_str(&self.arguments)
    }
}

/// 带工具目录的补全结果：文本或工具调用
#[derive(Debug, Clone, PartialEq)]
pub enum Completion {
    Text(String),
    ToolCall(ToolInvocation),
}

/// LLM 客户端 trait
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// 纯文本补全（规划、合成）
    async fn complete(&self, messages: &[Message]) -> Result<String, LlmError>;

    /// 带工具目录的补全（单轮路径、下一步决策）
    async fn complete_with_tools(
        &self,
        messages: &[Message],
        tools: &[ToolSpec],
    ) -> Result<Completion, LlmError>;

    /// 获取累计 token 使用统计：(prompt_tokens, completion_tokens, total_tokens)
    /// 默认返回 (0, 0, 0)，具体实现可覆盖
    fn token_usage(&self) -> (u64, u64, u64) {
        (0, 0, 0)
    }
}
