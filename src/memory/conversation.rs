//! 对话数据：消息、工具调用记录、回合记录与有界历史
//!
//! ConversationHistory 只在尾部追加，超过上限时从头部淘汰（最旧先出）。

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 消息角色（与 LLM API 一致）
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    User,
    Assistant,
    System,
}

/// 单条消息
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }
}

/// 一次工具调用：名称、序列化参数、结果文本
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRecord {
    pub capability: String,
    pub arguments: String,
    pub result: String,
}

impl ToolCallRecord {
    pub fn new(
        capability: impl Into<String>,
        arguments: &serde_json::Value,
        result: impl Into<String>,
    ) -> Self {
        Self {
            capability: capability.into(),
            arguments: arguments.to_string(),
            result: result.into(),
        }
    }
}

/// 一个完成的用户回合
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Interaction {
    pub timestamp: DateTime<Utc>,
    pub query: String,
    pub response: String,
    pub tool_calls: Vec<ToolCallRecord>,
}

impl Interaction {
    pub fn new(
        query: impl Into<String>,
        response: impl Into<String>,
        tool_calls: Vec<ToolCallRecord>,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            query: query.into(),
            response: response.into(),
            tool_calls,
        }
    }
}

/// 有界对话历史：最多 max_len 个 Interaction
#[derive(Clone, Debug)]
pub struct ConversationHistory {
    interactions: VecDeque<Interaction>,
    max_len: usize,
}

impl ConversationHistory {
    pub fn new(max_len: usize) -> Self {
        Self {
            interactions: VecDeque::with_capacity(max_len.min(64)),
            max_len,
        }
    }

    pub fn push(&mut self, interaction: Interaction) {
        self.interactions.push_back(interaction);
        while self.interactions.len() > self.max_len {
            self.interactions.pop_front();
        }
    }

    /// 最近 n 条，按时间顺序
    pub fn recent(&self, n: usize) -> impl Iterator<Item = &Interaction> {
        let skip = self.interactions.len().saturating_sub(n);
        self.interactions.iter().skip(skip)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Interaction> {
        self.interactions.iter()
    }

    pub fn clear(&mut self) {
        self.interactions.clear();
    }

    pub fn len(&self) -> usize {
        self.interactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.interactions.is_empty()
    }
}
