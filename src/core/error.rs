//! 错误类型与展示
//!
//! 三层错误：LlmError（补全服务）、CapabilityError（工具调度边界）、AgentError（回合级）。
//! CapabilityError 在调度边界被转成文本 Observation；只有 AgentError 会短路一个回合，
//! 并由 user_message() 渲染成一句致歉文本。

use thiserror::Error;

/// 工具不存在时返回给回合的固定文本
pub const UNKNOWN_CAPABILITY_TEXT: &str = "Sorry, I don't know how to do that yet.";

/// 补全服务（LLM）调用失败：网络、鉴权、限流、空响应
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LlmError {
    #[error("request failed: {0}")]
    Request(String),

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("rate limited")]
    RateLimited,

    #[error("empty response")]
    EmptyResponse,
}

/// 工具调用失败：未知工具、缺参数、参数非法、运行时失败、超时
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CapabilityError {
    #[error("unknown capability: {0}")]
    Unknown(String),

    #[error("{capability}: missing required argument '{argument}'")]
    MissingArgument { capability: String, argument: String },

    #[error("{capability}: invalid argument: {detail}")]
    InvalidArgument { capability: String, detail: String },

    #[error("{capability} failed: {detail}")]
    Failed { capability: String, detail: String },

    #[error("{capability} timed out after {millis}ms")]
    Timeout { capability: String, millis: u64 },
}

impl CapabilityError {
    pub fn failed(capability: &str, detail: impl Into<String>) -> Self {
        Self::Failed {
            capability: capability.to_string(),
            detail: detail.into(),
        }
    }

    pub fn invalid(capability: &str, detail: impl Into<String>) -> Self {
        Self::InvalidArgument {
            capability: capability.to_string(),
            detail: detail.into(),
        }
    }

    /// 仅运行时失败与超时值得重试；参数问题重试也不会变好
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Failed { .. } | Self::Timeout { .. })
    }

    /// 渲染为可直接进入结果列表的文本
    pub fn to_observation(&self) -> String {
        match self {
            Self::Unknown(_) => UNKNOWN_CAPABILITY_TEXT.to_string(),
            Self::MissingArgument {
                capability,
                argument,
            } => format!("Couldn't {capability}: missing '{argument}'."),
            Self::InvalidArgument { capability, detail } | Self::Failed { capability, detail } => {
                format!("Couldn't {capability}: {detail}.")
            }
            Self::Timeout { capability, millis } if millis % 1000 == 0 => format!(
                "Couldn't {capability}: it took longer than {} seconds.",
                millis / 1000
            ),
            Self::Timeout { capability, millis } => {
                format!("Couldn't {capability}: it took longer than {millis} ms.")
            }
        }
    }
}

/// 回合级错误：只有这些会中断一个回合
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("malformed arguments for {capability}: {detail}")]
    ArgumentDecode { capability: String, detail: String },

    #[error("Config error: {0}")]
    Config(String),
}

impl AgentError {
    /// 面向用户的一句话；不暴露内部错误码
    pub fn user_message(&self) -> String {
        match self {
            AgentError::Llm(LlmError::RateLimited) => {
                "Sorry, I'm being rate limited right now. Please try again in a moment.".to_string()
            }
            AgentError::Llm(_) => {
                "Sorry, I couldn't reach my language service. Please try again.".to_string()
            }
            AgentError::ArgumentDecode { .. } => {
                "Sorry, I got confused working out how to do that. Could you rephrase?".to_string()
            }
            AgentError::Config(_) => {
                "Sorry, I'm not configured correctly for that request.".to_string()
            }
        }
    }
}
