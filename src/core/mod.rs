//! 核心层：错误类型与展示

pub mod error;

pub use error::{AgentError, CapabilityError, LlmError, UNKNOWN_CAPABILITY_TEXT};
