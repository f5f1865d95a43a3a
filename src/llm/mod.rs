//! LLM 层：客户端抽象与实现（OpenAI 兼容 / Mock）

pub mod mock;
pub mod openai;
pub mod traits;

use std::sync::Arc;

pub use mock::{MockLlmClient, RecordedRequest};
pub use openai::{CompletionSettings, OpenAiClient};
pub use traits::{Completion, LlmClient, ToolInvocation, ToolSpec};

use crate::config::AppConfig;

/// 根据配置与环境变量选择 LLM 后端：有 OPENAI_API_KEY 时走 OpenAI 兼容端点，否则 Mock
pub fn create_llm_from_config(cfg: &AppConfig) -> Arc<dyn LlmClient> {
    let api_key = std::env::var("OPENAI_API_KEY").ok();
    let provider = cfg.llm.provider.to_lowercase();

    match (provider.as_str(), api_key) {
        ("mock", _) => {
            tracing::info!("Using Mock LLM (configured)");
            Arc::new(MockLlmClient::new())
        }
        (_, Some(key)) => {
            let settings = CompletionSettings {
                model: cfg.llm.model.clone(),
                max_tokens: cfg.llm.max_tokens,
                temperature: cfg.llm.temperature,
                request_timeout_secs: cfg.llm.timeouts.request,
            };
            tracing::info!(model = %settings.model, "Using OpenAI-compatible LLM");
            Arc::new(OpenAiClient::new(
                cfg.llm.base_url.as_deref(),
                Some(key.as_str()),
                settings,
            ))
        }
        (_, None) => {
            tracing::warn!("OPENAI_API_KEY not set, using Mock LLM");
            Arc::new(MockLlmClient::new())
        }
    }
}
