//! 联网检索工具：调用 Perplexity 兼容的 chat completions 端点获取实时信息
//!
//! 未配置 PERPLEXITY_API_KEY 时直接返回「无法联网」文本，不算失败。

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::config::WebSection;
use crate::core::CapabilityError;
use crate::tools::{parse_args, schema_of, Tool};

/// 无 API Key 时的回复
pub const NO_WEB_ACCESS_TEXT: &str = "Sorry, I don't have access to web search at the moment.";

const SEARCH_SYSTEM_PROMPT: &str = "You are a helpful AI assistant. Provide only the final answer. \
Do not include explanations. Provide a list if needed with a short intro.";

#[derive(Deserialize, JsonSchema)]
struct WebDataArgs {
    /// The search query or question to search the web for
    query: String,
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    choices: Vec<SearchChoice>,
}

#[derive(Deserialize)]
struct SearchChoice {
    message: SearchMessage,
}

#[derive(Deserialize)]
struct SearchMessage {
    #[serde(default)]
    content: String,
}

/// 联网检索：请求超时由 [tools.web].timeout_secs 决定
pub struct WebDataTool {
    client: Client,
    settings: WebSection,
    api_key: Option<String>,
}

impl WebDataTool {
    pub fn new(settings: WebSection, api_key: Option<String>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .unwrap_or_default();
        Self {
            client,
            settings,
            api_key: api_key.filter(|k| !k.trim().is_empty()),
        }
    }

    /// 从环境变量 PERPLEXITY_API_KEY 读取 Key
    pub fn from_env(settings: WebSection) -> Self {
        Self::new(settings, std::env::var("PERPLEXITY_API_KEY").ok())
    }

    fn request_body(&self, query: &str) -> Value {
        json!({
            "model": self.settings.model,
            "messages": [
                { "role": "system", "content": SEARCH_SYSTEM_PROMPT },
                { "role": "user", "content": query }
            ],
            "max_tokens": self.settings.max_tokens,
            "temperature": self.settings.temperature,
        })
    }
}

#[async_trait]
impl Tool for WebDataTool {
    fn name(&self) -> &str {
        "get_web_data"
    }

    fn description(&self) -> &str {
        "Fetch real-time web data about a topic or question (especially post-2020 events, news, or anything involving today, recent, or this week)."
    }

    fn parameters_schema(&self) -> Value {
        schema_of::<WebDataArgs>()
    }

    async fn execute(&self, args: Value) -> Result<String, CapabilityError> {
        let args: WebDataArgs = parse_args(self.name(), args)?;
        let Some(ref key) = self.api_key else {
            return Ok(NO_WEB_ACCESS_TEXT.to_string());
        };
        tracing::info!(query = %args.query, "web search");

        let resp = self
            .client
            .post(&self.settings.endpoint)
            .bearer_auth(key)
            .json(&self.request_body(&args.query))
            .send()
            .await
            .map_err(|e| CapabilityError::failed(self.name(), format!("request failed: {e}")))?;
        if !resp.status().is_success() {
            return Err(CapabilityError::failed(
                self.name(),
                format!("search service returned HTTP {}", resp.status().as_u16()),
            ));
        }
        let parsed: SearchResponse = resp
            .json()
            .await
            .map_err(|e| CapabilityError::failed(self.name(), format!("bad response: {e}")))?;
        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| CapabilityError::failed(self.name(), "no answer in response"))
    }
}
