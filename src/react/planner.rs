//! Planner：为多步请求生成简短的自然语言计划
//!
//! 计划是不透明文本，只作为下一步决策 prompt 的附加上下文；不做结构校验。

use std::sync::Arc;

use crate::core::LlmError;
use crate::llm::LlmClient;
use crate::memory::Message;

const PLANNER_SYSTEM_PROMPT: &str = "You plan tasks for a desktop voice assistant. \
Be brief. Each step must name exactly one of the listed capabilities.";

pub struct Planner {
    llm: Arc<dyn LlmClient>,
    max_steps: usize,
}

impl Planner {
    pub fn new(llm: Arc<dyn LlmClient>, max_steps: usize) -> Self {
        Self {
            llm,
            max_steps: max_steps.max(1),
        }
    }

    fn prompt(&self, query: &str, context_summary: &str, capabilities: &[(String, String)]) -> String {
        let catalog = capabilities
            .iter()
            .map(|(name, desc)| format!("- {name}: {desc}"))
            .collect::<Vec<_>>()
            .join("\n");
        let context = if context_summary.is_empty() {
            "(none)"
        } else {
            context_summary
        };
        format!(
            "Task: {query}\n\nRecent context: {context}\n\nAvailable capabilities:\n{catalog}\n\n\
            Plan at most {} step(s) to complete the task. Name one capability per step. \
            Reply with the numbered steps only.",
            self.max_steps
        )
    }

    /// 调用一次 LLM 得到计划文本
    pub async fn plan(
        &self,
        query: &str,
        context_summary: &str,
        capabilities: &[(String, String)],
    ) -> Result<String, LlmError> {
        let messages = vec![
            Message::system(PLANNER_SYSTEM_PROMPT),
            Message::user(self.prompt(query, context_summary, capabilities)),
        ];
        let plan = self.llm.complete(&messages).await?;
        tracing::debug!(plan = %plan, "plan ready");
        Ok(plan.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockLlmClient;

    fn caps() -> Vec<(String, String)> {
        vec![
            ("get_web_data".to_string(), "Fetch real-time web data.".to_string()),
            ("open_any_url".to_string(), "Opens any URL in the browser.".to_string()),
        ]
    }

    #[tokio::test]
    async fn test_plan_prompt_lists_catalog_and_limit() {
        let mock = Arc::new(MockLlmClient::new().with_text("1. get_web_data\n2. open_any_url\n"));
        let planner = Planner::new(mock.clone(), 2);
        let plan = planner
            .plan("find news and then open the browser", "", &caps())
            .await
            .unwrap();
        assert_eq!(plan, "1. get_web_data\n2. open_any_url");

        let req = &mock.requests()[0];
        assert!(req.tool_names.is_none());
        let prompt = &req.messages[1].content;
        assert!(prompt.contains("- get_web_data: Fetch real-time web data."));
        assert!(prompt.contains("at most 2 step(s)"));
        assert!(prompt.contains("Recent context: (none)"));
    }

    #[tokio::test]
    async fn test_plan_propagates_llm_error() {
        let mock = Arc::new(MockLlmClient::new().with_text_error(LlmError::RateLimited));
        let planner = Planner::new(mock, 2);
        assert_eq!(
            planner.plan("q", "", &caps()).await.unwrap_err(),
            LlmError::RateLimited
        );
    }
}
