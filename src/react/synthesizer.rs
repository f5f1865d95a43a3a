//! 回复合成：把工具原始结果改写成简短自然的回复
//!
//! 改写失败（LLM 错误或空回复）时原样返回原始结果，用户的答案不会丢。

use std::sync::Arc;

use crate::llm::LlmClient;
use crate::memory::Message;

const SYNTHESIS_PROMPT: &str = "You turn raw tool output into a natural, concise spoken reply \
addressed to the user. Use 10 to 20 words. Do not mention tools or functions.";

pub struct ResponseSynthesizer {
    llm: Arc<dyn LlmClient>,
}

impl ResponseSynthesizer {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    /// 单个结果改写
    pub async fn refine(&self, original_query: &str, raw_result: &str) -> String {
        let messages = vec![
            Message::system(SYNTHESIS_PROMPT),
            Message::user(format!(
                "User asked: {original_query}\nResult: {raw_result}\nReply:"
            )),
        ];
        match self.llm.complete(&messages).await {
            Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
            Ok(_) => raw_result.to_string(),
            Err(e) => {
                tracing::warn!(error = %e, "synthesis failed, using raw result");
                raw_result.to_string()
            }
        }
    }

    /// 多步结果合并后改写
    pub async fn refine_many(&self, original_query: &str, results: &[String]) -> String {
        let joined = results.join("\n");
        self.refine(original_query, &joined).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::LlmError;
    use crate::llm::MockLlmClient;

    #[tokio::test]
    async fn test_refine_uses_llm_text() {
        let mock = Arc::new(MockLlmClient::new().with_text("  It's 3:07 in the afternoon, sir.  "));
        let synth = ResponseSynthesizer::new(mock.clone());
        assert_eq!(
            synth.refine("what time is it", "03:07 PM").await,
            "It's 3:07 in the afternoon, sir."
        );
        let prompt = &mock.requests()[0].messages[1].content;
        assert!(prompt.contains("Result: 03:07 PM"));
    }

    #[tokio::test]
    async fn test_refine_falls_back_on_error() {
        let mock = Arc::new(MockLlmClient::new().with_text_error(LlmError::Request("down".into())));
        let synth = ResponseSynthesizer::new(mock);
        assert_eq!(synth.refine("q", "raw answer").await, "raw answer");
    }

    #[tokio::test]
    async fn test_refine_falls_back_on_empty() {
        let mock = Arc::new(MockLlmClient::new().with_text("   "));
        let synth = ResponseSynthesizer::new(mock);
        assert_eq!(synth.refine("q", "raw answer").await, "raw answer");
    }

    #[tokio::test]
    async fn test_refine_many_joins_results() {
        let mock = Arc::new(MockLlmClient::new().with_text_error(LlmError::EmptyResponse));
        let synth = ResponseSynthesizer::new(mock);
        let out = synth
            .refine_many("q", &["first".to_string(), "second".to_string()])
            .await;
        assert_eq!(out, "first\nsecond");
    }
}
