//! Jarvis 编排器
//!
//! 一个回合：意图分类 -> 单轮路径或自主路径 -> 记录 Interaction。
//! 只有补全服务错误（含参数解码失败）会中断回合，中断时用一句道歉代替回复，回合照样入历史。
//! handle_turn 需要 &mut self，回合之间天然串行。

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::Instrument;
use uuid::Uuid;

use crate::config::{AppConfig, AppSection, AutonomousSection};
use crate::core::AgentError;
use crate::llm::{create_llm_from_config, Completion, LlmClient};
use crate::memory::{ConversationHistory, Interaction, Message, ToolCallRecord};
use crate::react::{
    ContextManager, ExecutionContext, ExecutionLoop, ExecutionStats, IntentClassifier,
    KeywordOverlap, LoopExit, Planner, RedundancyGuard, ResponseSynthesizer, TurnMode,
};
use crate::tools::{
    builtin_registry, DesktopContext, ToolExecutor, ToolRegistry, BUILTIN_CAPABILITIES,
};

/// 自主回合没有执行任何能力时的固定回复
pub const NO_RESULT_TEXT: &str = "I'm sorry, I could not complete the task.";

/// 只说了唤醒词时的应答
pub const WAKE_ACK_TEXT: &str = "Yes, sir? How can I help you?";

/// 一个回合的输出
#[derive(Debug, Clone, Serialize)]
pub struct TurnReply {
    pub text: String,
    pub mode: TurnMode,
    pub tool_calls: Vec<ToolCallRecord>,
}

pub struct Jarvis {
    llm: Arc<dyn LlmClient>,
    executor: ToolExecutor,
    context: ContextManager,
    classifier: IntentClassifier,
    planner: Planner,
    guard: RedundancyGuard,
    synthesizer: ResponseSynthesizer,
    app: AppSection,
    autonomous: AutonomousSection,
}

impl Jarvis {
    /// 按配置组装：LLM 后端、内置工具、平台探测；注册表须与内置能力目录一致
    pub fn from_config(cfg: &AppConfig) -> Result<Self, AgentError> {
        let llm = create_llm_from_config(cfg);
        let desktop = Arc::new(DesktopContext::detect(&cfg.tools.desktop));
        let registry = builtin_registry(&cfg.tools, desktop);
        let jarvis = Self::new(cfg, llm, registry);
        let names: Vec<String> = BUILTIN_CAPABILITIES.iter().map(|n| n.to_string()).collect();
        jarvis.executor.verify_catalog(&names)?;
        Ok(jarvis)
    }

    pub fn new(cfg: &AppConfig, llm: Arc<dyn LlmClient>, registry: ToolRegistry) -> Self {
        let auto = &cfg.autonomous;
        let executor = ToolExecutor::new(registry, auto.tool_call_timeout_secs)
            .with_retries(auto.tool_retries);
        let guard = RedundancyGuard::new().with_overlap(Arc::new(KeywordOverlap::for_web_lookup(
            auto.overlap_keywords.clone(),
            auto.overlap_window,
        )));
        tracing::info!(
            tools = executor.tool_names().len(),
            autonomous = auto.enable_autonomous,
            context = cfg.context.enable_context,
            "Jarvis ready"
        );
        Self {
            planner: Planner::new(llm.clone(), auto.max_planning_steps),
            synthesizer: ResponseSynthesizer::new(llm.clone()),
            classifier: IntentClassifier::new(auto.enable_autonomous),
            context: ContextManager::new(cfg.context.clone()),
            llm,
            executor,
            guard,
            app: cfg.app.clone(),
            autonomous: auto.clone(),
        }
    }

    /// 替换冗余检测（例如换一个更强的重叠判定）
    pub fn with_guard(mut self, guard: RedundancyGuard) -> Self {
        self.guard = guard;
        self
    }

    pub fn history(&self) -> &ConversationHistory {
        self.context.history()
    }

    pub fn history_len(&self) -> usize {
        self.context.history_len()
    }

    pub fn clear_history(&mut self) {
        self.context.clear_history();
    }

    pub fn stats(&self) -> ExecutionStats {
        self.context
            .stats(self.classifier.is_enabled(), self.llm.token_usage())
    }

    /// 处理一条用户输入，永不失败
    pub async fn handle_turn(&mut self, query: &str) -> TurnReply {
        let mode = self.classifier.classify(query);
        let span = tracing::info_span!("turn", id = %Uuid::new_v4(), mode = ?mode);

        let mut tool_calls = Vec::new();
        let result = async {
            tracing::info!(query = %query, "turn started");
            match mode {
                TurnMode::Single => self.single_turn(query, &mut tool_calls).await,
                TurnMode::Autonomous => self.autonomous_turn(query, &mut tool_calls).await,
            }
        }
        .instrument(span.clone())
        .await;

        let text = match result {
            Ok(text) => text,
            Err(e) => {
                span.in_scope(|| tracing::warn!(error = %e, "turn failed"));
                e.user_message()
            }
        };
        span.in_scope(|| tracing::info!(tool_calls = tool_calls.len(), "turn finished"));

        self.context
            .record(Interaction::new(query, text.clone(), tool_calls.clone()));
        TurnReply {
            text,
            mode,
            tool_calls,
        }
    }

    /// 单轮：带历史与完整目录调用一次；工具调用则执行并改写结果，文本则直接作为回复
    async fn single_turn(
        &self,
        query: &str,
        tool_calls: &mut Vec<ToolCallRecord>,
    ) -> Result<String, AgentError> {
        let mut messages = vec![Message::system(self.app.system_prompt())];
        messages.extend(self.context.context_messages());
        messages.push(Message::user(query));
        tracing::debug!(messages = messages.len(), "single-turn prompt");

        let completion = self
            .llm
            .complete_with_tools(&messages, &self.executor.catalog())
            .await?;
        match completion {
            Completion::Text(text) => Ok(text.trim().to_string()),
            Completion::ToolCall(call) => {
                let args = call
                    .decode_arguments()
                    .map_err(|e| AgentError::ArgumentDecode {
                        capability: call.name.clone(),
                        detail: e.to_string(),
                    })?;
                let result = self.executor.dispatch(&call.name, args.clone()).await;
                tool_calls.push(ToolCallRecord::new(call.name.as_str(), &args, result.as_str()));
                Ok(self.synthesizer.refine(query, &result).await)
            }
        }
    }

    /// 自主：规划 -> 执行循环 -> 合并改写；已完成的工具调用在出错时也写回 tool_calls
    async fn autonomous_turn(
        &self,
        query: &str,
        tool_calls: &mut Vec<ToolCallRecord>,
    ) -> Result<String, AgentError> {
        let mut ctx = ExecutionContext::new(query);
        if self.autonomous.enable_planning {
            ctx.plan = self
                .planner
                .plan(
                    query,
                    &self.context.summary(),
                    &self.executor.tool_descriptions(),
                )
                .await?;
        }

        let exec_loop = ExecutionLoop::new(
            self.llm.as_ref(),
            &self.executor,
            &self.guard,
            self.autonomous.max_tool_calls,
        )
        .with_step_delay(Duration::from_millis(self.autonomous.step_delay_ms))
        .with_system_prompt(self.app.system_prompt());

        let outcome = exec_loop.run(&mut ctx).await;
        tool_calls.append(&mut ctx.tool_calls);
        match outcome? {
            LoopExit::Completed(reason) => tracing::debug!(reason = %reason, "loop completed"),
            LoopExit::StepLimit => tracing::debug!(steps = ctx.step, "loop hit step limit"),
        }

        if ctx.results.is_empty() {
            return Ok(NO_RESULT_TEXT.to_string());
        }
        Ok(self.synthesizer.refine_many(query, &ctx.results).await)
    }

    /// 退出时的告别语
    pub fn farewell(&self) -> String {
        format!("Shutting down {}. Goodbye!", self.app.name)
    }

    /// 文本命令入口（替代语音循环）：处理唤醒词后交给 handle_turn
    ///
    /// 返回 None 表示忽略该输入（空输入，或要求唤醒词而未出现）。
    pub async fn process_text_command(&mut self, text: &str) -> Option<String> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        let command = match strip_wake_word(text, &self.app.wake_word) {
            Some(rest) if rest.is_empty() => return Some(WAKE_ACK_TEXT.to_string()),
            Some(rest) => rest,
            None if self.app.require_wake_word => return None,
            None => text.to_string(),
        };
        Some(self.handle_turn(&command).await.text)
    }
}

/// 去掉第一次出现的唤醒词（ASCII 不区分大小写）；未出现返回 None
fn strip_wake_word(text: &str, wake_word: &str) -> Option<String> {
    let wake = wake_word.trim();
    if wake.is_empty() {
        return None;
    }
    let pos = text.char_indices().map(|(i, _)| i).find(|&i| {
        text.get(i..i + wake.len())
            .is_some_and(|s| s.eq_ignore_ascii_case(wake))
    })?;
    let before = text[..pos].trim();
    let after = text[pos + wake.len()..].trim();
    let joined = if before.is_empty() {
        after.to_string()
    } else {
        format!("{before} {after}")
    };
    Some(
        joined
            .trim_matches(|c: char| c.is_whitespace() || matches!(c, ',' | '.' | '!'))
            .to_string(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockLlmClient;
    use crate::tools::CurrentTimeTool;

    fn config() -> AppConfig {
        let mut cfg = AppConfig::default();
        cfg.autonomous.step_delay_ms = 0;
        cfg
    }

    fn jarvis(mock: Arc<MockLlmClient>, cfg: &AppConfig) -> Jarvis {
        let mut reg = ToolRegistry::new();
        reg.register(CurrentTimeTool);
        Jarvis::new(cfg, mock, reg)
    }

    #[test]
    fn test_strip_wake_word() {
        assert_eq!(
            strip_wake_word("Jarvis, what time is it?", "jarvis").as_deref(),
            Some("what time is it?")
        );
        assert_eq!(
            strip_wake_word("hey JARVIS open chrome", "jarvis").as_deref(),
            Some("hey open chrome")
        );
        assert_eq!(strip_wake_word("Jarvis.", "jarvis").as_deref(), Some(""));
        assert_eq!(strip_wake_word("what time is it", "jarvis"), None);
        assert_eq!(strip_wake_word("anything", ""), None);
    }

    #[tokio::test]
    async fn test_wake_word_only_acknowledges_without_turn() {
        let mock = Arc::new(MockLlmClient::new());
        let mut j = jarvis(mock.clone(), &config());
        assert_eq!(
            j.process_text_command("  Jarvis!  ").await.as_deref(),
            Some(WAKE_ACK_TEXT)
        );
        assert_eq!(j.history_len(), 0);
        assert!(mock.requests().is_empty());
    }

    #[tokio::test]
    async fn test_required_wake_word_ignores_other_input() {
        let mut cfg = config();
        cfg.app.require_wake_word = true;
        let mock = Arc::new(MockLlmClient::new());
        let mut j = jarvis(mock, &cfg);
        assert_eq!(j.process_text_command("what time is it").await, None);
        assert_eq!(j.process_text_command("   ").await, None);
        assert_eq!(j.history_len(), 0);
    }

    #[tokio::test]
    async fn test_command_after_wake_word_runs_turn() {
        let mock = Arc::new(MockLlmClient::new().with_reply("Good evening, sir."));
        let mut j = jarvis(mock.clone(), &config());
        let reply = j.process_text_command("Jarvis, say hello").await;
        assert_eq!(reply.as_deref(), Some("Good evening, sir."));
        let req = &mock.requests()[0];
        assert_eq!(req.messages.last().map(|m| m.content.as_str()), Some("say hello"));
    }

    #[tokio::test]
    async fn test_single_turn_prompt_carries_history() {
        let mock = Arc::new(
            MockLlmClient::new()
                .with_reply("Hello, sir.")
                .with_reply("You said hello."),
        );
        let mut j = jarvis(mock.clone(), &config());
        j.handle_turn("hello").await;
        j.handle_turn("what did I say").await;

        let reqs = mock.requests();
        let second = &reqs[1].messages;
        assert_eq!(second.len(), 4);
        assert_eq!(second[1].content, "hello");
        assert_eq!(second[2].content, "Hello, sir.");
        assert_eq!(
            reqs[1].tool_names.as_deref(),
            Some(&["get_current_time".to_string()][..])
        );
    }

    #[tokio::test]
    async fn test_stats_track_turns() {
        let mock = Arc::new(
            MockLlmClient::new()
                .with_tool_call("get_current_time", serde_json::json!({}))
                .with_reply("Hi."),
        );
        let mut j = jarvis(mock, &config());
        j.handle_turn("what time is it").await;
        j.handle_turn("hi").await;
        let s = j.stats();
        assert_eq!(s.total_interactions, 2);
        assert_eq!(s.total_tool_calls, 1);
        assert_eq!(s.average_tools_per_interaction, 0.5);
        assert!(s.autonomous_enabled);

        j.clear_history();
        assert_eq!(j.stats().total_interactions, 0);
    }

    #[test]
    fn test_farewell_names_assistant() {
        let j = jarvis(Arc::new(MockLlmClient::new()), &config());
        assert_eq!(j.farewell(), "Shutting down Jarvis. Goodbye!");
    }

    #[tokio::test]
    async fn test_stats_report_llm_token_usage() {
        let mock = Arc::new(MockLlmClient::new().with_token_usage(50, 10).with_reply("Hi."));
        let mut j = jarvis(mock, &config());
        j.handle_turn("hi").await;
        let s = j.stats();
        assert_eq!((s.prompt_tokens, s.completion_tokens, s.total_tokens), (50, 10, 60));
    }

    #[test]
    fn test_from_config_builds_full_catalog() {
        let mut cfg = config();
        cfg.llm.provider = "mock".to_string();
        assert!(Jarvis::from_config(&cfg).is_ok());
    }

    #[tokio::test]
    async fn test_malformed_arguments_become_apology() {
        let mock = Arc::new(MockLlmClient::new().with_raw_tool_call("get_current_time", "[oops"));
        let mut j = jarvis(mock, &config());
        let reply = j.handle_turn("what time is it").await;
        assert_eq!(
            reply.text,
            AgentError::ArgumentDecode {
                capability: String::new(),
                detail: String::new()
            }
            .user_message()
        );
        assert!(reply.tool_calls.is_empty());
        assert_eq!(j.history_len(), 1);
    }
}
