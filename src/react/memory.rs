//! 上下文管理：有界对话历史、单轮 prompt 上下文窗口、规划摘要、截断与统计
//!
//! 历史只在回合结束时由 record 追加；enable_context 关闭时任何 prompt 都不带历史。

use serde::Serialize;

use crate::config::ContextSection;
use crate::memory::{ConversationHistory, Interaction, Message};

/// 规划摘要带入的最近回合数
const SUMMARY_INTERACTIONS: usize = 3;

/// 对外统计
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionStats {
    pub total_interactions: usize,
    pub total_tool_calls: usize,
    pub average_tools_per_interaction: f64,
    pub context_enabled: bool,
    pub autonomous_enabled: bool,
    /// LLM 累计 token 用量
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

/// 上下文管理器：独占 ConversationHistory
#[derive(Debug, Clone)]
pub struct ContextManager {
    history: ConversationHistory,
    settings: ContextSection,
}

impl ContextManager {
    pub fn new(settings: ContextSection) -> Self {
        Self {
            history: ConversationHistory::new(settings.max_context_length),
            settings,
        }
    }

    /// 追加一个完成的回合，超出上限时淘汰最旧的
    pub fn record(&mut self, interaction: Interaction) {
        self.history.push(interaction);
    }

    pub fn history(&self) -> &ConversationHistory {
        &self.history
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    /// 超过 max_tokens_per_message 个字符时截断为前 T 个字符 + "..."
    pub fn truncate(&self, text: &str) -> String {
        let limit = self.settings.max_tokens_per_message;
        if text.chars().count() <= limit {
            return text.to_string();
        }
        let mut out: String = text.chars().take(limit).collect();
        out.push_str("...");
        out
    }

    /// 单轮 prompt 的历史：最近 context_window 个回合，每个回合一条 user + 一条 assistant，按时间顺序
    pub fn context_messages(&self) -> Vec<Message> {
        if !self.settings.enable_context {
            return Vec::new();
        }
        self.history
            .recent(self.settings.context_window)
            .flat_map(|i| {
                [
                    Message::user(self.truncate(&i.query)),
                    Message::assistant(self.truncate(&i.response)),
                ]
            })
            .collect()
    }

    /// 规划 prompt 用的简短摘要："User: …|Assistant: …" 以 " | " 连接
    pub fn summary(&self) -> String {
        if !self.settings.enable_context {
            return String::new();
        }
        self.history
            .recent(SUMMARY_INTERACTIONS)
            .flat_map(|i| {
                [
                    format!("User: {}", i.query),
                    format!("Assistant: {}", i.response),
                ]
            })
            .collect::<Vec<_>>()
            .join(" | ")
    }

    /// tokens 为 LLM 客户端的累计 (prompt, completion, total)
    pub fn stats(&self, autonomous_enabled: bool, tokens: (u64, u64, u64)) -> ExecutionStats {
        let total_interactions = self.history.len();
        let total_tool_calls: usize = self.history.iter().map(|i| i.tool_calls.len()).sum();
        let average_tools_per_interaction = if total_interactions == 0 {
            0.0
        } else {
            total_tool_calls as f64 / total_interactions as f64
        };
        ExecutionStats {
            total_interactions,
            total_tool_calls,
            average_tools_per_interaction,
            context_enabled: self.settings.enable_context,
            autonomous_enabled,
            prompt_tokens: tokens.0,
            completion_tokens: tokens.1,
            total_tokens: tokens.2,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{Role, ToolCallRecord};

    fn settings(max_len: usize, window: usize, cap: usize) -> ContextSection {
        ContextSection {
            max_context_length: max_len,
            context_window: window,
            max_tokens_per_message: cap,
            enable_context: true,
        }
    }

    fn turn(i: usize, tools: usize) -> Interaction {
        let calls = (0..tools)
            .map(|t| ToolCallRecord::new(format!("tool{t}"), &serde_json::json!({}), "ok"))
            .collect();
        Interaction::new(format!("q{i}"), format!("a{i}"), calls)
    }

    #[test]
    fn test_context_window_alternates_chronologically() {
        let mut cm = ContextManager::new(settings(10, 3, 100));
        for i in 0..5 {
            cm.record(turn(i, 0));
        }
        let msgs = cm.context_messages();
        assert_eq!(msgs.len(), 6);
        let contents: Vec<&str> = msgs.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["q2", "a2", "q3", "a3", "q4", "a4"]);
        for (i, m) in msgs.iter().enumerate() {
            let expected = if i % 2 == 0 { Role::User } else { Role::Assistant };
            assert_eq!(m.role, expected);
        }
    }

    #[test]
    fn test_context_window_larger_than_history() {
        let mut cm = ContextManager::new(settings(10, 5, 100));
        cm.record(turn(0, 0));
        cm.record(turn(1, 0));
        assert_eq!(cm.context_messages().len(), 4);
    }

    #[test]
    fn test_context_disabled_is_empty() {
        let mut s = settings(10, 5, 100);
        s.enable_context = false;
        let mut cm = ContextManager::new(s);
        for i in 0..4 {
            cm.record(turn(i, 0));
        }
        assert!(cm.context_messages().is_empty());
        assert!(cm.summary().is_empty());
        assert_eq!(cm.history_len(), 4);
    }

    #[test]
    fn test_history_bound_after_many_records() {
        let mut cm = ContextManager::new(settings(4, 5, 100));
        for i in 0..9 {
            cm.record(turn(i, 0));
        }
        let queries: Vec<String> = cm.history().iter().map(|i| i.query.clone()).collect();
        assert_eq!(queries, vec!["q5", "q6", "q7", "q8"]);
    }

    #[test]
    fn test_truncate_exact() {
        let cm = ContextManager::new(settings(10, 5, 5));
        assert_eq!(cm.truncate("hello"), "hello");
        assert_eq!(cm.truncate("hello world"), "hello...");
        assert_eq!(cm.truncate("héllö wörld"), "héllö...");
    }

    #[test]
    fn test_summary_last_three() {
        let mut cm = ContextManager::new(settings(10, 5, 100));
        for i in 0..5 {
            cm.record(turn(i, 0));
        }
        assert_eq!(
            cm.summary(),
            "User: q2 | Assistant: a2 | User: q3 | Assistant: a3 | User: q4 | Assistant: a4"
        );
    }

    #[test]
    fn test_summary_keeps_full_text() {
        let mut cm = ContextManager::new(settings(10, 5, 4));
        cm.record(Interaction::new("open the browser", "Opening it now", vec![]));
        assert_eq!(cm.summary(), "User: open the browser | Assistant: Opening it now");
    }

    #[test]
    fn test_stats() {
        let mut cm = ContextManager::new(settings(10, 5, 100));
        let empty = cm.stats(true, (0, 0, 0));
        assert_eq!(empty.total_interactions, 0);
        assert_eq!(empty.average_tools_per_interaction, 0.0);

        cm.record(turn(0, 1));
        cm.record(turn(1, 2));
        let s = cm.stats(false, (120, 30, 150));
        assert_eq!(s.total_interactions, 2);
        assert_eq!(s.total_tool_calls, 3);
        assert_eq!(s.average_tools_per_interaction, 1.5);
        assert!(s.context_enabled);
        assert!(!s.autonomous_enabled);
        assert_eq!(s.total_tokens, 150);
    }
}
