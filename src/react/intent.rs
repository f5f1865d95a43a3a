//! 意图分类：单轮 vs 自主多步
//!
//! 纯启发式：自主模式开启且查询包含任一多步指示词（顺序词、连接词、比较动词等）时走自主路径。

use serde::Serialize;

/// 多步指示词（不区分大小写的子串匹配）
pub const MULTI_STEP_INDICATORS: &[&str] = &[
    "and then",
    "after that",
    "also",
    "as well",
    "multiple",
    "several",
    "first",
    "second",
    "third",
    "finally",
    "next",
    "then",
    "open and",
    "search for",
    "find",
    "get",
    "check",
    "verify",
    "compare",
];

/// 回合处理方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnMode {
    Single,
    Autonomous,
}

/// 意图分类器：无状态，永不失败
#[derive(Debug, Clone)]
pub struct IntentClassifier {
    enabled: bool,
    indicators: Vec<String>,
}

impl IntentClassifier {
    pub fn new(autonomous_enabled: bool) -> Self {
        Self {
            enabled: autonomous_enabled,
            indicators: MULTI_STEP_INDICATORS.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// 替换指示词表
    pub fn with_indicators(mut self, indicators: Vec<String>) -> Self {
        self.indicators = indicators.into_iter().map(|s| s.to_lowercase()).collect();
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn classify(&self, query: &str) -> TurnMode {
        if !self.enabled {
            return TurnMode::Single;
        }
        let lower = query.to_lowercase();
        if self.indicators.iter().any(|k| lower.contains(k.as_str())) {
            TurnMode::Autonomous
        } else {
            TurnMode::Single
        }
    }
}
