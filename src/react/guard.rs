//! 冗余检测：阻止同一回合内重复或重叠的工具调用
//!
//! 规则一（精确）：回合内已执行过的工具名一律视为冗余，每个工具每回合最多执行一次。
//! 规则二（重叠）：可注入的 OverlapPredicate；默认 KeywordOverlap 只作用于信息检索工具，
//! 参数与最近几条结果共享关键词时视为冗余。

use std::collections::HashSet;
use std::sync::Arc;

use serde_json::Value;

use crate::tools::WEB_LOOKUP_TOOL;

/// 判定为冗余的原因
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Redundancy {
    AlreadyExecuted,
    Overlap,
}

/// 近似重复意图的判定，可替换为更强的相似度实现
pub trait OverlapPredicate: Send + Sync {
    fn overlaps(&self, capability: &str, args: &Value, recent_results: &[String]) -> bool;
}

/// 关键词重叠：参数文本与最近 window 条结果都出现同一关键词
#[derive(Debug, Clone)]
pub struct KeywordOverlap {
    capability: String,
    keywords: Vec<String>,
    window: usize,
}

impl KeywordOverlap {
    pub fn new(capability: impl Into<String>, keywords: Vec<String>, window: usize) -> Self {
        Self {
            capability: capability.into(),
            keywords: keywords
                .into_iter()
                .map(|k| k.trim().to_lowercase())
                .filter(|k| !k.is_empty())
                .collect(),
            window,
        }
    }

    /// 默认作用于 get_web_data
    pub fn for_web_lookup(keywords: Vec<String>, window: usize) -> Self {
        Self::new(WEB_LOOKUP_TOOL, keywords, window)
    }
}

/// 参数中所有字符串值拼成一段文本
fn args_text(args: &Value) -> String {
    match args {
        Value::String(s) => s.to_lowercase(),
        Value::Object(map) => map.values().map(args_text).collect::<Vec<_>>().join(" "),
        Value::Array(items) => items.iter().map(args_text).collect::<Vec<_>>().join(" "),
        _ => String::new(),
    }
}

impl OverlapPredicate for KeywordOverlap {
    fn overlaps(&self, capability: &str, args: &Value, recent_results: &[String]) -> bool {
        if capability != self.capability || recent_results.is_empty() {
            return false;
        }
        let text = args_text(args);
        let skip = recent_results.len().saturating_sub(self.window);
        let recent: Vec<String> = recent_results[skip..]
            .iter()
            .map(|r| r.to_lowercase())
            .collect();
        self.keywords
            .iter()
            .filter(|k| text.contains(k.as_str()))
            .any(|k| recent.iter().any(|r| r.contains(k.as_str())))
    }
}

#[derive(Clone, Default)]
pub struct RedundancyGuard {
    overlap: Option<Arc<dyn OverlapPredicate>>,
}

impl RedundancyGuard {
    /// 只有精确规则
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_overlap(mut self, predicate: Arc<dyn OverlapPredicate>) -> Self {
        self.overlap = Some(predicate);
        self
    }

    pub fn check(
        &self,
        name: &str,
        args: &Value,
        executed: &HashSet<String>,
        recent_results: &[String],
    ) -> Option<Redundancy> {
        if executed.contains(name) {
            return Some(Redundancy::AlreadyExecuted);
        }
        match &self.overlap {
            Some(p) if p.overlaps(name, args, recent_results) => Some(Redundancy::Overlap),
            _ => None,
        }
    }

    pub fn is_redundant(
        &self,
        name: &str,
        args: &Value,
        executed: &HashSet<String>,
        recent_results: &[String],
    ) -> bool {
        self.check(name, args, executed, recent_results).is_some()
    }
}
