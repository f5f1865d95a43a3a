//! 认知层：意图分类、上下文管理、Planner、冗余检测、自主执行循环、回复合成

pub mod guard;
pub mod intent;
pub mod loop_;
pub mod memory;
pub mod planner;
pub mod synthesizer;

pub use guard::{KeywordOverlap, OverlapPredicate, Redundancy, RedundancyGuard};
pub use intent::{IntentClassifier, TurnMode};
pub use loop_::{ExecutionContext, ExecutionLoop, LoopExit, NextAction};
pub use memory::{ContextManager, ExecutionStats};
pub use planner::Planner;
pub use synthesizer::ResponseSynthesizer;
