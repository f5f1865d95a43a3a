//! Jarvis - 语音/文本助手的自主工具编排核心
//!
//! 模块划分：
//! - **agent**: 回合编排器 Jarvis（单轮 / 自主多步、唤醒词、统计）
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 错误类型
//! - **llm**: 补全服务抽象与实现（OpenAI 兼容 / Mock）
//! - **memory**: 对话消息与有界对话历史
//! - **observability**: 日志初始化
//! - **react**: 意图分类、上下文管理、Planner、冗余检测、执行循环、回复合成
//! - **tools**: 能力注册表、调度器与内置能力

pub mod agent;
pub mod config;
pub mod core;
pub mod llm;
pub mod memory;
pub mod observability;
pub mod react;
pub mod tools;

pub use agent::{Jarvis, TurnReply};
