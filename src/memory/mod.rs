//! 记忆层：消息、回合记录与有界对话历史（进程内，不持久化）

pub mod conversation;

pub use conversation::{ConversationHistory, Interaction, Message, Role, ToolCallRecord};
