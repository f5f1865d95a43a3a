//! 工具注册表
//!
//! 所有工具实现 Tool trait（name / description / parameters_schema / execute），由 ToolRegistry 按名注册与查找。
//! 发给 LLM 的工具目录由注册表生成，名称与可执行项一一对应。

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::core::{AgentError, CapabilityError};
use crate::llm::ToolSpec;
use crate::tools::schema::{empty_schema, required_fields};

/// 工具 trait：名称、描述（供 LLM 理解）、参数 schema、异步执行（args 为 JSON）
#[async_trait]
pub trait Tool: Send + Sync {
    /// 工具名称（function-calling 中的 name）
    fn name(&self) -> &str;

    /// 工具描述（供 LLM 理解功能）
    fn description(&self) -> &str;

    /// 参数 JSON Schema；默认无参数
    fn parameters_schema(&self) -> Value {
        empty_schema()
    }

    /// 执行工具，返回给用户看的文本
    async fn execute(&self, args: Value) -> Result<String, CapabilityError>;
}

/// 工具注册表：保留注册顺序，目录与 prompt 中的顺序稳定
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
    order: Vec<String>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 同名工具后注册者覆盖先注册者
    pub fn register(&mut self, tool: impl Tool + 'static) {
        let name = tool.name().to_string();
        if self.tools.insert(name.clone(), Arc::new(tool)).is_none() {
            self.order.push(name);
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// 校验名称与必填参数后执行
    pub async fn invoke(&self, name: &str, args: Value) -> Result<String, CapabilityError> {
        let tool = self
            .get(name)
            .ok_or_else(|| CapabilityError::Unknown(name.to_string()))?;
        for field in required_fields(&tool.parameters_schema()) {
            if args.get(&field).map_or(true, Value::is_null) {
                return Err(CapabilityError::MissingArgument {
                    capability: name.to_string(),
                    argument: field,
                });
            }
        }
        tool.execute(args).await
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.order.clone()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// 返回 (name, description) 列表，用于生成规划 prompt 中的能力列表
    pub fn tool_descriptions(&self) -> Vec<(String, String)> {
        self.order
            .iter()
            .filter_map(|name| {
                self.tools
                    .get(name)
                    .map(|t| (name.clone(), t.description().to_string()))
            })
            .collect()
    }

    /// 发给 LLM 的工具目录
    pub fn catalog(&self) -> Vec<ToolSpec> {
        self.order
            .iter()
            .filter_map(|name| self.tools.get(name))
            .map(|tool| ToolSpec {
                name: tool.name().to_string(),
                description: tool.description().to_string(),
                parameters: tool.parameters_schema(),
            })
            .collect()
    }

    /// 校验外部给定的目录名称与注册表完全一致
    pub fn verify_catalog(&self, names: &[String]) -> Result<(), AgentError> {
        let missing: Vec<&str> = names
            .iter()
            .filter(|n| !self.tools.contains_key(n.as_str()))
            .map(String::as_str)
            .collect();
        let unlisted: Vec<&str> = self
            .order
            .iter()
            .filter(|n| !names.contains(n))
            .map(String::as_str)
            .collect();
        if missing.is_empty() && unlisted.is_empty() {
            return Ok(());
        }
        Err(AgentError::Config(format!(
            "catalog mismatch: not registered [{}], not in catalog [{}]",
            missing.join(", "),
            unlisted.join(", ")
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::schema::schema_of;
    use schemars::JsonSchema;
    use serde::Deserialize;

    struct Shout;

    #[allow(dead_code)]
    #[derive(Deserialize, JsonSchema)]
    struct ShoutArgs {
        text: String,
    }

    #[async_trait]
    impl Tool for Shout {
        fn name(&self) -> &str {
            "shout"
        }

        fn description(&self) -> &str {
            "Uppercase text."
        }

        fn parameters_schema(&self) -> Value {
            schema_of::<ShoutArgs>()
        }

        async fn execute(&self, args: Value) -> Result<String, CapabilityError> {
            let a: ShoutArgs = crate::tools::parse_args(self.name(), args)?;
            Ok(a.text.to_uppercase())
        }
    }

    #[tokio::test]
    async fn test_invoke_validates_required() {
        let mut reg = ToolRegistry::new();
        reg.register(Shout);
        let err = reg.invoke("shout", serde_json::json!({})).await.unwrap_err();
        assert_eq!(
            err,
            CapabilityError::MissingArgument {
                capability: "shout".to_string(),
                argument: "text".to_string()
            }
        );
        let ok = reg
            .invoke("shout", serde_json::json!({"text": "hi"}))
            .await
            .unwrap();
        assert_eq!(ok, "HI");
    }

    #[tokio::test]
    async fn test_invoke_unknown() {
        let reg = ToolRegistry::new();
        let err = reg.invoke("teleport", Value::Null).await.unwrap_err();
        assert_eq!(err, CapabilityError::Unknown("teleport".to_string()));
    }

    #[test]
    fn test_catalog_matches_registry() {
        let mut reg = ToolRegistry::new();
        reg.register(Shout);
        let names: Vec<String> = reg.catalog().into_iter().map(|s| s.name).collect();
        assert!(reg.verify_catalog(&names).is_ok());
        assert!(reg.verify_catalog(&["shout".to_string(), "fly".to_string()]).is_err());
        assert!(reg.verify_catalog(&[]).is_err());
    }
}
