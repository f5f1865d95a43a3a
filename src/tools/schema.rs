//! 工具参数 Schema 与解析（schemars 由参数结构体自动生成 Schema）
//!
//! 每个工具声明一个带 `JsonSchema + Deserialize` 的参数结构体：
//! schema_of 生成发给 LLM 的 parameters，parse_args 在执行时做类型校验。

use schemars::{schema_for, JsonSchema};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::core::CapabilityError;

/// 无参数工具的 Schema
pub fn empty_schema() -> Value {
    serde_json::json!({
        "type": "object",
        "properties": {},
        "required": []
    })
}

/// 由参数结构体生成 JSON Schema，去掉 $schema / title 等 function-calling 用不到的键
pub fn schema_of<T: JsonSchema>() -> Value {
    let mut value = serde_json::to_value(schema_for!(T)).unwrap_or_else(|_| empty_schema());
    if let Some(obj) = value.as_object_mut() {
        obj.remove("$schema");
        obj.remove("title");
        obj.entry("required").or_insert_with(|| Value::Array(Vec::new()));
    }
    value
}

/// Schema 中声明的必填参数名
pub fn required_fields(schema: &Value) -> Vec<String> {
    schema
        .get("required")
        .and_then(|r| r.as_array())
        .map(|arr| {
            arr.iter()
                .filter_map(|v| v.as_str().map(String::from))
                .collect()
        })
        .unwrap_or_default()
}

/// 将 JSON 参数解析为工具自己的参数类型；类型不符转为 InvalidArgument
pub fn parse_args<T: DeserializeOwned>(capability: &str, args: Value) -> Result<T, CapabilityError> {
    serde_json::from_value(args).map_err(|e| CapabilityError::invalid(capability, e.to_string()))
}
