//! 当前时间工具

use async_trait::async_trait;
use serde_json::Value;

use crate::core::CapabilityError;
use crate::tools::Tool;

/// 返回本地时间，12 小时制（如 "03:07 PM"）
pub struct CurrentTimeTool;

#[async_trait]
impl Tool for CurrentTimeTool {
    fn name(&self) -> &str {
        "get_current_time"
    }

    fn description(&self) -> &str {
        "Get the current system time."
    }

    async fn execute(&self, _args: Value) -> Result<String, CapabilityError> {
        Ok(chrono::Local::now().format("%I:%M %p").to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_time_format() {
        let t = CurrentTimeTool.execute(Value::Null).await.unwrap();
        assert_eq!(t.len(), 8);
        assert!(t.ends_with("AM") || t.ends_with("PM"));
        assert_eq!(&t[2..3], ":");
    }
}
