//! 工具执行器（调度器）
//!
//! 持有 ToolRegistry、单次超时与重试预算：invoke 在超时内调用 registry.invoke，
//! 超时即取消该次调用；运行失败/超时按预算重试；每次调用输出结构化审计日志（JSON）。
//! dispatch 把任何 CapabilityError 转成文本，调用方永远拿到可展示的结果。

use std::time::{Duration, Instant};

use serde_json::Value;
use tokio::time::timeout;

use crate::core::{AgentError, CapabilityError};
use crate::llm::ToolSpec;
use crate::tools::ToolRegistry;

/// 工具执行器：对每次调用施加超时与重试
pub struct ToolExecutor {
    registry: ToolRegistry,
    timeout: Duration,
    retries: u32,
}

impl ToolExecutor {
    pub fn new(registry: ToolRegistry, timeout_secs: u64) -> Self {
        Self {
            registry,
            timeout: Duration::from_secs(timeout_secs),
            retries: 0,
        }
    }

    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// 执行指定工具；超时返回 Timeout，可重试错误按预算重试；输出 JSON 审计日志
    pub async fn invoke(&self, tool_name: &str, args: Value) -> Result<String, CapabilityError> {
        let start = Instant::now();
        let mut attempts = 0u32;
        let result = loop {
            attempts += 1;
            let outcome = match timeout(self.timeout, self.registry.invoke(tool_name, args.clone()))
                .await
            {
                Ok(r) => r,
                Err(_) => Err(CapabilityError::Timeout {
                    capability: tool_name.to_string(),
                    millis: self.timeout.as_millis() as u64,
                }),
            };
            match outcome {
                Err(e) if e.is_retryable() && attempts <= self.retries => {
                    tracing::warn!(tool = %tool_name, attempt = attempts, error = %e, "retrying tool");
                }
                other => break other,
            }
        };

        let outcome = match &result {
            Ok(_) => "ok",
            Err(CapabilityError::Unknown(_)) => "unknown",
            Err(CapabilityError::MissingArgument { .. })
            | Err(CapabilityError::InvalidArgument { .. }) => "bad_args",
            Err(CapabilityError::Timeout { .. }) => "timeout",
            Err(CapabilityError::Failed { .. }) => "error",
        };
        let audit = serde_json::json!({
            "event": "tool_audit",
            "tool": tool_name,
            "ok": result.is_ok(),
            "outcome": outcome,
            "attempts": attempts,
            "duration_ms": start.elapsed().as_millis() as u64,
            "args_preview": args_preview(&args),
        });
        tracing::info!(audit = %audit.to_string(), "tool");

        result
    }

    /// 永不失败的调度：错误渲染为 Observation 文本
    pub async fn dispatch(&self, tool_name: &str, args: Value) -> String {
        match self.invoke(tool_name, args).await {
            Ok(text) => text,
            Err(e) => e.to_observation(),
        }
    }

    pub fn catalog(&self) -> Vec<ToolSpec> {
        self.registry.catalog()
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.registry.tool_names()
    }

    pub fn tool_descriptions(&self) -> Vec<(String, String)> {
        self.registry.tool_descriptions()
    }

    pub fn verify_catalog(&self, names: &[String]) -> Result<(), AgentError> {
        self.registry.verify_catalog(names)
    }
}

fn args_preview(args: &Value) -> String {
    let s = args.to_string();
    if s.chars().count() > 200 {
        format!("{}...", s.chars().take(200).collect::<String>())
    } else {
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::UNKNOWN_CAPABILITY_TEXT;
    use crate::tools::Tool;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    /// 前 n 次失败，之后成功
    struct Flaky {
        failures: u32,
        calls: Arc<AtomicU32>,
    }

    #[async_trait]
    impl Tool for Flaky {
        fn name(&self) -> &str {
            "flaky"
        }

        fn description(&self) -> &str {
            "Fails a few times."
        }

        async fn execute(&self, _args: Value) -> Result<String, CapabilityError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                Err(CapabilityError::failed("flaky", "not yet"))
            } else {
                Ok("finally".to_string())
            }
        }
    }

    struct Sleepy;

    #[async_trait]
    impl Tool for Sleepy {
        fn name(&self) -> &str {
            "sleepy"
        }

        fn description(&self) -> &str {
            "Never returns in time."
        }

        async fn execute(&self, _args: Value) -> Result<String, CapabilityError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok("late".to_string())
        }
    }

    fn executor_with(tool: impl Tool + 'static, retries: u32) -> ToolExecutor {
        let mut reg = ToolRegistry::new();
        reg.register(tool);
        ToolExecutor::new(reg, 1).with_retries(retries)
    }

    #[tokio::test]
    async fn test_retry_within_budget() {
        let calls = Arc::new(AtomicU32::new(0));
        let exec = executor_with(
            Flaky {
                failures: 1,
                calls: calls.clone(),
            },
            1,
        );
        assert_eq!(exec.invoke("flaky", Value::Null).await.unwrap(), "finally");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_retry_budget_exhausted() {
        let calls = Arc::new(AtomicU32::new(0));
        let exec = executor_with(
            Flaky {
                failures: 5,
                calls: calls.clone(),
            },
            2,
        );
        let text = exec.dispatch("flaky", Value::Null).await;
        assert_eq!(text, "Couldn't flaky: not yet.");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_timeout_cancels_call() {
        let exec = executor_with(Sleepy, 0).with_timeout(Duration::from_millis(20));
        let err = exec.invoke("sleepy", Value::Null).await.unwrap_err();
        assert!(matches!(err, CapabilityError::Timeout { millis: 20, .. }));
        assert_eq!(
            err.to_observation(),
            "Couldn't sleepy: it took longer than 20 ms."
        );
    }

    #[tokio::test]
    async fn test_unknown_is_not_retried_and_renders_fallback() {
        let exec = ToolExecutor::new(ToolRegistry::new(), 1).with_retries(3);
        assert_eq!(
            exec.dispatch("warp_drive", serde_json::json!({})).await,
            UNKNOWN_CAPABILITY_TEXT
        );
    }
}
