//! 系统信息工具：运行中的应用、CPU / 内存 / 运行时长
//!
//! sysinfo 的刷新是阻塞调用，放到 spawn_blocking 中执行。

use async_trait::async_trait;
use serde_json::Value;
use sysinfo::System;

use crate::core::CapabilityError;
use crate::tools::Tool;

/// 最多列出的应用数
const MAX_APPS: usize = 10;

/// 去重、排序后取前 MAX_APPS 个进程名
fn unique_app_names(mut names: Vec<String>) -> Vec<String> {
    names.retain(|n| !n.trim().is_empty());
    names.sort_by_key(|n| n.to_lowercase());
    names.dedup_by(|a, b| a.eq_ignore_ascii_case(b));
    names.truncate(MAX_APPS);
    names
}

pub struct RunningAppsTool;

#[async_trait]
impl Tool for RunningAppsTool {
    fn name(&self) -> &str {
        "get_running_apps"
    }

    fn description(&self) -> &str {
        "Get a list of currently running applications."
    }

    async fn execute(&self, _args: Value) -> Result<String, CapabilityError> {
        let names = tokio::task::spawn_blocking(|| {
            let mut sys = System::new();
            sys.refresh_processes();
            sys.processes()
                .values()
                .map(|p| p.name().to_string())
                .collect::<Vec<_>>()
        })
        .await
        .map_err(|e| CapabilityError::failed("get_running_apps", e.to_string()))?;

        Ok(format!("Running apps: {}", unique_app_names(names).join(", ")))
    }
}

fn format_uptime(secs: u64) -> String {
    let hours = secs / 3600;
    let minutes = (secs % 3600) / 60;
    if hours > 0 {
        format!("{hours}h {minutes}m")
    } else {
        format!("{minutes}m")
    }
}

pub struct SystemStatsTool;

#[async_trait]
impl Tool for SystemStatsTool {
    fn name(&self) -> &str {
        "get_system_stats"
    }

    fn description(&self) -> &str {
        "Get current CPU usage, memory usage and system uptime."
    }

    async fn execute(&self, _args: Value) -> Result<String, CapabilityError> {
        let (cpu, used, total) = tokio::task::spawn_blocking(|| {
            let mut sys = System::new();
            sys.refresh_cpu();
            // CPU 使用率需要两次采样
            std::thread::sleep(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL);
            sys.refresh_cpu();
            sys.refresh_memory();
            (
                sys.global_cpu_info().cpu_usage(),
                sys.used_memory(),
                sys.total_memory(),
            )
        })
        .await
        .map_err(|e| CapabilityError::failed("get_system_stats", e.to_string()))?;

        const GIB: f64 = 1024.0 * 1024.0 * 1024.0;
        Ok(format!(
            "CPU usage {:.0}%, memory {:.1} of {:.1} GB used, up {}.",
            cpu,
            used as f64 / GIB,
            total as f64 / GIB,
            format_uptime(System::uptime())
        ))
    }
}
