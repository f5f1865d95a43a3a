//! 打开 URL / 应用
//!
//! macOS 用 `open`，Linux 用 `xdg-open` 或直接启动可执行文件，Windows 用 `cmd /C start`；
//! 可通过 [tools.desktop].open_command 覆盖。

use std::sync::Arc;

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value;

use crate::core::CapabilityError;
use crate::tools::desktop::{DesktopContext, Platform};
use crate::tools::{parse_args, schema_of, Tool};

/// 打开目标所用的 (程序, 参数)
fn open_invocation(ctx: &DesktopContext, target: &str) -> (String, Vec<String>) {
    if let Some(cmd) = &ctx.open_command {
        return (cmd.clone(), vec![target.to_string()]);
    }
    match ctx.platform {
        Platform::MacOs => ("open".to_string(), vec![target.to_string()]),
        Platform::Windows => (
            "cmd".to_string(),
            vec![
                "/C".to_string(),
                "start".to_string(),
                String::new(),
                target.to_string(),
            ],
        ),
        Platform::Linux | Platform::Other => ("xdg-open".to_string(), vec![target.to_string()]),
    }
}

/// 没有 scheme 的地址补成 https
fn normalize_url(raw: &str) -> String {
    let url = raw.trim();
    if url.contains("://") || url.starts_with("mailto:") {
        url.to_string()
    } else {
        format!("https://{url}")
    }
}

#[derive(Deserialize, JsonSchema)]
struct OpenUrlArgs {
    /// The URL to open
    url: String,
}

pub struct OpenUrlTool {
    ctx: Arc<DesktopContext>,
}

impl OpenUrlTool {
    pub fn new(ctx: Arc<DesktopContext>) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl Tool for OpenUrlTool {
    fn name(&self) -> &str {
        "open_any_url"
    }

    fn description(&self) -> &str {
        "Opens any URL in the browser."
    }

    fn parameters_schema(&self) -> Value {
        schema_of::<OpenUrlArgs>()
    }

    async fn execute(&self, args: Value) -> Result<String, CapabilityError> {
        let args: OpenUrlArgs = parse_args(self.name(), args)?;
        if args.url.trim().is_empty() {
            return Err(CapabilityError::invalid(self.name(), "url is empty"));
        }
        let url = normalize_url(&args.url);
        let (program, argv) = open_invocation(&self.ctx, &url);
        self.ctx.spawn(self.name(), &program, &argv)?;
        Ok(format!("Opening {url} in your browser."))
    }
}

/// 友好名称到各平台实际应用名
fn resolve_app(platform: Platform, name: &str) -> String {
    let lower = name.trim().to_lowercase();
    let mapped = match platform {
        Platform::MacOs => match lower.as_str() {
            "chrome" => Some("Google Chrome"),
            "safari" => Some("Safari"),
            "firefox" => Some("Firefox"),
            "spotify" => Some("Spotify"),
            "terminal" => Some("Terminal"),
            "finder" => Some("Finder"),
            "mail" => Some("Mail"),
            "messages" => Some("Messages"),
            "facetime" => Some("FaceTime"),
            "photos" => Some("Photos"),
            "music" => Some("Music"),
            "calculator" => Some("Calculator"),
            "notes" => Some("Notes"),
            "calendar" => Some("Calendar"),
            "reminders" => Some("Reminders"),
            "maps" => Some("Maps"),
            "weather" => Some("Weather"),
            "clock" => Some("Clock"),
            "settings" | "preferences" => Some("System Preferences"),
            _ => None,
        },
        Platform::Windows => match lower.as_str() {
            "chrome" => Some("chrome.exe"),
            "edge" => Some("msedge.exe"),
            "firefox" => Some("firefox.exe"),
            "notepad" => Some("notepad.exe"),
            "calculator" => Some("calc.exe"),
            "explorer" => Some("explorer.exe"),
            "cmd" => Some("cmd.exe"),
            "powershell" => Some("powershell.exe"),
            _ => None,
        },
        Platform::Linux | Platform::Other => match lower.as_str() {
            "chrome" => Some("google-chrome"),
            "firefox" => Some("firefox"),
            "terminal" => Some("gnome-terminal"),
            "calculator" => Some("gnome-calculator"),
            "files" => Some("nautilus"),
            "gedit" => Some("gedit"),
            _ => None,
        },
    };
    mapped.map(String::from).unwrap_or_else(|| name.trim().to_string())
}

#[derive(Deserialize, JsonSchema)]
struct OpenAppArgs {
    /// Application name, e.g. chrome, terminal, calculator
    app_name: String,
}

pub struct OpenApplicationTool {
    ctx: Arc<DesktopContext>,
}

impl OpenApplicationTool {
    pub fn new(ctx: Arc<DesktopContext>) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl Tool for OpenApplicationTool {
    fn name(&self) -> &str {
        "open_application"
    }

    fn description(&self) -> &str {
        "Open a desktop application by name (e.g. chrome, terminal, calculator)."
    }

    fn parameters_schema(&self) -> Value {
        schema_of::<OpenAppArgs>()
    }

    async fn execute(&self, args: Value) -> Result<String, CapabilityError> {
        let args: OpenAppArgs = parse_args(self.name(), args)?;
        if args.app_name.trim().is_empty() {
            return Err(CapabilityError::invalid(self.name(), "app_name is empty"));
        }
        let app = resolve_app(self.ctx.platform, &args.app_name);
        let (program, argv) = match self.ctx.platform {
            Platform::MacOs => ("open".to_string(), vec!["-a".to_string(), app.clone()]),
            Platform::Windows => (
                "cmd".to_string(),
                vec!["/C".to_string(), "start".to_string(), String::new(), app.clone()],
            ),
            Platform::Linux | Platform::Other => (app.clone(), Vec::new()),
        };
        self.ctx.spawn(self.name(), &program, &argv)?;
        Ok(format!("Opened {app}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DesktopSection;

    #[test]
    fn test_normalize_url() {
        assert_eq!(normalize_url("example.com"), "https://example.com");
        assert_eq!(normalize_url(" http://a.b "), "http://a.b");
    }

    #[test]
    fn test_resolve_app_per_platform() {
        assert_eq!(resolve_app(Platform::MacOs, "Chrome"), "Google Chrome");
        assert_eq!(resolve_app(Platform::Windows, "calculator"), "calc.exe");
        assert_eq!(resolve_app(Platform::Linux, "terminal"), "gnome-terminal");
        assert_eq!(resolve_app(Platform::Linux, "blender"), "blender");
    }

    #[test]
    fn test_open_command_override() {
        let ctx = DesktopContext::new(
            Platform::Linux,
            &DesktopSection {
                open_command: Some("firefox".to_string()),
                ..DesktopSection::default()
            },
        );
        let (program, argv) = open_invocation(&ctx, "https://rust-lang.org");
        assert_eq!(program, "firefox");
        assert_eq!(argv, vec!["https://rust-lang.org".to_string()]);
    }

    #[tokio::test]
    async fn test_open_url_spawn_failure_is_capability_error() {
        let ctx = Arc::new(DesktopContext::new(
            Platform::Linux,
            &DesktopSection {
                open_command: Some("/nonexistent/opener-binary".to_string()),
                ..DesktopSection::default()
            },
        ));
        let err = OpenUrlTool::new(ctx)
            .execute(serde_json::json!({"url": "example.com"}))
            .await
            .unwrap_err();
        assert!(matches!(err, CapabilityError::Failed { .. }));
    }
}
