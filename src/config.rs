//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `JARVIS__*` 覆盖（双下划线表示嵌套，如 `JARVIS__AUTONOMOUS__MAX_TOOL_CALLS=3`）。

use std::path::PathBuf;

use serde::Deserialize;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub app: AppSection,
    pub llm: LlmSection,
    pub context: ContextSection,
    pub autonomous: AutonomousSection,
    pub tools: ToolsSection,
}

/// 默认人设 prompt
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are Jarvis, a witty, efficient AI assistant inspired by Iron Man's AI. \
Respond concisely and helpfully. Use a formal but friendly tone. \
Prefer available functions (time, calculator, web search, URL open, desktop control). \
If a request is unsupported, briefly explain what you can do instead.";

/// [app] 段：名称、人设、唤醒词
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppSection {
    pub name: String,
    /// 覆盖默认人设
    pub system_prompt: Option<String>,
    /// 唤醒词（不区分大小写）
    pub wake_word: String,
    /// 为 true 时只处理包含唤醒词的输入
    pub require_wake_word: bool,
}

impl Default for AppSection {
    fn default() -> Self {
        Self {
            name: "Jarvis".to_string(),
            system_prompt: None,
            wake_word: "jarvis".to_string(),
            require_wake_word: false,
        }
    }
}

impl AppSection {
    pub fn system_prompt(&self) -> &str {
        self.system_prompt.as_deref().unwrap_or(DEFAULT_SYSTEM_PROMPT)
    }
}

/// [llm] 段：后端、模型与生成参数
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    /// openai / mock
    pub provider: String,
    pub model: String,
    pub base_url: Option<String>,
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeouts: LlmTimeoutsSection,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: "gpt-4o-mini".to_string(),
            base_url: None,
            max_tokens: 200,
            temperature: 0.7,
            timeouts: LlmTimeoutsSection::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmTimeoutsSection {
    /// 单次请求超时（秒）
    pub request: u64,
}

impl Default for LlmTimeoutsSection {
    fn default() -> Self {
        Self { request: 60 }
    }
}

/// [context] 段：对话历史与 prompt 上下文窗口
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ContextSection {
    /// 保存的 Interaction 上限（FIFO 淘汰）
    pub max_context_length: usize,
    /// 单轮 prompt 带入的最近 Interaction 数
    pub context_window: usize,
    /// 单条消息字符上限，超出截断并加 "..."
    pub max_tokens_per_message: usize,
    pub enable_context: bool,
}

impl Default for ContextSection {
    fn default() -> Self {
        Self {
            max_context_length: 10,
            context_window: 5,
            max_tokens_per_message: 500,
            enable_context: true,
        }
    }
}

/// [autonomous] 段：多步自主执行
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AutonomousSection {
    pub enable_autonomous: bool,
    /// 每回合最多循环步数
    pub max_tool_calls: usize,
    /// 单次工具调用超时（秒）
    pub tool_call_timeout_secs: u64,
    /// 工具运行失败/超时后的额外重试次数
    pub tool_retries: u32,
    pub enable_planning: bool,
    pub max_planning_steps: usize,
    /// 步间等待（毫秒），让 UI 自动化动作落定
    pub step_delay_ms: u64,
    /// 信息检索类工具的重叠关键词
    pub overlap_keywords: Vec<String>,
    /// 重叠检测回看最近几条结果
    pub overlap_window: usize,
}

impl Default for AutonomousSection {
    fn default() -> Self {
        Self {
            enable_autonomous: true,
            max_tool_calls: 5,
            tool_call_timeout_secs: 30,
            tool_retries: 1,
            enable_planning: true,
            max_planning_steps: 2,
            step_delay_ms: 500,
            overlap_keywords: vec!["news".to_string()],
            overlap_window: 3,
        }
    }
}

/// [tools] 段
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ToolsSection {
    pub web: WebSection,
    pub desktop: DesktopSection,
}

/// [tools.web] 段：Perplexity 兼容的联网检索
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WebSection {
    pub endpoint: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout_secs: u64,
}

impl Default for WebSection {
    fn default() -> Self {
        Self {
            endpoint: "https://api.perplexity.ai/chat/completions".to_string(),
            model: "sonar".to_string(),
            max_tokens: 200,
            temperature: 0.3,
            timeout_secs: 10,
        }
    }
}

/// [tools.desktop] 段：桌面输入模拟与打开 URL/应用的命令
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DesktopSection {
    /// Linux 上模拟键鼠输入的 xdotool 路径
    pub xdotool: String,
    /// 覆盖默认的打开命令（open / xdg-open）
    pub open_command: Option<String>,
    /// 覆盖截图命令；以输出文件路径为唯一参数
    pub screenshot_command: Option<String>,
    /// 覆盖剪贴板命令；从 stdin 读取文本
    pub clipboard_command: Option<String>,
}

impl Default for DesktopSection {
    fn default() -> Self {
        Self {
            xdotool: "xdotool".to_string(),
            open_command: None,
            screenshot_command: None,
            clipboard_command: None,
        }
    }
}

/// 从 config 目录加载配置，环境变量 JARVIS__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 JARVIS__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("JARVIS")
            .separator("__")
            .try_parsing(true)
            .list_separator(",")
            .with_list_parse_key("autonomous.overlap_keywords"),
    );

    let c = builder.build()?;
    c.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.context.max_context_length, 10);
        assert_eq!(cfg.context.context_window, 5);
        assert_eq!(cfg.autonomous.max_tool_calls, 5);
        assert!(cfg.autonomous.enable_autonomous);
        assert_eq!(cfg.app.system_prompt(), DEFAULT_SYSTEM_PROMPT);
    }

    #[test]
    fn test_load_from_file_overrides_and_keeps_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[context]\nmax_context_length = 4\nenable_context = false\n\n[autonomous]\nmax_tool_calls = 2"
        )
        .unwrap();

        let cfg = load_config(Some(file.path().to_path_buf())).unwrap();
        assert_eq!(cfg.context.max_context_length, 4);
        assert!(!cfg.context.enable_context);
        assert_eq!(cfg.context.context_window, 5);
        assert_eq!(cfg.autonomous.max_tool_calls, 2);
        assert_eq!(cfg.autonomous.tool_call_timeout_secs, 30);
    }
}
