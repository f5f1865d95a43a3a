//! 桌面控制：平台上下文与键鼠输入模拟
//!
//! DesktopContext 由编排器在启动时构造并以 Arc 注入各桌面工具，不使用全局状态。
//! 输入模拟与屏幕查询在 Linux 上经 xdotool 完成；其他平台返回「不支持」失败。
//! 截图与剪贴板走各平台命令（screencapture / import，pbcopy / clip / xclip），可在配置中覆盖。
//! run 启动的子进程随调用结束：调度器超时丢弃 future 时子进程被杀掉，重试不会重复副作用。

use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::config::DesktopSection;
use crate::core::CapabilityError;
use crate::tools::{parse_args, schema_of, Tool};

/// 运行平台
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    MacOs,
    Windows,
    Linux,
    Other,
}

impl Platform {
    pub fn current() -> Self {
        match std::env::consts::OS {
            "macos" => Platform::MacOs,
            "windows" => Platform::Windows,
            "linux" => Platform::Linux,
            _ => Platform::Other,
        }
    }
}

/// 桌面工具共享的上下文：平台与外部命令路径
#[derive(Debug, Clone)]
pub struct DesktopContext {
    pub platform: Platform,
    pub xdotool: String,
    pub open_command: Option<String>,
    pub screenshot_command: Option<String>,
    pub clipboard_command: Option<String>,
}

impl DesktopContext {
    pub fn new(platform: Platform, settings: &DesktopSection) -> Self {
        Self {
            platform,
            xdotool: settings.xdotool.clone(),
            open_command: settings.open_command.clone(),
            screenshot_command: settings.screenshot_command.clone(),
            clipboard_command: settings.clipboard_command.clone(),
        }
    }

    pub fn detect(settings: &DesktopSection) -> Self {
        Self::new(Platform::current(), settings)
    }

    /// 运行命令并等待结束；非零退出码视为失败
    pub async fn run(
        &self,
        capability: &str,
        program: &str,
        args: &[String],
    ) -> Result<String, CapabilityError> {
        tracing::debug!(program = %program, ?args, "desktop command");
        let output = Command::new(program)
            .args(args)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| CapabilityError::failed(capability, format!("can't run {program}: {e}")))?;
        command_output(capability, program, output)
    }

    /// 运行命令并把 input 写入其 stdin（剪贴板）
    pub async fn run_with_stdin(
        &self,
        capability: &str,
        program: &str,
        args: &[String],
        input: &str,
    ) -> Result<String, CapabilityError> {
        tracing::debug!(program = %program, ?args, "desktop command with stdin");
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| CapabilityError::failed(capability, format!("can't run {program}: {e}")))?;
        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(input.as_bytes())
                .await
                .map_err(|e| CapabilityError::failed(capability, e.to_string()))?;
        }
        let output = child
            .wait_with_output()
            .await
            .map_err(|e| CapabilityError::failed(capability, e.to_string()))?;
        command_output(capability, program, output)
    }

    /// 启动进程但不等待（打开浏览器 / 应用）；被打开的程序在调用结束后继续运行
    pub fn spawn(
        &self,
        capability: &str,
        program: &str,
        args: &[String],
    ) -> Result<(), CapabilityError> {
        tracing::debug!(program = %program, ?args, "desktop spawn");
        Command::new(program)
            .args(args)
            .spawn()
            .map(|_| ())
            .map_err(|e| CapabilityError::failed(capability, format!("can't start {program}: {e}")))
    }

    /// 经 xdotool 发送输入；仅 Linux
    async fn xdotool(&self, capability: &str, args: Vec<String>) -> Result<String, CapabilityError> {
        if self.platform != Platform::Linux {
            return Err(CapabilityError::failed(
                capability,
                "input simulation is only supported on Linux",
            ));
        }
        self.run(capability, &self.xdotool, &args).await
    }
}

fn command_output(
    capability: &str,
    program: &str,
    output: std::process::Output,
) -> Result<String, CapabilityError> {
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(CapabilityError::failed(
            capability,
            format!("{program} exited with {}: {}", output.status, stderr.trim()),
        ));
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

fn s(v: &str) -> String {
    v.to_string()
}

#[derive(Deserialize, JsonSchema)]
struct TypeTextArgs {
    /// Text to type at the current cursor position
    text: String,
}

/// 在当前光标处输入文本
pub struct TypeTextTool {
    ctx: Arc<DesktopContext>,
}

impl TypeTextTool {
    pub fn new(ctx: Arc<DesktopContext>) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl Tool for TypeTextTool {
    fn name(&self) -> &str {
        "type_text"
    }

    fn description(&self) -> &str {
        "Type text at the current cursor position."
    }

    fn parameters_schema(&self) -> Value {
        schema_of::<TypeTextArgs>()
    }

    async fn execute(&self, args: Value) -> Result<String, CapabilityError> {
        let args: TypeTextArgs = parse_args(self.name(), args)?;
        self.ctx
            .xdotool(self.name(), vec![s("type"), s("--"), args.text.clone()])
            .await?;
        Ok(format!("Typed: {}", args.text))
    }
}

#[derive(Deserialize, JsonSchema)]
struct PressKeyArgs {
    /// Key name, e.g. enter, tab, escape, ctrl+c
    key: String,
}

/// 按下一个键（或组合键）
pub struct PressKeyTool {
    ctx: Arc<DesktopContext>,
}

impl PressKeyTool {
    pub fn new(ctx: Arc<DesktopContext>) -> Self {
        Self { ctx }
    }
}

/// 常用键名映射到 xdotool keysym
fn keysym(key: &str) -> String {
    key.split('+')
        .map(|part| match part.trim().to_lowercase().as_str() {
            "enter" | "return" => s("Return"),
            "esc" | "escape" => s("Escape"),
            "tab" => s("Tab"),
            "space" => s("space"),
            "backspace" => s("BackSpace"),
            "delete" | "del" => s("Delete"),
            "up" => s("Up"),
            "down" => s("Down"),
            "left" => s("Left"),
            "right" => s("Right"),
            "cmd" | "win" | "super" => s("super"),
            other => other.to_string(),
        })
        .collect::<Vec<_>>()
        .join("+")
}

#[async_trait]
impl Tool for PressKeyTool {
    fn name(&self) -> &str {
        "press_key"
    }

    fn description(&self) -> &str {
        "Press a specific key or key combination (e.g. enter, escape, ctrl+c)."
    }

    fn parameters_schema(&self) -> Value {
        schema_of::<PressKeyArgs>()
    }

    async fn execute(&self, args: Value) -> Result<String, CapabilityError> {
        let args: PressKeyArgs = parse_args(self.name(), args)?;
        self.ctx
            .xdotool(self.name(), vec![s("key"), keysym(&args.key)])
            .await?;
        Ok(format!("Pressed key: {}", args.key))
    }
}

#[derive(Deserialize, JsonSchema)]
struct ClickArgs {
    /// Horizontal screen coordinate in pixels
    x: i32,
    /// Vertical screen coordinate in pixels
    y: i32,
}

/// 在指定坐标单击
pub struct ClickTool {
    ctx: Arc<DesktopContext>,
}

impl ClickTool {
    pub fn new(ctx: Arc<DesktopContext>) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl Tool for ClickTool {
    fn name(&self) -> &str {
        "click_position"
    }

    fn description(&self) -> &str {
        "Click at specific screen coordinates."
    }

    fn parameters_schema(&self) -> Value {
        schema_of::<ClickArgs>()
    }

    async fn execute(&self, args: Value) -> Result<String, CapabilityError> {
        let ClickArgs { x, y } = parse_args(self.name(), args)?;
        if x < 0 || y < 0 {
            return Err(CapabilityError::invalid(
                self.name(),
                format!("position ({x}, {y}) is off screen"),
            ));
        }
        self.ctx
            .xdotool(
                self.name(),
                vec![
                    s("mousemove"),
                    x.to_string(),
                    y.to_string(),
                    s("click"),
                    s("1"),
                ],
            )
            .await?;
        Ok(format!("Clicked at position ({x}, {y})"))
    }
}

#[derive(Deserialize, JsonSchema)]
struct ScrollArgs {
    /// up or down
    direction: String,
    /// Number of scroll units (default 3)
    amount: Option<u32>,
}

/// 上下滚动
pub struct ScrollTool {
    ctx: Arc<DesktopContext>,
}

impl ScrollTool {
    pub fn new(ctx: Arc<DesktopContext>) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl Tool for ScrollTool {
    fn name(&self) -> &str {
        "scroll"
    }

    fn description(&self) -> &str {
        "Scroll up or down."
    }

    fn parameters_schema(&self) -> Value {
        schema_of::<ScrollArgs>()
    }

    async fn execute(&self, args: Value) -> Result<String, CapabilityError> {
        let args: ScrollArgs = parse_args(self.name(), args)?;
        let amount = args.amount.unwrap_or(3);
        // xdotool: button 4 向上，button 5 向下
        let (button, label) = match args.direction.to_lowercase().as_str() {
            "up" | "scrollup" => ("4", "up"),
            "down" | "scrolldown" => ("5", "down"),
            _ => {
                return Err(CapabilityError::invalid(
                    self.name(),
                    "direction must be 'up' or 'down'",
                ))
            }
        };
        self.ctx
            .xdotool(
                self.name(),
                vec![s("click"), s("--repeat"), amount.to_string(), s(button)],
            )
            .await?;
        Ok(format!("Scrolled {label} {amount} units"))
    }
}

/// 窗口操作：关闭 / 最小化当前窗口
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowAction {
    Close,
    Minimize,
}

pub struct WindowTool {
    ctx: Arc<DesktopContext>,
    action: WindowAction,
}

impl WindowTool {
    pub fn close(ctx: Arc<DesktopContext>) -> Self {
        Self {
            ctx,
            action: WindowAction::Close,
        }
    }

    pub fn minimize(ctx: Arc<DesktopContext>) -> Self {
        Self {
            ctx,
            action: WindowAction::Minimize,
        }
    }
}

#[async_trait]
impl Tool for WindowTool {
    fn name(&self) -> &str {
        match self.action {
            WindowAction::Close => "close_active_window",
            WindowAction::Minimize => "minimize_window",
        }
    }

    fn description(&self) -> &str {
        match self.action {
            WindowAction::Close => "Close the currently active window.",
            WindowAction::Minimize => "Minimize the currently active window.",
        }
    }

    async fn execute(&self, _args: Value) -> Result<String, CapabilityError> {
        let args = match self.action {
            WindowAction::Close => vec![s("key"), s("ctrl+w")],
            WindowAction::Minimize => vec![s("getactivewindow"), s("windowminimize")],
        };
        self.ctx.xdotool(self.name(), args).await?;
        Ok(match self.action {
            WindowAction::Close => "Closed active window".to_string(),
            WindowAction::Minimize => "Minimized active window".to_string(),
        })
    }
}

/// xdotool getdisplaygeometry 输出 "1920 1080"
fn parse_geometry(raw: &str) -> Option<(u32, u32)> {
    let mut parts = raw.split_whitespace();
    let width = parts.next()?.parse().ok()?;
    let height = parts.next()?.parse().ok()?;
    Some((width, height))
}

/// xdotool getmouselocation --shell 输出 "X=..\nY=..\nSCREEN=..\nWINDOW=.."
fn parse_mouse_location(raw: &str) -> Option<(i32, i32)> {
    let mut x = None;
    let mut y = None;
    for line in raw.lines() {
        match line.trim().split_once('=') {
            Some(("X", v)) => x = v.parse().ok(),
            Some(("Y", v)) => y = v.parse().ok(),
            _ => {}
        }
    }
    Some((x?, y?))
}

pub struct ScreenSizeTool {
    ctx: Arc<DesktopContext>,
}

impl ScreenSizeTool {
    pub fn new(ctx: Arc<DesktopContext>) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl Tool for ScreenSizeTool {
    fn name(&self) -> &str {
        "get_screen_size"
    }

    fn description(&self) -> &str {
        "Get the screen dimensions in pixels."
    }

    async fn execute(&self, _args: Value) -> Result<String, CapabilityError> {
        let raw = self
            .ctx
            .xdotool(self.name(), vec![s("getdisplaygeometry")])
            .await?;
        let (w, h) = parse_geometry(&raw).ok_or_else(|| {
            CapabilityError::failed(self.name(), format!("unexpected geometry '{raw}'"))
        })?;
        Ok(format!("Screen size: {w}x{h} pixels"))
    }
}

pub struct MousePositionTool {
    ctx: Arc<DesktopContext>,
}

impl MousePositionTool {
    pub fn new(ctx: Arc<DesktopContext>) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl Tool for MousePositionTool {
    fn name(&self) -> &str {
        "get_mouse_position"
    }

    fn description(&self) -> &str {
        "Get the current mouse position."
    }

    async fn execute(&self, _args: Value) -> Result<String, CapabilityError> {
        let raw = self
            .ctx
            .xdotool(self.name(), vec![s("getmouselocation"), s("--shell")])
            .await?;
        let (x, y) = parse_mouse_location(&raw).ok_or_else(|| {
            CapabilityError::failed(self.name(), "unexpected mouse location output")
        })?;
        Ok(format!("Mouse position: ({x}, {y})"))
    }
}

#[derive(Deserialize, JsonSchema)]
struct ScreenshotArgs {
    /// Output file name (default screenshot_<unix time>.png)
    filename: Option<String>,
}

/// 截图命令：(程序, 参数)；平台不支持时为 None
fn screenshot_invocation(ctx: &DesktopContext, file: &str) -> Option<(String, Vec<String>)> {
    if let Some(cmd) = &ctx.screenshot_command {
        return Some((cmd.clone(), vec![file.to_string()]));
    }
    match ctx.platform {
        Platform::MacOs => Some((s("screencapture"), vec![s("-x"), file.to_string()])),
        // ImageMagick
        Platform::Linux => Some((s("import"), vec![s("-window"), s("root"), file.to_string()])),
        Platform::Windows | Platform::Other => None,
    }
}

pub struct ScreenshotTool {
    ctx: Arc<DesktopContext>,
}

impl ScreenshotTool {
    pub fn new(ctx: Arc<DesktopContext>) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl Tool for ScreenshotTool {
    fn name(&self) -> &str {
        "take_screenshot"
    }

    fn description(&self) -> &str {
        "Take a screenshot of the entire screen and save it to a file."
    }

    fn parameters_schema(&self) -> Value {
        schema_of::<ScreenshotArgs>()
    }

    async fn execute(&self, args: Value) -> Result<String, CapabilityError> {
        let args: ScreenshotArgs = parse_args(self.name(), args)?;
        let file = args
            .filename
            .filter(|f| !f.trim().is_empty())
            .unwrap_or_else(|| format!("screenshot_{}.png", chrono::Utc::now().timestamp()));
        let (program, argv) = screenshot_invocation(&self.ctx, &file).ok_or_else(|| {
            CapabilityError::failed(self.name(), "screenshots are not supported on this platform")
        })?;
        self.ctx.run(self.name(), &program, &argv).await?;
        Ok(format!("Screenshot saved as {file}"))
    }
}

#[derive(Deserialize, JsonSchema)]
struct ClipboardArgs {
    /// Text to place on the clipboard
    text: String,
}

/// 剪贴板命令：文本从 stdin 写入
fn clipboard_invocation(ctx: &DesktopContext) -> Option<(String, Vec<String>)> {
    if let Some(cmd) = &ctx.clipboard_command {
        return Some((cmd.clone(), Vec::new()));
    }
    match ctx.platform {
        Platform::MacOs => Some((s("pbcopy"), Vec::new())),
        Platform::Windows => Some((s("clip"), Vec::new())),
        Platform::Linux => Some((s("xclip"), vec![s("-selection"), s("clipboard")])),
        Platform::Other => None,
    }
}

pub struct ClipboardTool {
    ctx: Arc<DesktopContext>,
}

impl ClipboardTool {
    pub fn new(ctx: Arc<DesktopContext>) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl Tool for ClipboardTool {
    fn name(&self) -> &str {
        "copy_to_clipboard"
    }

    fn description(&self) -> &str {
        "Copy text to the clipboard."
    }

    fn parameters_schema(&self) -> Value {
        schema_of::<ClipboardArgs>()
    }

    async fn execute(&self, args: Value) -> Result<String, CapabilityError> {
        let args: ClipboardArgs = parse_args(self.name(), args)?;
        let (program, argv) = clipboard_invocation(&self.ctx).ok_or_else(|| {
            CapabilityError::failed(self.name(), "clipboard is not supported on this platform")
        })?;
        self.ctx
            .run_with_stdin(self.name(), &program, &argv, &args.text)
            .await?;
        Ok(format!("Copied '{}' to clipboard", args.text))
    }
}
