//! 工具箱：注册表、调度器与内置能力（时间、计算、联网检索、打开 URL/应用、桌面输入与查询、系统信息）

pub mod calculator;
pub mod desktop;
pub mod executor;
pub mod launcher;
pub mod registry;
pub mod schema;
pub mod system;
pub mod time;
pub mod web;

use std::sync::Arc;

pub use calculator::CalculatorTool;
pub use desktop::{
    ClickTool, ClipboardTool, DesktopContext, MousePositionTool, Platform, PressKeyTool,
    ScreenSizeTool, ScreenshotTool, ScrollTool, TypeTextTool, WindowTool,
};
pub use executor::ToolExecutor;
pub use launcher::{OpenApplicationTool, OpenUrlTool};
pub use registry::{Tool, ToolRegistry};
pub use schema::{parse_args, schema_of};
pub use system::{RunningAppsTool, SystemStatsTool};
pub use time::CurrentTimeTool;
pub use web::WebDataTool;

use crate::config::ToolsSection;

/// 信息检索类工具名（冗余检测的重叠规则作用于它）
pub const WEB_LOOKUP_TOOL: &str = "get_web_data";

/// 内置能力名，按注册顺序
pub const BUILTIN_CAPABILITIES: [&str; 17] = [
    "get_current_time",
    "simple_calculator",
    "get_web_data",
    "open_any_url",
    "open_application",
    "type_text",
    "press_key",
    "click_position",
    "scroll",
    "close_active_window",
    "minimize_window",
    "take_screenshot",
    "get_screen_size",
    "get_mouse_position",
    "copy_to_clipboard",
    "get_running_apps",
    "get_system_stats",
];

/// 注册全部内置工具；桌面类工具共享同一个 DesktopContext
pub fn builtin_registry(settings: &ToolsSection, desktop: Arc<DesktopContext>) -> ToolRegistry {
    let mut tools = ToolRegistry::new();
    tools.register(CurrentTimeTool);
    tools.register(CalculatorTool);
    tools.register(WebDataTool::from_env(settings.web.clone()));
    tools.register(OpenUrlTool::new(desktop.clone()));
    tools.register(OpenApplicationTool::new(desktop.clone()));
    tools.register(TypeTextTool::new(desktop.clone()));
    tools.register(PressKeyTool::new(desktop.clone()));
    tools.register(ClickTool::new(desktop.clone()));
    tools.register(ScrollTool::new(desktop.clone()));
    tools.register(WindowTool::close(desktop.clone()));
    tools.register(WindowTool::minimize(desktop.clone()));
    tools.register(ScreenshotTool::new(desktop.clone()));
    tools.register(ScreenSizeTool::new(desktop.clone()));
    tools.register(MousePositionTool::new(desktop.clone()));
    tools.register(ClipboardTool::new(desktop));
    tools.register(RunningAppsTool);
    tools.register(SystemStatsTool);
    tools
}
