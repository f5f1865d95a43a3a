//! 自主执行主循环
//!
//! PLANNING -> STEPPING(0..max_steps) -> DONE。每一步：询问 LLM 下一步动作 ->
//! 文本即完成；工具调用先过冗余检测，冗余则跳过（步数照样前进），否则经调度器执行并记录结果。
//! 退出条件：完成、步数用尽、或补全服务出错（转为回合级错误）。

use std::collections::HashSet;
use std::time::Duration;

use serde_json::Value;

use crate::core::AgentError;
use crate::llm::{Completion, LlmClient};
use crate::memory::{Message, ToolCallRecord};
use crate::react::RedundancyGuard;
use crate::tools::ToolExecutor;

/// 结果文本在决策 prompt 中的最大字符数
const RESULT_PREVIEW_CHARS: usize = 600;

const STEP_INSTRUCTIONS: &str = "You are working through a multi-step task. \
Call exactly one capability for the next step. \
When the task is complete, reply with a short plain-text note instead of calling a capability.";

const COMPLETION_NUDGE: &str = "Some results are already available. If they are enough to answer the task, \
do not call another capability; reply with a short completion note.";

/// 单个自主回合的临时状态；回合结束即丢弃，结果汇总进一个 Interaction
#[derive(Debug, Clone, Default)]
pub struct ExecutionContext {
    pub query: String,
    pub plan: String,
    pub results: Vec<String>,
    pub executed: HashSet<String>,
    pub step: usize,
    pub tool_calls: Vec<ToolCallRecord>,
}

impl ExecutionContext {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Default::default()
        }
    }
}

/// LLM 给出的下一步
#[derive(Debug, Clone, PartialEq)]
pub enum NextAction {
    Execute { name: String, args: Value },
    Complete(String),
}

/// 循环退出方式
#[derive(Debug, Clone, PartialEq)]
pub enum LoopExit {
    /// LLM 声明完成
    Completed(String),
    /// 步数用尽
    StepLimit,
}

/// 执行循环配置
pub struct ExecutionLoop<'a> {
    pub llm: &'a dyn LlmClient,
    pub executor: &'a ToolExecutor,
    pub guard: &'a RedundancyGuard,
    pub max_steps: usize,
    pub step_delay: Duration,
    pub system_prompt: &'a str,
}

fn preview(text: &str) -> String {
    if text.chars().count() > RESULT_PREVIEW_CHARS {
        format!("{}...", text.chars().take(RESULT_PREVIEW_CHARS).collect::<String>())
    } else {
        text.to_string()
    }
}

impl<'a> ExecutionLoop<'a> {
    pub fn new(
        llm: &'a dyn LlmClient,
        executor: &'a ToolExecutor,
        guard: &'a RedundancyGuard,
        max_steps: usize,
    ) -> Self {
        Self {
            llm,
            executor,
            guard,
            max_steps,
            step_delay: Duration::ZERO,
            system_prompt: "",
        }
    }

    pub fn with_step_delay(mut self, delay: Duration) -> Self {
        self.step_delay = delay;
        self
    }

    pub fn with_system_prompt(mut self, prompt: &'a str) -> Self {
        self.system_prompt = prompt;
        self
    }

    fn step_prompt(&self, ctx: &ExecutionContext) -> String {
        let mut out = format!("Task: {}\n", ctx.query);
        if !ctx.plan.is_empty() {
            out.push_str(&format!("Plan:\n{}\n", ctx.plan));
        }
        if ctx.results.is_empty() {
            out.push_str("Results so far: none\n");
        } else {
            out.push_str("Results so far:\n");
            for (i, r) in ctx.results.iter().enumerate() {
                out.push_str(&format!("{}. {}\n", i + 1, preview(r)));
            }
        }
        if !ctx.executed.is_empty() {
            let mut names: Vec<&str> = ctx.executed.iter().map(String::as_str).collect();
            names.sort_unstable();
            out.push_str(&format!(
                "Already executed (do not repeat): {}\n",
                names.join(", ")
            ));
        }
        if !ctx.results.is_empty() {
            out.push_str(COMPLETION_NUDGE);
            out.push('\n');
        }
        out
    }

    /// 询问 LLM 下一步；参数 JSON 非法视为回合级错误
    pub async fn next_action(&self, ctx: &ExecutionContext) -> Result<NextAction, AgentError> {
        let system = if self.system_prompt.is_empty() {
            STEP_INSTRUCTIONS.to_string()
        } else {
            format!("{}\n\n{}", self.system_prompt, STEP_INSTRUCTIONS)
        };
        let messages = vec![Message::system(system), Message::user(self.step_prompt(ctx))];
        let completion = self
            .llm
            .complete_with_tools(&messages, &self.executor.catalog())
            .await?;
        match completion {
            Completion::Text(reason) => Ok(NextAction::Complete(reason)),
            Completion::ToolCall(call) => {
                let args = call
                    .decode_arguments()
                    .map_err(|e| AgentError::ArgumentDecode {
                        capability: call.name.clone(),
                        detail: e.to_string(),
                    })?;
                Ok(NextAction::Execute {
                    name: call.name,
                    args,
                })
            }
        }
    }

    /// 运行循环；ctx 由调用方持有，出错时已完成的工具调用仍可读取
    pub async fn run(&self, ctx: &mut ExecutionContext) -> Result<LoopExit, AgentError> {
        while ctx.step < self.max_steps {
            let action = self.next_action(ctx).await?;
            ctx.step += 1;

            match action {
                NextAction::Complete(reason) => {
                    tracing::info!(step = ctx.step, "task declared complete");
                    return Ok(LoopExit::Completed(reason));
                }
                NextAction::Execute { name, args } => {
                    if let Some(why) = self.guard.check(&name, &args, &ctx.executed, &ctx.results) {
                        tracing::info!(step = ctx.step, tool = %name, reason = ?why, "skipping redundant call");
                    } else {
                        tracing::info!(step = ctx.step, tool = %name, "executing step");
                        let result = self.executor.dispatch(&name, args.clone()).await;
                        ctx.tool_calls
                            .push(ToolCallRecord::new(name.clone(), &args, result.clone()));
                        ctx.results.push(result);
                        ctx.executed.insert(name);
                    }
                }
            }

            if ctx.step < self.max_steps && !self.step_delay.is_zero() {
                tokio::time::sleep(self.step_delay).await;
            }
        }
        tracing::info!(steps = ctx.step, "step limit reached");
        Ok(LoopExit::StepLimit)
    }
}
