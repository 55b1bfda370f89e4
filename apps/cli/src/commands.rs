//! 命令定义
//!
//! 每个子命令转换为核心的 [`Command`]，由同一个会话执行；
//! `run` 在一个会话里依次执行脚本中的多条命令。

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use handeye_core::{CalibrationTester, CancelToken, Command};
use serde::Deserialize;
use serde_json::{Value, json};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// 检测物体
    Detect,

    /// 重新检测并抓取物体
    Pick {
        /// 物体索引（按分割服务返回的顺序）
        #[arg(short, long, default_value_t = 0)]
        object: usize,
    },

    /// 逐段移动夹爪到世界坐标系中的目标点
    MoveTo(MoveToArgs),

    /// 查询会话状态
    Status,

    /// 在一个会话中执行命令脚本
    Run {
        /// 脚本文件路径（JSON）
        #[arg(short, long)]
        script: PathBuf,

        /// 失败时继续执行
        #[arg(long)]
        continue_on_error: bool,
    },

    /// 打印生效的配置
    Config,
}

#[derive(Args, Debug)]
pub struct MoveToArgs {
    /// 目标 X（毫米）
    #[arg(long, allow_hyphen_values = true)]
    pub x: f64,
    /// 目标 Y（毫米）
    #[arg(long, allow_hyphen_values = true)]
    pub y: f64,
    /// 目标 Z（毫米）
    #[arg(long, allow_hyphen_values = true)]
    pub z: f64,
    /// 每段最大距离（毫米，缺省使用配置值）
    #[arg(long)]
    pub step_size: Option<f64>,
}

impl Commands {
    /// 对应的单条核心命令（`run`/`config` 没有）
    pub fn to_command(&self) -> Option<Command> {
        match self {
            Commands::Detect => Some(Command::Detect),
            Commands::Pick { object } => Some(Command::Pick {
                object_index: *object,
            }),
            Commands::MoveTo(args) => Some(Command::MoveTo {
                x: args.x,
                y: args.y,
                z: args.z,
                step_size: args.step_size,
            }),
            Commands::Status => Some(Command::Status),
            Commands::Run { .. } | Commands::Config => None,
        }
    }
}

/// 命令脚本
#[derive(Debug, Clone, Deserialize)]
pub struct Script {
    #[serde(default)]
    pub name: String,
    /// 每条命令与 `do_command` 的输入格式相同
    pub commands: Vec<Value>,
}

impl Script {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("读取脚本文件失败: {}", path.display()))?;
        serde_json::from_str(&content).context("解析脚本 JSON 失败")
    }
}

/// 依次执行脚本命令，返回每条命令的结果
///
/// 失败的命令记录为 `{"command", "error", "kind"}`；
/// 未设置 `continue_on_error` 时在第一条失败处停止，取消总是停止。
pub fn run_script(
    tester: &CalibrationTester,
    script: &Script,
    continue_on_error: bool,
    cancel: &CancelToken,
) -> Value {
    info!(name = %script.name, commands = script.commands.len(), "Running script");
    let mut results = Vec::with_capacity(script.commands.len());
    let mut failed = 0usize;

    for command in &script.commands {
        let name = command
            .get("command")
            .and_then(Value::as_str)
            .unwrap_or("?")
            .to_string();
        match tester.do_command(command.clone(), cancel) {
            Ok(response) => results.push(json!({"command": name, "response": response})),
            Err(e) => {
                warn!(command = %name, error = %e, "Script command failed");
                failed += 1;
                results.push(json!({
                    "command": name,
                    "error": e.to_string(),
                    "kind": e.kind().as_str(),
                }));
                if !continue_on_error || !e.is_fatal() {
                    break;
                }
            },
        }
    }

    json!({
        "name": script.name,
        "total": script.commands.len(),
        "executed": results.len(),
        "failed": failed,
        "results": results,
    })
}
