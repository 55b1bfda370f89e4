//! # Hand-eye Test CLI
//!
//! 在仿真测试台上 dry-run 手眼标定验证流程。
//!
//! ```bash
//! # 检测物体
//! handeye-test detect
//!
//! # 抓取第 0 个物体，接近距离 80mm
//! handeye-test pick --object 0 --approach-offset 80
//!
//! # 逐段移动到目标点
//! handeye-test move-to --x 300 --y 0 --z 250 --step-size 25
//!
//! # 在一个会话里执行多条命令（例如 detect 之后 pick_detected）
//! handeye-test run --script session.json
//! ```
//!
//! 结果以 JSON 打印到 stdout，日志写到 stderr（`--debug` 或 `RUST_LOG` 控制级别）。

use anyhow::{Context, Result};
use clap::Parser;
use handeye_core::sim::SimRig;
use handeye_core::{CalibrationTester, CancelToken};
use serde_json::json;
use tracing::info;

mod commands;
mod config;

use commands::{Commands, Script, run_script};
use config::ConfigArgs;

/// Hand-eye Test - 手眼标定验证工具
#[derive(Parser, Debug)]
#[command(name = "handeye-test")]
#[command(about = "Dry-run hand-eye calibration validation on a simulated rig", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    config: ConfigArgs,

    /// 输出调试日志
    #[arg(long, global = true)]
    debug: bool,
}

fn init_tracing(debug: bool) -> Result<()> {
    let directive = if debug { "handeye=debug" } else { "handeye=info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(directive.parse()?),
        )
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.debug)?;

    let loaded = cli.config.load()?;

    if let Commands::Config = cli.command {
        let output = json!({
            "source": loaded.source.as_ref().map(|p| p.display().to_string()),
            "service": loaded.service,
            "sim": loaded.sim,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    let rig = SimRig::for_service(loaded.sim, &loaded.service);
    let tester = CalibrationTester::new(rig.rig(), loaded.service).context("配置无效")?;

    // Ctrl-C 取消进行中的运动
    let cancel = CancelToken::new();
    {
        let cancel = cancel.clone();
        ctrlc::set_handler(move || {
            info!("Interrupted, cancelling");
            cancel.cancel();
        })
        .context("注册 Ctrl-C 处理器失败")?;
    }

    let output = match &cli.command {
        Commands::Run {
            script,
            continue_on_error,
        } => {
            let script = Script::load(script)?;
            run_script(&tester, &script, *continue_on_error, &cancel)
        },
        other => {
            let command = other
                .to_command()
                .ok_or_else(|| anyhow::anyhow!("不支持的命令"))?;
            let name = command.name();
            tester
                .dispatch(command, &cancel)
                .with_context(|| format!("{name} 失败"))?
                .to_value()?
        },
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    tester.close();
    Ok(())
}
