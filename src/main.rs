use anyhow::{Context, Result};
use clap::Parser;
use fieldops_core::logging::init_logging;
use fieldops_core::AppConfig;
use tracing::info;

mod app;
mod shutdown;

use app::Application;
use shutdown::shutdown_signal;

/// 现场服务排班与派工系统
#[derive(Debug, Parser)]
#[command(name = "fieldops", version, about = "现场服务排班与派工系统")]
struct Cli {
    /// 配置文件路径
    #[arg(short, long, value_name = "FILE")]
    config: Option<String>,

    /// 日志级别
    #[arg(short = 'l', long, default_value = "info",
          value_parser = ["trace", "debug", "info", "warn", "error"])]
    log_level: String,

    /// 日志格式
    #[arg(long, default_value = "pretty", value_parser = ["json", "pretty"])]
    log_format: String,

    /// 启动时跳过数据库迁移
    #[arg(long)]
    skip_migrations: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(&cli.log_level, &cli.log_format)?;

    info!("启动现场服务排班与派工系统");
    if let Some(path) = &cli.config {
        info!("配置文件: {path}");
    }

    let config = AppConfig::load(cli.config.as_deref()).context("加载配置失败")?;

    let app = Application::new(config, !cli.skip_migrations)
        .await
        .context("初始化应用失败")?;

    app.run(shutdown_signal()).await?;

    info!("系统已退出");
    Ok(())
}
