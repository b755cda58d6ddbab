use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;

use listing_pdf_harvester::bus::Bus;
use listing_pdf_harvester::models::{clamp_delay_ms, MIN_INTER_ITEM_DELAY_MS};
use listing_pdf_harvester::orchestrator::Commands;
use listing_pdf_harvester::utils::logging;
use listing_pdf_harvester::{App, Config, StateStore};

#[derive(Parser)]
#[command(
    name = "listing-pdf-harvester",
    version,
    about = "逐条打开列表中的文档并保存为 PDF"
)]
struct Cli {
    /// 配置文件（默认 harvester.toml 或 HARVESTER_CONFIG）
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// 显示详细日志
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// 开始或恢复运行（默认）
    Run,
    /// 标记运行停止，正在运行的进程会随之退出
    Stop,
    /// 清空运行状态（保留条目间隔）
    Reset,
    /// 显示运行状态
    Status,
    /// 导出已发现的条目
    ExportCsv {
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// 设置条目间隔（毫秒）
    SetDelay { delay_ms: u64 },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // 加载配置
    let mut config = match &cli.config {
        Some(path) => Config::from_file(path)?.with_env(),
        None => Config::load()?,
    };
    config.verbose_logging |= cli.verbose;

    // 初始化日志
    logging::init(config.verbose_logging);

    let store = Arc::new(StateStore::new(&config.state_file));
    let commands = Commands::new(Arc::clone(&store), Bus::new());

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => {
            commands
                .apply_configured_delay(config.inter_item_delay_ms)
                .await?;
            App::initialize(config).await?.run().await?;
        }
        Command::Stop => {
            commands.stop().await?;
            info!("⏹️ 已标记停止");
        }
        Command::Reset => {
            commands.reset().await?;
            info!("🧹 运行状态已清空");
        }
        Command::Status => {
            let state = commands.status().await?;
            info!("运行中: {}", state.active);
            info!("已发现: {} 个文档", state.items.len());
            info!("已处理: {} 个", state.attempted.len());
            info!("待处理: {} 个", state.pending_items().len());
            info!("已扫描页数: {}", state.page_count);
            info!("条目间隔: {} ms", state.effective_delay_ms());
        }
        Command::ExportCsv { output } => {
            let path = commands.export_csv(output.as_deref()).await?;
            info!("📄 已导出: {}", path.display());
        }
        Command::SetDelay { delay_ms } => {
            commands.set_delay(delay_ms).await?;
            if delay_ms < MIN_INTER_ITEM_DELAY_MS {
                info!(
                    "⏱️ 已设置 {} ms（实际使用下限 {} ms）",
                    delay_ms,
                    clamp_delay_ms(delay_ms)
                );
            } else {
                info!("⏱️ 条目间隔已设置为 {} ms", delay_ms);
            }
        }
    }

    Ok(())
}
