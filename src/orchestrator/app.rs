//! 应用入口 - 编排层
//!
//! ## 职责
//!
//! 1. **应用初始化**：日志文件、连接浏览器、创建 `ChromeHost` 和页面适配器
//! 2. **组件装配**：挂载三个邮箱，启动控制器、扫描器、控制面板
//! 3. **生命周期**：开始或恢复运行，等待完成 / 中断 / 外部停止
//! 4. **全局统计**：汇总保存和跳过的数量
//!
//! 唯一持有 Browser 的模块

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::browser::{self, ChromeHost};
use crate::bus::Bus;
use crate::config::{Config, Timings};
use crate::error::AppError;
use crate::infrastructure::{HostAutomation, JsExecutor, SourceId};
use crate::models::RowIndexRule;
use crate::orchestrator::control_surface::{Commands, ControlSurface, SurfaceSummary};
use crate::orchestrator::controller::{Controller, ControllerStats, RowSelector};
use crate::orchestrator::scanner::{ScanState, Scanner};
use crate::services::{GridPageAdapter, PageAdapter, PdfWriter};
use crate::store::StateStore;
use crate::utils::logging::{init_log_file, log_startup, print_final_stats};
use crate::workflow::CaptureFlow;

/// 外部停止检测的轮询间隔
const STOP_POLL: Duration = Duration::from_secs(2);

/// 装配一次运行所需的全部部件
pub struct Components {
    pub host: Arc<dyn HostAutomation>,
    pub adapter: Arc<dyn PageAdapter>,
    pub store: Arc<StateStore>,
    pub writer: PdfWriter,
    pub timings: Timings,
    pub rule: RowIndexRule,
    pub source: SourceId,
    pub log_file: Option<String>,
}

/// 一次运行结束后的汇总
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub controller: ControllerStats,
    pub scanner: ScanState,
    pub surface: SurfaceSummary,
}

/// 已启动的三个组件
pub struct RunHandles {
    pub bus: Bus,
    pub commands: Commands,
    completion: watch::Receiver<bool>,
    controller: JoinHandle<ControllerStats>,
    scanner: JoinHandle<ScanState>,
    surface: JoinHandle<SurfaceSummary>,
}

impl RunHandles {
    /// 等待控制面板收到运行完成
    pub async fn wait_completed(&mut self) -> bool {
        self.completion.wait_for(|done| *done).await.is_ok()
    }

    /// 卸载所有邮箱并等待组件退出
    ///
    /// 正在进行的条目会被丢弃
    pub async fn shutdown(self) -> Result<RunSummary> {
        self.bus.controller.detach();
        self.bus.scanner.detach();
        let controller = self.controller.await.context("控制器任务异常退出")?;
        let scanner = self.scanner.await.context("扫描器任务异常退出")?;

        self.bus.surface.detach();
        let surface = self.surface.await.context("控制面板任务异常退出")?;

        Ok(RunSummary {
            controller,
            scanner,
            surface,
        })
    }
}

/// 挂载邮箱并启动控制器、扫描器、控制面板
///
/// 邮箱在任务启动前挂载，之后发出的消息不会丢失
pub fn launch(components: Components, row_selector: RowSelector) -> RunHandles {
    let bus = Bus::new();
    let controller_inbox = bus.controller.attach();
    let scanner_inbox = bus.scanner.attach();
    let surface_inbox = bus.surface.attach();

    let surface = ControlSurface::new(components.log_file.clone());
    let completion = surface.completion();
    let surface = tokio::spawn(surface.run(surface_inbox));

    let flow = Arc::new(CaptureFlow::new(
        Arc::clone(&components.host),
        components.writer,
        bus.scanner.clone(),
        components.timings.clone(),
        bus.reporter("capture"),
    ));

    let controller = Controller::new(
        Arc::clone(&components.host),
        flow,
        Arc::clone(&components.store),
        bus.clone(),
        components.timings.clone(),
        row_selector,
    );
    let controller = tokio::spawn(controller.run(controller_inbox));

    let scanner = Scanner::new(
        components.adapter,
        Arc::clone(&components.store),
        bus.clone(),
        components.timings,
        components.rule,
        components.source,
    );
    let scanner = tokio::spawn(scanner.run(scanner_inbox));

    RunHandles {
        commands: Commands::new(components.store, bus.clone()),
        bus,
        completion,
        controller,
        scanner,
        surface,
    }
}

/// 应用主结构
pub struct App {
    config: Config,
    host: Arc<ChromeHost>,
    adapter: Arc<GridPageAdapter>,
    store: Arc<StateStore>,
}

impl App {
    /// 初始化应用
    pub async fn initialize(config: Config) -> Result<Self> {
        config.validate().map_err(AppError::Config)?;

        // 初始化日志文件
        init_log_file(&config.output_log_file)?;

        log_startup(&config);

        // 连接浏览器
        let (browser, page) = browser::connect_to_browser_and_page(
            config.browser_debug_port,
            config.target_url.as_deref(),
            config.target_title.as_deref(),
        )
        .await?;

        // 创建 JsExecutor（持有 page）
        let executor = JsExecutor::new(page);
        let rule = RowIndexRule::new(&config.row_index_pattern)?;
        let adapter = GridPageAdapter::new(
            executor.clone(),
            rule,
            config.action_selector.clone(),
            config.row_key_template.clone(),
        );
        let host = ChromeHost::new(browser, executor, config.timings.load_poll()).await?;

        Ok(Self {
            store: Arc::new(StateStore::new(&config.state_file)),
            config,
            host: Arc::new(host),
            adapter: Arc::new(adapter),
        })
    }

    /// 运行应用主逻辑
    pub async fn run(self) -> Result<RunSummary> {
        let writer = PdfWriter::new(&self.config.output_dir);
        writer.ensure_output_dir()?;

        let selector_adapter = Arc::clone(&self.adapter);
        let row_selector: RowSelector =
            Box::new(move |row| selector_adapter.row_action_selector(row));

        let components = Components {
            host: self.host.clone(),
            adapter: self.adapter.clone(),
            store: Arc::clone(&self.store),
            writer,
            timings: self.config.timings.clone(),
            rule: self.adapter.rule().clone(),
            source: self.host.source().source_id(),
            log_file: Some(self.config.output_log_file.clone()),
        };
        let mut handles = launch(components, row_selector);

        let state = self.store.load().await?;
        if state.active {
            info!("🔁 恢复上次的运行");
        } else {
            handles.commands.start();
        }

        tokio::select! {
            _ = handles.wait_completed() => {
                info!("✅ 运行完成");
            }
            _ = wait_until_inactive(&self.store, STOP_POLL) => {
                warn!("⏹️ 运行已被停止");
            }
            signal = tokio::signal::ctrl_c() => {
                signal.context("无法监听中断信号")?;
                warn!("⏹️ 收到中断信号，正在停止...");
                handles.commands.stop().await?;
            }
        }

        let summary = handles.shutdown().await?;
        let page_count = self.store.load().await.map(|s| s.page_count).unwrap_or(0);
        print_final_stats(
            summary.controller.saved,
            summary.controller.skipped,
            page_count,
            &self.config.output_log_file,
        );
        Ok(summary)
    }
}

/// 等待运行状态从激活变为未激活（外部 `stop` 命令或运行被终止）
pub async fn wait_until_inactive(store: &StateStore, poll: Duration) {
    let mut seen_active = false;
    let mut ticker = tokio::time::interval(poll);
    loop {
        ticker.tick().await;
        match store.load().await {
            Ok(state) if state.active => seen_active = true,
            Ok(_) if seen_active => return,
            Ok(_) => {}
            Err(e) => warn!("读取状态失败: {}", e),
        }
    }
}
