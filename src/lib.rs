//! # Listing PDF Harvester
//!
//! 从分页的服务端渲染列表中逐条打开文档、打印成 PDF 并保存
//!
//! ## 架构设计
//!
//! 本系统采用严格的四层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 持有稀缺资源（源页面），只暴露能力
//! - `JsExecutor` - 唯一的 page owner，提供 eval() 能力
//! - `HostAutomation` - 点击、感知新窗口、打印 PDF、关闭窗口
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"
//! - `PageAdapter` / `GridPageAdapter` - 定位文档按钮和分页控件
//! - `pagination` - 下一页选择策略
//! - `PdfWriter` - 不覆盖已有文件的落盘
//! - `csv_export` - 已发现条目导出
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 定义"一个文档"的完整抓取协议
//! - `ItemCtx` - 上下文封装（行号 + 源页面）
//! - `CaptureFlow` - 点击 → 新窗口 → 加载 → 打印 → 关闭
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/controller` - 单消费者任务队列
//! - `orchestrator/scanner` - 页面扫描与翻页状态机
//! - `orchestrator/control_surface` - 日志、进度、操作员命令
//! - `orchestrator/app` - 装配与生命周期
//!
//! 组件之间只通过 `bus` 通信，进度保存在 `store`。
//!
//! ## 模块结构

pub mod browser;
pub mod bus;
pub mod config;
pub mod error;
pub mod infrastructure;

pub mod models;
pub mod orchestrator;
pub mod services;
pub mod store;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use browser::{connect_to_browser_and_page, ChromeHost};
pub use config::{Config, Timings};
pub use error::{AppError, CaptureError};
pub use infrastructure::{HostAutomation, JsExecutor, SourceId, SurfaceId};
pub use models::{QueueEntry, RunState, WorkItem};
pub use orchestrator::{launch, App, Components, RunHandles, RunSummary};
pub use services::{GridPageAdapter, PageAdapter, PdfWriter};
pub use store::StateStore;
pub use workflow::{CaptureFlow, ItemCtx, ItemOutcome};
