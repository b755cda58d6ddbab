//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责组件调度和生命周期，是整个系统的"指挥中心"。
//!
//! ## 模块划分
//!
//! ### `app` - 应用入口
//! - 连接浏览器，持有 Browser
//! - 挂载邮箱，启动三个组件
//! - 等待完成 / 中断，输出统计
//!
//! ### `controller` - 任务队列处理器
//! - 单消费者 FIFO 队列，同一时刻只有一个条目在抓取
//! - 每条之后等待条目间隔
//! - 代扫描器点击下一页
//!
//! ### `scanner` - 页面扫描与翻页状态机
//! - 发现条目，写入持久化状态，交给控制器
//! - 本页处理完后寻找下一页
//!
//! ### `control_surface` - 控制面板
//! - 最近日志、进度、完成通知
//! - 开始 / 停止 / 重置 / 间隔 / CSV 导出
//!
//! ## 层次关系
//!
//! ```text
//! app
//!  ├── scanner ──enqueue──▶ controller ──▶ workflow::CaptureFlow (单个条目)
//!  │      ▲                    │                 ↓
//!  │      └─runFinishedOnPage──┘           infrastructure::HostAutomation
//!  └── control_surface ◀── log / progress / runCompleted
//! ```

pub mod app;
pub mod control_surface;
pub mod controller;
pub mod scanner;

// 重新导出主要类型
pub use app::{launch, App, Components, RunHandles, RunSummary};
pub use control_surface::{Commands, ControlSurface, SurfaceSummary};
pub use controller::{Controller, ControllerStats, RowSelector, TaskQueue};
pub use scanner::{ScanState, Scanner};
