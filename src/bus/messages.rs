use std::fmt;

use chrono::{DateTime, Local};
use tokio::sync::oneshot;

use crate::infrastructure::SourceId;
use crate::models::QueueEntry;

/// 发给控制器的消息
#[derive(Debug)]
pub enum ControllerMsg {
    /// 扫描器发现了新条目
    Enqueue {
        entries: Vec<QueueEntry>,
        source: SourceId,
    },
    /// 清空队列，当前条目跑完后停止
    Stop,
    /// 扫描器请求点击已标记的下一页控件
    RequestNextPageNavigation { source: SourceId, selector: String },
    /// 翻页任务发现源页面已关闭
    SourceLost,
}

/// 发给扫描器的消息
#[derive(Debug)]
pub enum ScannerMsg {
    Start,
    Stop,
    /// 翻页稳定后重新扫描
    Rescan,
    /// 控制器队列已清空
    RunFinishedOnPage,
    /// 定位某一行的按钮，可选地代为点击
    TriggerRowAction {
        row_index: u32,
        perform_click: bool,
        reply: oneshot::Sender<TriggerAck>,
    },
}

/// `TriggerRowAction` 的应答
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TriggerAck {
    pub found: bool,
}

/// 发给控制面板的消息
#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceMsg {
    Log(LogLine),
    Progress { total_items: usize, page_count: u32 },
    RunCompleted,
}

/// 日志严重级别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Success,
    Warn,
    Error,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Success => "success",
            Severity::Warn => "warn",
            Severity::Error => "error",
        }
    }
}

/// 带时间戳和级别的日志行，是唯一的失败上报渠道
#[derive(Debug, Clone, PartialEq)]
pub struct LogLine {
    pub at: DateTime<Local>,
    pub severity: Severity,
    pub message: String,
}

impl LogLine {
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            at: Local::now(),
            severity,
            message: message.into(),
        }
    }
}

impl fmt::Display for LogLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {:<7} {}",
            self.at.format("%H:%M:%S"),
            self.severity.as_str().to_uppercase(),
            self.message
        )
    }
}
