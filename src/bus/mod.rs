//! 消息总线
//!
//! 三个独立生命周期的上下文（控制器、扫描器、控制面板）之间只靠消息通信：
//! - `notify`：尽力而为，接收方不存在时静默丢弃
//! - `request`：带应答，调用方拿到确定的结果或错误

pub mod endpoint;
pub mod messages;
pub mod reporter;

pub use endpoint::{BusError, Endpoint};
pub use messages::{ControllerMsg, LogLine, ScannerMsg, Severity, SurfaceMsg, TriggerAck};
pub use reporter::Reporter;

/// 三个上下文的邮箱
#[derive(Clone)]
pub struct Bus {
    pub controller: Endpoint<ControllerMsg>,
    pub scanner: Endpoint<ScannerMsg>,
    pub surface: Endpoint<SurfaceMsg>,
}

impl Bus {
    pub fn new() -> Self {
        Self {
            controller: Endpoint::new("controller"),
            scanner: Endpoint::new("scanner"),
            surface: Endpoint::new("control-surface"),
        }
    }

    /// 为某个组件创建日志上报器
    pub fn reporter(&self, component: &'static str) -> Reporter {
        Reporter::new(component, self.surface.clone())
    }
}

impl Default for Bus {
    fn default() -> Self {
        Self::new()
    }
}
