use tracing::{error, info, warn};

use super::{Endpoint, LogLine, Severity, SurfaceMsg};

/// 日志上报器
///
/// 同时写 tracing 和控制面板；控制面板不在线时只写 tracing
#[derive(Clone)]
pub struct Reporter {
    component: &'static str,
    surface: Endpoint<SurfaceMsg>,
}

impl Reporter {
    pub fn new(component: &'static str, surface: Endpoint<SurfaceMsg>) -> Self {
        Self { component, surface }
    }

    pub fn log(&self, severity: Severity, message: impl Into<String>) {
        let message = message.into();
        match severity {
            Severity::Info => info!("[{}] {}", self.component, message),
            Severity::Success => info!("[{}] ✓ {}", self.component, message),
            Severity::Warn => warn!("[{}] ⚠️ {}", self.component, message),
            Severity::Error => error!("[{}] ❌ {}", self.component, message),
        }
        self.surface
            .notify(SurfaceMsg::Log(LogLine::new(severity, message)));
    }

    pub fn info(&self, message: impl Into<String>) {
        self.log(Severity::Info, message);
    }

    pub fn success(&self, message: impl Into<String>) {
        self.log(Severity::Success, message);
    }

    pub fn warn(&self, message: impl Into<String>) {
        self.log(Severity::Warn, message);
    }

    pub fn error(&self, message: impl Into<String>) {
        self.log(Severity::Error, message);
    }

    pub fn progress(&self, total_items: usize, page_count: u32) {
        self.surface.notify(SurfaceMsg::Progress {
            total_items,
            page_count,
        });
    }

    pub fn run_completed(&self) {
        self.surface.notify(SurfaceMsg::RunCompleted);
    }
}
