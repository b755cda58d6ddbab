//! 控制面板 - 编排层
//!
//! 操作员一侧的薄层：显示最近的日志和进度，发出开始 / 停止，读写持久化状态。

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::bus::{Bus, ControllerMsg, LogLine, ScannerMsg, SurfaceMsg};
use crate::models::RunState;
use crate::services::csv_export;
use crate::store::StateStore;
use crate::utils::logging;

/// 面板保留的日志行数
pub const LOG_CAPACITY: usize = 20;

/// 控制面板退出时的快照
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SurfaceSummary {
    pub recent: Vec<LogLine>,
    pub total_items: usize,
    pub page_count: u32,
    /// 收到完成通知的次数
    pub completions: usize,
}

pub struct ControlSurface {
    recent: VecDeque<LogLine>,
    log_file: Option<String>,
    total_items: usize,
    page_count: u32,
    completions: usize,
    completed: watch::Sender<bool>,
}

impl ControlSurface {
    pub fn new(log_file: Option<String>) -> Self {
        let (completed, _) = watch::channel(false);
        Self {
            recent: VecDeque::with_capacity(LOG_CAPACITY),
            log_file,
            total_items: 0,
            page_count: 0,
            completions: 0,
            completed,
        }
    }

    /// 订阅"运行完成"
    pub fn completion(&self) -> watch::Receiver<bool> {
        self.completed.subscribe()
    }

    pub async fn run(mut self, mut inbox: mpsc::UnboundedReceiver<SurfaceMsg>) -> SurfaceSummary {
        while let Some(msg) = inbox.recv().await {
            self.apply(msg);
        }
        SurfaceSummary {
            recent: self.recent.into_iter().collect(),
            total_items: self.total_items,
            page_count: self.page_count,
            completions: self.completions,
        }
    }

    fn apply(&mut self, msg: SurfaceMsg) {
        match msg {
            SurfaceMsg::Log(line) => {
                if let Some(path) = &self.log_file {
                    if let Err(e) = logging::append_log_line(path, &line.to_string()) {
                        debug!("写入日志文件失败: {}", e);
                    }
                }
                if self.recent.len() == LOG_CAPACITY {
                    self.recent.pop_front();
                }
                self.recent.push_back(line);
            }
            SurfaceMsg::Progress {
                total_items,
                page_count,
            } => {
                self.total_items = total_items;
                self.page_count = page_count;
                info!("📊 已发现 {} 个文档 | 第 {} 页", total_items, page_count);
            }
            SurfaceMsg::RunCompleted => {
                self.completions += 1;
                self.completed.send_replace(true);
            }
        }
    }
}

/// 操作员命令
///
/// 只读写持久化状态和发消息，不持有任何运行中的组件
#[derive(Clone)]
pub struct Commands {
    store: Arc<StateStore>,
    bus: Bus,
}

impl Commands {
    pub fn new(store: Arc<StateStore>, bus: Bus) -> Self {
        Self { store, bus }
    }

    pub fn start(&self) {
        self.bus.scanner.notify(ScannerMsg::Start);
    }

    pub async fn stop(&self) -> Result<()> {
        self.bus.controller.notify(ControllerMsg::Stop);
        self.bus.scanner.notify(ScannerMsg::Stop);
        self.store.set_active(false).await
    }

    pub async fn reset(&self) -> Result<()> {
        self.store.reset().await
    }

    pub async fn set_delay(&self, delay_ms: u64) -> Result<()> {
        self.store.set_delay(delay_ms).await
    }

    /// 新一轮运行采用配置中的间隔；恢复中的运行保留已保存的值
    ///
    /// # 返回
    /// 实际生效的间隔（毫秒）
    pub async fn apply_configured_delay(&self, configured_ms: u64) -> Result<u64> {
        let (resuming, stored) = self
            .store
            .update(|state| {
                if !state.active {
                    state.inter_item_delay_ms = configured_ms;
                }
                (state.active, state.inter_item_delay_ms)
            })
            .await?;
        if resuming && stored != configured_ms {
            warn!(
                "⏱️ 恢复运行，继续使用已保存的间隔 {} ms（配置为 {} ms，可用 set-delay 修改）",
                stored, configured_ms
            );
        }
        Ok(stored)
    }

    pub async fn status(&self) -> Result<RunState> {
        self.store.load().await
    }

    /// 导出所有已发现条目，返回写入的路径
    pub async fn export_csv(&self, output: Option<&Path>) -> Result<PathBuf> {
        let state = self.store.load().await?;
        let path = output
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(csv_export::default_file_name()));
        csv_export::write_csv(&path, &state.items)?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::Severity;

    #[test]
    fn test_keeps_last_twenty_lines() {
        let mut surface = ControlSurface::new(None);
        for i in 0..25 {
            surface.apply(SurfaceMsg::Log(LogLine::new(Severity::Info, format!("line {}", i))));
        }
        assert_eq!(surface.recent.len(), LOG_CAPACITY);
        assert_eq!(surface.recent.front().map(|l| l.message.as_str()), Some("line 5"));
        assert_eq!(surface.recent.back().map(|l| l.message.as_str()), Some("line 24"));
    }

    #[test]
    fn test_completion_is_observable() {
        let mut surface = ControlSurface::new(None);
        let done = surface.completion();
        assert!(!*done.borrow());
        surface.apply(SurfaceMsg::RunCompleted);
        assert!(*done.borrow());
        assert_eq!(surface.completions, 1);
    }

    #[test]
    fn test_log_lines_appended_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.log");
        let path_str = path.to_string_lossy().to_string();
        let mut surface = ControlSurface::new(Some(path_str));
        surface.apply(SurfaceMsg::Log(LogLine::new(Severity::Warn, "Row 3: 跳过")));
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("WARN"));
        assert!(content.contains("Row 3: 跳过"));
    }

    #[tokio::test]
    async fn test_configured_delay_applies_to_new_runs_only() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(StateStore::new(dir.path().join("state.json")));
        let commands = Commands::new(Arc::clone(&store), Bus::new());

        // 之前的运行留下了旧值
        commands.set_delay(9000).await.unwrap();
        assert_eq!(commands.apply_configured_delay(4000).await.unwrap(), 4000);
        assert_eq!(store.load().await.unwrap().inter_item_delay_ms, 4000);

        // 恢复中途的运行不覆盖操作员设置的值
        store.set_active(true).await.unwrap();
        commands.set_delay(6000).await.unwrap();
        assert_eq!(commands.apply_configured_delay(4000).await.unwrap(), 6000);
        assert_eq!(store.load().await.unwrap().inter_item_delay_ms, 6000);
    }

    #[tokio::test]
    async fn test_commands_reset_keeps_delay_and_exports() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(StateStore::new(dir.path().join("state.json")));
        let commands = Commands::new(Arc::clone(&store), Bus::new());

        commands.set_delay(5000).await.unwrap();
        store
            .update(|state| {
                state.active = true;
                state.append_new(vec![crate::models::WorkItem::new(0, 0, "A".to_string())]);
            })
            .await
            .unwrap();

        let csv_path = dir.path().join("out.csv");
        let written = commands.export_csv(Some(&csv_path)).await.unwrap();
        assert_eq!(written, csv_path);
        assert_eq!(std::fs::read_to_string(&csv_path).unwrap().lines().count(), 2);

        commands.stop().await.unwrap();
        assert!(!commands.status().await.unwrap().active);

        commands.reset().await.unwrap();
        let state = commands.status().await.unwrap();
        assert!(state.items.is_empty());
        assert_eq!(state.inter_item_delay_ms, 5000);
    }
}
