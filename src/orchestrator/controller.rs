//! 任务队列处理器 - 编排层
//!
//! ## 职责
//!
//! 长生命周期的单消费者队列：一次只抓一个文档，每条之后固定等待一个间隔。
//!
//! ## 单飞约束
//!
//! - `processing` 为真时不会再启动第二条
//! - `stop` 不打断正在进行的条目，只阻止下一条开始
//! - 新的 `enqueue` 在 `processing` 为假时重新启动消费

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Sleep;
use tracing::{debug, info};

use crate::bus::{Bus, ControllerMsg, Reporter, ScannerMsg};
use crate::config::Timings;
use crate::infrastructure::{HostAutomation, SourceId};
use crate::models::{clamp_delay_ms, QueueEntry, DEFAULT_INTER_ITEM_DELAY_MS};
use crate::store::StateStore;
use crate::workflow::{CaptureFlow, ItemCtx, ItemOutcome};

/// 由行号生成触发按钮的选择器
pub type RowSelector = Box<dyn Fn(u32) -> String + Send + Sync>;

/// 控制器的内存队列
///
/// 只描述队列纪律，不做任何 IO
#[derive(Debug, Default)]
pub struct TaskQueue {
    queue: VecDeque<QueueEntry>,
    processing: bool,
    source: Option<SourceId>,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加条目，队列中已有的 id 会被过滤
    ///
    /// # 返回
    /// 需要启动消费时返回 `true`
    pub fn enqueue(&mut self, entries: Vec<QueueEntry>, source: SourceId) -> bool {
        for entry in entries {
            if !self.queue.iter().any(|queued| queued.id == entry.id) {
                self.queue.push_back(entry);
            }
        }
        self.source = Some(source);

        if !self.processing && !self.queue.is_empty() {
            self.processing = true;
            return true;
        }
        false
    }

    /// 清空队列
    pub fn stop(&mut self) {
        self.queue.clear();
        self.processing = false;
    }

    pub fn pop_next(&mut self) -> Option<QueueEntry> {
        self.queue.pop_front()
    }

    /// 队列耗尽
    pub fn finish(&mut self) {
        self.processing = false;
    }

    pub fn is_processing(&self) -> bool {
        self.processing
    }

    pub fn source(&self) -> Option<&SourceId> {
        self.source.as_ref()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn ids(&self) -> Vec<&str> {
        self.queue.iter().map(|entry| entry.id.as_str()).collect()
    }
}

/// 控制器统计
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ControllerStats {
    pub saved: usize,
    pub skipped: usize,
    pub aborted: bool,
}

pub struct Controller {
    host: Arc<dyn HostAutomation>,
    flow: Arc<CaptureFlow>,
    store: Arc<StateStore>,
    bus: Bus,
    reporter: Reporter,
    timings: Timings,
    row_selector: RowSelector,
    queue: TaskQueue,
    in_flight: Option<BoxFuture<'static, (ItemCtx, ItemOutcome)>>,
    delay: Option<Pin<Box<Sleep>>>,
    navigation: Option<JoinHandle<()>>,
    stats: ControllerStats,
}

impl Controller {
    pub fn new(
        host: Arc<dyn HostAutomation>,
        flow: Arc<CaptureFlow>,
        store: Arc<StateStore>,
        bus: Bus,
        timings: Timings,
        row_selector: RowSelector,
    ) -> Self {
        let reporter = bus.reporter("controller");
        Self {
            host,
            flow,
            store,
            bus,
            reporter,
            timings,
            row_selector,
            queue: TaskQueue::new(),
            in_flight: None,
            delay: None,
            navigation: None,
            stats: ControllerStats::default(),
        }
    }

    /// 处理消息直到邮箱被卸载
    pub async fn run(mut self, mut inbox: mpsc::UnboundedReceiver<ControllerMsg>) -> ControllerStats {
        info!("🎛️ 控制器已启动");
        loop {
            tokio::select! {
                msg = inbox.recv() => match msg {
                    Some(msg) => self.handle(msg).await,
                    None => break,
                },
                (ctx, outcome) = poll_slot(&mut self.in_flight) => {
                    self.in_flight = None;
                    self.finish_item(ctx, outcome).await;
                }
                _ = poll_slot(&mut self.delay) => {
                    self.delay = None;
                    self.consume_next().await;
                }
            }
        }
        if let Some(handle) = self.navigation.take() {
            handle.abort();
        }
        info!("🎛️ 控制器已退出");
        self.stats
    }

    async fn handle(&mut self, msg: ControllerMsg) {
        match msg {
            ControllerMsg::Enqueue { entries, source } => {
                let count = entries.len();
                let start = self.queue.enqueue(entries, source);
                debug!("收到 {} 条，队列长度 {}", count, self.queue.len());
                if start {
                    self.reporter
                        .info(format!("开始处理队列 ({} 条)", self.queue.len()));
                    self.kick().await;
                }
            }
            ControllerMsg::Stop => {
                self.queue.stop();
                if let Some(handle) = self.navigation.take() {
                    handle.abort();
                }
                if let Err(e) = self.store.set_active(false).await {
                    self.reporter.error(format!("写入状态失败: {}", e));
                }
                self.reporter.warn("已停止，队列已清空");
            }
            ControllerMsg::RequestNextPageNavigation { source, selector } => {
                self.navigate(source, selector);
            }
            ControllerMsg::SourceLost => {
                self.navigation = None;
                self.abort_run("翻页前源页面已关闭").await;
            }
        }
    }

    /// 空闲时立即开始下一条；有条目在进行或正在等待间隔时什么都不做
    async fn kick(&mut self) {
        if self.in_flight.is_none() && self.delay.is_none() {
            self.consume_next().await;
        }
    }

    async fn consume_next(&mut self) {
        if !self.queue.is_processing() {
            return;
        }

        let Some(entry) = self.queue.pop_next() else {
            self.queue.finish();
            self.on_drained().await;
            return;
        };

        let Some(source) = self.queue.source().cloned() else {
            self.abort_run("没有源页面").await;
            return;
        };

        let id = entry.id.clone();
        if let Err(e) = self
            .store
            .update(move |state| {
                state.attempted.insert(id);
            })
            .await
        {
            self.reporter.warn(format!("记录处理进度失败: {}", e));
        }

        let selector = (self.row_selector)(entry.row_index);
        let ctx = ItemCtx::new(entry, source, selector, self.queue.len());
        let flow = Arc::clone(&self.flow);
        self.in_flight = Some(Box::pin(async move {
            let outcome = flow.run(&ctx).await;
            (ctx, outcome)
        }));
    }

    async fn finish_item(&mut self, ctx: ItemCtx, outcome: ItemOutcome) {
        match &outcome {
            ItemOutcome::Saved(_) => self.stats.saved += 1,
            ItemOutcome::Skipped(_) => self.stats.skipped += 1,
            ItemOutcome::Aborted(e) => {
                self.abort_run(&format!("{}: {}", ctx, e)).await;
                return;
            }
        }

        let inter_item = inter_item_delay(&self.store).await;
        let delay = outcome.next_delay(inter_item, self.timings.not_found_retry());
        debug!("{} 完成，{} ms 后继续", ctx, delay.as_millis());
        self.delay = Some(Box::pin(tokio::time::sleep(delay)));
    }

    async fn on_drained(&mut self) {
        let alive = match self.queue.source() {
            Some(source) => self.host.source_alive(source).await,
            None => false,
        };
        if alive {
            self.reporter.info("本页队列已处理完");
            self.bus.scanner.notify(ScannerMsg::RunFinishedOnPage);
        } else {
            self.abort_run("本页处理完时源页面已关闭").await;
        }
    }

    async fn abort_run(&mut self, reason: &str) {
        self.queue.stop();
        self.stats.aborted = true;
        self.reporter.error(format!("运行终止: {}", reason));
        if let Err(e) = self.store.set_active(false).await {
            self.reporter.error(format!("写入状态失败: {}", e));
        }
        self.bus.scanner.notify(ScannerMsg::Stop);
    }

    /// 翻页：等待后点击已标记的控件，表格刷新后请扫描器重扫
    fn navigate(&mut self, source: SourceId, selector: String) {
        if let Some(handle) = self.navigation.take() {
            handle.abort();
        }
        let host = Arc::clone(&self.host);
        let reporter = self.reporter.clone();
        let scanner = self.bus.scanner.clone();
        let controller = self.bus.controller.clone();
        let pre_click = self.timings.nav_pre_click();
        let settle = self.timings.nav_settle();

        self.navigation = Some(tokio::spawn(async move {
            tokio::time::sleep(pre_click).await;
            if !host.source_alive(&source).await {
                controller.notify(ControllerMsg::SourceLost);
                return;
            }
            match host.click(&source, &selector).await {
                Ok(true) => reporter.info("➡️ 已点击下一页"),
                Ok(false) => reporter.warn("找不到下一页控件"),
                Err(e) => reporter.warn(format!("点击下一页失败: {}", e)),
            }
            tokio::time::sleep(settle).await;
            scanner.notify(ScannerMsg::Rescan);
        }));
    }
}

/// 每条都重新读取，操作员可以在运行中调整间隔
async fn inter_item_delay(store: &StateStore) -> Duration {
    let ms = match store.load().await {
        Ok(state) => state.effective_delay_ms(),
        Err(e) => {
            debug!("读取状态失败，使用默认间隔: {}", e);
            clamp_delay_ms(DEFAULT_INTER_ITEM_DELAY_MS)
        }
    };
    Duration::from_millis(ms)
}

async fn poll_slot<F: Future + Unpin>(slot: &mut Option<F>) -> F::Output {
    match slot {
        Some(fut) => fut.await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: &str, row: u32) -> QueueEntry {
        QueueEntry {
            id: id.to_string(),
            row_index: row,
            file_name: format!("{}_file", id),
        }
    }

    fn source() -> SourceId {
        SourceId("page-1".to_string())
    }

    #[test]
    fn test_enqueue_starts_once() {
        let mut queue = TaskQueue::new();
        assert!(queue.enqueue(vec![entry("a", 0)], source()));
        assert!(!queue.enqueue(vec![entry("b", 1)], source()));
        assert_eq!(queue.ids(), vec!["a", "b"]);
    }

    #[test]
    fn test_enqueue_empty_batch_does_not_start() {
        let mut queue = TaskQueue::new();
        assert!(!queue.enqueue(vec![], source()));
        assert!(!queue.is_processing());
        assert_eq!(queue.source(), Some(&source()));
    }

    #[test]
    fn test_fifo_across_batches_with_duplicates() {
        let mut queue = TaskQueue::new();
        queue.enqueue(vec![entry("a", 0), entry("b", 1)], source());
        queue.enqueue(vec![entry("b", 1), entry("c", 2), entry("c", 2)], source());
        queue.enqueue(vec![entry("a", 0), entry("d", 3)], source());

        let mut order = Vec::new();
        while let Some(next) = queue.pop_next() {
            order.push(next.id);
        }
        assert_eq!(order, vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn test_stop_then_enqueue_restarts() {
        let mut queue = TaskQueue::new();
        queue.enqueue(vec![entry("a", 0), entry("b", 1)], source());
        queue.stop();
        assert!(queue.is_empty());
        assert!(!queue.is_processing());

        assert!(queue.enqueue(vec![entry("c", 2)], source()));
        assert!(queue.is_processing());
        assert_eq!(queue.ids(), vec!["c"]);
    }

    #[test]
    fn test_finish_clears_processing() {
        let mut queue = TaskQueue::new();
        queue.enqueue(vec![entry("a", 0)], source());
        assert!(queue.pop_next().is_some());
        assert!(queue.pop_next().is_none());
        queue.finish();
        assert!(!queue.is_processing());
        assert!(queue.enqueue(vec![entry("b", 1)], source()));
    }

    #[test]
    fn test_enqueue_records_latest_source() {
        let mut queue = TaskQueue::new();
        queue.enqueue(vec![entry("a", 0)], SourceId("old".to_string()));
        queue.enqueue(vec![], SourceId("new".to_string()));
        assert_eq!(queue.source().map(|s| s.0.as_str()), Some("new"));
    }
}
