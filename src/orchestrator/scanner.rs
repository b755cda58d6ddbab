//! 页面扫描与翻页状态机 - 编排层
//!
//! ## 状态
//!
//! ```text
//! Idle ──start / 恢复──▶ Scanning(1) ──没找到──▶ Scanning(n+1) … Scanning(6) ──▶ Idle
//!                            │
//!                          找到
//!                            ▼
//!                      AwaitingDrain ──本页处理完──▶ 找下一页 ──找到──▶ AwaitingNextPage ──rescan──▶ Scanning(1)
//!                                                         └──没有──▶ Done
//! ```
//!
//! 扫描器不直接点击源页面，翻页和行按钮都由控制器代为触发。

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::time::Sleep;
use tracing::{debug, info};

use crate::bus::{Bus, ControllerMsg, Reporter, ScannerMsg, TriggerAck};
use crate::config::Timings;
use crate::error::CaptureError;
use crate::infrastructure::SourceId;
use crate::models::{build_display_name, QueueEntry, RowIndexRule, WorkItem};
use crate::services::{find_next_page, DiscoveredAction, PageAdapter};
use crate::store::StateStore;

/// 连续多少页没有新条目就结束运行
pub const MAX_EMPTY_PAGES: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    Idle,
    Scanning { attempt: u32 },
    /// 条目已交给控制器，等待本页处理完
    AwaitingDrain,
    /// 已请求翻页，等待 rescan
    AwaitingNextPage,
    Done,
}

/// 一次扫描写入状态后的结果
#[derive(Debug)]
struct Ingested {
    appended: usize,
    pending: Vec<QueueEntry>,
    total_items: usize,
    page_count: u32,
}

pub struct Scanner {
    adapter: Arc<dyn PageAdapter>,
    store: Arc<StateStore>,
    bus: Bus,
    reporter: Reporter,
    timings: Timings,
    rule: RowIndexRule,
    source: SourceId,
    state: ScanState,
    timer: Option<Pin<Box<Sleep>>>,
    empty_pages: u32,
}

impl Scanner {
    pub fn new(
        adapter: Arc<dyn PageAdapter>,
        store: Arc<StateStore>,
        bus: Bus,
        timings: Timings,
        rule: RowIndexRule,
        source: SourceId,
    ) -> Self {
        let reporter = bus.reporter("scanner");
        Self {
            adapter,
            store,
            bus,
            reporter,
            timings,
            rule,
            source,
            state: ScanState::Idle,
            timer: None,
            empty_pages: 0,
        }
    }

    pub fn state(&self) -> ScanState {
        self.state
    }

    /// 处理消息直到邮箱被卸载
    ///
    /// 启动时总是先读持久化状态，运行中则在短暂等待后继续扫描
    pub async fn run(mut self, mut inbox: mpsc::UnboundedReceiver<ScannerMsg>) -> ScanState {
        self.resume().await;
        loop {
            tokio::select! {
                msg = inbox.recv() => match msg {
                    Some(msg) => self.handle(msg).await,
                    None => break,
                },
                _ = poll_timer(&mut self.timer) => {
                    self.timer = None;
                    self.scan_attempt().await;
                }
            }
        }
        debug!("扫描器退出，状态 {:?}", self.state);
        self.state
    }

    async fn resume(&mut self) {
        match self.store.load().await {
            Ok(state) if state.active => {
                info!(
                    "🔁 检测到进行中的运行 (已有 {} 条, 已扫描 {} 页)，稍后继续",
                    state.items.len(),
                    state.page_count
                );
                self.state = ScanState::Scanning { attempt: 1 };
                self.timer = Some(Box::pin(tokio::time::sleep(self.timings.resume_grace())));
            }
            Ok(_) => self.state = ScanState::Idle,
            Err(e) => {
                self.reporter.error(format!("读取状态失败: {}", e));
                self.state = ScanState::Idle;
            }
        }
    }

    async fn handle(&mut self, msg: ScannerMsg) {
        match msg {
            ScannerMsg::Start => {
                if let Err(e) = self.store.set_active(true).await {
                    self.reporter.error(format!("写入状态失败: {}", e));
                    return;
                }
                self.reporter.info("▶️ 开始运行");
                self.empty_pages = 0;
                self.begin_scan().await;
            }
            ScannerMsg::Stop => {
                self.timer = None;
                self.state = ScanState::Idle;
                if let Err(e) = self.store.set_active(false).await {
                    self.reporter.error(format!("写入状态失败: {}", e));
                }
            }
            ScannerMsg::Rescan => {
                let active = self.store.load().await.map(|s| s.active).unwrap_or(false);
                if !active {
                    debug!("运行未激活，忽略 rescan");
                    return;
                }
                self.begin_scan().await;
            }
            ScannerMsg::RunFinishedOnPage => {
                if self.state == ScanState::AwaitingDrain {
                    self.advance_page().await;
                } else {
                    debug!("状态 {:?} 下收到本页完成通知，忽略", self.state);
                }
            }
            ScannerMsg::TriggerRowAction {
                row_index,
                perform_click,
                reply,
            } => {
                let found = match self
                    .adapter
                    .locate_row_action(row_index, perform_click)
                    .await
                {
                    Ok(found) => found,
                    Err(e) => {
                        debug!("定位第 {} 行失败: {}", row_index + 1, e);
                        false
                    }
                };
                if reply.send(TriggerAck { found }).is_err() {
                    debug!("请求方已不再等待第 {} 行的应答", row_index + 1);
                }
            }
        }
    }

    async fn begin_scan(&mut self) {
        self.timer = None;
        self.state = ScanState::Scanning { attempt: 1 };
        self.scan_attempt().await;
    }

    async fn scan_attempt(&mut self) {
        let ScanState::Scanning { attempt } = self.state else {
            return;
        };

        let actions = match self.adapter.discover_actions().await {
            Ok(actions) => actions,
            Err(e) => {
                let err = CaptureError::AdapterMismatch {
                    detail: e.to_string(),
                };
                self.reporter.warn(err.to_string());
                Vec::new()
            }
        };

        if actions.is_empty() {
            if attempt < self.timings.scan_max_attempts {
                debug!("第 {} 次扫描没有找到文档按钮，稍后重试", attempt);
                self.state = ScanState::Scanning {
                    attempt: attempt + 1,
                };
                self.timer = Some(Box::pin(tokio::time::sleep(self.timings.scan_retry())));
            } else {
                self.reporter.warn("本页没有找到文档");
                self.state = ScanState::Idle;
            }
            return;
        }

        let ingested = match ingest(&self.store, &self.rule, &actions).await {
            Ok(ingested) => ingested,
            Err(e) => {
                self.reporter.error(format!("写入状态失败: {}", e));
                self.state = ScanState::Idle;
                return;
            }
        };

        self.reporter
            .progress(ingested.total_items, ingested.page_count + 1);
        self.reporter.info(format!(
            "第 {} 页发现 {} 个文档，新增 {} 个，待处理 {} 个",
            ingested.page_count + 1,
            actions.len(),
            ingested.appended,
            ingested.pending.len()
        ));

        if ingested.pending.is_empty() {
            self.empty_pages += 1;
            if self.empty_pages >= MAX_EMPTY_PAGES {
                self.reporter
                    .warn(format!("连续 {} 页没有新文档，结束运行", self.empty_pages));
                self.complete().await;
                return;
            }
            self.state = ScanState::AwaitingDrain;
            self.advance_page().await;
            return;
        }

        self.empty_pages = 0;
        self.state = ScanState::AwaitingDrain;
        let delivered = self.bus.controller.notify(ControllerMsg::Enqueue {
            entries: ingested.pending,
            source: self.source.clone(),
        });
        if !delivered {
            self.reporter.error("控制器不可达，条目已保存，等待恢复");
        }
    }

    /// 本页处理完：页数加一，找下一页
    async fn advance_page(&mut self) {
        let page_count = match self
            .store
            .update(|state| {
                state.page_count += 1;
                state.page_count
            })
            .await
        {
            Ok(page_count) => page_count,
            Err(e) => {
                self.reporter.error(format!("写入状态失败: {}", e));
                self.state = ScanState::Idle;
                return;
            }
        };

        let snapshot = match self.adapter.pagination_snapshot().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                let err = CaptureError::AdapterMismatch {
                    detail: e.to_string(),
                };
                self.reporter.error(format!("无法读取分页: {}", err));
                self.state = ScanState::Idle;
                return;
            }
        };

        let Some(choice) = find_next_page(&snapshot) else {
            self.complete().await;
            return;
        };

        match self.adapter.mark_control(&choice.control).await {
            Ok(true) => {}
            Ok(false) => {
                self.reporter.warn("下一页控件已消失");
                self.complete().await;
                return;
            }
            Err(e) => {
                self.reporter.warn(format!("标记下一页控件失败: {}", e));
                self.complete().await;
                return;
            }
        }

        self.reporter.info(format!(
            "📄 前往下一页 (已完成 {} 页, 方式 {:?})",
            page_count, choice.strategy
        ));
        self.state = ScanState::AwaitingNextPage;
        let delivered = self
            .bus
            .controller
            .notify(ControllerMsg::RequestNextPageNavigation {
                source: self.source.clone(),
                selector: self.adapter.marked_control_selector(),
            });
        if !delivered {
            self.reporter.error("控制器不可达，无法翻页");
            self.state = ScanState::Idle;
        }
    }

    /// 没有下一页：结束运行，完成通知只发一次
    async fn complete(&mut self) {
        self.timer = None;
        if let Err(e) = self.store.set_active(false).await {
            self.reporter.error(format!("写入状态失败: {}", e));
        }
        if self.state != ScanState::Done {
            self.state = ScanState::Done;
            self.reporter.success("🎉 所有页面处理完成");
            self.reporter.run_completed();
        }
    }
}

/// 生成条目并写入状态
///
/// 待处理条目包括本页新发现的和之前已保存但还没处理过的
async fn ingest(
    store: &StateStore,
    rule: &RowIndexRule,
    actions: &[DiscoveredAction],
) -> anyhow::Result<Ingested> {
    store
        .update(|state| {
            let page_count = state.page_count;
            let discovered: Vec<WorkItem> = actions
                .iter()
                .map(|action| {
                    let row = rule.derive(action.trigger_meta.as_deref(), action.position);
                    WorkItem::new(page_count, row, build_display_name(&action.cells))
                })
                .collect();
            let page_ids: Vec<String> = discovered.iter().map(|item| item.id.clone()).collect();
            let appended = state.append_new(discovered).len();

            let pending = state
                .pending_items()
                .into_iter()
                .filter(|item| page_ids.contains(&item.id))
                .map(WorkItem::queue_entry)
                .collect();

            Ingested {
                appended,
                pending,
                total_items: state.items.len(),
                page_count,
            }
        })
        .await
}

async fn poll_timer<F: Future + Unpin>(slot: &mut Option<F>) -> F::Output {
    match slot {
        Some(fut) => fut.await,
        None => std::future::pending().await,
    }
}
