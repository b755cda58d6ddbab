//! 单条抓取流程 - 流程层
//!
//! 核心职责：定义"一个文档"的完整抓取协议
//!
//! 流程顺序：
//! 1. 点击行按钮（找不到时请扫描器代为定位并点击）
//! 2. 等待新窗口出现
//! 3. 等待新窗口加载完成，再等前端渲染
//! 4. 打印 PDF 并落盘
//! 5. 关闭新窗口

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::bus::{Endpoint, Reporter, ScannerMsg};
use crate::config::Timings;
use crate::error::CaptureError;
use crate::infrastructure::{HostAutomation, SurfaceId};
use crate::services::PdfWriter;
use crate::utils::logging::truncate_text;
use crate::workflow::ItemCtx;

/// 单条处理结果
#[derive(Debug, Clone, PartialEq)]
pub enum ItemOutcome {
    /// PDF 已保存
    Saved(PathBuf),
    /// 跳过，队列继续
    Skipped(CaptureError),
    /// 源页面丢失，整个运行终止
    Aborted(CaptureError),
}

impl ItemOutcome {
    /// 下一条开始前的等待
    ///
    /// 找不到按钮时只等一个短间隔，其他情况都等完整的条目间隔
    pub fn next_delay(&self, inter_item: Duration, not_found_retry: Duration) -> Duration {
        match self {
            ItemOutcome::Skipped(CaptureError::TargetNotFound { .. }) => not_found_retry,
            _ => inter_item,
        }
    }
}

/// 单条抓取流程
///
/// - 编排一个条目的完整协议
/// - 所有失败都在条目边界内消化
/// - 不持有队列状态
pub struct CaptureFlow {
    host: Arc<dyn HostAutomation>,
    writer: PdfWriter,
    scanner: Endpoint<ScannerMsg>,
    timings: Timings,
    reporter: Reporter,
}

impl CaptureFlow {
    pub fn new(
        host: Arc<dyn HostAutomation>,
        writer: PdfWriter,
        scanner: Endpoint<ScannerMsg>,
        timings: Timings,
        reporter: Reporter,
    ) -> Self {
        Self {
            host,
            writer,
            scanner,
            timings,
            reporter,
        }
    }

    pub async fn run(&self, ctx: &ItemCtx) -> ItemOutcome {
        if !self.host.source_alive(&ctx.source).await {
            return ItemOutcome::Aborted(CaptureError::SourceGone);
        }

        self.reporter.info(format!(
            "{}: 开始处理 {} (剩余 {})",
            ctx,
            truncate_text(&ctx.entry.file_name, 60),
            ctx.remaining
        ));

        match self.capture(ctx).await {
            Ok(path) => {
                self.reporter
                    .success(format!("{}: 已保存 {}", ctx, path.display()));
                ItemOutcome::Saved(path)
            }
            Err(e) if e.is_run_fatal() => {
                self.reporter.error(format!("{}: {}，运行终止", ctx, e));
                ItemOutcome::Aborted(e)
            }
            Err(e) => {
                self.reporter.warn(format!("{}: 跳过 - {}", ctx, e));
                ItemOutcome::Skipped(e)
            }
        }
    }

    async fn capture(&self, ctx: &ItemCtx) -> Result<PathBuf, CaptureError> {
        self.host.begin_surface_watch().await;
        self.trigger(ctx).await?;

        let waited = self.timings.surface_wait();
        let surface = self
            .host
            .wait_for_new_surface(waited)
            .await
            .map_err(unexpected)?
            .ok_or(CaptureError::SurfaceTimeout { waited })?;
        debug!("{}: 新窗口 {}", ctx, surface);

        let result = self.capture_surface(ctx, &surface).await;

        // 关闭失败不影响结果
        if let Err(e) = self.host.close_surface(&surface).await {
            debug!("{}: 关闭窗口失败: {}", ctx, e);
        }
        result
    }

    async fn trigger(&self, ctx: &ItemCtx) -> Result<(), CaptureError> {
        let row = ctx.entry.row_index;
        match self.host.click(&ctx.source, &ctx.selector).await {
            Ok(true) => return Ok(()),
            Ok(false) => debug!("{}: 选择器未命中，请扫描器定位", ctx),
            Err(e) => {
                if !self.host.source_alive(&ctx.source).await {
                    return Err(CaptureError::SourceGone);
                }
                debug!("{}: 点击失败 ({})，请扫描器定位", ctx, e);
            }
        }

        let ack = self
            .scanner
            .request(
                |reply| ScannerMsg::TriggerRowAction {
                    row_index: row,
                    perform_click: true,
                    reply,
                },
                self.timings.request_ack(),
            )
            .await;
        match ack {
            Ok(ack) if ack.found => Ok(()),
            Ok(_) => Err(CaptureError::TargetNotFound { row: row + 1 }),
            Err(e) => {
                debug!("{}: 扫描器未应答: {}", ctx, e);
                Err(CaptureError::TargetNotFound { row: row + 1 })
            }
        }
    }

    async fn capture_surface(
        &self,
        ctx: &ItemCtx,
        surface: &SurfaceId,
    ) -> Result<PathBuf, CaptureError> {
        let waited = self.timings.load_wait();
        let ready = self
            .host
            .wait_for_surface_ready(surface, waited)
            .await
            .map_err(unexpected)?;
        if !ready {
            return Err(CaptureError::LoadTimeout { waited });
        }

        tokio::time::sleep(self.timings.render_settle()).await;

        let bytes = self
            .host
            .print_to_pdf(surface)
            .await
            .map_err(unexpected)?
            .filter(|bytes| !bytes.is_empty())
            .ok_or(CaptureError::CaptureEmpty)?;
        debug!("{}: PDF {} 字节", ctx, bytes.len());

        self.writer
            .write(&ctx.entry.file_name, &bytes)
            .map_err(unexpected)
    }
}

fn unexpected(e: anyhow::Error) -> CaptureError {
    CaptureError::Unexpected {
        detail: e.to_string(),
    }
}
