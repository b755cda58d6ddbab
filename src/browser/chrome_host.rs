//! 基于 chromiumoxide 的宿主自动化实现

use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::page::PrintToPdfParams;
use chromiumoxide::cdp::browser_protocol::target::EventTargetCreated;
use chromiumoxide::{Browser, Page};
use futures::StreamExt;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use crate::error::{AppError, BrowserError};
use crate::infrastructure::{HostAutomation, JsExecutor, SourceId, SurfaceId};

/// A4 纸张（英寸）
const PAPER_WIDTH_IN: f64 = 8.27;
const PAPER_HEIGHT_IN: f64 = 11.69;

pub struct ChromeHost {
    browser: Browser,
    source: JsExecutor,
    surfaces: Mutex<mpsc::UnboundedReceiver<SurfaceId>>,
    watcher: JoinHandle<()>,
    ready_poll: Duration,
}

impl ChromeHost {
    /// 创建宿主并开始监听新建的页面 target
    ///
    /// `ready_poll` 是检查新窗口加载状态的间隔
    pub async fn new(browser: Browser, source: JsExecutor, ready_poll: Duration) -> Result<Self> {
        let mut created = browser.event_listener::<EventTargetCreated>().await?;
        let source_id = source.source_id();
        let (tx, rx) = mpsc::unbounded_channel();

        let watcher = tokio::spawn(async move {
            while let Some(event) = created.next().await {
                let info = &event.target_info;
                if info.r#type != "page" {
                    continue;
                }
                let surface = SurfaceId(info.target_id.inner().clone());
                if surface.0 == source_id.0 {
                    continue;
                }
                debug!("检测到新窗口: {} | url: {}", surface, info.url);
                if tx.send(surface).is_err() {
                    break;
                }
            }
        });

        Ok(Self {
            browser,
            source,
            surfaces: Mutex::new(rx),
            watcher,
            ready_poll,
        })
    }

    pub fn source(&self) -> &JsExecutor {
        &self.source
    }

    async fn find_page(&self, target_id: &str) -> Result<Option<Page>> {
        let pages = self.browser.pages().await?;
        Ok(pages
            .into_iter()
            .find(|p| p.target_id().inner().as_str() == target_id))
    }

    async fn is_ready(page: &Page) -> bool {
        let url = match page.url().await {
            Ok(Some(url)) => url,
            Ok(None) => return false,
            Err(e) => {
                trace!("读取窗口 URL 失败: {}", e);
                return false;
            }
        };
        if !url.starts_with("http") {
            return false;
        }
        match page.evaluate("document.readyState").await {
            Ok(result) => result
                .into_value::<String>()
                .map(|state| state == "complete")
                .unwrap_or(false),
            Err(e) => {
                trace!("读取 readyState 失败: {}", e);
                false
            }
        }
    }
}

impl Drop for ChromeHost {
    fn drop(&mut self) {
        self.watcher.abort();
    }
}

#[async_trait]
impl HostAutomation for ChromeHost {
    async fn source_alive(&self, source: &SourceId) -> bool {
        match self.find_page(&source.0).await {
            Ok(page) => page.is_some(),
            Err(e) => {
                warn!("检查源页面失败: {}", e);
                false
            }
        }
    }

    async fn click(&self, source: &SourceId, selector: &str) -> Result<bool> {
        if *source != self.source.source_id() {
            return Ok(false);
        }
        let clicked: bool = self.source.eval_as(frame_click_script(selector)?).await?;
        Ok(clicked)
    }

    async fn begin_surface_watch(&self) {
        let mut rx = self.surfaces.lock().await;
        while let Ok(stale) = rx.try_recv() {
            trace!("丢弃之前出现的窗口: {}", stale);
        }
    }

    async fn wait_for_new_surface(&self, timeout: Duration) -> Result<Option<SurfaceId>> {
        let mut rx = self.surfaces.lock().await;
        match tokio::time::timeout(timeout, rx.recv()).await {
            Ok(Some(surface)) => Ok(Some(surface)),
            Ok(None) => Err(anyhow!("新窗口监听已停止")),
            Err(_) => Ok(None),
        }
    }

    async fn wait_for_surface_ready(
        &self,
        surface: &SurfaceId,
        timeout: Duration,
    ) -> Result<bool> {
        let ready = poll_until(timeout, self.ready_poll, move || async move {
            Ok(match self.find_page(&surface.0).await? {
                Some(page) => Self::is_ready(&page).await,
                None => false,
            })
        })
        .await?;
        if !ready {
            debug!("窗口 {} 在 {:?} 内未就绪", surface, timeout);
        }
        Ok(ready)
    }

    async fn print_to_pdf(&self, surface: &SurfaceId) -> Result<Option<Vec<u8>>> {
        let page = self
            .find_page(&surface.0)
            .await?
            .ok_or_else(|| anyhow!("窗口已关闭: {}", surface))?;
        let params = PrintToPdfParams {
            print_background: Some(true),
            display_header_footer: Some(false),
            paper_width: Some(PAPER_WIDTH_IN),
            paper_height: Some(PAPER_HEIGHT_IN),
            ..Default::default()
        };
        let bytes = page.pdf(params).await.map_err(|e| {
            AppError::Browser(BrowserError::PrintFailed {
                source: Box::new(e),
            })
        })?;
        Ok(if bytes.is_empty() { None } else { Some(bytes) })
    }

    async fn close_surface(&self, surface: &SurfaceId) -> Result<()> {
        if let Some(page) = self.find_page(&surface.0).await? {
            page.close().await?;
        }
        Ok(())
    }
}

/// 按间隔检查直到返回 `true`
///
/// 超时按总时长计算，单次检查卡住也算在内；超时返回 `Ok(false)`
pub async fn poll_until<F, Fut>(timeout: Duration, interval: Duration, mut check: F) -> Result<bool>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<bool>>,
{
    let polling = async {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            if check().await? {
                trace!("第 {} 次检查通过", attempt);
                return Ok::<_, anyhow::Error>(());
            }
            tokio::time::sleep(interval).await;
        }
    };
    match tokio::time::timeout(timeout, polling).await {
        Ok(result) => result.map(|()| true),
        Err(_) => Ok(false),
    }
}

/// 生成在顶层文档及所有同源子框架中查找并点击元素的脚本
pub fn frame_click_script(selector: &str) -> Result<String> {
    let selector = serde_json::to_string(selector)?;
    Ok(format!(
        r#"
        (() => {{
            const sel = {};
            const visit = (doc) => {{
                if (!doc) return false;
                const el = doc.querySelector(sel);
                if (el) {{
                    el.style.outline = '3px solid #6366f1';
                    el.scrollIntoView({{ behavior: 'smooth', block: 'center' }});
                    el.click();
                    return true;
                }}
                for (const frame of doc.querySelectorAll('iframe, frame')) {{
                    let inner = null;
                    try {{ inner = frame.contentDocument; }} catch (e) {{ inner = null; }}
                    if (visit(inner)) return true;
                }}
                return false;
            }};
            return visit(document);
        }})()
        "#,
        selector
    ))
}
