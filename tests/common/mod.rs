//! 测试用的模拟站点：一个分页列表 + 点击后弹出的文档窗口
#![allow(dead_code)]

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use tokio::time::Instant;

use listing_pdf_harvester::config::Timings;
use listing_pdf_harvester::models::RowIndexRule;
use listing_pdf_harvester::orchestrator::{launch, Components, RunHandles};
use listing_pdf_harvester::services::{DiscoveredAction, PagerLink, PaginationSnapshot};
use listing_pdf_harvester::{HostAutomation, PageAdapter, PdfWriter, SourceId, StateStore, SurfaceId};

pub const SOURCE: &str = "listing-page";
pub const NEXT_SELECTOR: &str = "#next";

#[derive(Default)]
pub struct SiteState {
    /// 每页的行号
    pub pages: Vec<Vec<u32>>,
    pub current: usize,
    pub source_alive: bool,
    /// 选择器点不到，只能由扫描器定位
    pub hidden_from_click: BTreeSet<u32>,
    /// 哪里都找不到
    pub missing: BTreeSet<u32>,
    /// 点击后不弹窗
    pub silent: BTreeSet<u32>,
    pub never_ready: BTreeSet<u32>,
    pub empty_print: BTreeSet<u32>,
    /// 第 N 次点击行按钮后源页面关闭
    pub kill_source_after: Option<usize>,
    /// 读取分页信息时源页面关闭（翻页点击之前）
    pub kill_source_on_snapshot: bool,

    pub pending_surface: Option<SurfaceId>,
    pub surfaces: HashMap<String, u32>,
    pub next_surface: u32,
    pub clicks: Vec<(Instant, String)>,
    pub closed: Vec<String>,
    pub marked: Vec<String>,
    pub discover_calls: usize,
    pub active_waits: usize,
    pub max_active_waits: usize,
}

pub struct MockSite {
    pub state: Mutex<SiteState>,
}

impl MockSite {
    pub fn new(pages: Vec<Vec<u32>>) -> Arc<Self> {
        Self::with(pages, |_| {})
    }

    pub fn with(pages: Vec<Vec<u32>>, tweak: impl FnOnce(&mut SiteState)) -> Arc<Self> {
        let mut state = SiteState {
            pages,
            source_alive: true,
            ..SiteState::default()
        };
        tweak(&mut state);
        Arc::new(Self {
            state: Mutex::new(state),
        })
    }

    pub fn clicks(&self) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .clicks
            .iter()
            .map(|(_, c)| c.clone())
            .collect()
    }

    pub fn click_times(&self) -> Vec<(Instant, String)> {
        self.state.lock().unwrap().clicks.clone()
    }

    pub fn max_active_waits(&self) -> usize {
        self.state.lock().unwrap().max_active_waits
    }

    pub fn discover_calls(&self) -> usize {
        self.state.lock().unwrap().discover_calls
    }

    fn on_current_page(state: &SiteState, row: u32) -> bool {
        state
            .pages
            .get(state.current)
            .is_some_and(|rows| rows.contains(&row))
    }

    fn open_surface(state: &mut SiteState, row: u32) {
        if state.silent.contains(&row) {
            return;
        }
        let id = format!("surface-{}", state.next_surface);
        state.next_surface += 1;
        state.surfaces.insert(id.clone(), row);
        state.pending_surface = Some(SurfaceId(id));
    }

    fn enter_wait(&self) {
        let mut state = self.state.lock().unwrap();
        state.active_waits += 1;
        state.max_active_waits = state.max_active_waits.max(state.active_waits);
    }

    fn leave_wait(&self) {
        self.state.lock().unwrap().active_waits -= 1;
    }

    fn surface_row(&self, surface: &SurfaceId) -> Result<u32> {
        self.state
            .lock()
            .unwrap()
            .surfaces
            .get(&surface.0)
            .copied()
            .ok_or_else(|| anyhow!("unknown surface {}", surface))
    }
}

pub struct MockHost(pub Arc<MockSite>);

#[async_trait]
impl HostAutomation for MockHost {
    async fn source_alive(&self, _source: &SourceId) -> bool {
        self.0.state.lock().unwrap().source_alive
    }

    async fn click(&self, _source: &SourceId, selector: &str) -> Result<bool> {
        let mut state = self.0.state.lock().unwrap();
        if !state.source_alive {
            return Err(anyhow!("target closed"));
        }
        state.clicks.push((Instant::now(), selector.to_string()));

        if selector == NEXT_SELECTOR {
            if state.current + 1 < state.pages.len() {
                state.current += 1;
            }
            return Ok(true);
        }

        let row: u32 = selector
            .strip_prefix("#row-")
            .and_then(|r| r.parse().ok())
            .ok_or_else(|| anyhow!("bad selector {}", selector))?;

        let row_clicks = state
            .clicks
            .iter()
            .filter(|(_, c)| c.starts_with("#row-"))
            .count();
        if state.kill_source_after == Some(row_clicks) {
            state.source_alive = false;
        }

        if state.hidden_from_click.contains(&row)
            || state.missing.contains(&row)
            || !MockSite::on_current_page(&state, row)
        {
            return Ok(false);
        }
        MockSite::open_surface(&mut state, row);
        Ok(true)
    }

    async fn begin_surface_watch(&self) {
        self.0.state.lock().unwrap().pending_surface = None;
    }

    async fn wait_for_new_surface(&self, timeout: Duration) -> Result<Option<SurfaceId>> {
        self.0.enter_wait();
        let deadline = Instant::now() + timeout;
        let found = loop {
            if let Some(surface) = self.0.state.lock().unwrap().pending_surface.take() {
                break Some(surface);
            }
            if Instant::now() >= deadline {
                break None;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        };
        self.0.leave_wait();
        Ok(found)
    }

    async fn wait_for_surface_ready(&self, surface: &SurfaceId, timeout: Duration) -> Result<bool> {
        self.0.enter_wait();
        let row = self.0.surface_row(surface)?;
        let never_ready = self.0.state.lock().unwrap().never_ready.contains(&row);
        let ready = if never_ready {
            tokio::time::sleep(timeout).await;
            false
        } else {
            tokio::time::sleep(Duration::from_millis(200)).await;
            true
        };
        self.0.leave_wait();
        Ok(ready)
    }

    async fn print_to_pdf(&self, surface: &SurfaceId) -> Result<Option<Vec<u8>>> {
        let row = self.0.surface_row(surface)?;
        if self.0.state.lock().unwrap().empty_print.contains(&row) {
            return Ok(None);
        }
        Ok(Some(format!("%PDF-1.4 row {}", row).into_bytes()))
    }

    async fn close_surface(&self, surface: &SurfaceId) -> Result<()> {
        self.0.state.lock().unwrap().closed.push(surface.0.clone());
        Ok(())
    }
}

pub struct MockAdapter(pub Arc<MockSite>);

#[async_trait]
impl PageAdapter for MockAdapter {
    async fn discover_actions(&self) -> Result<Vec<DiscoveredAction>> {
        let mut state = self.0.state.lock().unwrap();
        state.discover_calls += 1;
        let page = state.current;
        let rows = state.pages.get(page).cloned().unwrap_or_default();
        Ok(rows
            .into_iter()
            .enumerate()
            .map(|(position, row)| DiscoveredAction {
                position,
                trigger_meta: Some(format!(
                    "javascript:__doPostBack('RegistrationGrid','indexII${}')",
                    row
                )),
                cells: vec![
                    format!("D{}{}", page, row),
                    "Sale Deed".to_string(),
                    format!("2024/01/0{}", row),
                ],
            })
            .collect())
    }

    async fn locate_row_action(&self, row_index: u32, perform_click: bool) -> Result<bool> {
        let mut state = self.0.state.lock().unwrap();
        if state.missing.contains(&row_index) || !MockSite::on_current_page(&state, row_index) {
            return Ok(false);
        }
        if perform_click {
            MockSite::open_surface(&mut state, row_index);
        }
        Ok(true)
    }

    async fn pagination_snapshot(&self) -> Result<PaginationSnapshot> {
        let mut state = self.0.state.lock().unwrap();
        if state.kill_source_on_snapshot {
            state.source_alive = false;
        }
        let current = state.current + 1;
        let page_links = (1..=state.pages.len())
            .filter(|n| *n != current)
            .map(|n| PagerLink {
                key: format!("pg{}", n),
                dom_order: n * 10,
                text: n.to_string(),
                target: format!("javascript:__doPostBack('RegistrationGrid','Page${}')", n),
            })
            .collect();
        Ok(PaginationSnapshot {
            page_links,
            current_page: Some(current as u32),
            current_dom_order: Some(current * 10),
            ..PaginationSnapshot::default()
        })
    }

    async fn mark_control(&self, control: &PagerLink) -> Result<bool> {
        self.0.state.lock().unwrap().marked.push(control.text.clone());
        Ok(true)
    }

    fn row_action_selector(&self, row_index: u32) -> String {
        format!("#row-{}", row_index)
    }

    fn marked_control_selector(&self) -> String {
        NEXT_SELECTOR.to_string()
    }
}

pub fn store_in(dir: &Path) -> Arc<StateStore> {
    Arc::new(StateStore::new(dir.join("state.json")))
}

pub fn output_dir(dir: &Path) -> PathBuf {
    dir.join("pdfs")
}

/// 用模拟站点启动三个组件
pub fn launch_site(site: &Arc<MockSite>, dir: &Path, store: &Arc<StateStore>) -> RunHandles {
    let components = Components {
        host: Arc::new(MockHost(Arc::clone(site))),
        adapter: Arc::new(MockAdapter(Arc::clone(site))),
        store: Arc::clone(store),
        writer: PdfWriter::new(output_dir(dir)),
        timings: Timings::default(),
        rule: RowIndexRule::default(),
        source: SourceId(SOURCE.to_string()),
        log_file: None,
    };
    launch(components, Box::new(|row| format!("#row-{}", row)))
}

/// 输出目录中的 PDF 文件名（排序后）
pub fn pdf_files(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = match std::fs::read_dir(output_dir(dir)) {
        Ok(entries) => entries
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect(),
        Err(_) => Vec::new(),
    };
    names.sort();
    names
}

/// 推进虚拟时间直到条件满足
pub async fn wait_until(mut cond: impl FnMut() -> bool) {
    for _ in 0..100_000 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition never became true");
}
