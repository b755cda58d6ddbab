//! ASP.NET 网格列表页的适配器
//!
//! 文档按钮形如 `<input value="IndexII" onclick="__doPostBack('RegistrationGrid','indexII$3')">`，
//! 分页是 `Page$N` 回发链接，当前页显示为分页行里的 `<span>`。

use anyhow::Result;
use async_trait::async_trait;
use tracing::debug;

use crate::infrastructure::JsExecutor;
use crate::models::RowIndexRule;
use crate::services::page_adapter::{
    DiscoveredAction, PageAdapter, PagerLink, PaginationSnapshot,
};

pub const DEFAULT_GRID_ID: &str = "RegistrationGrid";

const NEXT_PAGE_MARK: &str = "next-page-btn";

pub struct GridPageAdapter {
    executor: JsExecutor,
    rule: RowIndexRule,
    action_selector: String,
    row_key_template: String,
    grid_id: String,
}

impl GridPageAdapter {
    pub fn new(
        executor: JsExecutor,
        rule: RowIndexRule,
        action_selector: impl Into<String>,
        row_key_template: impl Into<String>,
    ) -> Self {
        Self {
            executor,
            rule,
            action_selector: action_selector.into(),
            row_key_template: row_key_template.into(),
            grid_id: DEFAULT_GRID_ID.to_string(),
        }
    }

    pub fn rule(&self) -> &RowIndexRule {
        &self.rule
    }

    /// 触发元数据中代表某一行的关键字，例如 `indexII$3`
    pub fn row_key(&self, row_index: u32) -> String {
        self.row_key_template
            .replace("{row}", &row_index.to_string())
    }
}

#[async_trait]
impl PageAdapter for GridPageAdapter {
    async fn discover_actions(&self) -> Result<Vec<DiscoveredAction>> {
        let actions: Vec<DiscoveredAction> = self
            .executor
            .eval_as(discover_script(&self.action_selector)?)
            .await?;
        debug!("发现 {} 个文档按钮", actions.len());
        Ok(actions)
    }

    async fn locate_row_action(&self, row_index: u32, perform_click: bool) -> Result<bool> {
        let script = locate_script(&self.row_key(row_index), perform_click)?;
        let found: bool = self.executor.eval_as(script).await?;
        Ok(found)
    }

    async fn pagination_snapshot(&self) -> Result<PaginationSnapshot> {
        let snapshot: PaginationSnapshot = self
            .executor
            .eval_as(snapshot_script(&self.grid_id)?)
            .await?;
        debug!(
            "分页快照: {} 个页码链接, 当前页 {:?}",
            snapshot.page_links.len(),
            snapshot.current_page
        );
        Ok(snapshot)
    }

    async fn mark_control(&self, control: &PagerLink) -> Result<bool> {
        let marked: bool = self.executor.eval_as(mark_script(&control.key)?).await?;
        Ok(marked)
    }

    fn row_action_selector(&self, row_index: u32) -> String {
        exact_key_selector(&self.row_key(row_index))
    }

    fn marked_control_selector(&self) -> String {
        format!(r#"[data-scraper-id="{}"]"#, NEXT_PAGE_MARK)
    }
}

/// 关键字后必须紧跟引号，`indexII$1` 不会命中 `indexII$10`
fn exact_key_selector(key: &str) -> String {
    format!(r#"[onclick*="{key}'"], [onclick*='{key}"']"#)
}

// ========== 脚本 ==========

fn discover_script(action_selector: &str) -> Result<String> {
    Ok(format!(
        r#"
        (() => {{
            const links = Array.from(document.querySelectorAll({}));
            return links.map((link, position) => {{
                link.style.border = '3px solid #6366f1';
                link.style.boxShadow = '0 0 10px rgba(99, 102, 241, 0.5)';
                const row = link.closest('tr');
                const cells = row
                    ? Array.from(row.cells).map(c => (c.innerText || '').trim())
                    : [];
                return {{
                    position,
                    triggerMeta: link.getAttribute('onclick') || link.getAttribute('href'),
                    cells
                }};
            }});
        }})()
        "#,
        serde_json::to_string(action_selector)?
    ))
}

fn locate_script(row_key: &str, perform_click: bool) -> Result<String> {
    Ok(format!(
        r#"
        (() => {{
            const key = {key};
            const boundary = new RegExp(key.replace(/[.*+?^${{}}()|[\]\\]/g, '\\$&') + '(?!\\d)');
            document.querySelectorAll('[data-target-active]').forEach(el => {{
                el.removeAttribute('data-target-active');
                el.style.border = '';
                el.style.backgroundColor = '';
            }});
            const meta = (el) => el.getAttribute('onclick') || el.getAttribute('href') || '';
            let btn = Array.from(document.querySelectorAll('[onclick*="' + key + '"]'))
                .find(el => boundary.test(meta(el)));
            if (!btn) {{
                btn = Array.from(document.querySelectorAll("input[type='button'], input.Button, a"))
                    .find(el => boundary.test(meta(el)));
            }}
            if (!btn) return false;
            btn.style.border = '2px solid #6366f1';
            btn.scrollIntoView({{ behavior: 'smooth', block: 'center' }});
            btn.setAttribute('data-target-active', 'true');
            if ({click}) {{
                setTimeout(() => btn.click(), 500);
            }}
            return true;
        }})()
        "#,
        key = serde_json::to_string(row_key)?,
        click = perform_click
    ))
}

fn snapshot_script(grid_id: &str) -> Result<String> {
    Ok(format!(
        r#"
        (() => {{
            document.querySelectorAll('[data-harvester-key]')
                .forEach(el => el.removeAttribute('data-harvester-key'));
            const all = Array.from(document.getElementsByTagName('*'));
            let seq = 0;
            const tag = (el) => {{
                let key = el.getAttribute('data-harvester-key');
                if (!key) {{
                    key = 'pg' + (seq++);
                    el.setAttribute('data-harvester-key', key);
                }}
                return key;
            }};
            const text = (el) => (el.innerText || el.textContent || el.value || '').trim();
            const describe = (el) => ({{
                key: tag(el),
                domOrder: all.indexOf(el),
                text: text(el),
                target: el.getAttribute('href') || el.getAttribute('onclick') || ''
            }});

            const pageLinks = Array.from(
                document.querySelectorAll("a[href*='Page$'], a[onclick*='Page$']")
            ).map(describe);

            let indicator = null;
            const grid = document.getElementById({grid});
            if (grid) {{
                const pagerRow = grid.querySelector('tr:last-child');
                if (pagerRow) indicator = pagerRow.querySelector('span, b');
                if (!indicator) {{
                    const pagerSelectors = [
                        "tr[style*='background-color:#CCCCCC'] table",
                        "tr[style*='background-color:Silver'] table",
                        "tr[style*='background-color: #CCCCCC'] table",
                        "tr.GridPager table",
                        "tr td[colspan] table"
                    ];
                    for (const sel of pagerSelectors) {{
                        const table = grid.querySelector(sel);
                        const span = table ? table.querySelector('span') : null;
                        if (span) {{ indicator = span; break; }}
                    }}
                }}
            }}
            let currentPage = null;
            let currentDomOrder = null;
            if (indicator) {{
                const parsed = parseInt(text(indicator), 10);
                if (!isNaN(parsed)) {{
                    currentPage = parsed;
                    currentDomOrder = all.indexOf(indicator);
                }}
            }}

            const genericTexts = ['next', '>>', 'next page', '›', '»'];
            const genericControls = Array.from(
                document.querySelectorAll('a, button, input[type="button"]')
            ).filter(el => genericTexts.includes(text(el).toLowerCase())).map(describe);

            const attr = document.querySelector(
                "[id*='btnNext'], .next, .PagerNext, [id*='lnkNext']"
            );

            return {{
                pageLinks,
                currentPage,
                currentDomOrder,
                genericControls,
                attributeHit: attr ? describe(attr) : null
            }};
        }})()
        "#,
        grid = serde_json::to_string(grid_id)?
    ))
}

fn mark_script(key: &str) -> Result<String> {
    Ok(format!(
        r#"
        (() => {{
            document.querySelectorAll('[data-scraper-id={mark}]')
                .forEach(el => el.removeAttribute('data-scraper-id'));
            const el = document.querySelector('[data-harvester-key=' + JSON.stringify({key}) + ']');
            if (!el) return false;
            el.setAttribute('data-scraper-id', {mark});
            return true;
        }})()
        "#,
        mark = serde_json::to_string(NEXT_PAGE_MARK)?,
        key = serde_json::to_string(key)?
    ))
}
