//! 页面适配器 - 业务能力层
//!
//! 站点相关的 DOM 查询都收敛在这里：定位文档按钮、读取分页控件

use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;

/// 页面上发现的一个"打开文档"动作
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveredAction {
    /// 在页面中的枚举位置
    pub position: usize,
    /// 触发元数据（`onclick` / `href`），可能嵌有行号
    #[serde(default)]
    pub trigger_meta: Option<String>,
    /// 同一行的单元格文本
    #[serde(default)]
    pub cells: Vec<String>,
}

/// 分页区域中的一个候选控件
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PagerLink {
    /// 快照时打在元素上的标记，用于之后重新定位
    pub key: String,
    /// 在文档中的先后顺序
    pub dom_order: usize,
    pub text: String,
    /// 回发目标（`href` / `onclick`），例如 `__doPostBack('Grid','Page$3')`
    #[serde(default)]
    pub target: String,
}

/// 分页区域快照
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PaginationSnapshot {
    /// 页码链接（含 `...`）
    pub page_links: Vec<PagerLink>,
    /// 当前页指示器上的页码
    pub current_page: Option<u32>,
    /// 当前页指示器在文档中的先后顺序
    pub current_dom_order: Option<usize>,
    /// 文本可能是"下一页"的通用控件
    pub generic_controls: Vec<PagerLink>,
    /// 按属性启发式命中的控件
    pub attribute_hit: Option<PagerLink>,
}

#[async_trait]
pub trait PageAdapter: Send + Sync {
    /// 查询当前页所有打开文档的动作
    async fn discover_actions(&self) -> Result<Vec<DiscoveredAction>>;

    /// 重新定位某一行的按钮并标记，可选地点击
    async fn locate_row_action(&self, row_index: u32, perform_click: bool) -> Result<bool>;

    /// 读取分页区域
    async fn pagination_snapshot(&self) -> Result<PaginationSnapshot>;

    /// 把选中的控件标记为下一页按钮
    async fn mark_control(&self, control: &PagerLink) -> Result<bool>;

    /// 某一行按钮的选择器，发现阶段和触发阶段共用
    fn row_action_selector(&self, row_index: u32) -> String;

    /// 已标记的下一页按钮的选择器
    fn marked_control_selector(&self) -> String;
}
