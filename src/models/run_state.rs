use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::WorkItem;

/// 条目间隔的默认值（毫秒）
pub const DEFAULT_INTER_ITEM_DELAY_MS: u64 = 4000;
/// 条目间隔的下限（毫秒），保护响应缓慢的服务器
pub const MIN_INTER_ITEM_DELAY_MS: u64 = 3000;

/// 持久化的运行状态
///
/// 全进程唯一一份，扫描器上下文被销毁重建后依靠它恢复进度。
/// 每次修改都整体写回（upsert），不依赖字段级原子性：
/// - 扫描器写 `items` / `page_count`
/// - 控制器和控制面板写 `active`
/// - 控制器写 `attempted`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RunState {
    pub active: bool,
    /// 按发现顺序追加，只增不减
    pub items: Vec<WorkItem>,
    /// 已完整扫描的页数
    pub page_count: u32,
    pub inter_item_delay_ms: u64,
    /// 控制器已经开始处理过的条目 id
    pub attempted: BTreeSet<String>,
}

impl Default for RunState {
    fn default() -> Self {
        Self {
            active: false,
            items: Vec::new(),
            page_count: 0,
            inter_item_delay_ms: DEFAULT_INTER_ITEM_DELAY_MS,
            attempted: BTreeSet::new(),
        }
    }
}

impl RunState {
    pub fn contains(&self, id: &str) -> bool {
        self.items.iter().any(|item| item.id == id)
    }

    /// 追加新发现的条目，按 id 过滤已存在的条目
    ///
    /// # 返回
    /// 返回实际追加的条目
    pub fn append_new(&mut self, discovered: Vec<WorkItem>) -> Vec<WorkItem> {
        let mut appended = Vec::new();
        for item in discovered {
            if self.contains(&item.id) || appended.iter().any(|a: &WorkItem| a.id == item.id) {
                continue;
            }
            appended.push(item);
        }
        self.items.extend(appended.iter().cloned());
        appended
    }

    /// 已存储但控制器尚未处理过的条目
    pub fn pending_items(&self) -> Vec<&WorkItem> {
        self.items
            .iter()
            .filter(|item| !self.attempted.contains(&item.id))
            .collect()
    }

    /// 控制器实际使用的间隔（带下限）
    pub fn effective_delay_ms(&self) -> u64 {
        clamp_delay_ms(self.inter_item_delay_ms)
    }

    /// 清空为初始值，保留已配置的间隔
    pub fn reset(&mut self) {
        let delay = self.inter_item_delay_ms;
        *self = Self {
            inter_item_delay_ms: delay,
            ..Self::default()
        };
    }
}

/// 把配置的间隔限制在下限之上
pub fn clamp_delay_ms(configured: u64) -> u64 {
    configured.max(MIN_INTER_ITEM_DELAY_MS)
}
