//! 条目处理上下文
//!
//! 封装"我正在从哪个源页面抓第几行"这一信息

use std::fmt::Display;

use crate::infrastructure::SourceId;
use crate::models::QueueEntry;

#[derive(Debug, Clone)]
pub struct ItemCtx {
    pub entry: QueueEntry,

    /// 点击发生的源页面
    pub source: SourceId,

    /// 触发按钮的选择器
    pub selector: String,

    /// 本条之后队列里还剩多少条（仅用于日志显示）
    pub remaining: usize,
}

impl ItemCtx {
    pub fn new(entry: QueueEntry, source: SourceId, selector: String, remaining: usize) -> Self {
        Self {
            entry,
            source,
            selector,
            remaining,
        }
    }
}

impl Display for ItemCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Row {}", self.entry.display_row())
    }
}
