use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 一个可发现的"打开文档"动作
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkItem {
    /// 页码 + 行号组合而成的稳定标识，一次运行内唯一
    pub id: String,
    /// 动作在当前页列表中的位置，页面重载后用它重新定位按钮
    pub row_index: u32,
    /// 已清洗的显示名称
    pub display_name: String,
    /// 保存 PDF 时使用的文件名（不含扩展名）
    pub file_name: String,
    pub discovered_at: DateTime<Utc>,
}

impl WorkItem {
    /// 创建新的工作项
    ///
    /// # 参数
    /// - `page_count`: 发现时已完成扫描的页数（从 0 开始）
    /// - `row_index`: 行号
    /// - `display_name`: 已清洗的显示名称
    pub fn new(page_count: u32, row_index: u32, display_name: String) -> Self {
        let file_name = super::file_stem(&display_name, page_count, row_index);
        Self {
            id: Self::make_id(page_count, row_index),
            row_index,
            display_name,
            file_name,
            discovered_at: Utc::now(),
        }
    }

    pub fn make_id(page_count: u32, row_index: u32) -> String {
        format!("btn_p{}_i{}", page_count, row_index)
    }

    /// 取出控制器驱动抓取所需的字段
    pub fn queue_entry(&self) -> QueueEntry {
        QueueEntry {
            id: self.id.clone(),
            row_index: self.row_index,
            file_name: self.file_name.clone(),
        }
    }
}

/// 控制器内存队列中的条目
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueEntry {
    pub id: String,
    pub row_index: u32,
    pub file_name: String,
}

impl QueueEntry {
    /// 面向用户的行号（从 1 开始）
    pub fn display_row(&self) -> u32 {
        self.row_index + 1
    }
}
