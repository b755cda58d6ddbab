//! 已发现条目导出为 CSV

use std::path::Path;

use anyhow::{Context, Result};
use chrono::Local;

use crate::models::WorkItem;

pub const CSV_HEADER: [&str; 4] = ["ID", "Label", "Filename", "Discovered At"];

/// 默认导出文件名：`harvest_<YYYY-MM-DD>.csv`
pub fn default_file_name() -> String {
    format!("harvest_{}.csv", Local::now().format("%Y-%m-%d"))
}

fn quote(field: &str) -> String {
    format!("\"{}\"", field.replace('"', "\"\""))
}

pub fn to_csv_string(items: &[WorkItem]) -> String {
    let mut out = CSV_HEADER.join(",");
    out.push('\n');
    for item in items {
        let discovered_at = item.discovered_at.to_rfc3339();
        let row = [
            item.id.as_str(),
            item.display_name.as_str(),
            item.file_name.as_str(),
            discovered_at.as_str(),
        ];
        let line: Vec<String> = row.iter().map(|f| quote(f)).collect();
        out.push_str(&line.join(","));
        out.push('\n');
    }
    out
}

pub fn write_csv(path: &Path, items: &[WorkItem]) -> Result<()> {
    std::fs::write(path, to_csv_string(items))
        .with_context(|| format!("无法写入 CSV: {}", path.display()))
}
