//! 文件名与行号推导
//!
//! 发现阶段和触发阶段必须用同一套规则推导行号，
//! 否则页面重载后无法重新定位到同一个按钮。

use regex::Regex;

/// 显示名称的最大长度（字符数）
pub const MAX_DISPLAY_NAME_LEN: usize = 80;

const FALLBACK_NAME: &str = "Doc";

/// 清洗显示名称，使其可以作为文件名使用
///
/// - `/\:*?"<>|` 和控制字符替换为 `_`
/// - 去掉末尾的空白和点
/// - 截断到 80 个字符
pub fn sanitize_display_name(input: &str) -> String {
    let replaced: String = input
        .chars()
        .map(|c| if is_forbidden(c) { '_' } else { c })
        .collect();

    let truncated: String = trim_tail(&replaced)
        .chars()
        .take(MAX_DISPLAY_NAME_LEN)
        .collect();

    // 截断后末尾可能又出现空白或点
    trim_tail(&truncated).to_string()
}

fn trim_tail(s: &str) -> &str {
    s.trim_end_matches(|c: char| c.is_whitespace() || c == '.')
}

fn is_forbidden(c: char) -> bool {
    matches!(c, '\\' | '/' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | '\0'..='\u{1F}')
}

/// 根据行内单元格构建显示名称
///
/// 取前三列（文档号、名称、日期）用 `_` 拼接；不足三列时返回 `Doc`
pub fn build_display_name(cells: &[String]) -> String {
    if cells.len() < 3 {
        return FALLBACK_NAME.to_string();
    }
    let joined = cells[..3]
        .iter()
        .map(|c| c.trim())
        .collect::<Vec<_>>()
        .join("_");

    let name = sanitize_display_name(&joined);
    if name.is_empty() {
        FALLBACK_NAME.to_string()
    } else {
        name
    }
}

/// 生成 PDF 文件名主干：`{显示名}_P{页}_R{行}`（页和行都从 1 开始）
pub fn file_stem(display_name: &str, page_count: u32, row_index: u32) -> String {
    format!("{}_P{}_R{}", display_name, page_count + 1, row_index + 1)
}

/// 行号推导规则
///
/// 优先使用触发元数据（例如 `onclick`）中嵌入的行号，DOM 位置可能漂移；
/// 找不到时退回到枚举顺序。
#[derive(Debug, Clone)]
pub struct RowIndexRule {
    pattern: Regex,
}

impl RowIndexRule {
    /// 默认规则，匹配 ASP.NET 网格的 `indexII$<n>` 回发参数
    pub const DEFAULT_PATTERN: &'static str = r"indexII\$(\d+)";

    pub fn new(pattern: &str) -> anyhow::Result<Self> {
        let pattern = Regex::new(pattern)?;
        if pattern.captures_len() < 2 {
            anyhow::bail!("行号规则必须包含一个捕获组: {}", pattern.as_str());
        }
        Ok(Self { pattern })
    }

    /// 推导行号
    pub fn derive(&self, trigger_meta: Option<&str>, position: usize) -> u32 {
        trigger_meta
            .and_then(|meta| self.pattern.captures(meta))
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse::<u32>().ok())
            .unwrap_or(position as u32)
    }
}

impl Default for RowIndexRule {
    fn default() -> Self {
        Self {
            pattern: Regex::new(Self::DEFAULT_PATTERN).expect("默认行号规则必须合法"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_strips_illegal_characters() {
        let out = sanitize_display_name(r#"a/b\c:d*e?f"g<h>i|j. . "#);
        for c in ['/', '\\', ':', '*', '?', '"', '<', '>', '|'] {
            assert!(!out.contains(c), "仍包含 {:?}: {}", c, out);
        }
        assert!(!out.ends_with('.'));
        assert!(!out.ends_with(' '));
        assert_eq!(out, "a_b_c_d_e_f_g_h_i_j");
    }

    #[test]
    fn test_sanitize_caps_length() {
        let long = "x".repeat(200);
        assert_eq!(sanitize_display_name(&long).chars().count(), 80);
    }

    #[test]
    fn test_sanitize_trims_after_truncation() {
        let mut input = "y".repeat(79);
        input.push('.');
        input.push_str("zzzz");
        let out = sanitize_display_name(&input);
        assert_eq!(out, "y".repeat(79));
    }

    #[test]
    fn test_build_display_name_from_cells() {
        let cells = vec![
            " 1234/2023 ".to_string(),
            "Sale Deed".to_string(),
            "01/02/2023".to_string(),
            "ignored".to_string(),
        ];
        assert_eq!(build_display_name(&cells), "1234_2023_Sale Deed_01_02_2023");
    }

    #[test]
    fn test_build_display_name_fallback() {
        assert_eq!(build_display_name(&["only".to_string()]), "Doc");
        let dotted = vec!["A".to_string(), "B".to_string(), "...".to_string()];
        assert_eq!(build_display_name(&dotted), "A_B_");
    }

    #[test]
    fn test_row_index_prefers_trigger_metadata() {
        let rule = RowIndexRule::default();
        let meta = "javascript:__doPostBack('RegistrationGrid','indexII$12')";
        assert_eq!(rule.derive(Some(meta), 0), 12);
        assert_eq!(rule.derive(Some("no index here"), 4), 4);
        assert_eq!(rule.derive(None, 5), 5);
    }

    #[test]
    fn test_custom_rule_requires_capture_group() {
        assert!(RowIndexRule::new(r"row-\d+").is_err());
        let rule = RowIndexRule::new(r"row-(\d+)").unwrap();
        assert_eq!(rule.derive(Some("open row-9"), 0), 9);
    }
}
