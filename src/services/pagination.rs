//! 下一页查找策略
//!
//! 目标站点不同视图下的分页标记并不一致，所以按固定顺序逐级回退：
//! 1. 页码链接，文本等于 当前页+1
//! 2. `...` 链接，回发目标编码了 `Page$<当前页+1>`
//! 3. 位于当前页指示器之后的 `...` 链接
//! 4. 通用文本（next / >> / › / »）
//! 5. 属性启发式

use super::page_adapter::{PagerLink, PaginationSnapshot};

const GENERIC_NEXT_TEXTS: &[&str] = &["next", ">>", "next page", "›", "»"];

/// 命中的策略
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextPageStrategy {
    PageNumber,
    EllipsisTarget,
    EllipsisAfterCurrent,
    GenericText,
    Attribute,
}

/// 查找结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NextPageChoice {
    pub control: PagerLink,
    pub strategy: NextPageStrategy,
    /// 期望跳转到的页码（通用文本和属性启发式无法得知）
    pub page: Option<u32>,
}

/// 从快照中选出下一页控件
pub fn find_next_page(snapshot: &PaginationSnapshot) -> Option<NextPageChoice> {
    if !snapshot.page_links.is_empty() {
        let current = snapshot.current_page.unwrap_or(1);
        let next = current + 1;

        if let Some(link) = snapshot
            .page_links
            .iter()
            .find(|l| l.text.trim().parse::<u32>().ok() == Some(next))
        {
            return Some(choice(link, NextPageStrategy::PageNumber, Some(next)));
        }

        let marker = format!("Page${}", next);
        if let Some(link) = snapshot
            .page_links
            .iter()
            .find(|l| is_ellipsis(&l.text) && encodes_page(&l.target, &marker))
        {
            return Some(choice(link, NextPageStrategy::EllipsisTarget, Some(next)));
        }

        if let Some(current_order) = snapshot.current_dom_order {
            if let Some(link) = snapshot
                .page_links
                .iter()
                .filter(|l| is_ellipsis(&l.text) && l.dom_order > current_order)
                .min_by_key(|l| l.dom_order)
            {
                return Some(choice(
                    link,
                    NextPageStrategy::EllipsisAfterCurrent,
                    Some(next),
                ));
            }
        }
    }

    if let Some(link) = snapshot.generic_controls.iter().find(|l| {
        let text = l.text.trim().to_lowercase();
        GENERIC_NEXT_TEXTS.contains(&text.as_str())
    }) {
        return Some(choice(link, NextPageStrategy::GenericText, None));
    }

    snapshot
        .attribute_hit
        .as_ref()
        .map(|link| choice(link, NextPageStrategy::Attribute, None))
}

fn choice(link: &PagerLink, strategy: NextPageStrategy, page: Option<u32>) -> NextPageChoice {
    NextPageChoice {
        control: link.clone(),
        strategy,
        page,
    }
}

fn is_ellipsis(text: &str) -> bool {
    let text = text.trim();
    text == "..." || text == "…"
}

/// `Page$3` 不能误匹配 `Page$30`
fn encodes_page(target: &str, marker: &str) -> bool {
    target.match_indices(marker).any(|(idx, _)| {
        !target[idx + marker.len()..]
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_digit())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn link(order: usize, text: &str, target: &str) -> PagerLink {
        PagerLink {
            key: format!("k{}", order),
            dom_order: order,
            text: text.to_string(),
            target: target.to_string(),
        }
    }

    fn postback(page: u32) -> String {
        format!("javascript:__doPostBack('RegistrationGrid','Page${}')", page)
    }

    #[test]
    fn test_exact_number_wins() {
        // {1,2,3,"..."}，当前第 2 页
        let snapshot = PaginationSnapshot {
            page_links: vec![
                link(0, "1", &postback(1)),
                link(2, "3", &postback(3)),
                link(3, "...", &postback(11)),
            ],
            current_page: Some(2),
            current_dom_order: Some(1),
            ..Default::default()
        };
        let next = find_next_page(&snapshot).unwrap();
        assert_eq!(next.control.text, "3");
        assert_eq!(next.strategy, NextPageStrategy::PageNumber);
        assert_eq!(next.page, Some(3));
    }

    #[test]
    fn test_ellipsis_encoding_next_page() {
        // {1,2,"...",9}，当前第 2 页且没有可见的 3
        let snapshot = PaginationSnapshot {
            page_links: vec![
                link(0, "1", &postback(1)),
                link(2, "...", &postback(3)),
                link(3, "9", &postback(9)),
            ],
            current_page: Some(2),
            current_dom_order: Some(1),
            ..Default::default()
        };
        let next = find_next_page(&snapshot).unwrap();
        assert_eq!(next.control.text, "...");
        assert!(next.control.target.contains("Page$3"));
        assert_eq!(next.strategy, NextPageStrategy::EllipsisTarget);
    }

    #[test]
    fn test_ellipsis_target_does_not_match_longer_number() {
        let snapshot = PaginationSnapshot {
            page_links: vec![link(0, "...", &postback(30))],
            current_page: Some(2),
            ..Default::default()
        };
        assert!(find_next_page(&snapshot).is_none());
    }

    #[test]
    fn test_ellipsis_after_current_indicator() {
        // 前后各有一个 ...，只取当前页之后的
        let snapshot = PaginationSnapshot {
            page_links: vec![
                link(0, "...", "javascript:void(0)"),
                link(1, "11", &postback(11)),
                link(3, "...", "javascript:void(0)"),
            ],
            current_page: Some(20),
            current_dom_order: Some(2),
            ..Default::default()
        };
        let next = find_next_page(&snapshot).unwrap();
        assert_eq!(next.control.dom_order, 3);
        assert_eq!(next.strategy, NextPageStrategy::EllipsisAfterCurrent);
    }

    #[test]
    fn test_missing_indicator_defaults_to_first_page() {
        let snapshot = PaginationSnapshot {
            page_links: vec![link(0, "2", &postback(2)), link(1, "3", &postback(3))],
            ..Default::default()
        };
        assert_eq!(find_next_page(&snapshot).unwrap().control.text, "2");
    }

    #[test]
    fn test_falls_back_to_generic_text() {
        let snapshot = PaginationSnapshot {
            page_links: vec![link(0, "1", &postback(1))],
            current_page: Some(1),
            generic_controls: vec![link(5, "Prev", ""), link(6, " Next ", "")],
            ..Default::default()
        };
        let next = find_next_page(&snapshot).unwrap();
        assert_eq!(next.control.dom_order, 6);
        assert_eq!(next.strategy, NextPageStrategy::GenericText);
        assert_eq!(next.page, None);
    }

    #[test]
    fn test_falls_back_to_attribute_then_none() {
        let snapshot = PaginationSnapshot {
            attribute_hit: Some(link(9, "", "")),
            ..Default::default()
        };
        assert_eq!(
            find_next_page(&snapshot).unwrap().strategy,
            NextPageStrategy::Attribute
        );
        assert!(find_next_page(&PaginationSnapshot::default()).is_none());
    }

    #[test]
    fn test_last_page_has_no_next() {
        let snapshot = PaginationSnapshot {
            page_links: vec![link(0, "1", &postback(1)), link(1, "2", &postback(2))],
            current_page: Some(3),
            current_dom_order: Some(2),
            ..Default::default()
        };
        assert!(find_next_page(&snapshot).is_none());
    }
}
