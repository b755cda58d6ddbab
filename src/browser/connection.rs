use anyhow::Result;
use chromiumoxide::cdp::browser_protocol::target::SetDiscoverTargetsParams;
use chromiumoxide::{Browser, Page};
use futures::StreamExt;
use tokio::time::sleep;
use tracing::{debug, error, info};

use crate::error::{AppError, BrowserError};

/// 连接到已打开的浏览器并找到列表页
///
/// 列表页通常需要人工登录和搜索，所以优先按标题 / URL 在已有标签页中查找；
/// 都找不到且给出了 `target_url` 时才新建页面导航过去。
pub async fn connect_to_browser_and_page(
    port: u16,
    target_url: Option<&str>,
    target_title: Option<&str>,
) -> Result<(Browser, Page)> {
    let browser_url = format!("http://localhost:{}", port);
    info!("正在连接到浏览器: {}", browser_url);
    debug!("目标 URL: {:?}, 目标标题: {:?}", target_url, target_title);

    let (browser, mut handler) = Browser::connect(&browser_url).await.map_err(|e| {
        error!("连接浏览器失败: {}", e);
        AppError::browser_connection_failed(port, e)
    })?;
    debug!("浏览器连接成功");

    // 在后台处理浏览器事件
    tokio::spawn(async move {
        while let Some(h) = handler.next().await {
            if h.is_err() {
                break;
            }
        }
    });

    // 新窗口感知依赖 target 发现
    browser.execute(SetDiscoverTargetsParams::new(true)).await?;

    // 添加短暂延迟以等待浏览器状态同步
    sleep(tokio::time::Duration::from_millis(300)).await;

    let pages = browser.pages().await?;
    debug!("获取到 {} 个页面", pages.len());

    if let Some(title) = target_title {
        debug!("正在查找标题包含 '{}' 的页面", title);
        for p in pages.iter() {
            if let Ok(Some(page_title)) = p.get_title().await {
                debug!("检查页面标题: {}", page_title);
                if page_title.contains(title) {
                    info!("✓ 找到源页面: {}", page_title);
                    return Ok((browser, p.clone()));
                }
            }
        }
    }

    if let Some(url) = target_url {
        for p in pages.iter() {
            if let Ok(Some(page_url)) = p.url().await {
                if page_url.starts_with(url) {
                    info!("✓ 找到源页面: {}", page_url);
                    return Ok((browser, p.clone()));
                }
            }
        }

        debug!("未找到匹配的页面，创建新页面并导航到: {}", url);
        let page = browser.new_page("about:blank").await.map_err(|e| {
            error!("创建新页面失败: {}", e);
            e
        })?;
        page.goto(url).await.map_err(|e| {
            error!("导航到 {} 失败: {}", url, e);
            e
        })?;
        info!("已导航到: {}", url);
        return Ok((browser, page));
    }

    Err(AppError::Browser(BrowserError::SourcePageNotFound {
        hint: format!(
            "请设置 TARGET_TITLE 或 TARGET_URL (标题: {:?}, URL: {:?})",
            target_title, target_url
        ),
    })
    .into())
}
