//! 宿主自动化能力
//!
//! 点击源页面元素、感知新窗口、等待加载、打印 PDF、关闭窗口。
//! 核心流程只依赖这个 trait，具体实现见 `browser::ChromeHost`。

use std::fmt;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;

/// 源页面（列表页）的句柄
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceId(pub String);

/// 点击后新打开的文档窗口句柄
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SurfaceId(pub String);

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for SurfaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[async_trait]
pub trait HostAutomation: Send + Sync {
    /// 源页面是否仍然存在
    async fn source_alive(&self, source: &SourceId) -> bool;

    /// 在源页面（含所有同源子框架）中点击第一个匹配的元素
    ///
    /// # 返回
    /// 找到并点击返回 `true`，找不到返回 `false`
    async fn click(&self, source: &SourceId, selector: &str) -> Result<bool>;

    /// 开始观察新窗口，丢弃之前已经出现的窗口
    async fn begin_surface_watch(&self);

    /// 等待新窗口出现，超时返回 `None`
    async fn wait_for_new_surface(&self, timeout: Duration) -> Result<Option<SurfaceId>>;

    /// 等待窗口加载到真实地址（非空白页）并完成
    ///
    /// # 返回
    /// 超时返回 `false`
    async fn wait_for_surface_ready(&self, surface: &SurfaceId, timeout: Duration)
        -> Result<bool>;

    /// 把窗口打印成 PDF；没有数据时返回 `None`
    async fn print_to_pdf(&self, surface: &SurfaceId) -> Result<Option<Vec<u8>>>;

    /// 关闭窗口
    async fn close_surface(&self, surface: &SurfaceId) -> Result<()>;
}
