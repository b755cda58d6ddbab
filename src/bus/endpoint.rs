use std::sync::{Arc, Mutex};
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tracing::trace;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BusError {
    #[error("接收方 {0} 不可达")]
    Unreachable(&'static str),
    #[error("接收方 {0} 未应答就丢弃了请求")]
    NoReply(&'static str),
    #[error("等待 {0} 应答超时")]
    Timeout(&'static str),
}

/// 可挂载 / 卸载的邮箱
///
/// 接收方上下文被销毁重建时重新 `attach`，旧的接收端随之失效。
/// 发送方只持有 `Endpoint`，永远不假设接收方仍然存活。
pub struct Endpoint<T> {
    name: &'static str,
    slot: Arc<Mutex<Option<mpsc::UnboundedSender<T>>>>,
}

impl<T> Clone for Endpoint<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            slot: Arc::clone(&self.slot),
        }
    }
}

impl<T: Send + 'static> Endpoint<T> {
    /// 创建未挂载的邮箱
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            slot: Arc::new(Mutex::new(None)),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// 挂载新的接收端，替换之前的接收端
    pub fn attach(&self) -> mpsc::UnboundedReceiver<T> {
        let (tx, rx) = mpsc::unbounded_channel();
        if let Ok(mut slot) = self.slot.lock() {
            *slot = Some(tx);
        }
        rx
    }

    /// 卸载接收端，之后的消息全部丢弃
    pub fn detach(&self) {
        if let Ok(mut slot) = self.slot.lock() {
            *slot = None;
        }
    }

    pub fn is_attached(&self) -> bool {
        self.slot
            .lock()
            .map(|slot| slot.as_ref().is_some_and(|tx| !tx.is_closed()))
            .unwrap_or(false)
    }

    /// 尽力投递，不保证送达
    ///
    /// 接收方不存在或已关闭时返回 `false`，调用方不应把它当作错误
    pub fn notify(&self, msg: T) -> bool {
        let sender = match self.slot.lock() {
            Ok(slot) => slot.clone(),
            Err(_) => None,
        };
        match sender {
            Some(tx) => match tx.send(msg) {
                Ok(()) => true,
                Err(_) => {
                    trace!("{} 已关闭，消息被丢弃", self.name);
                    false
                }
            },
            None => {
                trace!("{} 未挂载，消息被丢弃", self.name);
                false
            }
        }
    }

    /// 发送请求并等待应答
    ///
    /// # 参数
    /// - `build`: 用应答通道构建消息
    /// - `timeout`: 等待应答的上限
    pub async fn request<R>(
        &self,
        build: impl FnOnce(oneshot::Sender<R>) -> T,
        timeout: Duration,
    ) -> Result<R, BusError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        if !self.notify(build(reply_tx)) {
            return Err(BusError::Unreachable(self.name));
        }
        match tokio::time::timeout(timeout, reply_rx).await {
            Ok(Ok(reply)) => Ok(reply),
            Ok(Err(_)) => Err(BusError::NoReply(self.name)),
            Err(_) => Err(BusError::Timeout(self.name)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    enum Msg {
        Ping,
        Ask(oneshot::Sender<u32>),
    }

    #[tokio::test]
    async fn test_notify_without_receiver_is_noop() {
        let endpoint: Endpoint<Msg> = Endpoint::new("nobody");
        assert!(!endpoint.is_attached());
        assert!(!endpoint.notify(Msg::Ping));
    }

    #[tokio::test]
    async fn test_reattach_replaces_receiver() {
        let endpoint: Endpoint<Msg> = Endpoint::new("scanner");
        let mut old = endpoint.attach();
        let mut new = endpoint.attach();
        assert!(endpoint.notify(Msg::Ping));
        assert!(matches!(new.recv().await, Some(Msg::Ping)));
        // 旧接收端的发送方已被替换
        assert!(old.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_notify_after_receiver_dropped() {
        let endpoint: Endpoint<Msg> = Endpoint::new("gone");
        drop(endpoint.attach());
        assert!(!endpoint.is_attached());
        assert!(!endpoint.notify(Msg::Ping));
    }

    #[tokio::test]
    async fn test_request_roundtrip() {
        let endpoint: Endpoint<Msg> = Endpoint::new("responder");
        let mut rx = endpoint.attach();
        tokio::spawn(async move {
            while let Some(msg) = rx.recv().await {
                if let Msg::Ask(reply) = msg {
                    let _ = reply.send(7);
                }
            }
        });
        let answer = endpoint
            .request(Msg::Ask, Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(answer, 7);
    }

    #[tokio::test]
    async fn test_request_errors() {
        let endpoint: Endpoint<Msg> = Endpoint::new("silent");
        assert_eq!(
            endpoint.request(Msg::Ask, Duration::from_millis(10)).await,
            Err(BusError::Unreachable("silent"))
        );

        let mut rx = endpoint.attach();
        tokio::spawn(async move {
            // 收到请求后直接丢弃应答通道
            while let Some(msg) = rx.recv().await {
                drop(msg);
            }
        });
        assert_eq!(
            endpoint.request(Msg::Ask, Duration::from_secs(1)).await,
            Err(BusError::NoReply("silent"))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_request_timeout() {
        let endpoint: Endpoint<Msg> = Endpoint::new("slow");
        let _rx = endpoint.attach();
        assert_eq!(
            endpoint.request(Msg::Ask, Duration::from_secs(5)).await,
            Err(BusError::Timeout("slow"))
        );
    }
}
