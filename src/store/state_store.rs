//! 运行状态持久化
//!
//! 状态以 JSON 整体写入，先写临时文件再重命名，崩溃时不会留下半截文件。
//! 读-改-写由内部互斥锁串行化。

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tempfile::NamedTempFile;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::AppError;
use crate::models::RunState;

pub struct StateStore {
    path: PathBuf,
    guard: Mutex<()>,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            guard: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 读取当前状态；文件不存在时返回初始状态
    pub async fn load(&self) -> Result<RunState> {
        let _guard = self.guard.lock().await;
        self.read().await
    }

    /// 整体写回状态
    pub async fn save(&self, state: &RunState) -> Result<()> {
        let _guard = self.guard.lock().await;
        self.write(state).await
    }

    /// 读-改-写
    ///
    /// # 返回
    /// 返回闭包的结果
    pub async fn update<R>(&self, f: impl FnOnce(&mut RunState) -> R) -> Result<R> {
        let _guard = self.guard.lock().await;
        let mut state = self.read().await?;
        let result = f(&mut state);
        self.write(&state).await?;
        Ok(result)
    }

    pub async fn set_active(&self, active: bool) -> Result<()> {
        self.update(|state| state.active = active).await
    }

    pub async fn set_delay(&self, delay_ms: u64) -> Result<()> {
        self.update(|state| state.inter_item_delay_ms = delay_ms).await
    }

    /// 清空为初始值，可重复调用
    pub async fn reset(&self) -> Result<()> {
        self.update(|state| state.reset()).await
    }

    async fn read(&self) -> Result<RunState> {
        if !fs::try_exists(&self.path).await.unwrap_or(false) {
            debug!("状态文件不存在，使用初始状态: {}", self.path.display());
            return Ok(RunState::default());
        }
        let content = fs::read_to_string(&self.path)
            .await
            .map_err(|e| AppError::file_read_failed(self.path.display().to_string(), e))?;
        if content.trim().is_empty() {
            return Ok(RunState::default());
        }
        let state = serde_json::from_str(&content)
            .map_err(|e| AppError::file_parse_failed(self.path.display().to_string(), e))?;
        Ok(state)
    }

    /// 同步文件操作放到阻塞线程池，调用方仍持有锁
    async fn write(&self, state: &RunState) -> Result<()> {
        let json = serde_json::to_vec_pretty(state)?;
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || write_atomic(&path, &json))
            .await
            .context("写入状态任务异常退出")?
    }
}

fn write_atomic(path: &Path, json: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&dir).with_context(|| format!("无法创建目录: {}", dir.display()))?;

    let mut tmp = NamedTempFile::new_in(&dir)
        .with_context(|| format!("无法创建临时文件: {}", dir.display()))?;
    tmp.write_all(json)?;
    tmp.flush()?;
    tmp.persist(path)
        .map_err(|e| AppError::file_write_failed(path.display().to_string(), e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::WorkItem;
    use tokio_test::assert_ok;

    fn store_in(dir: &tempfile::TempDir) -> StateStore {
        StateStore::new(dir.path().join("state.json"))
    }

    #[tokio::test]
    async fn test_missing_file_loads_initial_state() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        let state = assert_ok!(store.load().await);
        assert_eq!(state, RunState::default());
    }

    #[tokio::test]
    async fn test_update_persists_whole_record() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        store
            .update(|s| {
                s.active = true;
                s.append_new(vec![WorkItem::new(0, 1, "A".into())]);
            })
            .await
            .unwrap();

        // 新实例模拟上下文重建后重新读取
        let reopened = store_in(&dir);
        let state = reopened.load().await.unwrap();
        assert!(state.active);
        assert_eq!(state.items.len(), 1);
        assert_eq!(state.items[0].id, "btn_p0_i1");
    }

    #[tokio::test]
    async fn test_reset_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        store.set_delay(6000).await.unwrap();
        store.set_active(true).await.unwrap();
        assert_ok!(store.reset().await);
        let first = store.load().await.unwrap();
        assert_ok!(store.reset().await);
        let second = store.load().await.unwrap();
        assert_eq!(first, second);
        assert!(!second.active);
        assert_eq!(second.inter_item_delay_ms, 6000);
    }

    #[tokio::test]
    async fn test_corrupt_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        std::fs::write(store.path(), "{not json").unwrap();
        let err = store.load().await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<AppError>(),
            Some(AppError::File(crate::error::FileError::ParseFailed { .. }))
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_updates_are_not_lost() {
        let dir = tempfile::tempdir().unwrap();
        let store = std::sync::Arc::new(store_in(&dir));

        let tasks: Vec<_> = (0..20)
            .map(|i| {
                let store = std::sync::Arc::clone(&store);
                tokio::spawn(async move {
                    store
                        .update(move |s| {
                            s.attempted.insert(format!("btn_p0_i{}", i));
                        })
                        .await
                })
            })
            .collect();
        for task in tasks {
            assert_ok!(task.await.unwrap());
        }

        let state = store_in(&dir).load().await.unwrap();
        assert_eq!(state.attempted.len(), 20);
    }
}
