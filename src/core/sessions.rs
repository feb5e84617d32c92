//! 会话管理与持久化
//!
//! SessionManager 按 session_id 持有 `Arc<Mutex<Session>>`：同一会话的轮次串行，不同会话并发。
//! 可选的 SessionPersistence 在每轮结束后保存快照、首次访问时恢复；持久化失败只记日志，不影响本轮。

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

use crate::domain::{Session, SessionId};
use crate::memory::MemoryLimits;

/// 会话快照存储
pub trait SessionPersistence: Send + Sync {
    /// 不存在时返回 Ok(None)
    fn load(&self, id: &str) -> anyhow::Result<Option<Session>>;
    fn save(&self, session: &Session) -> anyhow::Result<()>;
    fn remove(&self, id: &str) -> anyhow::Result<()>;
}

/// 每个会话一个 JSON 文件：`<dir>/<session_id>.json`
#[derive(Debug, Clone)]
pub struct JsonFileSessionPersistence {
    dir: PathBuf,
}

impl JsonFileSessionPersistence {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    /// 字母数字与 '-' 原样保留，其余字节编码为 `_XX`（含 '_' 本身），不同 id 不会映射到同一文件
    fn path_for(&self, id: &str) -> PathBuf {
        let mut safe = String::with_capacity(id.len());
        for byte in id.bytes() {
            if byte.is_ascii_alphanumeric() || byte == b'-' {
                safe.push(byte as char);
            } else {
                safe.push_str(&format!("_{byte:02X}"));
            }
        }
        self.dir.join(format!("{safe}.json"))
    }
}

impl SessionPersistence for JsonFileSessionPersistence {
    fn load(&self, id: &str) -> anyhow::Result<Option<Session>> {
        let path = self.path_for(id);
        if !path.exists() {
            return Ok(None);
        }
        let data = std::fs::read_to_string(&path)?;
        Ok(Some(serde_json::from_str(&data)?))
    }

    fn save(&self, session: &Session) -> anyhow::Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        std::fs::write(self.path_for(session.id()), serde_json::to_string_pretty(session)?)?;
        Ok(())
    }

    fn remove(&self, id: &str) -> anyhow::Result<()> {
        let path = self.path_for(id);
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        Ok(())
    }
}

pub struct SessionManager {
    sessions: RwLock<HashMap<SessionId, Arc<Mutex<Session>>>>,
    limits: MemoryLimits,
    idle_timeout: Duration,
    persistence: Option<Arc<dyn SessionPersistence>>,
}

impl SessionManager {
    pub fn new(limits: MemoryLimits, idle_timeout_secs: u64) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            limits,
            idle_timeout: Duration::from_secs(idle_timeout_secs),
            persistence: None,
        }
    }

    pub fn with_persistence(mut self, persistence: Arc<dyn SessionPersistence>) -> Self {
        self.persistence = Some(persistence);
        self
    }

    /// 获取或创建会话；先查内存，再查持久化层，最后新建
    pub async fn get_or_create(&self, id: &str) -> Arc<Mutex<Session>> {
        if let Some(session) = self.sessions.read().await.get(id) {
            return session.clone();
        }

        let mut sessions = self.sessions.write().await;
        // 等待写锁期间可能已被其他请求创建
        if let Some(session) = sessions.get(id) {
            return session.clone();
        }
        let session = self
            .restore(id)
            .unwrap_or_else(|| Session::new(id, self.limits.clone()));
        let handle = Arc::new(Mutex::new(session));
        sessions.insert(id.to_string(), handle.clone());
        tracing::debug!(session = id, "session opened");
        handle
    }

    /// 取得会话并加锁；加锁前被空闲清理移除的旧句柄会被丢弃并重新获取
    pub async fn lock_session(&self, id: &str) -> OwnedMutexGuard<Session> {
        loop {
            let handle = self.get_or_create(id).await;
            let mut guard = handle.clone().lock_owned().await;
            if self.is_current(id, &handle).await {
                // 持锁期间 cleanup_expired 会跳过该会话
                guard.touch();
                return guard;
            }
            tracing::debug!(session = id, "session evicted before lock, reopening");
        }
    }

    async fn is_current(&self, id: &str, handle: &Arc<Mutex<Session>>) -> bool {
        self.sessions
            .read()
            .await
            .get(id)
            .is_some_and(|current| Arc::ptr_eq(current, handle))
    }

    fn restore(&self, id: &str) -> Option<Session> {
        let persistence = self.persistence.as_ref()?;
        match persistence.load(id) {
            Ok(Some(session)) => {
                tracing::info!(session = id, "session restored from snapshot");
                Some(session)
            }
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(session = id, error = %e, "failed to load session snapshot");
                None
            }
        }
    }

    /// 保存快照（调用方持有会话锁）
    pub fn persist(&self, session: &Session) {
        if let Some(persistence) = &self.persistence {
            if let Err(e) = persistence.save(session) {
                tracing::warn!(session = session.id(), error = %e, "failed to save session snapshot");
            }
        }
    }

    pub async fn get(&self, id: &str) -> Option<Arc<Mutex<Session>>> {
        self.sessions.read().await.get(id).cloned()
    }

    pub async fn remove(&self, id: &str) -> bool {
        let removed = self.sessions.write().await.remove(id).is_some();
        if let Some(persistence) = &self.persistence {
            if let Err(e) = persistence.remove(id) {
                tracing::warn!(session = id, error = %e, "failed to remove session snapshot");
            }
        }
        removed
    }

    /// 清理空闲超时的会话；正在处理请求（锁被占用）的会话跳过
    pub async fn cleanup_expired(&self) -> usize {
        let mut sessions = self.sessions.write().await;
        let expired: Vec<SessionId> = sessions
            .iter()
            .filter(|(_, s)| {
                s.try_lock()
                    .map(|s| s.is_expired(self.idle_timeout))
                    .unwrap_or(false)
            })
            .map(|(id, _)| id.clone())
            .collect();
        for id in &expired {
            sessions.remove(id);
        }
        if !expired.is_empty() {
            tracing::info!(count = expired.len(), "expired sessions evicted");
        }
        expired.len()
    }

    pub async fn active_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}
