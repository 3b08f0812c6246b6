use std::sync::Arc;
use tokio::sync::{OnceCell, RwLock};
use tracing::{debug, info, warn};
use crate::core::{StorageError, TokenStorage, User};
use super::{Session, TOKEN_KEY, USER_KEY};

/// 会话的唯一来源
///
/// 内存中的 [`Session`] 与持久化存储只通过这里读写，两者不会出现分歧。
/// 克隆开销很小，HTTP 客户端、路由守卫共享同一个实例。
#[derive(Clone)]
pub struct SessionManager {
    storage: Arc<dyn TokenStorage>,
    state: Arc<RwLock<Session>>,
    initialized: Arc<OnceCell<()>>,
}

impl SessionManager {
    pub fn new(storage: Arc<dyn TokenStorage>) -> Self {
        Self {
            storage,
            state: Arc::new(RwLock::new(Session::default())),
            initialized: Arc::new(OnceCell::new()),
        }
    }

    /// 从持久化存储恢复会话，只执行一次
    pub async fn init(&self) -> Result<Session, StorageError> {
        self.initialized
            .get_or_try_init(|| async { self.rehydrate().await })
            .await?;

        Ok(self.current().await)
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.initialized()
    }

    async fn rehydrate(&self) -> Result<(), StorageError> {
        let token = self.storage.get(TOKEN_KEY).await?;
        let user = match self.storage.get(USER_KEY).await? {
            Some(raw) => match serde_json::from_str::<User>(&raw) {
                Ok(user) => Some(user),
                Err(err) => {
                    warn!("Discarding unreadable stored user: {}", err);
                    None
                }
            },
            None => None,
        };

        match (token, user) {
            (Some(token), Some(user)) => {
                info!(email = %user.email, "Session restored");
                *self.state.write().await = Session::authenticated(user, token);
            }
            (None, None) => {
                debug!("No stored session");
            }
            _ => {
                // 只剩一半的会话无法使用，清掉避免重启后状态不一致
                warn!("Stored session incomplete, clearing");
                self.storage.remove(TOKEN_KEY).await?;
                self.storage.remove(USER_KEY).await?;
            }
        }

        Ok(())
    }

    /// 登录成功，同时写入 user 与 token
    ///
    /// 任何一步写入失败都会清空存储与内存，不会留下新旧混合的会话。
    pub async fn login_success(&self, user: User, token: impl Into<String>) -> Result<(), StorageError> {
        let token = token.into();
        let user_json = serde_json::to_string(&user)?;
        // 等恢复结束，避免旧会话在登录之后被读回内存
        self.settle().await;

        let mut state = self.state.write().await;
        if let Err(err) = self.persist(&token, &user_json).await {
            warn!("Failed to store session, clearing: {}", err);
            if let Err(clear_err) = self.clear_storage().await {
                warn!("Failed to clear stored session: {}", clear_err);
            }
            *state = Session::default();
            return Err(err);
        }

        info!(email = %user.email, "Logged in");
        *state = Session::authenticated(user, token);

        Ok(())
    }

    /// 退出登录，同时清空内存与持久化存储
    ///
    /// 存储删除失败时内存也会清空，错误照常返回。
    pub async fn logout(&self) -> Result<(), StorageError> {
        self.settle().await;

        let mut state = self.state.write().await;
        let result = self.clear_storage().await;
        *state = Session::default();

        match &result {
            Ok(()) => info!("Logged out"),
            Err(err) => warn!("Logged out, but stored session could not be removed: {}", err),
        }
        result
    }

    async fn settle(&self) {
        if let Err(err) = self.init().await {
            warn!("Session restore failed: {}", err);
        }
        // 恢复失败也不再重试，之后的状态以这次写入为准
        let _ = self.initialized.set(());
    }

    async fn persist(&self, token: &str, user_json: &str) -> Result<(), StorageError> {
        self.storage.set(TOKEN_KEY, token).await?;
        self.storage.set(USER_KEY, user_json).await
    }

    /// 两个键都尝试删除，返回第一个错误
    async fn clear_storage(&self) -> Result<(), StorageError> {
        let token = self.storage.remove(TOKEN_KEY).await;
        let user = self.storage.remove(USER_KEY).await;
        token.and(user)
    }

    pub async fn teardown(&self) {
        debug!(authenticated = self.is_authenticated().await, "Session manager teardown");
    }

    pub async fn current(&self) -> Session {
        self.state.read().await.clone()
    }

    pub async fn token(&self) -> Option<String> {
        self.state.read().await.token().map(String::from)
    }

    pub async fn user(&self) -> Option<User> {
        self.state.read().await.user().cloned()
    }

    pub async fn is_authenticated(&self) -> bool {
        self.state.read().await.is_authenticated()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tokio::sync::Notify;
    use crate::session::MemoryTokenStorage;

    fn alice() -> User {
        User::new("Alice Doe", "alice@example.com")
    }

    #[tokio::test]
    async fn test_login_and_logout_keep_fields_together() {
        let storage = Arc::new(MemoryTokenStorage::new());
        let manager = SessionManager::new(storage.clone());
        manager.init().await.unwrap();
        assert!(!manager.is_authenticated().await);

        manager.login_success(alice(), "t-1").await.unwrap();
        let session = manager.current().await;
        assert_eq!(session.token(), Some("t-1"));
        assert_eq!(session.user(), Some(&alice()));
        assert_eq!(storage.get(TOKEN_KEY).await.unwrap().as_deref(), Some("t-1"));

        manager.logout().await.unwrap();
        let session = manager.current().await;
        assert!(session.token().is_none());
        assert!(session.user().is_none());
        assert_eq!(storage.get(TOKEN_KEY).await.unwrap(), None);
        assert_eq!(storage.get(USER_KEY).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_init_restores_stored_session() {
        let storage = Arc::new(MemoryTokenStorage::new());
        storage.set(TOKEN_KEY, "t-2").await.unwrap();
        storage.set(USER_KEY, &serde_json::to_string(&alice()).unwrap()).await.unwrap();

        let manager = SessionManager::new(storage);
        assert!(!manager.is_initialized());

        let session = manager.init().await.unwrap();
        assert!(manager.is_initialized());
        assert_eq!(session.token(), Some("t-2"));
        assert_eq!(session.user().map(|u| u.email.as_str()), Some("alice@example.com"));
    }

    #[tokio::test]
    async fn test_init_clears_token_without_user() {
        let storage = Arc::new(MemoryTokenStorage::new());
        storage.set(TOKEN_KEY, "orphan").await.unwrap();

        let manager = SessionManager::new(storage.clone());
        let session = manager.init().await.unwrap();

        assert!(!session.is_authenticated());
        assert_eq!(storage.get(TOKEN_KEY).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_init_runs_once() {
        let storage = Arc::new(MemoryTokenStorage::new());
        let manager = SessionManager::new(storage.clone());
        manager.init().await.unwrap();

        // 初始化之后直接写存储不会被再次读入
        storage.set(TOKEN_KEY, "late").await.unwrap();
        storage.set(USER_KEY, &serde_json::to_string(&alice()).unwrap()).await.unwrap();
        let session = manager.init().await.unwrap();
        assert!(!session.is_authenticated());
    }

    /// 可以让指定操作失败的存储
    #[derive(Default)]
    struct FlakyStorage {
        inner: MemoryTokenStorage,
        fail_user_set: AtomicBool,
        fail_user_remove: AtomicBool,
    }

    #[async_trait::async_trait]
    impl TokenStorage for FlakyStorage {
        async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
            self.inner.get(key).await
        }

        async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
            if key == USER_KEY && self.fail_user_set.load(Ordering::SeqCst) {
                return Err(StorageError::PathUnavailable("disk full".to_string()));
            }
            self.inner.set(key, value).await
        }

        async fn remove(&self, key: &str) -> Result<(), StorageError> {
            if key == USER_KEY && self.fail_user_remove.load(Ordering::SeqCst) {
                return Err(StorageError::PathUnavailable("disk full".to_string()));
            }
            self.inner.remove(key).await
        }
    }

    #[tokio::test]
    async fn test_failed_login_write_leaves_no_mixed_session() {
        let storage = Arc::new(FlakyStorage::default());
        let manager = SessionManager::new(storage.clone());
        manager.login_success(alice(), "token-A").await.unwrap();

        storage.fail_user_set.store(true, Ordering::SeqCst);
        let bob = User::new("Bob Roe", "bob@example.com");
        assert!(manager.login_success(bob, "token-B").await.is_err());

        assert_eq!(manager.token().await, None);
        assert_eq!(manager.user().await, None);
        assert_eq!(storage.get(TOKEN_KEY).await.unwrap(), None);
        assert_eq!(storage.get(USER_KEY).await.unwrap(), None);

        // 重启后也不会恢复出 A 的用户配 B 的 token
        let restarted = SessionManager::new(storage.clone());
        assert!(!restarted.init().await.unwrap().is_authenticated());
    }

    #[tokio::test]
    async fn test_failed_logout_still_clears_memory() {
        let storage = Arc::new(FlakyStorage::default());
        let manager = SessionManager::new(storage.clone());
        manager.login_success(alice(), "token-A").await.unwrap();

        storage.fail_user_remove.store(true, Ordering::SeqCst);
        assert!(manager.logout().await.is_err());

        assert!(!manager.is_authenticated().await);
        assert_eq!(storage.get(TOKEN_KEY).await.unwrap(), None);

        // 只剩 user 的半个会话，重启时会被清掉
        storage.fail_user_remove.store(false, Ordering::SeqCst);
        let restarted = SessionManager::new(storage.clone());
        assert!(!restarted.init().await.unwrap().is_authenticated());
        assert_eq!(storage.get(USER_KEY).await.unwrap(), None);
    }

    /// 第一次读取会卡住，直到 gate 被通知
    struct SlowStorage {
        inner: MemoryTokenStorage,
        gated: AtomicBool,
        entered: Notify,
        gate: Notify,
    }

    #[async_trait::async_trait]
    impl TokenStorage for SlowStorage {
        async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
            if self.gated.swap(false, Ordering::SeqCst) {
                self.entered.notify_one();
                self.gate.notified().await;
            }
            self.inner.get(key).await
        }

        async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
            self.inner.set(key, value).await
        }

        async fn remove(&self, key: &str) -> Result<(), StorageError> {
            self.inner.remove(key).await
        }
    }

    #[tokio::test]
    async fn test_login_during_restore_is_not_overwritten() {
        let storage = Arc::new(SlowStorage {
            inner: MemoryTokenStorage::new(),
            gated: AtomicBool::new(false),
            entered: Notify::new(),
            gate: Notify::new(),
        });
        storage.set(TOKEN_KEY, "stale").await.unwrap();
        storage.set(USER_KEY, &serde_json::to_string(&alice()).unwrap()).await.unwrap();
        storage.gated.store(true, Ordering::SeqCst);

        let manager = SessionManager::new(storage.clone());
        let restoring = {
            let manager = manager.clone();
            tokio::spawn(async move { manager.init().await })
        };
        storage.entered.notified().await;

        let login = {
            let manager = manager.clone();
            tokio::spawn(async move {
                manager.login_success(User::new("Bob Roe", "bob@example.com"), "fresh").await
            })
        };
        tokio::task::yield_now().await;
        storage.gate.notify_one();

        restoring.await.unwrap().unwrap();
        login.await.unwrap().unwrap();

        assert_eq!(manager.token().await.as_deref(), Some("fresh"));
        assert_eq!(manager.user().await.map(|u| u.email), Some("bob@example.com".to_string()));
        assert_eq!(storage.get(TOKEN_KEY).await.unwrap().as_deref(), Some("fresh"));
    }
}
