use tracing::{debug, warn};
use crate::session::SessionManager;
use super::Route;

/// 守卫的判定结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    Render(Route),
    Redirect {
        to: Route,
        replace: bool,
    },
}

/// 受保护路由的守卫，只检查 token 是否存在，不校验其真实性
#[derive(Clone)]
pub struct RouteGuard {
    session: SessionManager,
}

impl RouteGuard {
    pub fn new(session: SessionManager) -> Self {
        Self { session }
    }

    pub async fn check(&self, route: Route) -> GuardDecision {
        // 第一次判定之前必须完成会话恢复
        if let Err(err) = self.session.init().await {
            warn!("Session rehydration failed: {}", err);
        }

        if route.is_protected() && !self.session.is_authenticated().await {
            debug!(path = %route, "Unauthenticated, redirecting to login");
            return GuardDecision::Redirect {
                to: Route::Login,
                replace: true,
            };
        }

        match route.alias_target() {
            Some(to) => GuardDecision::Redirect { to, replace: true },
            None => GuardDecision::Render(route),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use super::*;
    use crate::core::{TokenStorage, User};
    use crate::session::{MemoryTokenStorage, TOKEN_KEY, USER_KEY};

    const PROTECTED: &[&str] = &[
        "/", "/dashboard", "/analytics-hub", "/upload", "/analysis", "/analysis/1",
        "/reports", "/insights", "/activity", "/somewhere-else",
    ];

    #[tokio::test]
    async fn test_protected_routes_redirect_without_token() {
        let guard = RouteGuard::new(SessionManager::new(Arc::new(MemoryTokenStorage::new())));

        for path in PROTECTED {
            assert_eq!(
                guard.check(Route::parse(path)).await,
                GuardDecision::Redirect { to: Route::Login, replace: true },
                "{}",
                path
            );
        }

        assert_eq!(guard.check(Route::Register).await, GuardDecision::Render(Route::Register));
    }

    #[tokio::test]
    async fn test_protected_routes_render_with_token() {
        let session = SessionManager::new(Arc::new(MemoryTokenStorage::new()));
        session.login_success(User::new("A", "a@example.com"), "any-token").await.unwrap();
        let guard = RouteGuard::new(session);

        assert_eq!(guard.check(Route::Upload).await, GuardDecision::Render(Route::Upload));
        assert_eq!(
            guard.check(Route::Reports).await,
            GuardDecision::Redirect { to: Route::AnalyticsHub, replace: true }
        );
    }

    #[tokio::test]
    async fn test_first_decision_sees_rehydrated_session() {
        let storage = Arc::new(MemoryTokenStorage::new());
        storage.set(TOKEN_KEY, "persisted").await.unwrap();
        storage
            .set(USER_KEY, &serde_json::to_string(&User::new("A", "a@example.com")).unwrap())
            .await
            .unwrap();

        let guard = RouteGuard::new(SessionManager::new(storage));
        assert_eq!(guard.check(Route::Dashboard).await, GuardDecision::Render(Route::Dashboard));
    }
}
