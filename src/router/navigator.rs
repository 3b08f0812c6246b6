use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};
use super::{GuardDecision, Route, RouteGuard};

/// 重定向链的最大长度
const MAX_REDIRECTS: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationMode {
    Push,
    Replace,
}

/// 导航历史，所有跳转都先经过 [`RouteGuard`]
#[derive(Clone)]
pub struct Navigator {
    guard: RouteGuard,
    history: Arc<RwLock<Vec<Route>>>,
}

impl Navigator {
    pub fn new(guard: RouteGuard) -> Self {
        Self {
            guard,
            history: Arc::new(RwLock::new(Vec::new())),
        }
    }

    pub async fn push(&self, route: Route) -> Route {
        self.navigate(route, NavigationMode::Push).await
    }

    pub async fn replace(&self, route: Route) -> Route {
        self.navigate(route, NavigationMode::Replace).await
    }

    /// 跳转并返回最终渲染的路由
    ///
    /// 第一跳按调用方的 mode 落到历史里；`replace` 的重定向替换的是
    /// 这一跳自己的记录，来源页面保持不变。
    pub async fn navigate(&self, route: Route, mode: NavigationMode) -> Route {
        let mut route = route;
        let mut mode = mode;

        for _ in 0..MAX_REDIRECTS {
            match self.guard.check(route.clone()).await {
                GuardDecision::Render(target) => {
                    self.apply(target.clone(), mode).await;
                    return target;
                }
                GuardDecision::Redirect { to, replace } => {
                    debug!(from = %route, to = %to, "Redirect");
                    if !replace {
                        // 保留被跳过的记录，新目标压在它上面
                        self.apply(route, mode).await;
                        mode = NavigationMode::Push;
                    }
                    route = to;
                }
            }
        }

        warn!(path = %route, "Too many redirects, falling back to login");
        self.apply(Route::Login, mode).await;
        Route::Login
    }

    /// 后退一步，并对新的当前路由重新执行守卫
    pub async fn back(&self) -> Option<Route> {
        let previous = {
            let mut history = self.history.write().await;
            if history.len() < 2 {
                return history.last().cloned();
            }
            history.pop();
            history.last().cloned()
        }?;

        Some(self.replace(previous).await)
    }

    pub async fn current(&self) -> Option<Route> {
        self.history.read().await.last().cloned()
    }

    pub async fn history(&self) -> Vec<Route> {
        self.history.read().await.clone()
    }

    async fn apply(&self, route: Route, mode: NavigationMode) {
        let mut history = self.history.write().await;
        match (mode, history.last_mut()) {
            (NavigationMode::Replace, Some(top)) => *top = route,
            _ => history.push(route),
        }
    }
}
