//! 路由表、路由守卫与导航历史

mod guard;
mod navigator;

pub use guard::{GuardDecision, RouteGuard};
pub use navigator::{NavigationMode, Navigator};

use std::fmt;
use url::Url;

const BASE_URL: &str = "http://app.local/";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Route {
    Login,
    Register,
    ForgotPassword,
    ResetPassword {
        token: Option<String>,
    },
    Root,
    Dashboard,
    AnalyticsHub,
    Upload,
    Analysis {
        file_id: Option<String>,
    },
    Reports,
    Insights,
    Activity,
    NotFound(String),
}

impl Route {
    /// 解析路径，例如 `/analysis/42` 或 `/reset-password?token=abc`
    pub fn parse(path: &str) -> Route {
        let url = match Url::parse(BASE_URL).and_then(|base| base.join(path)) {
            Ok(url) => url,
            Err(_) => return Route::NotFound(path.to_string()),
        };

        let segments: Vec<&str> = url
            .path_segments()
            .map(|segments| segments.filter(|s| !s.is_empty()).collect())
            .unwrap_or_default();

        match segments.as_slice() {
            [] => Route::Root,
            ["login"] => Route::Login,
            ["register"] => Route::Register,
            ["forgot-password"] => Route::ForgotPassword,
            ["reset-password"] => {
                let token = url
                    .query_pairs()
                    .find(|(key, _)| key == "token")
                    .map(|(_, value)| value.into_owned())
                    .filter(|value| !value.is_empty());
                Route::ResetPassword { token }
            }
            ["dashboard"] => Route::Dashboard,
            ["analytics-hub"] => Route::AnalyticsHub,
            ["upload"] => Route::Upload,
            ["analysis"] => Route::Analysis { file_id: None },
            ["analysis", file_id] => Route::Analysis {
                file_id: Some(file_id.to_string()),
            },
            ["reports"] => Route::Reports,
            ["insights"] => Route::Insights,
            ["activity"] => Route::Activity,
            _ => Route::NotFound(url.path().to_string()),
        }
    }

    /// 需要登录才能访问
    pub fn is_protected(&self) -> bool {
        !matches!(
            self,
            Route::Login | Route::Register | Route::ForgotPassword | Route::ResetPassword { .. }
        )
    }

    /// 别名路由，总是以 replace 的方式跳转
    pub fn alias_target(&self) -> Option<Route> {
        match self {
            Route::Root => Some(Route::Dashboard),
            Route::Reports | Route::Insights | Route::Activity => Some(Route::AnalyticsHub),
            _ => None,
        }
    }

    pub fn path(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Route::Login => write!(f, "/login"),
            Route::Register => write!(f, "/register"),
            Route::ForgotPassword => write!(f, "/forgot-password"),
            Route::ResetPassword { token: Some(token) } => {
                let mut url = Url::parse(BASE_URL).map_err(|_| fmt::Error)?;
                url.set_path("/reset-password");
                url.query_pairs_mut().append_pair("token", token);
                write!(f, "{}?{}", url.path(), url.query().unwrap_or_default())
            }
            Route::ResetPassword { token: None } => write!(f, "/reset-password"),
            Route::Root => write!(f, "/"),
            Route::Dashboard => write!(f, "/dashboard"),
            Route::AnalyticsHub => write!(f, "/analytics-hub"),
            Route::Upload => write!(f, "/upload"),
            Route::Analysis { file_id: None } => write!(f, "/analysis"),
            Route::Analysis { file_id: Some(id) } => write!(f, "/analysis/{}", id),
            Route::Reports => write!(f, "/reports"),
            Route::Insights => write!(f, "/insights"),
            Route::Activity => write!(f, "/activity"),
            Route::NotFound(path) => write!(f, "{}", path),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_routes() {
        assert_eq!(Route::parse("/"), Route::Root);
        assert_eq!(Route::parse("/login"), Route::Login);
        assert_eq!(Route::parse("/dashboard/"), Route::Dashboard);
        assert_eq!(Route::parse("/analysis"), Route::Analysis { file_id: None });
        assert_eq!(
            Route::parse("/analysis/65f1c2"),
            Route::Analysis { file_id: Some("65f1c2".to_string()) }
        );
        assert_eq!(Route::parse("/nope"), Route::NotFound("/nope".to_string()));
    }

    #[test]
    fn test_reset_password_token_query() {
        assert_eq!(
            Route::parse("/reset-password?token=abc%20def"),
            Route::ResetPassword { token: Some("abc def".to_string()) }
        );
        assert_eq!(Route::parse("/reset-password"), Route::ResetPassword { token: None });
        assert_eq!(Route::parse("/reset-password?token="), Route::ResetPassword { token: None });

        let route = Route::ResetPassword { token: Some("a&b".to_string()) };
        assert_eq!(Route::parse(&route.path()), route);
    }

    #[test]
    fn test_protection_and_aliases() {
        assert!(!Route::Login.is_protected());
        assert!(!Route::ResetPassword { token: None }.is_protected());
        assert!(Route::Upload.is_protected());
        assert!(Route::NotFound("/x".to_string()).is_protected());

        assert_eq!(Route::Root.alias_target(), Some(Route::Dashboard));
        assert_eq!(Route::Insights.alias_target(), Some(Route::AnalyticsHub));
        assert_eq!(Route::Upload.alias_target(), None);
    }
}
