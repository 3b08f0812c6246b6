//! 登录、注册、忘记密码、重置密码流程
//!
//! 每个视图持有自己的表单与 [`FormStatus`]。提交失败时停留在当前路由，
//! 表单保持可编辑；成功时通过 [`Navigator`] 跳转。

mod views;

pub use views::{ForgotPasswordView, LoginView, RegisterForm, RegisterView, ResetPasswordView};

use std::sync::Arc;
use std::time::Duration;
use crate::core::{ApiError, AuthService};
use crate::router::Navigator;
use crate::session::SessionManager;

pub const PASSWORD_MISMATCH: &str = "Passwords do not match";
pub const PASSWORD_TOO_SHORT: &str = "Password must be at least 8 characters long";
pub const EMAIL_REQUIRED: &str = "Please enter your email";
pub const INVALID_RESET_LINK: &str = "Invalid reset link. Please request a new password reset.";
pub const RESET_INSTRUCTIONS_SENT: &str = "Password reset instructions have been sent to your email.";
pub const PASSWORD_RESET_DONE: &str = "Password has been reset successfully!";

pub const MIN_PASSWORD_LEN: usize = 8;

/// 认证流程共享的依赖
#[derive(Clone)]
pub struct AuthContext {
    pub(crate) auth: Arc<dyn AuthService>,
    pub(crate) session: SessionManager,
    pub(crate) navigator: Navigator,
    pub(crate) reset_redirect_delay: Duration,
}

impl AuthContext {
    pub fn new(auth: Arc<dyn AuthService>, session: SessionManager, navigator: Navigator) -> Self {
        Self {
            auth,
            session,
            navigator,
            reset_redirect_delay: Duration::from_secs(2),
        }
    }

    pub fn with_reset_redirect_delay(mut self, delay: Duration) -> Self {
        self.reset_redirect_delay = delay;
        self
    }

    pub fn login_view(&self) -> LoginView {
        LoginView::new(self.clone())
    }

    pub fn register_view(&self) -> RegisterView {
        RegisterView::new(self.clone())
    }

    pub fn forgot_password_view(&self) -> ForgotPasswordView {
        ForgotPasswordView::new(self.clone())
    }

    pub fn reset_password_view(&self, token: Option<String>) -> ResetPasswordView {
        ResetPasswordView::new(self.clone(), token)
    }
}

/// 服务端错误原样展示，信息为空时使用各表单自己的兜底文案
pub(crate) fn failure_message(err: &ApiError, fallback: &str) -> String {
    let message = err.user_message();
    if message.trim().is_empty() {
        fallback.to_string()
    } else {
        message
    }
}
