use tokio::task::JoinHandle;
use tracing::{info, warn};
use crate::core::{Credentials, RegisterRequest};
use crate::router::Route;
use crate::validation::{FieldErrors, FormStatus};
use super::{
    failure_message,
    AuthContext,
    EMAIL_REQUIRED,
    INVALID_RESET_LINK,
    MIN_PASSWORD_LEN,
    PASSWORD_MISMATCH,
    PASSWORD_RESET_DONE,
    PASSWORD_TOO_SHORT,
    RESET_INSTRUCTIONS_SENT,
};

pub struct LoginView {
    ctx: AuthContext,
    pub form: Credentials,
    status: FormStatus,
}

impl LoginView {
    pub(crate) fn new(ctx: AuthContext) -> Self {
        Self {
            ctx,
            form: Credentials::default(),
            status: FormStatus::Idle,
        }
    }

    pub fn status(&self) -> &FormStatus {
        &self.status
    }

    /// 登录成功后写入会话并跳转 dashboard，返回最终路由
    pub async fn submit(&mut self) -> Option<Route> {
        self.status = FormStatus::Submitting;

        let response = match self.ctx.auth.login(&self.form).await {
            Ok(response) => response,
            Err(err) => {
                warn!("Login failed: {}", err);
                self.status = FormStatus::Error(failure_message(&err, "Login failed"));
                return None;
            }
        };

        if let Err(err) = self.ctx.session.login_success(response.user, response.token).await {
            warn!("Failed to persist session: {}", err);
            self.status = FormStatus::Error(err.to_string());
            return None;
        }

        self.status = FormStatus::Idle;
        Some(self.ctx.navigator.push(Route::Dashboard).await)
    }
}

#[derive(Debug, Clone, Default)]
pub struct RegisterForm {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
}

impl RegisterForm {
    pub fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        if self.email.trim().is_empty() {
            errors.add("email", EMAIL_REQUIRED);
        }
        if self.password != self.confirm_password {
            errors.add("confirmPassword", PASSWORD_MISMATCH);
        }
        errors.into_result()
    }

    /// 去掉 confirm，拼接姓名
    pub fn to_request(&self) -> RegisterRequest {
        RegisterRequest {
            name: format!("{} {}", self.first_name, self.last_name).trim().to_string(),
            email: self.email.trim().to_string(),
            password: self.password.clone(),
        }
    }
}

pub struct RegisterView {
    ctx: AuthContext,
    pub form: RegisterForm,
    status: FormStatus,
    field_errors: FieldErrors,
}

impl RegisterView {
    pub(crate) fn new(ctx: AuthContext) -> Self {
        Self {
            ctx,
            form: RegisterForm::default(),
            status: FormStatus::Idle,
            field_errors: FieldErrors::new(),
        }
    }

    pub fn status(&self) -> &FormStatus {
        &self.status
    }

    pub fn field_errors(&self) -> &FieldErrors {
        &self.field_errors
    }

    /// 注册成功后跳转登录页
    pub async fn submit(&mut self) -> Option<Route> {
        if let Err(errors) = self.form.validate() {
            self.status = FormStatus::Error(errors.first().unwrap_or(PASSWORD_MISMATCH).to_string());
            self.field_errors = errors;
            return None;
        }
        self.field_errors = FieldErrors::new();
        self.status = FormStatus::Submitting;

        match self.ctx.auth.register(&self.form.to_request()).await {
            Ok(user) => {
                info!(email = %user.email, "Registered");
                self.status = FormStatus::Idle;
                Some(self.ctx.navigator.push(Route::Login).await)
            }
            Err(err) => {
                warn!("Registration failed: {}", err);
                self.status = FormStatus::Error(failure_message(&err, "Registration failed"));
                None
            }
        }
    }
}

pub struct ForgotPasswordView {
    ctx: AuthContext,
    pub email: String,
    status: FormStatus,
}

impl ForgotPasswordView {
    pub(crate) fn new(ctx: AuthContext) -> Self {
        Self {
            ctx,
            email: String::new(),
            status: FormStatus::Idle,
        }
    }

    pub fn status(&self) -> &FormStatus {
        &self.status
    }

    pub async fn submit(&mut self) -> bool {
        if self.email.trim().is_empty() {
            self.status = FormStatus::Error(EMAIL_REQUIRED.to_string());
            return false;
        }
        self.status = FormStatus::Submitting;

        match self.ctx.auth.forgot_password(self.email.trim()).await {
            Ok(_) => {
                self.status = FormStatus::Success(RESET_INSTRUCTIONS_SENT.to_string());
                self.email.clear();
                true
            }
            Err(err) => {
                warn!("Forgot password request failed: {}", err);
                self.status = FormStatus::Error(failure_message(&err, "Failed to process request"));
                false
            }
        }
    }
}

pub struct ResetPasswordView {
    ctx: AuthContext,
    token: Option<String>,
    pub password: String,
    pub confirm_password: String,
    status: FormStatus,
}

impl ResetPasswordView {
    pub(crate) fn new(ctx: AuthContext, token: Option<String>) -> Self {
        let token = token.filter(|token| !token.is_empty());
        let status = match token {
            Some(_) => FormStatus::Idle,
            None => FormStatus::Error(INVALID_RESET_LINK.to_string()),
        };

        Self {
            ctx,
            token,
            password: String::new(),
            confirm_password: String::new(),
            status,
        }
    }

    /// 链接里没有 token 时整个表单不可用
    pub fn is_disabled(&self) -> bool {
        self.token.is_none()
    }

    pub fn status(&self) -> &FormStatus {
        &self.status
    }

    fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        if self.password != self.confirm_password {
            errors.add("confirmPassword", PASSWORD_MISMATCH);
        } else if self.password.chars().count() < MIN_PASSWORD_LEN {
            errors.add("password", PASSWORD_TOO_SHORT);
        }
        errors.into_result()
    }

    /// 成功时返回延迟跳转登录页的任务
    pub async fn submit(&mut self) -> Option<JoinHandle<Route>> {
        let token = self.token.clone()?;

        if let Err(errors) = self.validate() {
            self.status = FormStatus::Error(errors.first().unwrap_or(PASSWORD_MISMATCH).to_string());
            return None;
        }
        self.status = FormStatus::Submitting;

        match self.ctx.auth.reset_password(&token, &self.password).await {
            Ok(_) => {
                self.status = FormStatus::Success(PASSWORD_RESET_DONE.to_string());
                let navigator = self.ctx.navigator.clone();
                let delay = self.ctx.reset_redirect_delay;
                Some(tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    navigator.replace(Route::Login).await
                }))
            }
            Err(err) => {
                warn!("Password reset failed: {}", err);
                self.status = FormStatus::Error(failure_message(&err, "Failed to reset password"));
                None
            }
        }
    }
}
