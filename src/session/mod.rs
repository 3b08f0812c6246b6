//! 会话状态与持久化
//!
//! [`Session`] 只能整体登录或整体清空，token 与 user 永远同时存在或同时缺失。

mod manager;
mod storage;

pub use manager::SessionManager;
pub use storage::{FileTokenStorage, MemoryTokenStorage};

use crate::core::User;

/// 持久化存储中保存 token 的键
pub const TOKEN_KEY: &str = "token";
/// 持久化存储中保存用户信息的键
pub const USER_KEY: &str = "user";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    user: Option<User>,
    token: Option<String>,
}

impl Session {
    pub fn authenticated(user: User, token: impl Into<String>) -> Self {
        Self {
            user: Some(user),
            token: Some(token.into()),
        }
    }

    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }
}
