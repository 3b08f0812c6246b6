//! Excel Analytics 客户端
//!
//! - [`session`]：会话与持久化，唯一的认证状态来源
//! - [`router`]：路由表、守卫与导航历史
//! - [`api`]：带 bearer token 的 HTTP 客户端
//! - [`auth`]：登录、注册、找回与重置密码
//! - [`upload`]：拖入文件的过滤与批量上传
//! - [`analysis`]：图表配置校验与分析页数据

pub mod analysis;
pub mod api;
pub mod auth;
pub mod config;
pub mod core;
pub mod router;
pub mod session;
pub mod upload;
pub mod utils;
pub mod validation;

// 重新导出核心类型
pub use core::{
    ApiError,
    AuthService,
    FileHandle,
    FileService,
    ProgressCallback,
    Result,
    StoredFile,
    TokenStorage,
    User,
};

pub use api::ApiClient;
pub use auth::AuthContext;
pub use config::Config;
pub use router::{GuardDecision, Navigator, Route, RouteGuard};
pub use session::{FileTokenStorage, MemoryTokenStorage, Session, SessionManager};
pub use upload::{Candidate, RunOutcome, UploadEvent, UploadStatus, UploadWorkflow};
