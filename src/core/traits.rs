use std::sync::Arc;
use async_trait::async_trait;
use super::errors::{Result, StorageError};
use super::types::{
    Ack,
    ChartData,
    Credentials,
    FileHandle,
    FileStructure,
    LoginResponse,
    RegisterRequest,
    StoredFile,
    User,
};
use crate::analysis::ChartConfig;

/// 上传进度回调，参数为 0..=100 的百分比
pub type ProgressCallback = Arc<dyn Fn(u8) + Send + Sync>;

/// 认证服务
#[async_trait]
pub trait AuthService: Send + Sync {
    async fn register(&self, request: &RegisterRequest) -> Result<User>;

    async fn login(&self, credentials: &Credentials) -> Result<LoginResponse>;

    async fn forgot_password(&self, email: &str) -> Result<Ack>;

    async fn reset_password(&self, token: &str, new_password: &str) -> Result<Ack>;
}

/// 文件存储服务
#[async_trait]
pub trait FileService: Send + Sync {
    /// 上传文件，上传过程中零次或多次调用 on_progress
    async fn upload_file(&self, file: &FileHandle, on_progress: ProgressCallback) -> Result<StoredFile>;

    async fn get_files(&self) -> Result<Vec<StoredFile>>;

    async fn get_file(&self, file_id: &str) -> Result<StoredFile>;

    async fn get_file_structure(&self, file_id: &str) -> Result<FileStructure>;

    async fn generate_chart(&self, file_id: &str, config: &ChartConfig) -> Result<ChartData>;

    async fn delete_file(&self, file_id: &str) -> Result<Ack>;
}

/// 持久化存储适配器，语义同浏览器的 localStorage
#[async_trait]
pub trait TokenStorage: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    async fn remove(&self, key: &str) -> Result<(), StorageError>;
}
