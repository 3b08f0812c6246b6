use std::path::PathBuf;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// 已登录用户
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct User {
    #[serde(default, alias = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    pub email: String,
}

impl User {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            email: email.into(),
        }
    }
}

/// 登录凭证
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

/// 注册请求，name 由 first/last name 拼接
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: User,
}

/// 服务端的简单确认
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Ack {
    #[serde(default)]
    pub message: Option<String>,
}

/// 服务端保存的文件记录
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredFile {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
    pub filename: String,
    #[serde(default)]
    pub size: Option<f64>,
    #[serde(default)]
    pub uploaded_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub status: Option<String>,
}

/// 列的数据类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Number,
    String,
    Date,
    Boolean,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ColumnDescriptor {
    pub id: String,
    pub label: String,
    #[serde(rename = "type")]
    pub column_type: ColumnType,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct FileStructure {
    #[serde(default)]
    pub columns: Vec<ColumnDescriptor>,
}

/// 待上传的本地文件
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct FileHandle {
    pub path: PathBuf,
    pub name: String,
    pub size: u64,
    pub media_type: String,
}

/// 图表数据，由服务端生成，客户端不解析
pub type ChartData = Value;
