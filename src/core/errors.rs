use thiserror::Error;

/// 服务端不可达时展示给用户的通用提示
pub const NETWORK_FAILURE_MESSAGE: &str = "No response from server. Please check your connection.";

#[derive(Error, Debug)]
pub enum ApiError {
    /// 没有收到任何响应（连接失败、超时）
    #[error("Network error: {0}")]
    Network(String),

    /// 服务端拒绝了请求，message 为服务端给出的信息
    #[error("Server error: status code {status_code}, message: {message}")]
    Server {
        status_code: u16,
        message: String,
    },

    #[error("Decode error: {0}")]
    Decode(String),

    /// 请求无法构建（非法 mime、客户端配置错误等）
    #[error("Invalid request: {0}")]
    Request(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid url: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl ApiError {
    pub fn server_error(status_code: u16, message: impl Into<String>) -> Self {
        Self::Server {
            status_code,
            message: message.into(),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::Network(message.into())
    }

    /// 给用户看的错误信息：网络错误统一提示，服务端错误原样透出
    pub fn user_message(&self) -> String {
        match self {
            ApiError::Network(_) => NETWORK_FAILURE_MESSAGE.to_string(),
            ApiError::Server { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_builder() {
            ApiError::Request(err.to_string())
        } else if err.is_decode() {
            ApiError::Decode(err.to_string())
        } else if let Some(status) = err.status() {
            ApiError::server_error(status.as_u16(), format!("Request failed with status {}", status.as_u16()))
        } else {
            ApiError::Network(err.to_string())
        }
    }
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialize error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("Storage path unavailable: {0}")]
    PathUnavailable(String),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid api url: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

/// Error alias
pub type Result<T, E = ApiError> = std::result::Result<T, E>;
