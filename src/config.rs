use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use serde::Deserialize;
use url::Url;
use crate::core::{ConfigError, StorageError};
use crate::session::FileTokenStorage;

/// 覆盖 api_url 的环境变量
pub const API_URL_ENV: &str = "EXCEL_ANALYTICS_API_URL";

pub const DEFAULT_API_URL: &str = "http://localhost:5000/api";

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    /// 后端 API 根地址
    pub api_url: String,
    /// 持久化存储文件，缺省时放在系统数据目录下
    pub storage_path: Option<PathBuf>,
    /// HTTP 请求超时（秒）
    pub timeout_secs: u64,
    /// 同时上传的文件数，1 表示严格串行
    pub max_concurrent_uploads: usize,
    /// 重置密码成功后跳转登录页前的等待时间（毫秒）
    pub reset_redirect_delay_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            storage_path: None,
            timeout_secs: 300,
            max_concurrent_uploads: 1,
            reset_redirect_delay_ms: 2000,
        }
    }
}

impl Config {
    /// 读取配置文件，文件不存在时使用默认配置
    pub fn load_config(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
        let path = path.as_ref();
        let config = match fs::read_to_string(path) {
            Ok(content) => Config::parse(&content)?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Config::default(),
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.display().to_string(),
                    source,
                });
            }
        };

        config.override_api_url(std::env::var(API_URL_ENV).ok())
    }

    pub fn parse(content: &str) -> Result<Config, ConfigError> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// `<config dir>/excel-analytics/config.toml`，取不到系统目录时用当前目录
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .map(|dir| dir.join("excel-analytics").join("config.toml"))
            .unwrap_or_else(|| PathBuf::from("config.toml"))
    }

    fn override_api_url(mut self, api_url: Option<String>) -> Result<Config, ConfigError> {
        if let Some(api_url) = api_url.filter(|url| !url.trim().is_empty()) {
            self.api_url = api_url;
            self.validate()?;
        }
        Ok(self)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        Url::parse(&self.api_url)?;
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn reset_redirect_delay(&self) -> Duration {
        Duration::from_millis(self.reset_redirect_delay_ms)
    }

    pub fn max_concurrent_uploads(&self) -> usize {
        self.max_concurrent_uploads.max(1)
    }

    pub fn token_storage(&self) -> Result<FileTokenStorage, StorageError> {
        match &self.storage_path {
            Some(path) => Ok(FileTokenStorage::new(path)),
            None => FileTokenStorage::default_location(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_partial_config() {
        let config = Config::parse(r#"
            api_url = "https://analytics.example.com/api"
            max_concurrent_uploads = 3
        "#).unwrap();

        assert_eq!(config.api_url, "https://analytics.example.com/api");
        assert_eq!(config.max_concurrent_uploads(), 3);
        assert_eq!(config.timeout(), Duration::from_secs(300));
        assert_eq!(config.reset_redirect_delay(), Duration::from_secs(2));
    }

    #[test]
    fn test_invalid_config() {
        assert!(matches!(Config::parse("api_url = 5"), Err(ConfigError::Parse(_))));
        assert!(matches!(Config::parse(r#"api_url = "not a url""#), Err(ConfigError::InvalidUrl(_))));
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::default()
            .override_api_url(None)
            .unwrap();
        assert_eq!(config, Config::default());

        let loaded = Config::load_config(dir.path().join("absent.toml")).unwrap();
        assert_eq!(loaded.timeout_secs, 300);
    }

    #[test]
    fn test_api_url_override() {
        let config = Config::default()
            .override_api_url(Some("http://10.0.0.2:5000/api".to_string()))
            .unwrap();
        assert_eq!(config.api_url, "http://10.0.0.2:5000/api");

        assert!(Config::default().override_api_url(Some("::".to_string())).is_err());
    }

    #[test]
    fn test_zero_concurrency_means_sequential() {
        let config = Config { max_concurrent_uploads: 0, ..Config::default() };
        assert_eq!(config.max_concurrent_uploads(), 1);
    }
}
