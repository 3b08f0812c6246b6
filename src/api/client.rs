use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tokio::fs::File;
use tokio_util::io::ReaderStream;
use tracing::debug;
use url::Url;
use crate::analysis::ChartConfig;
use crate::config::Config;
use crate::core::{
    Ack,
    ApiError,
    AuthService,
    ChartData,
    Credentials,
    FileHandle,
    FileService,
    FileStructure,
    LoginResponse,
    ProgressCallback,
    RegisterRequest,
    Result,
    StoredFile,
    User,
};
use crate::session::SessionManager;
use super::progress_stream::ProgressStream;

/// 读取文件时的缓冲大小
const READ_CAPACITY: usize = 64 * 1024;

/// 后端 API 客户端
///
/// token 从 [`SessionManager`] 读取，请求头与持久化的 token 始终一致。
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: Url,
    session: SessionManager,
}

impl ApiClient {
    pub fn new(base_url: &str, session: SessionManager) -> Result<Self> {
        Self::with_client(Client::new(), base_url, session)
    }

    pub fn from_config(config: &Config, session: SessionManager) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|err| ApiError::Request(err.to_string()))?;

        Self::with_client(client, &config.api_url, session)
    }

    pub fn with_client(client: Client, base_url: &str, session: SessionManager) -> Result<Self> {
        // 末尾补 `/`，join 时才不会吞掉最后一段路径
        let mut base_url = Url::parse(base_url)?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        Ok(Self {
            client,
            base_url,
            session,
        })
    }

    pub fn session(&self) -> &SessionManager {
        &self.session
    }

    pub fn endpoint(&self, path: &str) -> Result<Url> {
        Ok(self.base_url.join(path.trim_start_matches('/'))?)
    }

    async fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match self.session.token().await {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let response = self.authorize(request).await.send().await?;
        let response = Self::check_status(response).await?;

        response.json::<T>().await.map_err(|err| ApiError::Decode(err.to_string()))
    }

    /// 确认类接口，允许空响应体
    async fn send_ack(&self, request: RequestBuilder) -> Result<Ack> {
        let response = self.authorize(request).await.send().await?;
        let body = Self::check_status(response).await?.text().await?;
        if body.trim().is_empty() {
            return Ok(Ack::default());
        }

        Ok(serde_json::from_str(&body).unwrap_or_else(|_| Ack { message: Some(body) }))
    }

    async fn check_status(response: Response) -> Result<Response> {
        let status = response.status();
        debug!(url = %response.url(), status = status.as_u16(), "Response");
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(ApiError::server_error(status.as_u16(), server_message(status.as_u16(), &body)))
    }
}

/// 取出服务端错误信息：JSON 的 message 字段、JSON 字符串或原始文本
pub(crate) fn server_message(status_code: u16, body: &str) -> String {
    let from_json = serde_json::from_str::<Value>(body).ok().and_then(|value| match value {
        Value::Object(map) => map
            .get("message")
            .or_else(|| map.get("error"))
            .and_then(Value::as_str)
            .map(String::from),
        Value::String(message) => Some(message),
        _ => None,
    });

    from_json
        .or_else(|| Some(body.trim().to_string()).filter(|text| !text.is_empty()))
        .unwrap_or_else(|| format!("Request failed with status {}", status_code))
}

#[async_trait]
impl AuthService for ApiClient {
    async fn register(&self, request: &RegisterRequest) -> Result<User> {
        let url = self.endpoint("auth/register")?;
        self.send(self.client.post(url).json(request)).await
    }

    async fn login(&self, credentials: &Credentials) -> Result<LoginResponse> {
        let url = self.endpoint("auth/login")?;
        self.send(self.client.post(url).json(credentials)).await
    }

    async fn forgot_password(&self, email: &str) -> Result<Ack> {
        let url = self.endpoint("auth/forgot-password")?;
        self.send_ack(self.client.post(url).json(&json!({ "email": email }))).await
    }

    async fn reset_password(&self, token: &str, new_password: &str) -> Result<Ack> {
        let url = self.endpoint("auth/reset-password")?;
        let body = json!({ "token": token, "password": new_password });
        self.send_ack(self.client.post(url).json(&body)).await
    }
}

#[async_trait]
impl FileService for ApiClient {
    async fn upload_file(&self, file: &FileHandle, on_progress: ProgressCallback) -> Result<StoredFile> {
        let url = self.endpoint("files/upload")?;
        debug!(name = %file.name, size = file.size, "Uploading file");

        let reader = File::open(&file.path).await?;
        let stream = ProgressStream::new(
            ReaderStream::with_capacity(reader, READ_CAPACITY),
            file.size,
            on_progress,
        );
        let part = Part::stream_with_length(reqwest::Body::wrap_stream(stream), file.size)
            .file_name(file.name.clone())
            .mime_str(&file.media_type)
            .map_err(|err| ApiError::Request(err.to_string()))?;
        let form = Form::new().part("file", part);

        self.send(self.client.post(url).multipart(form)).await
    }

    async fn get_files(&self) -> Result<Vec<StoredFile>> {
        let url = self.endpoint("files")?;
        self.send(self.client.get(url)).await
    }

    async fn get_file(&self, file_id: &str) -> Result<StoredFile> {
        let url = self.endpoint(&format!("files/{}", file_id))?;
        self.send(self.client.get(url)).await
    }

    async fn get_file_structure(&self, file_id: &str) -> Result<FileStructure> {
        let url = self.endpoint(&format!("files/{}/structure", file_id))?;
        self.send(self.client.get(url)).await
    }

    async fn generate_chart(&self, file_id: &str, config: &ChartConfig) -> Result<ChartData> {
        let url = self.endpoint(&format!("files/{}/chart", file_id))?;
        self.send(self.client.post(url).json(config)).await
    }

    async fn delete_file(&self, file_id: &str) -> Result<Ack> {
        let url = self.endpoint(&format!("files/{}", file_id))?;
        self.send_ack(self.client.delete(url)).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use super::*;
    use crate::session::MemoryTokenStorage;

    fn client(base: &str) -> ApiClient {
        let session = SessionManager::new(Arc::new(MemoryTokenStorage::new()));
        ApiClient::new(base, session).unwrap()
    }

    #[test]
    fn test_endpoint_keeps_base_path() {
        let api = client("http://localhost:5000/api");
        assert_eq!(api.endpoint("/auth/login").unwrap().as_str(), "http://localhost:5000/api/auth/login");
        assert_eq!(api.endpoint("files/42/chart").unwrap().as_str(), "http://localhost:5000/api/files/42/chart");

        let api = client("http://localhost:5000/api/");
        assert_eq!(api.endpoint("files").unwrap().as_str(), "http://localhost:5000/api/files");
    }

    #[test]
    fn test_server_message() {
        assert_eq!(server_message(400, r#"{"message":"Email already in use"}"#), "Email already in use");
        assert_eq!(server_message(400, r#""User not found""#), "User not found");
        assert_eq!(server_message(502, "Bad Gateway"), "Bad Gateway");
        assert_eq!(server_message(500, ""), "Request failed with status 500");
        assert_eq!(server_message(500, r#"{"code":1}"#), r#"{"code":1}"#);
    }

    #[tokio::test]
    async fn test_bearer_header_follows_session() {
        let api = client("http://localhost:5000/api");

        let request = api.authorize(api.client.get("http://localhost/x")).await.build().unwrap();
        assert!(request.headers().get("authorization").is_none());

        api.session().login_success(User::new("A", "a@example.com"), "tok").await.unwrap();
        let request = api.authorize(api.client.get("http://localhost/x")).await.build().unwrap();
        assert_eq!(request.headers().get("authorization").unwrap(), "Bearer tok");

        api.session().logout().await.unwrap();
        let request = api.authorize(api.client.get("http://localhost/x")).await.build().unwrap();
        assert!(request.headers().get("authorization").is_none());
    }

    #[tokio::test]
    async fn test_unreachable_server_is_network_error() {
        // 先占一个空闲端口再释放，保证没有服务在监听
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let api = client(&format!("http://127.0.0.1:{}/api", port));
        let err = api.get_files().await.unwrap_err();
        assert!(matches!(err, ApiError::Network(_)), "{:?}", err);
    }
}
