use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::config::AlistEndpointConfig;
use crate::errors::{StorageError, StorageResult};

use super::StorageProvider;

/// Alist answers 200 in `code` on success, regardless of the HTTP status
const ALIST_OK: i64 = 200;
const ALIST_UNAUTHORIZED: i64 = 401;

#[derive(Debug, Deserialize)]
struct AlistEnvelope<T> {
    code: i64,
    #[serde(default)]
    message: String,
    data: Option<T>,
}

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
struct LoginData {
    token: String,
}

#[derive(Debug, Serialize)]
struct FsGetRequest<'a> {
    path: &'a str,
    password: &'a str,
    page: u32,
    per_page: u32,
    refresh: bool,
}

/// Subset of the `/api/fs/get` payload
#[derive(Debug, Clone, Deserialize)]
pub struct FsObject {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub size: i64,
    #[serde(default)]
    pub is_dir: bool,
    #[serde(default)]
    pub raw_url: String,
    #[serde(default)]
    pub sign: String,
}

/// Client for one Alist server
pub struct AlistClient {
    client: Client,
    addr: String,
    username: String,
    password: String,
    static_token: Option<String>,
    session_token: RwLock<Option<String>>,
}

impl AlistClient {
    pub fn new(config: &AlistEndpointConfig, timeout: Duration) -> StorageResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| StorageError::Request {
                url: config.addr.clone(),
                message: e.to_string(),
            })?;

        Ok(Self {
            client,
            addr: config.addr.trim_end_matches('/').to_string(),
            username: config.username.clone(),
            password: config.password.clone(),
            static_token: config.token.clone().filter(|t| !t.is_empty()),
            session_token: RwLock::new(None),
        })
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Metadata of one file
    pub async fn fs_get(&self, path: &str) -> StorageResult<FsObject> {
        let body = FsGetRequest {
            path,
            password: "",
            page: 1,
            per_page: 0,
            refresh: false,
        };

        let token = self.token().await?;
        match self.post::<_, FsObject>("/api/fs/get", &body, Some(&token)).await {
            Err(StorageError::Api { code, .. })
                if code == ALIST_UNAUTHORIZED && self.static_token.is_none() =>
            {
                // Session expired; log in again once
                debug!(addr = %self.addr, "Alist session rejected, logging in again");
                *self.session_token.write().await = None;
                let token = self.token().await?;
                self.post("/api/fs/get", &body, Some(&token)).await
            }
            other => other,
        }
    }

    /// Static token when configured, else a cached session token
    async fn token(&self) -> StorageResult<String> {
        if let Some(token) = &self.static_token {
            return Ok(token.clone());
        }
        if let Some(token) = self.session_token.read().await.as_ref() {
            return Ok(token.clone());
        }

        let mut slot = self.session_token.write().await;
        if let Some(token) = slot.as_ref() {
            return Ok(token.clone());
        }

        if self.username.is_empty() {
            return Err(StorageError::Authentication {
                message: format!("no token or username configured for {}", self.addr),
            });
        }

        let login = LoginRequest {
            username: &self.username,
            password: &self.password,
        };
        let data: LoginData = self
            .post("/api/auth/login", &login, None)
            .await
            .map_err(|e| StorageError::Authentication {
                message: e.to_string(),
            })?;

        info!(addr = %self.addr, user = %self.username, "Logged in to Alist");
        *slot = Some(data.token.clone());
        Ok(data.token)
    }

    async fn post<B, T>(&self, endpoint: &str, body: &B, token: Option<&str>) -> StorageResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = format!("{}{}", self.addr, endpoint);
        let mut request = self.client.post(&url).json(body);
        if let Some(token) = token {
            request = request.header(reqwest::header::AUTHORIZATION, token);
        }

        let response = request.send().await.map_err(|e| StorageError::Request {
            url: url.clone(),
            message: e.to_string(),
        })?;
        let status = response.status();
        let envelope: AlistEnvelope<T> = response.json().await.map_err(|e| StorageError::Request {
            url: url.clone(),
            message: format!("HTTP {status}: {e}"),
        })?;

        if envelope.code != ALIST_OK {
            return Err(StorageError::Api {
                code: envelope.code,
                message: envelope.message,
            });
        }
        envelope.data.ok_or_else(|| StorageError::Api {
            code: envelope.code,
            message: format!("{endpoint} returned no data"),
        })
    }

    /// `{addr}/d{path}?sign={sign}` with every path segment percent-encoded
    fn signed_download_url(&self, path: &str, sign: &str) -> String {
        let encoded: Vec<String> = path
            .split('/')
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect();
        let mut url = format!("{}/d{}", self.addr, encoded.join("/"));
        if !sign.is_empty() {
            url.push_str("?sign=");
            url.push_str(sign);
        }
        url
    }
}

#[async_trait]
impl StorageProvider for AlistClient {
    async fn file_size(&self, path: &str) -> StorageResult<i64> {
        let object = self.fs_get(path).await?;
        debug!(addr = %self.addr, path = %path, size = object.size, "Alist file size");
        Ok(object.size)
    }

    async fn download_url(&self, path: &str) -> StorageResult<String> {
        let object = self.fs_get(path).await?;
        if object.is_dir {
            warn!(addr = %self.addr, path = %path, "Alist path is a directory");
        }
        if !object.raw_url.is_empty() {
            return Ok(object.raw_url);
        }
        Ok(self.signed_download_url(path, &object.sign))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn endpoint(addr: &str) -> AlistEndpointConfig {
        AlistEndpointConfig {
            addr: addr.to_string(),
            username: "admin".to_string(),
            password: "secret".to_string(),
            ..Default::default()
        }
    }

    async fn mount_login(server: &MockServer) {
        Mock::given(method("POST"))
            .and(path("/api/auth/login"))
            .and(body_partial_json(json!({"username": "admin", "password": "secret"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "code": 200, "message": "success", "data": {"token": "session-token"}
            })))
            .expect(1)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_login_then_fs_get() {
        let server = MockServer::start().await;
        mount_login(&server).await;
        Mock::given(method("POST"))
            .and(path("/api/fs/get"))
            .and(header("authorization", "session-token"))
            .and(body_partial_json(json!({"path": "/cloud/a.mkv"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "code": 200, "message": "success",
                "data": {"name": "a.mkv", "size": 4096, "is_dir": false, "raw_url": "", "sign": "abc"}
            })))
            .mount(&server)
            .await;

        let client = AlistClient::new(&endpoint(&server.uri()), Duration::from_secs(5)).unwrap();
        assert_eq!(client.file_size("/cloud/a.mkv").await.unwrap(), 4096);
        // Token is reused: login mock expects exactly one call
        assert_eq!(
            client.download_url("/cloud/a.mkv").await.unwrap(),
            format!("{}/d/cloud/a.mkv?sign=abc", server.uri())
        );
    }

    #[tokio::test]
    async fn test_raw_url_is_preferred() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/fs/get"))
            .and(header("authorization", "static"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "code": 200, "message": "success",
                "data": {"name": "b.mp4", "size": 1, "raw_url": "https://cdn/b.mp4", "sign": ""}
            })))
            .mount(&server)
            .await;

        let config = AlistEndpointConfig {
            addr: server.uri(),
            token: Some("static".to_string()),
            ..Default::default()
        };
        let client = AlistClient::new(&config, Duration::from_secs(5)).unwrap();
        assert_eq!(client.download_url("/b.mp4").await.unwrap(), "https://cdn/b.mp4");
    }

    #[tokio::test]
    async fn test_api_error_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/fs/get"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "code": 500, "message": "object not found", "data": null
            })))
            .mount(&server)
            .await;

        let config = AlistEndpointConfig {
            addr: server.uri(),
            token: Some("static".to_string()),
            ..Default::default()
        };
        let client = AlistClient::new(&config, Duration::from_secs(5)).unwrap();
        let err = client.file_size("/missing").await.unwrap_err();
        assert!(matches!(err, StorageError::Api { code: 500, .. }));
    }

    #[test]
    fn test_signed_url_encodes_segments() {
        let config = AlistEndpointConfig {
            addr: "http://alist:5244/".to_string(),
            token: Some("t".to_string()),
            ..Default::default()
        };
        let client = AlistClient::new(&config, Duration::from_secs(1)).unwrap();
        assert_eq!(
            client.signed_download_url("/Movies/My Film (2020).mkv", "s1"),
            "http://alist:5244/d/Movies/My%20Film%20%282020%29.mkv?sign=s1"
        );
    }
}
