//! Thin HTTP client for the `gbox-server` control plane. Mirrors the wire
//! shapes `gbox-server`'s route handlers expose rather than depending on
//! `gbox-driver`/`gbox-service` directly, so the CLI binary stays free of
//! the container/cluster backend stacks (`bollard`/`kube`).

use std::collections::BTreeMap;
use std::io::ErrorKind;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{message}")]
    Api { status: u16, code: String, message: String },
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid host: {0}")]
    InvalidHost(String),
    #[error("server did not upgrade the connection (status {0})")]
    UpgradeRefused(u16),
}

pub type Result<T> = std::result::Result<T, ClientError>;

#[derive(Debug, Deserialize)]
struct ErrorBody {
    code: String,
    message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Mount {
    pub source: String,
    pub target: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_only: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GboxBox {
    pub id: String,
    pub image: String,
    pub status: String,
    pub labels: BTreeMap<String, String>,
    pub cmd: Option<Vec<String>>,
    pub args: Option<Vec<String>>,
    pub working_dir: Option<String>,
    pub env: Option<BTreeMap<String, String>>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CreateBoxRequest {
    pub image: String,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cmd: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub args: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<String>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    #[serde(default)]
    pub mounts: Vec<Mount>,
}

#[derive(Debug, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct DeleteAllResponse {
    pub count: usize,
    pub ids: Vec<String>,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct ActionResult {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RunRequest {
    pub cmd: Vec<String>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stdout_line_limit: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stderr_line_limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct RunResponse {
    pub exit_code: i64,
    pub stdout: String,
    pub stderr: String,
}

#[derive(Debug, Deserialize)]
pub struct PathStat {
    pub name: String,
    pub size: u64,
    pub mtime: i64,
    pub mode: u32,
    pub uid: u32,
    pub gid: u32,
}

#[derive(Debug, Deserialize)]
pub struct ReclaimResponse {
    pub stopped_ids: Vec<String>,
    pub deleted_ids: Vec<String>,
    pub stopped_count: usize,
    pub deleted_count: usize,
    pub message: String,
}

#[derive(Debug, Clone, Default)]
pub struct ListFilter {
    pub id: Option<String>,
    pub label_key: Option<String>,
    pub label_value: Option<String>,
    pub ancestor: Option<String>,
}

/// Default control-plane address; override with `GBOX_HOST` or `--host`.
pub const DEFAULT_HOST: &str = "http://127.0.0.1:28080";

pub struct Client {
    http: reqwest::Client,
    base_url: String,
}

impl Client {
    pub fn new(host: Option<String>) -> Self {
        let base_url = host
            .or_else(|| std::env::var("GBOX_HOST").ok())
            .unwrap_or_else(|| DEFAULT_HOST.to_string())
            .trim_end_matches('/')
            .to_string();
        Self { http: reqwest::Client::new(), base_url }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body: ErrorBody = response.json().await.unwrap_or(ErrorBody {
            code: "unknown".to_string(),
            message: format!("request failed with status {status}"),
        });
        Err(ClientError::Api { status: status.as_u16(), code: body.code, message: body.message })
    }

    pub async fn list_boxes(&self, filter: &ListFilter) -> Result<Vec<GboxBox>> {
        let mut query = Vec::new();
        if let Some(id) = &filter.id {
            query.push(("id", id.clone()));
        }
        if let Some(key) = &filter.label_key {
            query.push(("label_key", key.clone()));
        }
        if let Some(value) = &filter.label_value {
            query.push(("label_value", value.clone()));
        }
        if let Some(ancestor) = &filter.ancestor {
            query.push(("ancestor", ancestor.clone()));
        }
        let response = self.http.get(self.url("/api/v1/boxes")).query(&query).send().await?;
        Ok(Self::check(response).await?.json().await?)
    }

    pub async fn get_box(&self, id: &str) -> Result<GboxBox> {
        let response = self.http.get(self.url(&format!("/api/v1/boxes/{id}"))).send().await?;
        Ok(Self::check(response).await?.json().await?)
    }

    pub async fn create_box(&self, req: &CreateBoxRequest) -> Result<GboxBox> {
        let response = self.http.post(self.url("/api/v1/boxes")).json(req).send().await?;
        Ok(Self::check(response).await?.json().await?)
    }

    pub async fn delete_box(&self, id: &str, force: bool) -> Result<MessageResponse> {
        let response = self
            .http
            .delete(self.url(&format!("/api/v1/boxes/{id}")))
            .query(&[("force", force)])
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }

    pub async fn delete_all_boxes(&self, force: bool) -> Result<DeleteAllResponse> {
        let response = self
            .http
            .delete(self.url("/api/v1/boxes"))
            .query(&[("force", force)])
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }

    pub async fn start_box(&self, id: &str) -> Result<ActionResult> {
        let response = self.http.post(self.url(&format!("/api/v1/boxes/{id}/start"))).send().await?;
        Ok(Self::check(response).await?.json().await?)
    }

    pub async fn stop_box(&self, id: &str) -> Result<ActionResult> {
        let response = self.http.post(self.url(&format!("/api/v1/boxes/{id}/stop"))).send().await?;
        Ok(Self::check(response).await?.json().await?)
    }

    pub async fn run(&self, id: &str, req: &RunRequest) -> Result<RunResponse> {
        let response = self.http.post(self.url(&format!("/api/v1/boxes/{id}/run"))).json(req).send().await?;
        Ok(Self::check(response).await?.json().await?)
    }

    pub async fn reclaim(&self) -> Result<ReclaimResponse> {
        let response = self.http.post(self.url("/api/v1/boxes/reclaim")).send().await?;
        Ok(Self::check(response).await?.json().await?)
    }

    pub async fn head_archive(&self, id: &str, path: &str) -> Result<PathStat> {
        let response = self
            .http
            .head(self.url(&format!("/api/v1/boxes/{id}/archive")))
            .query(&[("path", path)])
            .send()
            .await?;
        let response = Self::check(response).await?;
        Self::path_stat_from_headers(response.headers())
    }

    pub async fn get_archive(&self, id: &str, path: &str, dest: &std::path::Path) -> Result<PathStat> {
        let response = self
            .http
            .get(self.url(&format!("/api/v1/boxes/{id}/archive")))
            .query(&[("path", path)])
            .send()
            .await?;
        let response = Self::check(response).await?;
        let stat = Self::path_stat_from_headers(response.headers())?;
        let bytes = response.bytes().await?;
        tokio::fs::write(dest, &bytes).await?;
        Ok(stat)
    }

    pub async fn put_archive(
        &self,
        id: &str,
        path: &str,
        tar_bytes: Vec<u8>,
        no_overwrite_dir_non_dir: bool,
        copy_uid_gid: bool,
    ) -> Result<()> {
        let response = self
            .http
            .put(self.url(&format!("/api/v1/boxes/{id}/archive")))
            .query(&[
                ("path", path.to_string()),
                ("noOverwriteDirNonDir", no_overwrite_dir_non_dir.to_string()),
                ("copyUIDGID", copy_uid_gid.to_string()),
            ])
            .body(tar_bytes)
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    fn path_stat_from_headers(headers: &reqwest::header::HeaderMap) -> Result<PathStat> {
        let raw = headers
            .get("X-Gbox-Path-Stat")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ClientError::Api {
                status: 500,
                code: "missing_stat".to_string(),
                message: "response had no X-Gbox-Path-Stat header".to_string(),
            })?;
        serde_json::from_str(raw).map_err(|e| ClientError::Api {
            status: 500,
            code: "invalid_stat".to_string(),
            message: format!("malformed path stat: {e}"),
        })
    }

    /// Opens an exec session and bridges stdin/stdout over the raw socket
    /// the server hijacks after replying `101 Switching Protocols`, the
    /// same connection-upgrade handshake `gbox-server`'s exec route speaks.
    pub async fn exec_stream(
        &self,
        id: &str,
        spec: &serde_json::Value,
        tty: bool,
    ) -> Result<()> {
        let (host, port, path_prefix) = self.parse_host()?;
        let mut stream = TcpStream::connect((host.as_str(), port)).await?;

        let body = serde_json::to_vec(spec)?;
        let accept = if tty {
            "application/vnd.gbox.raw-stream"
        } else {
            "application/vnd.gbox.multiplexed-stream"
        };
        let request = format!(
            "POST {path_prefix}/api/v1/boxes/{id}/exec HTTP/1.1\r\n\
             Host: {host}\r\n\
             Accept: {accept}\r\n\
             Connection: Upgrade\r\n\
             Upgrade: {accept}\r\n\
             Content-Type: application/json\r\n\
             Content-Length: {}\r\n\r\n",
            body.len()
        );
        stream.write_all(request.as_bytes()).await?;
        stream.write_all(&body).await?;

        let mut reader = BufReader::new(stream);
        let mut status_line = String::new();
        reader.read_line(&mut status_line).await?;
        let status: u16 = status_line
            .split_whitespace()
            .nth(1)
            .and_then(|s| s.parse().ok())
            .unwrap_or(0);
        loop {
            let mut line = String::new();
            reader.read_line(&mut line).await?;
            if line == "\r\n" || line.is_empty() {
                break;
            }
        }
        if status != 101 {
            return Err(ClientError::UpgradeRefused(status));
        }

        let (mut server_read, mut server_write) = tokio::io::split(reader);
        let stdin_to_server = async {
            let mut stdin = tokio::io::stdin();
            let _ = tokio::io::copy(&mut stdin, &mut server_write).await;
            let _ = server_write.shutdown().await;
        };
        let server_to_stdout = async {
            let mut stdout = tokio::io::stdout();
            match tokio::io::copy(&mut server_read, &mut stdout).await {
                Ok(_) => {}
                Err(e) if e.kind() == ErrorKind::UnexpectedEof => {}
                Err(_) => {}
            }
        };
        tokio::join!(stdin_to_server, server_to_stdout);
        Ok(())
    }

    fn parse_host(&self) -> Result<(String, u16, String)> {
        let without_scheme = self
            .base_url
            .strip_prefix("http://")
            .or_else(|| self.base_url.strip_prefix("https://"))
            .unwrap_or(&self.base_url);
        let (authority, path_prefix) = match without_scheme.find('/') {
            Some(idx) => (&without_scheme[..idx], without_scheme[idx..].to_string()),
            None => (without_scheme, String::new()),
        };
        let mut parts = authority.rsplitn(2, ':');
        let port_part = parts.next();
        let host_part = parts.next();
        match (host_part, port_part) {
            (Some(host), Some(port)) => {
                let port: u16 = port
                    .parse()
                    .map_err(|_| ClientError::InvalidHost(self.base_url.clone()))?;
                Ok((host.to_string(), port, path_prefix))
            }
            _ => Ok((authority.to_string(), 80, path_prefix)),
        }
    }
}
