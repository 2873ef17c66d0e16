//! 图片上传客户端
//!
//! - `InlineImageUploader`：把文件编码为 base64 data URL，不经过网络，
//!   适用于直接接受图片内容的 OpenAI 兼容视觉接口
//! - `HttpImageUploader`：multipart 上传到文件服务，返回远程 URL

use crate::clients::interface::ImageUploader;
use crate::error::UploadError;
use async_trait::async_trait;
use base64::{engine::general_purpose, Engine};
use reqwest::multipart::{Form, Part};
use serde_json::Value;
use std::path::Path;
use tracing::debug;

async fn read_file(path: &Path) -> Result<Vec<u8>, UploadError> {
    tokio::fs::read(path)
        .await
        .map_err(|source| UploadError::ReadFailed {
            path: path.display().to_string(),
            source,
        })
}

/// data URL 上传器
#[derive(Debug, Clone, Default)]
pub struct InlineImageUploader;

impl InlineImageUploader {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ImageUploader for InlineImageUploader {
    async fn upload(&self, path: &Path, mime_type: &str) -> Result<String, UploadError> {
        let bytes = read_file(path).await?;
        debug!("内联编码 {} ({} 字节)", path.display(), bytes.len());
        Ok(format!(
            "data:{};base64,{}",
            mime_type,
            general_purpose::STANDARD.encode(bytes)
        ))
    }
}

/// HTTP 文件服务上传器
pub struct HttpImageUploader {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

impl HttpImageUploader {
    /// 创建新的上传客户端
    pub fn new(endpoint: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            api_key: api_key.filter(|k| !k.is_empty()),
        }
    }

    /// 从响应 JSON 中取出远程引用，兼容 `uri` / `url` / `file.uri` 几种写法
    fn extract_uri(body: &Value) -> Option<String> {
        ["uri", "url"]
            .iter()
            .find_map(|key| body.get(*key).and_then(|v| v.as_str()))
            .or_else(|| body.pointer("/file/uri").and_then(|v| v.as_str()))
            .or_else(|| body.pointer("/data/url").and_then(|v| v.as_str()))
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    }
}

#[async_trait]
impl ImageUploader for HttpImageUploader {
    async fn upload(&self, path: &Path, mime_type: &str) -> Result<String, UploadError> {
        let bytes = read_file(path).await?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "image".to_string());

        let part = Part::bytes(bytes)
            .file_name(file_name)
            .mime_str(mime_type)
            .map_err(|e| UploadError::request_failed(&self.endpoint, e))?;
        let form = Form::new().part("file", part);

        let mut request = self.client.post(&self.endpoint).multipart(form);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| UploadError::request_failed(&self.endpoint, e))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(UploadError::BadResponse {
                endpoint: self.endpoint.clone(),
                status: status.as_u16(),
                message,
            });
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| UploadError::request_failed(&self.endpoint, e))?;

        Self::extract_uri(&body).ok_or_else(|| UploadError::MissingHandle {
            endpoint: self.endpoint.clone(),
        })
    }
}
