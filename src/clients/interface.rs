//! 外部服务接口
//!
//! 核心流程只依赖这两个 trait，具体的协议和鉴权由实现负责，
//! 测试时可以替换为假的实现

use crate::error::{GenerationError, UploadError};
use crate::models::UploadedHandle;
use async_trait::async_trait;
use std::path::Path;

/// 远程上传原语：上传一个文件，返回远程引用
#[async_trait]
pub trait ImageUploader: Send + Sync {
    async fn upload(&self, path: &Path, mime_type: &str) -> Result<String, UploadError>;
}

/// 批量生成原语：一次调用，多个句柄，返回一段文本
#[async_trait]
pub trait BatchGenerator: Send + Sync {
    async fn generate(
        &self,
        handles: &[UploadedHandle],
        prompt: &str,
    ) -> Result<String, GenerationError>;
}
