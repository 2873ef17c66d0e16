//! 临时文件管理 - 基础设施层
//!
//! 持有压缩产物的所有权，离开作用域时删除文件

use crate::error::PipelineError;
use crate::models::CompressedArtifact;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// 临时文件守卫
///
/// 职责：
/// - 持有一个压缩临时文件
/// - Drop 时删除文件（任务被取消时同样生效）
/// - 非临时产物（回退的原图）不会被删除
pub struct TempFileGuard {
    path: Option<PathBuf>,
}

impl TempFileGuard {
    /// 为压缩产物创建守卫
    pub fn for_artifact(artifact: &CompressedArtifact) -> Self {
        Self {
            path: artifact.is_temporary.then(|| artifact.path.clone()),
        }
    }

    /// 被守护的路径
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// 立即删除文件
    pub fn cleanup(mut self) {
        self.remove();
    }

    fn remove(&mut self) {
        if let Some(path) = self.path.take() {
            match std::fs::remove_file(&path) {
                Ok(()) => debug!("已删除临时文件: {}", path.display()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!("删除临时文件失败 ({}): {}", path.display(), e),
            }
        }
    }
}

impl Drop for TempFileGuard {
    fn drop(&mut self) {
        self.remove();
    }
}

/// 确保工作目录存在且可写
pub async fn ensure_writable_dir(dir: &Path) -> Result<(), PipelineError> {
    let not_writable = |source| PipelineError::WorkFolderNotWritable {
        path: dir.display().to_string(),
        source,
    };

    tokio::fs::create_dir_all(dir).await.map_err(not_writable)?;

    let probe = dir.join(".write_probe");
    tokio::fs::write(&probe, b"").await.map_err(not_writable)?;
    let _ = tokio::fs::remove_file(&probe).await;

    Ok(())
}
