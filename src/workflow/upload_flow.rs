//! 单张图片上传流程 - 流程层
//!
//! 流程顺序：
//! 1. 压缩（失败时回退原图）
//! 2. 推断 MIME 类型
//! 3. 带重试上传
//! 4. 删除压缩临时文件（无论成功失败）

use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

use crate::clients::ImageUploader;
use crate::infrastructure::TempFileGuard;
use crate::models::{FailedUpload, ImageRecord, ImageStatus, UploadedHandle};
use crate::services::{Preprocessor, RetryPolicy};
use crate::workflow::image_ctx::ImageCtx;

/// 单张图片上传流程
///
/// - 编排压缩 → 上传 → 清理
/// - 不关心并发，只处理一张图
/// - 只依赖上传能力（ImageUploader）
pub struct UploadFlow {
    uploader: Arc<dyn ImageUploader>,
    preprocessor: Preprocessor,
    retry: RetryPolicy,
}

impl UploadFlow {
    pub fn new(uploader: Arc<dyn ImageUploader>, preprocessor: Preprocessor, retry: RetryPolicy) -> Self {
        Self {
            uploader,
            preprocessor,
            retry,
        }
    }

    fn run_label(ctx: &ImageCtx) -> String {
        format!("{} 上传", ctx)
    }

    pub async fn run(
        &self,
        mut record: ImageRecord,
        ctx: &ImageCtx,
        output_dir: &Path,
    ) -> Result<UploadedHandle, FailedUpload> {
        let artifact = self
            .preprocessor
            .compress_async(&record.source_path, output_dir)
            .await;
        if artifact.is_temporary {
            record.transition(ImageStatus::Compressed);
        }

        // 守卫持有临时文件，任务被取消时同样会删除
        let guard = TempFileGuard::for_artifact(&artifact);

        let label = Self::run_label(ctx);
        let result = self
            .retry
            .run(&label, |_attempt| {
                self.uploader.upload(&artifact.path, &artifact.mime_type)
            })
            .await;

        guard.cleanup();

        match result {
            Ok(uri) => {
                record.transition(ImageStatus::Uploaded);
                info!("{} ✓ 上传成功", ctx);
                Ok(UploadedHandle {
                    uri,
                    mime_type: artifact.mime_type,
                    source_path: record.source_path,
                    source_index: record.index,
                })
            }
            Err(e) => {
                record.transition(ImageStatus::UploadFailed);
                warn!("{} ⚠️ 上传失败，已放弃: {}", ctx, e.last_error);
                Err(FailedUpload {
                    source_path: record.source_path,
                    attempts: e.attempts,
                    reason: e.last_error.to_string(),
                })
            }
        }
    }
}
