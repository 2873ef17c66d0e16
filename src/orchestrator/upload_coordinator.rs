//! 上传协调器 - 编排层
//!
//! ## 职责
//!
//! 对一批图片并发执行上传流程，并限制同时进行的任务数量。
//!
//! ## 核心功能
//!
//! 1. **并发控制**：Semaphore 的许可在 spawn 之前获取，任务存活期间一直持有，
//!    同时存在的任务数不会超过 `min(图片数, 上限)`
//! 2. **结果汇总**：成功的句柄写入共享的 Mutex 列表，失败的逐条记录
//! 3. **顺序恢复**：全部完成后按输入顺序排序，保证下游编号稳定
//!
//! 单张图片失败不会影响其他图片，也不会让整批失败。

use crate::clients::ImageUploader;
use crate::config::Config;
use crate::models::{FailedUpload, ImageRecord, UploadedHandle};
use crate::services::{Preprocessor, RetryPolicy};
use crate::workflow::{ImageCtx, UploadFlow};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{Mutex, Semaphore};
use tracing::{error, info, warn};

/// 默认的并发上限
pub const DEFAULT_MAX_CONCURRENT_UPLOADS: usize = 150;

/// 一批上传的结果
#[derive(Debug, Default)]
pub struct UploadReport {
    /// 成功的句柄，按输入顺序排列
    pub handles: Vec<UploadedHandle>,
    pub failed: Vec<FailedUpload>,
}

impl UploadReport {
    pub fn total(&self) -> usize {
        self.handles.len() + self.failed.len()
    }
}

/// 上传协调器
pub struct UploadCoordinator {
    flow: Arc<UploadFlow>,
    max_concurrency: usize,
}

impl UploadCoordinator {
    pub fn new(
        uploader: Arc<dyn ImageUploader>,
        preprocessor: Preprocessor,
        retry: RetryPolicy,
        max_concurrency: usize,
    ) -> Self {
        Self {
            flow: Arc::new(UploadFlow::new(uploader, preprocessor, retry)),
            max_concurrency: max_concurrency.max(1),
        }
    }

    pub fn from_config(config: &Config, uploader: Arc<dyn ImageUploader>) -> Self {
        Self::new(
            uploader,
            Preprocessor::new(config.jpeg_quality),
            config.retry_policy(),
            config.max_concurrent_uploads,
        )
    }

    /// 实际使用的并发数
    pub fn pool_size(&self, item_count: usize) -> usize {
        item_count.min(self.max_concurrency).max(1)
    }

    /// 上传全部图片
    ///
    /// # 参数
    /// - `image_paths`: 待上传的原图
    /// - `output_dir`: 压缩临时文件目录
    ///
    /// # 返回
    /// 返回成功的句柄（按输入顺序）和失败记录；全部失败时句柄列表为空
    pub async fn upload_all(&self, image_paths: &[PathBuf], output_dir: &Path) -> UploadReport {
        if image_paths.is_empty() {
            return UploadReport::default();
        }

        let total = image_paths.len();
        let pool_size = self.pool_size(total);
        info!("📤 开始上传 {} 张图片 (并发数: {})", total, pool_size);

        let semaphore = Arc::new(Semaphore::new(pool_size));
        let sink: Arc<Mutex<Vec<UploadedHandle>>> = Arc::new(Mutex::new(Vec::with_capacity(total)));
        let mut tasks = Vec::with_capacity(total);
        let mut failed = Vec::new();

        for (index, path) in image_paths.iter().enumerate() {
            let permit = match semaphore.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(e) => {
                    error!("获取上传许可失败: {}", e);
                    failed.push(FailedUpload {
                        source_path: path.clone(),
                        attempts: 0,
                        reason: format!("获取上传许可失败: {}", e),
                    });
                    continue;
                }
            };

            let flow = Arc::clone(&self.flow);
            let sink = Arc::clone(&sink);
            let record = ImageRecord::new(index, path.clone());
            let ctx = ImageCtx::new(index + 1, total, path.clone());
            let output_dir = output_dir.to_path_buf();

            let task = tokio::spawn(async move {
                let _permit = permit;
                match flow.run(record, &ctx, &output_dir).await {
                    Ok(handle) => {
                        sink.lock().await.push(handle);
                        None
                    }
                    Err(failed) => Some(failed),
                }
            });
            tasks.push((path.clone(), task));
        }

        // 等待所有任务完成
        for (path, task) in tasks {
            match task.await {
                Ok(None) => {}
                Ok(Some(failure)) => failed.push(failure),
                Err(e) => {
                    error!("[{}] 上传任务执行失败: {}", path.display(), e);
                    failed.push(FailedUpload {
                        source_path: path,
                        attempts: 0,
                        reason: format!("任务执行失败: {}", e),
                    });
                }
            }
        }

        let mut handles = std::mem::take(&mut *sink.lock().await);
        handles.sort_by_key(|h| h.source_index);

        if !failed.is_empty() {
            warn!("⚠️ {} 张图片上传失败，已从本批移除", failed.len());
        }
        info!("✓ 上传完成: 成功 {}/{}", handles.len(), total);

        UploadReport { handles, failed }
    }
}
