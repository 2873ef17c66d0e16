//! 流水线控制器 - 编排层
//!
//! ## 职责
//!
//! 把 扫描 → 上传 → 批量分析 → 解析 串成一次 `run` 调用，负责计时、日志，
//! 并判断整批是完全成功、部分成功还是无结果。
//!
//! 只有整批无法继续时才返回错误（图片目录不存在、工作目录不可写）；
//! 没有图片、全部上传失败、生成失败都返回空结果和对应的 `RunOutcome`。

use crate::clients::{BatchGenerator, ImageUploader};
use crate::config::Config;
use crate::error::AppResult;
use crate::infrastructure::ensure_writable_dir;
use crate::models::{list_image_files, FailedUpload, ResultSet};
use crate::orchestrator::batch_analysis::BatchAnalyzer;
use crate::orchestrator::upload_coordinator::UploadCoordinator;
use crate::services::{ResponseParser, ResponseValidation};
use crate::utils::logging;
use std::fmt::{self, Display};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// 一次运行的整体结论
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// 所有图片都上传成功，响应编号与上传数量一致
    Complete,
    /// 有图片上传失败，或响应缺少/多出编号
    Partial,
    /// 目录中没有可处理的图片
    NoImages,
    /// 没有任何图片上传成功
    NoUploads,
    /// 批量生成失败
    GenerationFailed(String),
}

impl Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunOutcome::Complete => write!(f, "全部完成"),
            RunOutcome::Partial => write!(f, "部分完成"),
            RunOutcome::NoImages => write!(f, "没有可处理的图片"),
            RunOutcome::NoUploads => write!(f, "没有可用的图片（上传全部失败）"),
            RunOutcome::GenerationFailed(msg) => write!(f, "批量分析失败: {}", msg),
        }
    }
}

/// 一次运行的完整报告
#[derive(Debug, Clone)]
pub struct AnalysisReport {
    pub results: ResultSet,
    pub outcome: RunOutcome,
    /// 目录中找到的图片数
    pub images_found: usize,
    /// 截断后实际处理的图片数
    pub images_selected: usize,
    pub uploaded: usize,
    /// 上传失败的图片，不会出现在结果中
    pub failed_uploads: Vec<FailedUpload>,
    pub validation: Option<ResponseValidation>,
    pub raw_response: String,
    pub elapsed: Duration,
}

impl AnalysisReport {
    fn empty(outcome: RunOutcome, images_found: usize, started: Instant) -> Self {
        Self {
            results: ResultSet::new(),
            outcome,
            images_found,
            images_selected: 0,
            uploaded: 0,
            failed_uploads: Vec::new(),
            validation: None,
            raw_response: String::new(),
            elapsed: started.elapsed(),
        }
    }
}

/// 流水线控制器
pub struct PipelineController {
    coordinator: UploadCoordinator,
    analyzer: BatchAnalyzer,
    parser: ResponseParser,
    default_max_images: usize,
}

impl PipelineController {
    pub fn new(
        config: &Config,
        uploader: Arc<dyn ImageUploader>,
        generator: Arc<dyn BatchGenerator>,
    ) -> Self {
        let mut analyzer = BatchAnalyzer::new(generator);
        if let Some(instruction) = &config.analysis_prompt {
            analyzer = analyzer.with_instruction(instruction.clone());
        }
        Self::from_parts(
            UploadCoordinator::from_config(config, uploader),
            analyzer,
            ResponseParser::new(),
            config.max_images,
        )
    }

    pub fn from_parts(
        coordinator: UploadCoordinator,
        analyzer: BatchAnalyzer,
        parser: ResponseParser,
        default_max_images: usize,
    ) -> Self {
        Self {
            coordinator,
            analyzer,
            parser,
            default_max_images: default_max_images.max(1),
        }
    }

    /// 分析目录中的图片，只返回结果
    pub async fn analyze(
        &self,
        image_folder: &Path,
        work_folder: &Path,
        max_images: Option<usize>,
    ) -> AppResult<ResultSet> {
        Ok(self.run(image_folder, work_folder, max_images).await?.results)
    }

    /// 分析目录中的图片
    ///
    /// # 参数
    /// - `image_folder`: 图片目录
    /// - `work_folder`: 压缩临时文件目录
    /// - `max_images`: 单批最多处理的图片数，`None` 使用配置值
    pub async fn run(
        &self,
        image_folder: &Path,
        work_folder: &Path,
        max_images: Option<usize>,
    ) -> AppResult<AnalysisReport> {
        let started = Instant::now();

        info!("\n📁 正在扫描图片目录: {}", image_folder.display());
        let mut images = list_image_files(image_folder).await?;
        let images_found = images.len();

        if images.is_empty() {
            warn!("⚠️ 没有找到可处理的图片");
            return Ok(AnalysisReport::empty(RunOutcome::NoImages, 0, started));
        }

        let cap = max_images.unwrap_or(self.default_max_images).max(1);
        if images.len() > cap {
            warn!("⚠️ 找到 {} 张图片，本批只处理前 {} 张", images.len(), cap);
            images.truncate(cap);
        }
        logging::log_images_found(images_found, images.len());

        ensure_writable_dir(work_folder).await?;

        // ========== 上传 ==========
        let upload = self.coordinator.upload_all(&images, work_folder).await;
        logging::log_upload_summary(upload.handles.len(), upload.failed.len());

        if upload.handles.is_empty() {
            warn!("⚠️ 没有任何图片上传成功，跳过分析");
            let mut report = AnalysisReport::empty(RunOutcome::NoUploads, images_found, started);
            report.images_selected = images.len();
            report.failed_uploads = upload.failed;
            return Ok(report);
        }

        // ========== 批量分析 ==========
        let generation = self.analyzer.analyze(&upload.handles).await;
        if let Some(message) = generation.error {
            let mut report = AnalysisReport::empty(
                RunOutcome::GenerationFailed(message),
                images_found,
                started,
            );
            report.images_selected = images.len();
            report.uploaded = upload.handles.len();
            report.failed_uploads = upload.failed;
            return Ok(report);
        }

        // ========== 解析 ==========
        let parsed = self.parser.parse_detailed(&generation.raw_text);
        let validation = self.parser.validate(&parsed, upload.handles.len());
        log_validation(&validation);

        let outcome = if upload.failed.is_empty() && validation.is_consistent() {
            RunOutcome::Complete
        } else {
            RunOutcome::Partial
        };

        let (results, dropped) = parsed.results.attach_sources(&upload.handles);
        if !dropped.is_empty() {
            warn!("⚠️ 移除没有对应图片的结果: {}", join_ids(&dropped));
        }
        let elapsed = started.elapsed();
        info!("⏱️ 本批耗时: {:.2} 秒", elapsed.as_secs_f64());

        Ok(AnalysisReport {
            results,
            outcome,
            images_found,
            images_selected: images.len(),
            uploaded: upload.handles.len(),
            failed_uploads: upload.failed,
            validation: Some(validation),
            raw_response: generation.raw_text,
            elapsed,
        })
    }
}

fn log_validation(validation: &ResponseValidation) {
    if validation.is_consistent() {
        return;
    }
    warn!(
        "⚠️ 响应编号与上传数量不一致: 期望 {}，解析到 {}",
        validation.expected, validation.parsed
    );
    if !validation.missing.is_empty() {
        warn!("   缺失: {}", join_ids(&validation.missing));
    }
    if !validation.unexpected.is_empty() {
        warn!("   多出: {}", join_ids(&validation.unexpected));
    }
    if !validation.duplicates.is_empty() {
        warn!("   重复: {}", join_ids(&validation.duplicates));
    }
}

fn join_ids(ids: &[crate::models::ImageId]) -> String {
    ids.iter().map(|id| id.to_string()).collect::<Vec<_>>().join(", ")
}
