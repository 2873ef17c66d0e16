//! 应用入口 - 编排层
//!
//! 管理应用生命周期：初始化日志文件、按配置创建外部客户端、运行一批分析、
//! 输出统计。只有这里根据配置决定使用哪种上传器和生成器。

use crate::clients::{BatchGenerator, HttpImageUploader, ImageUploader, InlineImageUploader, LlmClient};
use crate::config::Config;
use crate::error::AppError;
use crate::orchestrator::pipeline_controller::{AnalysisReport, PipelineController};
use crate::utils::logging::{append_results, init_log_file, log_startup, print_final_stats};
use anyhow::Result;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// 应用主结构
pub struct App {
    config: Config,
    controller: PipelineController,
}

impl App {
    /// 初始化应用
    pub fn initialize(config: Config) -> Result<Self> {
        config.validate().map_err(AppError::from)?;

        // 初始化日志文件
        init_log_file(&config.output_log_file)?;

        log_startup(&config);

        let uploader: Arc<dyn ImageUploader> = match &config.upload_endpoint {
            Some(endpoint) => {
                info!("📡 使用文件服务上传: {}", endpoint);
                Arc::new(HttpImageUploader::new(
                    endpoint.clone(),
                    Some(config.llm_api_key.clone()),
                ))
            }
            None => {
                info!("📡 使用内联 data URL 上传");
                Arc::new(InlineImageUploader::new())
            }
        };
        let generator: Arc<dyn BatchGenerator> = Arc::new(LlmClient::new(&config));

        Ok(Self::with_clients(config, uploader, generator))
    }

    /// 使用指定的外部客户端创建应用
    pub fn with_clients(
        config: Config,
        uploader: Arc<dyn ImageUploader>,
        generator: Arc<dyn BatchGenerator>,
    ) -> Self {
        let controller = PipelineController::new(&config, uploader, generator);
        Self { config, controller }
    }

    /// 运行应用主逻辑
    pub async fn run(&self) -> Result<AnalysisReport> {
        let report = self
            .controller
            .run(
                Path::new(&self.config.image_folder),
                Path::new(&self.config.work_folder),
                Some(self.config.max_images),
            )
            .await?;

        for verdict in report.results.iter() {
            info!(
                "{} → {} | {}",
                verdict.image_id,
                verdict.classification,
                crate::utils::truncate_text(&verdict.explanation, 80)
            );
        }

        if let Err(e) = append_results(&self.config.output_log_file, &report) {
            warn!("写入日志文件失败: {}", e);
        }

        // 输出最终统计
        print_final_stats(&report, &self.config.output_log_file);

        Ok(report)
    }
}
