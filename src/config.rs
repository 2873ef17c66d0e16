//! 程序配置
//!
//! 所有运行参数都通过 `Config` 显式传入各组件，不存在进程级全局状态。

use crate::error::ConfigError;
use crate::services::retry::RetryPolicy;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// 程序配置文件
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// 待分析图片所在目录
    pub image_folder: String,
    /// 压缩临时文件目录
    pub work_folder: String,
    /// 单批最多处理的图片数量（保护下游 prompt/token 预算）
    pub max_images: usize,
    /// 同时上传的最大任务数
    pub max_concurrent_uploads: usize,
    /// 单张图片上传的最大尝试次数
    pub upload_max_attempts: usize,
    /// 两次上传尝试之间的固定等待（毫秒）
    pub upload_retry_delay_ms: u64,
    /// JPEG 压缩质量（1-100）
    ///
    /// 越低上传越快，但可能丢失对分类有用的细节
    pub jpeg_quality: u8,
    /// 上传端点；为空时使用 data URL 内联上传
    pub upload_endpoint: Option<String>,
    // --- LLM 配置 ---
    pub llm_api_key: String,
    pub llm_api_base_url: String,
    pub llm_model_name: String,
    pub llm_temperature: f32,
    pub llm_max_tokens: u32,
    /// 自定义分析指令；为空时使用内置的手机使用检测指令
    pub analysis_prompt: Option<String>,
    /// 输出日志文件
    pub output_log_file: String,
    /// 是否显示详细日志
    pub verbose_logging: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            image_folder: "images".to_string(),
            work_folder: "compressed_images".to_string(),
            max_images: 100,
            max_concurrent_uploads: 150,
            upload_max_attempts: 3,
            upload_retry_delay_ms: 2000,
            jpeg_quality: 10,
            upload_endpoint: None,
            llm_api_key: String::new(),
            llm_api_base_url: "https://api.openai.com/v1".to_string(),
            llm_model_name: "gpt-4o-mini".to_string(),
            llm_temperature: 1.0,
            llm_max_tokens: 8192,
            analysis_prompt: None,
            output_log_file: "analysis_log.txt".to_string(),
            verbose_logging: false,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// 从 TOML 文件加载配置，未出现的字段使用默认值，之后再应用环境变量覆盖
    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("无法读取配置文件: {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("无法解析配置文件: {}", path.display()))?;
        Ok(config.with_env_overrides())
    }

    fn with_env_overrides(self) -> Self {
        let base = self;
        Self {
            image_folder: std::env::var("IMAGE_FOLDER").unwrap_or(base.image_folder),
            work_folder: std::env::var("WORK_FOLDER").unwrap_or(base.work_folder),
            max_images: env_parse("MAX_IMAGES").unwrap_or(base.max_images),
            max_concurrent_uploads: env_parse("MAX_CONCURRENT_UPLOADS").unwrap_or(base.max_concurrent_uploads),
            upload_max_attempts: env_parse("UPLOAD_MAX_ATTEMPTS").unwrap_or(base.upload_max_attempts),
            upload_retry_delay_ms: env_parse("UPLOAD_RETRY_DELAY_MS").unwrap_or(base.upload_retry_delay_ms),
            jpeg_quality: env_parse("JPEG_QUALITY").unwrap_or(base.jpeg_quality),
            upload_endpoint: std::env::var("UPLOAD_ENDPOINT").ok().or(base.upload_endpoint),
            llm_api_key: std::env::var("LLM_API_KEY").unwrap_or(base.llm_api_key),
            llm_api_base_url: std::env::var("LLM_API_BASE_URL").unwrap_or(base.llm_api_base_url),
            llm_model_name: std::env::var("LLM_MODEL_NAME").unwrap_or(base.llm_model_name),
            llm_temperature: env_parse("LLM_TEMPERATURE").unwrap_or(base.llm_temperature),
            llm_max_tokens: env_parse("LLM_MAX_TOKENS").unwrap_or(base.llm_max_tokens),
            analysis_prompt: std::env::var("ANALYSIS_PROMPT").ok().or(base.analysis_prompt),
            output_log_file: std::env::var("OUTPUT_LOG_FILE").unwrap_or(base.output_log_file),
            verbose_logging: env_parse("VERBOSE_LOGGING").unwrap_or(base.verbose_logging),
        }
    }

    /// 检查配置取值是否合法
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_concurrent_uploads == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_concurrent_uploads",
                reason: "必须大于 0".to_string(),
            });
        }
        if self.upload_max_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                field: "upload_max_attempts",
                reason: "必须大于 0".to_string(),
            });
        }
        if self.max_images == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_images",
                reason: "必须大于 0".to_string(),
            });
        }
        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(ConfigError::InvalidValue {
                field: "jpeg_quality",
                reason: format!("{} 不在 1-100 范围内", self.jpeg_quality),
            });
        }
        Ok(())
    }

    /// 上传重试策略
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.upload_max_attempts,
            Duration::from_millis(self.upload_retry_delay_ms),
        )
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}
