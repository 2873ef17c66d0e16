//! # Batch Image Analyzer
//!
//! 把一个目录里的图片压缩、并发上传到外部视觉理解服务，
//! 用一次批量请求完成分析，再把自由文本响应解析为逐张图片的结论。
//!
//! ## 架构设计
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 持有临时文件，离开作用域即删除
//!
//! ### ② 外部客户端（Clients）
//! - `ImageUploader` / `BatchGenerator` - 外部服务的最小接口
//! - `InlineImageUploader` / `HttpImageUploader` / `LlmClient` - 具体实现
//!
//! ### ③ 业务能力层（Services）
//! - `Preprocessor` - 压缩单张图片
//! - `RetryPolicy` - 固定间隔的有限重试
//! - `ResponseParser` - 解析单个响应
//!
//! ### ④ 流程层（Workflow）
//! - `UploadFlow` - 单张图片：压缩 → 上传 → 清理
//!
//! ### ⑤ 编排层（Orchestration）
//! - `UploadCoordinator` - 有界并发上传
//! - `BatchAnalyzer` - 一批一次的生成请求
//! - `PipelineController` - 串起整条流水线
//!
//! ## 模块结构
//!
//! - `config` / `error` / `logger` - 配置、错误类型、日志初始化
//! - `models` - 图片记录、上传句柄、结论与结果集
//! - `utils` - 日志文件与统计输出

pub mod clients;
pub mod config;
pub mod error;
pub mod infrastructure;
pub mod logger;

pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use clients::{BatchGenerator, ImageUploader};
pub use config::Config;
pub use error::{AppError, AppResult};
pub use models::{AnalysisVerdict, Classification, ImageId, ResultSet, UploadedHandle};
pub use orchestrator::{AnalysisReport, App, PipelineController, RunOutcome};
