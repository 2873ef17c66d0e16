//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责批量处理和流程调度，是整个系统的"指挥中心"。
//!
//! ## 模块划分
//!
//! ### `upload_coordinator` - 上传协调器
//! - 控制并发数量（Semaphore）
//! - 为每张图片执行 `workflow::UploadFlow`
//! - 汇总成功句柄和失败记录
//!
//! ### `batch_analysis` - 批量分析
//! - 一批只发起一次生成请求
//! - 失败时返回空文本和错误信息，不重试
//!
//! ### `pipeline_controller` - 流水线控制器
//! - 扫描 → 上传 → 分析 → 解析
//! - 计时、日志、整体结论
//!
//! ### `app` - 应用入口
//! - 根据配置创建外部客户端
//! - 输出统计信息
//!
//! ## 层次关系
//!
//! ```text
//! app
//!     ↓
//! pipeline_controller (处理整个目录)
//!     ↓
//! upload_coordinator / batch_analysis (处理 Vec<图片>)
//!     ↓
//! workflow::UploadFlow (处理单张图片)
//!     ↓
//! services (能力层：preprocessor / retry / response_parser)
//!     ↓
//! clients / infrastructure (外部服务、临时文件)
//! ```

pub mod app;
pub mod batch_analysis;
pub mod pipeline_controller;
pub mod upload_coordinator;

// 重新导出主要类型
pub use app::App;
pub use batch_analysis::{BatchAnalyzer, GenerationOutcome};
pub use pipeline_controller::{AnalysisReport, PipelineController, RunOutcome};
pub use upload_coordinator::{UploadCoordinator, UploadReport};
