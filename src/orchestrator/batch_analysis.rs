//! 批量分析 - 编排层
//!
//! 把所有上传成功的句柄放进同一个请求，一批只调用一次生成服务，
//! 分类的成本和延迟由整批分摊。这里不做重试：上传阶段已经重试过，
//! 生成失败属于另一类错误，交给调用方决定是否整体重跑。

use crate::clients::BatchGenerator;
use crate::models::UploadedHandle;
use std::sync::Arc;
use tracing::{debug, error, info};

/// 默认的分析任务：检测图片中是否有人正在使用手机
pub const DEFAULT_TASK_INSTRUCTION: &str = "Analyze the images for active phone usage. Consider these indicators:
- Holding a phone in hand
- Looking at phone screen
- Texting or scrolling
- Taking photos/videos
- Visible phone screen content";

/// 一次生成调用的结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerationOutcome {
    /// 原始响应文本；失败时为空
    pub raw_text: String,
    pub error: Option<String>,
}

impl GenerationOutcome {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    fn failed(message: String) -> Self {
        Self {
            raw_text: String::new(),
            error: Some(message),
        }
    }
}

/// 批量分析器
pub struct BatchAnalyzer {
    generator: Arc<dyn BatchGenerator>,
    task_instruction: String,
}

impl BatchAnalyzer {
    pub fn new(generator: Arc<dyn BatchGenerator>) -> Self {
        Self {
            generator,
            task_instruction: DEFAULT_TASK_INSTRUCTION.to_string(),
        }
    }

    /// 替换分析任务描述，输出格式要求保持不变
    pub fn with_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.task_instruction = instruction.into();
        self
    }

    /// 构建指令：任务描述 + 固定的输出格式要求
    pub fn build_prompt(&self, image_count: usize) -> String {
        format!(
            r#"{task}

There are {count} images, numbered 1 to {count} in the order they were provided.

For each image, in order:
1. Start with 'Image N:' where N is the image number
2. Follow with 'yes' or 'no'
3. Provide a detailed explanation after ' - ', highlighting any relevant visual elements

Use exactly this format, one block per image, and do not skip any image:
Image 1: yes - [explanation]
Image 2: no - [explanation]"#,
            task = self.task_instruction.trim(),
            count = image_count
        )
    }

    /// 对整批句柄发起一次分析
    pub async fn analyze(&self, handles: &[UploadedHandle]) -> GenerationOutcome {
        if handles.is_empty() {
            return GenerationOutcome::failed("没有可分析的图片".to_string());
        }

        let prompt = self.build_prompt(handles.len());
        info!("🤖 提交批量分析请求 ({} 张图片)...", handles.len());
        debug!("分析指令: {}", prompt);

        match self.generator.generate(handles, &prompt).await {
            Ok(text) if text.trim().is_empty() => {
                error!("❌ 生成服务返回空文本");
                GenerationOutcome::failed("生成服务返回空文本".to_string())
            }
            Ok(text) => {
                info!("✓ 收到分析结果 ({} 字符)", text.chars().count());
                GenerationOutcome {
                    raw_text: text,
                    error: None,
                }
            }
            Err(e) => {
                error!("❌ 批量分析请求失败: {}", e);
                GenerationOutcome::failed(e.to_string())
            }
        }
    }
}
