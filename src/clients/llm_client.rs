//! LLM 客户端
//!
//! ## 技术栈
//! - 使用 `async-openai` crate 进行 API 调用
//! - 支持自定义 API 端点和模型
//! - 兼容 OpenAI API 的服务（如 Azure, Gemini, Doubao 等）

use crate::clients::interface::BatchGenerator;
use crate::config::Config;
use crate::error::GenerationError;
use crate::models::UploadedHandle;
use async_openai::{
    config::OpenAIConfig,
    types::chat::{
        ChatCompletionRequestMessage, ChatCompletionRequestMessageContentPartImage,
        ChatCompletionRequestMessageContentPartText, ChatCompletionRequestUserMessageArgs,
        ChatCompletionRequestUserMessageContent, ChatCompletionRequestUserMessageContentPart,
        CreateChatCompletionRequestArgs, ImageDetail, ImageUrl,
    },
    Client,
};
use async_trait::async_trait;
use tracing::{debug, warn};

/// LLM 客户端
///
/// 职责：
/// - 把一批图片句柄和指令组装成一次多模态对话请求
/// - 只返回原始文本，不做解析
pub struct LlmClient {
    client: Client<OpenAIConfig>,
    model_name: String,
    temperature: f32,
    max_tokens: u32,
}

impl LlmClient {
    /// 创建新的 LLM 客户端
    pub fn new(config: &Config) -> Self {
        // 配置 OpenAI 客户端（兼容 OpenAI API 的服务）
        let openai_config = OpenAIConfig::new()
            .with_api_key(&config.llm_api_key)
            .with_api_base(&config.llm_api_base_url);

        Self {
            client: Client::with_config(openai_config),
            model_name: config.llm_model_name.clone(),
            temperature: config.llm_temperature,
            max_tokens: config.llm_max_tokens,
        }
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    /// 构建用户消息：先放全部图片，最后放指令文本
    fn build_user_message(
        &self,
        handles: &[UploadedHandle],
        prompt: &str,
    ) -> Result<ChatCompletionRequestMessage, GenerationError> {
        let mut content_parts: Vec<ChatCompletionRequestUserMessageContentPart> =
            Vec::with_capacity(handles.len() + 1);

        for handle in handles {
            content_parts.push(ChatCompletionRequestUserMessageContentPart::ImageUrl(
                ChatCompletionRequestMessageContentPartImage {
                    image_url: ImageUrl {
                        url: handle.uri.clone(),
                        detail: Some(ImageDetail::Auto),
                    },
                },
            ));
        }

        content_parts.push(ChatCompletionRequestUserMessageContentPart::Text(
            ChatCompletionRequestMessageContentPartText {
                text: prompt.to_string(),
            },
        ));

        let user_msg = ChatCompletionRequestUserMessageArgs::default()
            .content(ChatCompletionRequestUserMessageContent::Array(content_parts))
            .build()
            .map_err(|e| GenerationError::RequestBuild(e.to_string()))?;

        Ok(ChatCompletionRequestMessage::User(user_msg))
    }
}

#[async_trait]
impl BatchGenerator for LlmClient {
    async fn generate(
        &self,
        handles: &[UploadedHandle],
        prompt: &str,
    ) -> Result<String, GenerationError> {
        debug!(
            "调用 LLM API，模型: {}，包含 {} 张图片",
            self.model_name,
            handles.len()
        );

        let message = self.build_user_message(handles, prompt)?;

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model_name)
            .messages(vec![message])
            .temperature(self.temperature)
            .max_tokens(self.max_tokens)
            .build()
            .map_err(|e| GenerationError::RequestBuild(e.to_string()))?;

        let response = self.client.chat().create(request).await.map_err(|e| {
            warn!("LLM API 调用失败: {}", e);
            GenerationError::api_call_failed(&self.model_name, e)
        })?;

        debug!("LLM API 调用成功");

        let content = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| GenerationError::EmptyContent {
                model: self.model_name.clone(),
            })?;

        Ok(content.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn handle(uri: &str) -> UploadedHandle {
        UploadedHandle {
            uri: uri.to_string(),
            mime_type: "image/jpeg".to_string(),
            source_path: PathBuf::from("a.jpg"),
            source_index: 0,
        }
    }

    #[test]
    fn test_build_user_message_has_one_part_per_image_plus_prompt() {
        let client = LlmClient::new(&Config::default());
        let message = client
            .build_user_message(&[handle("data:image/jpeg;base64,AA"), handle("files/2")], "prompt")
            .unwrap();

        match message {
            ChatCompletionRequestMessage::User(user) => match user.content {
                ChatCompletionRequestUserMessageContent::Array(parts) => {
                    assert_eq!(parts.len(), 3);
                    assert!(matches!(
                        parts.last(),
                        Some(ChatCompletionRequestUserMessageContentPart::Text(_))
                    ));
                }
                other => panic!("unexpected content: {:?}", other),
            },
            other => panic!("unexpected message: {:?}", other),
        }
    }

    /// 测试真实的批量调用
    ///
    /// 运行方式：
    /// ```bash
    /// LLM_API_KEY=... cargo test test_live_generation -- --ignored --nocapture
    /// ```
    #[tokio::test]
    #[ignore]
    async fn test_live_generation() {
        let _ = tracing_subscriber::fmt::try_init();

        let client = LlmClient::new(&Config::from_env());
        let handles = vec![handle(
            "https://upload.wikimedia.org/wikipedia/commons/thumb/3/3a/Cat03.jpg/1200px-Cat03.jpg",
        )];

        let text = client
            .generate(&handles, "Image 1: is there a cat? Answer 'Image 1: yes - ...' or 'Image 1: no - ...'")
            .await
            .expect("live generation failed");

        println!("{}", text);
        assert!(!text.is_empty());
    }
}
