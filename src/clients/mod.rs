pub mod interface;
pub mod llm_client;
pub mod uploader;

pub use interface::{BatchGenerator, ImageUploader};
pub use llm_client::LlmClient;
pub use uploader::{HttpImageUploader, InlineImageUploader};
