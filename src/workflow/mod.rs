pub mod image_ctx;
pub mod upload_flow;

pub use image_ctx::ImageCtx;
pub use upload_flow::UploadFlow;
