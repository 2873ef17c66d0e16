pub mod image_loader;

pub use image_loader::{is_supported_image, list_image_files, SUPPORTED_EXTENSIONS};
