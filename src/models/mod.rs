pub mod image;
pub mod loaders;
pub mod verdict;

pub use image::{CompressedArtifact, FailedUpload, ImageId, ImageRecord, ImageStatus, UploadedHandle};
pub use loaders::{is_supported_image, list_image_files};
pub use verdict::{AnalysisVerdict, Classification, ResultSet};
