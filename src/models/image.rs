//! 图片在上传阶段的各种形态
//!
//! ImageRecord → CompressedArtifact → UploadedHandle，失败时变为 FailedUpload

use serde::{Serialize, Serializer};
use std::fmt::{self, Display};
use std::path::{Path, PathBuf};
use tracing::debug;

/// 图片编号（从 1 开始），对应响应中的 "Image N"
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ImageId(pub u32);

impl ImageId {
    pub fn number(&self) -> u32 {
        self.0
    }
}

impl Display for ImageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "image_{}", self.0)
    }
}

impl Serialize for ImageId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// 图片处理状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageStatus {
    Pending,
    Compressed,
    Uploaded,
    UploadFailed,
}

impl ImageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageStatus::Pending => "pending",
            ImageStatus::Compressed => "compressed",
            ImageStatus::Uploaded => "uploaded",
            ImageStatus::UploadFailed => "upload_failed",
        }
    }

    /// 上传成功或最终失败后不再变化
    pub fn is_terminal(&self) -> bool {
        matches!(self, ImageStatus::Uploaded | ImageStatus::UploadFailed)
    }
}

impl Display for ImageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 单张图片的上传记录
///
/// 在一个批次中只由上传流程持有
#[derive(Debug, Clone)]
pub struct ImageRecord {
    /// 在输入列表中的位置（从 0 开始）
    pub index: usize,
    pub source_path: PathBuf,
    pub status: ImageStatus,
}

impl ImageRecord {
    pub fn new(index: usize, source_path: PathBuf) -> Self {
        Self {
            index,
            source_path,
            status: ImageStatus::Pending,
        }
    }

    /// 文件名（用于日志）
    pub fn file_name(&self) -> String {
        display_name(&self.source_path)
    }

    /// 切换状态；已到终态的记录保持不变并返回 false
    pub fn transition(&mut self, next: ImageStatus) -> bool {
        if self.status.is_terminal() {
            debug!(
                "{} 已处于 {}，忽略切换到 {}",
                self.file_name(),
                self.status,
                next
            );
            return false;
        }
        debug!("{}: {} → {}", self.file_name(), self.status, next);
        self.status = next;
        true
    }
}

/// 压缩产物
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompressedArtifact {
    pub path: PathBuf,
    pub mime_type: String,
    /// 是否为本次压缩生成的临时文件；压缩失败回退到原图时为 false，原图不能删除
    pub is_temporary: bool,
}

impl CompressedArtifact {
    pub fn temporary(path: PathBuf) -> Self {
        let mime_type = guess_mime_type(&path).to_string();
        Self {
            path,
            mime_type,
            is_temporary: true,
        }
    }

    pub fn original(path: PathBuf) -> Self {
        let mime_type = guess_mime_type(&path).to_string();
        Self {
            path,
            mime_type,
            is_temporary: false,
        }
    }
}

/// 上传成功后得到的远程句柄
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadedHandle {
    /// 远程引用（URL / 文件 URI / data URL），对本系统不透明
    pub uri: String,
    pub mime_type: String,
    pub source_path: PathBuf,
    /// 在输入列表中的位置，用于恢复确定的编号顺序
    pub source_index: usize,
}

/// 重试耗尽后仍然失败的上传
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedUpload {
    pub source_path: PathBuf,
    pub attempts: usize,
    pub reason: String,
}

/// 根据扩展名推断 MIME 类型，无法判断时使用通用二进制类型
pub fn guess_mime_type(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|s| s.to_str())
        .map(|s| s.to_ascii_lowercase())
        .as_deref()
    {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        _ => "application/octet-stream",
    }
}

pub(crate) fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guess_mime_type() {
        assert_eq!(guess_mime_type(Path::new("a/b.JPG")), "image/jpeg");
        assert_eq!(guess_mime_type(Path::new("b.jpeg")), "image/jpeg");
        assert_eq!(guess_mime_type(Path::new("c.Png")), "image/png");
        assert_eq!(guess_mime_type(Path::new("d.bin")), "application/octet-stream");
        assert_eq!(guess_mime_type(Path::new("noext")), "application/octet-stream");
    }

    #[test]
    fn test_record_transitions_stop_at_terminal_status() {
        let mut record = ImageRecord::new(0, PathBuf::from("cam.jpg"));
        assert_eq!(record.status, ImageStatus::Pending);

        assert!(record.transition(ImageStatus::Compressed));
        assert!(record.transition(ImageStatus::Uploaded));
        assert!(!record.transition(ImageStatus::UploadFailed));
        assert_eq!(record.status, ImageStatus::Uploaded);
        assert_eq!(record.status.to_string(), "uploaded");
    }

    #[test]
    fn test_image_id_display() {
        assert_eq!(ImageId(7).to_string(), "image_7");
        assert_eq!(serde_json::to_string(&ImageId(3)).unwrap(), "\"image_3\"");
    }
}
