use crate::error::PipelineError;
use std::path::{Path, PathBuf};
use tokio::fs;

/// 允许处理的图片扩展名（不区分大小写）
pub const SUPPORTED_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

/// 判断文件扩展名是否在白名单内
pub fn is_supported_image(path: &Path) -> bool {
    path.extension()
        .and_then(|s| s.to_str())
        .map(|ext| {
            SUPPORTED_EXTENSIONS
                .iter()
                .any(|allowed| ext.eq_ignore_ascii_case(allowed))
        })
        .unwrap_or(false)
}

/// 扫描目录中所有可处理的图片
///
/// 按文件名排序，保证同一目录每次得到相同的编号顺序
pub async fn list_image_files(folder: &Path) -> Result<Vec<PathBuf>, PipelineError> {
    let folder_str = folder.display().to_string();

    if !fs::try_exists(folder).await.unwrap_or(false) {
        return Err(PipelineError::ImageFolderNotFound { path: folder_str });
    }

    let mut entries = fs::read_dir(folder)
        .await
        .map_err(|source| PipelineError::ImageFolderUnreadable {
            path: folder_str.clone(),
            source,
        })?;

    let mut images = Vec::new();
    loop {
        let entry = match entries.next_entry().await {
            Ok(Some(entry)) => entry,
            Ok(None) => break,
            Err(source) => {
                return Err(PipelineError::ImageFolderUnreadable {
                    path: folder_str,
                    source,
                })
            }
        };

        let path = entry.path();
        let is_file = entry.file_type().await.map(|t| t.is_file()).unwrap_or(false);
        if is_file && is_supported_image(&path) {
            images.push(path);
        } else {
            tracing::debug!("跳过非图片文件: {}", path.display());
        }
    }

    images.sort();
    Ok(images)
}
