//! 图片预处理 - 业务能力层
//!
//! 只负责把一张图片压缩成适合上传的 JPEG

use crate::models::image::display_name;
use crate::models::CompressedArtifact;
use image::codecs::jpeg::JpegEncoder;
use image::DynamicImage;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// 默认 JPEG 质量
///
/// 质量越低上传越快，但细节损失越大，可能影响分类
pub const DEFAULT_JPEG_QUALITY: u8 = 10;

/// 图片预处理器
///
/// 职责：
/// - 解码原图，统一转换为 RGB 三通道
/// - 按配置的质量重新编码为 JPEG
/// - 失败时回退为原图路径，不向上抛错
#[derive(Debug, Clone, Copy)]
pub struct Preprocessor {
    quality: u8,
}

impl Preprocessor {
    pub fn new(quality: u8) -> Self {
        Self {
            quality: quality.clamp(1, 100),
        }
    }

    pub fn quality(&self) -> u8 {
        self.quality
    }

    /// 压缩后的输出路径：`<原文件名>_compressed.jpg`
    ///
    /// 同一张图重复压缩会覆盖同一个文件
    pub fn output_path(source: &Path, output_dir: &Path) -> PathBuf {
        output_dir.join(format!("{}_compressed.jpg", display_name(source)))
    }

    /// 压缩图片（同步）
    ///
    /// # 返回
    /// 成功时返回临时压缩文件；失败时返回指向原图的非临时产物
    pub fn compress(&self, source: &Path, output_dir: &Path) -> CompressedArtifact {
        let output = Self::output_path(source, output_dir);
        match self.encode(source, &output) {
            Ok(()) => {
                debug!(
                    "压缩完成: {} → {} (质量 {})",
                    source.display(),
                    output.display(),
                    self.quality
                );
                CompressedArtifact::temporary(output)
            }
            Err(e) => {
                warn!("⚠️ 压缩图片失败 {}: {}，使用原图上传", source.display(), e);
                // 写了一半的文件也不能留下
                let _ = fs::remove_file(&output);
                CompressedArtifact::original(source.to_path_buf())
            }
        }
    }

    /// 压缩图片（异步），解码和编码放到阻塞线程池执行
    pub async fn compress_async(&self, source: &Path, output_dir: &Path) -> CompressedArtifact {
        let this = *self;
        let source_buf = source.to_path_buf();
        let output_dir = output_dir.to_path_buf();
        match tokio::task::spawn_blocking(move || this.compress(&source_buf, &output_dir)).await {
            Ok(artifact) => artifact,
            Err(e) => {
                warn!("⚠️ 压缩任务异常 {}: {}，使用原图上传", source.display(), e);
                CompressedArtifact::original(source.to_path_buf())
            }
        }
    }

    fn encode(&self, source: &Path, output: &Path) -> anyhow::Result<()> {
        if let Some(parent) = output.parent() {
            fs::create_dir_all(parent)?;
        }
        let img = image::open(source)?;
        let rgb = DynamicImage::ImageRgb8(img.to_rgb8());

        let writer = BufWriter::new(File::create(output)?);
        let encoder = JpegEncoder::new_with_quality(writer, self.quality);
        rgb.write_with_encoder(encoder)?;
        Ok(())
    }
}

impl Default for Preprocessor {
    fn default() -> Self {
        Self::new(DEFAULT_JPEG_QUALITY)
    }
}
