//! 图片处理上下文
//!
//! 封装"我正在处理这一批中的第几张图"这一信息

use std::fmt::Display;
use std::path::PathBuf;

/// 图片处理上下文
#[derive(Debug, Clone)]
pub struct ImageCtx {
    /// 在输入列表中的位置（从1开始，仅用于日志显示）
    pub position: usize,

    /// 本批图片总数
    pub total: usize,

    /// 源文件
    pub source_path: PathBuf,
}

impl ImageCtx {
    /// 创建新的图片上下文
    pub fn new(position: usize, total: usize, source_path: PathBuf) -> Self {
        Self {
            position,
            total,
            source_path,
        }
    }

    pub fn file_name(&self) -> String {
        crate::models::image::display_name(&self.source_path)
    }
}

impl Display for ImageCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[图片 {}/{} {}]", self.position, self.total, self.file_name())
    }
}
