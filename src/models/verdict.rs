//! 分析结论

use crate::models::image::{ImageId, UploadedHandle};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::{self, Display};
use std::path::PathBuf;

/// 分类结果
///
/// `Unknown` 表示"无法判断"，与普通的 `No` 不同
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Classification {
    Yes,
    No,
    Unknown,
}

impl Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Classification::Yes => "yes",
            Classification::No => "no",
            Classification::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// 单张图片的结论
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnalysisVerdict {
    pub image_id: ImageId,
    pub classification: Classification,
    pub explanation: String,
    /// 对应的源文件（编号与上传顺序对齐时才有）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_path: Option<PathBuf>,
}

impl AnalysisVerdict {
    pub fn new(image_id: ImageId, classification: Classification, explanation: String) -> Self {
        Self {
            image_id,
            classification,
            explanation,
            source_path: None,
        }
    }
}

/// 图片编号 → 结论
///
/// 由响应解析器一次性构建，交给调用方后不再修改
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ResultSet {
    entries: BTreeMap<ImageId, AnalysisVerdict>,
}

impl ResultSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// 插入结论；编号已存在时保留先出现的那条并返回 false
    pub(crate) fn insert(&mut self, verdict: AnalysisVerdict) -> bool {
        if self.entries.contains_key(&verdict.image_id) {
            return false;
        }
        self.entries.insert(verdict.image_id, verdict);
        true
    }

    /// 按上传顺序把 `image_N` 对应到第 N 个句柄的源文件
    ///
    /// 没有对应句柄的编号会被移出结果，一并返回
    pub(crate) fn attach_sources(mut self, handles: &[UploadedHandle]) -> (Self, Vec<ImageId>) {
        let mut dropped = Vec::new();
        self.entries.retain(|id, verdict| {
            let handle = (id.number() as usize)
                .checked_sub(1)
                .and_then(|i| handles.get(i));
            match handle {
                Some(handle) => {
                    verdict.source_path = Some(handle.source_path.clone());
                    true
                }
                None => {
                    dropped.push(*id);
                    false
                }
            }
        });
        (self, dropped)
    }

    pub fn get(&self, id: ImageId) -> Option<&AnalysisVerdict> {
        self.entries.get(&id)
    }

    pub fn contains(&self, id: ImageId) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = ImageId> + '_ {
        self.entries.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &AnalysisVerdict> {
        self.entries.values()
    }

    /// 统计某一分类的数量
    pub fn count(&self, classification: Classification) -> usize {
        self.entries
            .values()
            .filter(|v| v.classification == classification)
            .count()
    }
}
