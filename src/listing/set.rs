//! 商品图片集合数据模型

use serde::Serialize;

use crate::enhance::EncodedImage;

/// 变体图片的来源。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EnhancementSource {
    /// 远程 AI 生成。
    Remote,
    /// 本地像素回退（至少一个槽位由本地流水线生成）。
    LocalFallback,
    /// 两个槽位都复用了原图。
    Original,
}

impl EnhancementSource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Remote => "remote",
            Self::LocalFallback => "local_fallback",
            Self::Original => "original",
        }
    }
}

/// 某个商品草稿的三张图。
///
/// 每个槽位要么为空，要么是一张完整的编码图片。
/// 处理中只有 `original`，处理完成后 `enhanced` / `cartoon` 同时写入。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingImageSet {
    pub original: Option<EncodedImage>,
    pub enhanced: Option<EncodedImage>,
    pub cartoon: Option<EncodedImage>,
    pub source: Option<EnhancementSource>,
    /// 写入该集合的拍摄代次。
    pub generation: u64,
    /// 最后更新时间（毫秒时间戳）。
    pub updated_at: i64,
}

impl ListingImageSet {
    /// 新一次拍摄：只有原图。
    pub fn captured(original: EncodedImage, generation: u64) -> Self {
        Self {
            original: Some(original),
            enhanced: None,
            cartoon: None,
            source: None,
            generation,
            updated_at: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// 两个变体槽位均已填充。
    pub fn is_complete(&self) -> bool {
        self.original.is_some() && self.enhanced.is_some() && self.cartoon.is_some()
    }

    /// 是否仍在等待变体。
    pub fn is_pending(&self) -> bool {
        self.source.is_none()
    }
}
