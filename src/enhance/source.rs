//! # 数据模型
//!
//! ## 设计思路
//!
//! 将“外部编码图片”和“流水线中间结果”解耦：
//! - `EncodedImage` 表示带媒体类型的编码图片（概念上即 `data:<mime>;base64,...`）
//! - `RasterBuffer` 表示解码后的 RGBA 像素，只在单次变换期间存在
//!
//! `EncodedImage` 使用 `Bytes` 持有负载，克隆只增加引用计数，
//! 便于同一张原图同时填入多个槽位。

use base64::{Engine as _, engine::general_purpose};
use bytes::Bytes;
use image::ImageFormat;
use serde::{Serialize, Serializer};

/// 支持的图片媒体类型。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaType {
    Png,
    Jpeg,
    Webp,
    Gif,
    Bmp,
}

impl MediaType {
    /// 从 MIME 字符串解析（大小写不敏感，忽略参数）。
    pub fn from_mime(mime: &str) -> Option<Self> {
        let base = mime.split(';').next()?.trim().to_ascii_lowercase();
        match base.as_str() {
            "image/png" => Some(Self::Png),
            "image/jpeg" | "image/jpg" => Some(Self::Jpeg),
            "image/webp" => Some(Self::Webp),
            "image/gif" => Some(Self::Gif),
            "image/bmp" => Some(Self::Bmp),
            _ => None,
        }
    }

    pub fn mime(self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::Webp => "image/webp",
            Self::Gif => "image/gif",
            Self::Bmp => "image/bmp",
        }
    }

    /// 输出文件扩展名。
    pub fn extension(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpg",
            Self::Webp => "webp",
            Self::Gif => "gif",
            Self::Bmp => "bmp",
        }
    }

    pub(crate) fn image_format(self) -> ImageFormat {
        match self {
            Self::Png => ImageFormat::Png,
            Self::Jpeg => ImageFormat::Jpeg,
            Self::Webp => ImageFormat::WebP,
            Self::Gif => ImageFormat::Gif,
            Self::Bmp => ImageFormat::Bmp,
        }
    }
}

/// 编码后的图片：媒体类型 + 字节负载。创建后不可变。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    media_type: MediaType,
    bytes: Bytes,
}

impl EncodedImage {
    pub fn new(media_type: MediaType, bytes: impl Into<Bytes>) -> Self {
        Self {
            media_type,
            bytes: bytes.into(),
        }
    }

    pub fn media_type(&self) -> MediaType {
        self.media_type
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// 同一负载换一个媒体类型（负载共享，不复制）。
    pub fn with_media_type(&self, media_type: MediaType) -> Self {
        Self {
            media_type,
            bytes: self.bytes.clone(),
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// 渲染为 `data:<mime>;base64,<payload>` 形式。
    pub fn to_data_uri(&self) -> String {
        format!(
            "data:{};base64,{}",
            self.media_type.mime(),
            general_purpose::STANDARD.encode(&self.bytes)
        )
    }
}

/// 下游 UI 读取时直接得到 Data URL 字符串。
impl Serialize for EncodedImage {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_data_uri())
    }
}

/// 解码后的 RGBA 像素缓冲。
///
/// 不变式：`samples.len() == width * height * 4`，行优先、RGBA 交错排列。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RasterBuffer {
    /// 图像宽度（像素）。
    pub width: u32,
    /// 图像高度（像素）。
    pub height: u32,
    /// RGBA 字节数组。
    pub samples: Vec<u8>,
}

impl RasterBuffer {
    /// 用单一颜色填充的缓冲，主要用于测试与占位。
    pub fn filled(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let pixels = width as usize * height as usize;
        Self {
            width,
            height,
            samples: rgba.repeat(pixels),
        }
    }

    /// 期望的字节长度；溢出时返回 `None`。
    pub fn expected_len(width: u32, height: u32) -> Option<usize> {
        (width as usize)
            .checked_mul(height as usize)
            .and_then(|pixels| pixels.checked_mul(4))
    }

    /// 是否满足长度不变式。
    pub fn is_well_formed(&self) -> bool {
        Self::expected_len(self.width, self.height) == Some(self.samples.len())
    }

    /// 读取 `(x, y)` 处像素。
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = (y as usize * self.width as usize + x as usize) * 4;
        let px = self.samples.get(idx..idx + 4)?;
        Some([px[0], px[1], px[2], px[3]])
    }

    /// 对每个像素的 R/G/B 通道应用查找表，Alpha 原样保留。
    pub(crate) fn map_color_channels(&self, lut: &[u8; 256]) -> Self {
        let mut samples = self.samples.clone();
        for px in samples.chunks_exact_mut(4) {
            px[0] = lut[px[0] as usize];
            px[1] = lut[px[1] as usize];
            px[2] = lut[px[2] as usize];
        }
        Self {
            width: self.width,
            height: self.height,
            samples,
        }
    }
}
