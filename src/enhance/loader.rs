//! # 加载与校验模块
//!
//! ## 设计思路
//!
//! 统一处理不同来源（Data URL / 本地文件）的原始字节加载，并在“尽可能早”的阶段执行输入校验。
//! 目标是尽快失败，减少不必要内存与 CPU 消耗。
//!
//! ## 实现思路
//!
//! - Data URL：`data:image/` 前缀 + `;base64,` 标记 + 解码前体积估算 + 签名校验。
//! - 文件：存在性 + metadata 体积限制 + 读取 + 按签名推断媒体类型。
//! - 所有失败统一映射到 `ImageError`，便于编排层区分“输入无效”与“处理失败”。

use base64::{Engine as _, engine::general_purpose};
use std::path::Path;

use super::{EncodedImage, ImageError, MediaType};

const DATA_URI_PREFIX: &str = "data:";
const BASE64_MARKER: &str = ";base64,";

impl EncodedImage {
    /// 从 Data URL 解析编码图片。
    ///
    /// # 示例
    /// ```rust
    /// use listing_enhancer::enhance::{EncodedImage, MediaType};
    ///
    /// let png = [137_u8, 80, 78, 71, 13, 10, 26, 10, 0, 0, 0, 13];
    /// let uri = EncodedImage::new(MediaType::Png, png.to_vec()).to_data_uri();
    /// let parsed = EncodedImage::from_data_uri(&uri, 1024)?;
    /// assert_eq!(parsed.media_type(), MediaType::Png);
    /// # Ok::<(), listing_enhancer::enhance::ImageError>(())
    /// ```
    pub fn from_data_uri(data: &str, max_file_size: u64) -> Result<Self, ImageError> {
        let normalized = data.trim();

        let Some(rest) = normalized.strip_prefix(DATA_URI_PREFIX) else {
            return Err(ImageError::InvalidFormat("缺少 data: 前缀".to_string()));
        };

        if !rest.to_ascii_lowercase().starts_with("image/") {
            return Err(ImageError::InvalidFormat("Data URL 不是图片类型".to_string()));
        }

        let marker = rest
            .find(BASE64_MARKER)
            .ok_or_else(|| ImageError::InvalidFormat("缺少 base64 标记".to_string()))?;

        let declared_mime = &rest[..marker];
        let declared = MediaType::from_mime(declared_mime).ok_or_else(|| {
            ImageError::InvalidFormat(format!("不支持的图片类型：{}", declared_mime))
        })?;

        let payload = &rest[marker + BASE64_MARKER.len()..];
        let estimated_len = estimate_base64_decoded_upper_bound_len(payload)?;
        if estimated_len > max_file_size {
            return Err(ImageError::ResourceLimit(format!(
                "Base64 预计解码体积过大：{:.2} MB（限制：{:.2} MB）",
                estimated_len as f64 / 1024.0 / 1024.0,
                max_file_size as f64 / 1024.0 / 1024.0
            )));
        }

        let bytes = general_purpose::STANDARD
            .decode(payload.trim())
            .map_err(|e| ImageError::InvalidFormat(format!("Base64 解码失败：{}", e)))?;

        let sniffed = sniff_media_type(&bytes)?;
        if sniffed != declared {
            log::debug!(
                "🔎 Data URL 声明类型 {} 与签名 {} 不一致，以签名为准",
                declared.mime(),
                sniffed.mime()
            );
        }

        Ok(Self::new(sniffed, bytes))
    }
}

/// 从本地路径加载编码图片（拍照/上传的落地文件）。
pub fn load_from_file(path: impl AsRef<Path>, max_file_size: u64) -> Result<EncodedImage, ImageError> {
    let file_path = path.as_ref();
    log::info!("📁 开始读取本地图片 - 路径: {}", file_path.display());

    if !file_path.exists() {
        return Err(ImageError::FileSystem(format!("文件不存在：{}", file_path.display())));
    }

    let metadata = std::fs::metadata(file_path)
        .map_err(|e| ImageError::FileSystem(format!("无法读取文件信息：{}", e)))?;

    if metadata.len() > max_file_size {
        return Err(ImageError::ResourceLimit(format!(
            "文件过大：{:.2} MB（限制：{:.2} MB）",
            metadata.len() as f64 / 1024.0 / 1024.0,
            max_file_size as f64 / 1024.0 / 1024.0
        )));
    }

    let bytes = std::fs::read(file_path)
        .map_err(|e| ImageError::FileSystem(format!("无法读取图片文件：{}", e)))?;
    let media_type = sniff_media_type(&bytes)?;

    Ok(EncodedImage::new(media_type, bytes))
}

fn estimate_base64_decoded_upper_bound_len(base64_data: &str) -> Result<u64, ImageError> {
    let len = base64_data.trim().len() as u64;
    let groups = len
        .checked_add(3)
        .ok_or_else(|| ImageError::ResourceLimit("Base64 输入长度溢出".to_string()))?
        / 4;

    groups
        .checked_mul(3)
        .ok_or_else(|| ImageError::ResourceLimit("Base64 解码体积估算溢出".to_string()))
}

/// 通过文件签名（magic bytes）识别媒体类型。
pub(crate) fn sniff_media_type(bytes: &[u8]) -> Result<MediaType, ImageError> {
    if bytes.is_empty() {
        return Err(ImageError::InvalidFormat("图片内容为空".to_string()));
    }

    let kind = infer::get(bytes)
        .ok_or_else(|| ImageError::InvalidFormat("无法识别图片类型".to_string()))?;

    if kind.matcher_type() != infer::MatcherType::Image {
        return Err(ImageError::InvalidFormat(format!(
            "文件签名不是图片类型：{}",
            kind.mime_type()
        )));
    }

    MediaType::from_mime(kind.mime_type()).ok_or_else(|| {
        ImageError::InvalidFormat(format!("不支持的图片类型：{}", kind.mime_type()))
    })
}
