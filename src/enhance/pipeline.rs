//! # 解码与编码流水线模块
//!
//! ## 设计思路
//!
//! 将“字节 → 图像 → RGBA”以及反向的“RGBA → 字节”集中管理，并在关键节点增加资源上限控制。
//! 优先做尺寸检查，再进行完整解码，降低恶意输入触发高内存开销的风险。
//!
//! ## 实现思路
//!
//! 1. 按媒体类型读取 header 尺寸
//! 2. 零尺寸 / 像素上限 / 内存上限快速拒绝
//! 3. 完整解码并转换 RGBA，校验字节长度一致性
//! 4. 编码前校验缓冲不变式；JPEG 丢弃 Alpha，PNG 保留 RGBA

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder, ImageReader};
use std::io::Cursor;

use super::{EncodedImage, EnhanceConfig, ImageError, MediaType, RasterBuffer};

/// 将编码图片解码为 RGBA 像素缓冲，宽高等于图片固有尺寸。
pub fn decode(image: &EncodedImage, config: &EnhanceConfig) -> Result<RasterBuffer, ImageError> {
    let format = image.media_type().image_format();

    let (header_width, header_height) = inspect_dimensions(image)?;
    validate_dimensions(config, header_width, header_height)?;

    let decoded = image::load_from_memory_with_format(image.bytes(), format)
        .map_err(|e| ImageError::Decode(format!("图片解码失败：{}", e)))?;

    let rgba = decoded.to_rgba8();
    let (width, height) = rgba.dimensions();
    validate_dimensions(config, width, height)?;

    let samples = rgba.into_raw();
    let buffer = RasterBuffer {
        width,
        height,
        samples,
    };

    if !buffer.is_well_formed() {
        return Err(ImageError::Decode("解码后像素数据长度异常".to_string()));
    }

    log::debug!(
        "🧩 图片解码成功 - 类型: {} 尺寸: {}x{}",
        image.media_type().mime(),
        width,
        height
    );

    Ok(buffer)
}

/// 将 RGBA 缓冲重新编码。
///
/// `quality` 仅对 JPEG 生效（1~100）。JPEG 不支持透明度，Alpha 会被丢弃。
pub fn encode(
    buffer: &RasterBuffer,
    media_type: MediaType,
    quality: u8,
) -> Result<EncodedImage, ImageError> {
    if !buffer.is_well_formed() {
        return Err(ImageError::Encode(format!(
            "像素缓冲长度与尺寸不一致：{} 字节（期望 {}x{}x4）",
            buffer.samples.len(),
            buffer.width,
            buffer.height
        )));
    }

    if buffer.width == 0 || buffer.height == 0 {
        return Err(ImageError::Encode("不能编码零尺寸图片".to_string()));
    }

    let mut cursor = Cursor::new(Vec::new());

    match media_type {
        MediaType::Png => {
            PngEncoder::new(&mut cursor)
                .write_image(
                    &buffer.samples,
                    buffer.width,
                    buffer.height,
                    ExtendedColorType::Rgba8,
                )
                .map_err(|e| ImageError::Encode(format!("PNG 编码失败：{}", e)))?;
        }
        MediaType::Jpeg => {
            let rgb: Vec<u8> = buffer
                .samples
                .chunks_exact(4)
                .flat_map(|px| [px[0], px[1], px[2]])
                .collect();

            JpegEncoder::new_with_quality(&mut cursor, quality.clamp(1, 100))
                .encode(&rgb, buffer.width, buffer.height, ExtendedColorType::Rgb8)
                .map_err(|e| ImageError::Encode(format!("JPEG 编码失败：{}", e)))?;
        }
        other => {
            return Err(ImageError::Encode(format!(
                "不支持的输出格式：{}",
                other.mime()
            )));
        }
    }

    Ok(EncodedImage::new(media_type, cursor.into_inner()))
}

/// 仅通过图片头信息读取宽高。
///
/// 用于在完整解码前做像素限制检查。
fn inspect_dimensions(image: &EncodedImage) -> Result<(u32, u32), ImageError> {
    let reader = ImageReader::with_format(Cursor::new(image.bytes()), image.media_type().image_format());

    reader
        .into_dimensions()
        .map_err(|e| ImageError::Decode(format!("无法读取图片尺寸：{}", e)))
}

/// 校验零尺寸、像素数量与预计内存是否超过配置上限。
fn validate_dimensions(config: &EnhanceConfig, width: u32, height: u32) -> Result<(), ImageError> {
    if width == 0 || height == 0 {
        return Err(ImageError::Decode(format!("图片尺寸无效：{}x{}", width, height)));
    }

    let pixels = (width as u64)
        .checked_mul(height as u64)
        .ok_or_else(|| ImageError::ResourceLimit("图片像素数溢出".to_string()))?;

    if pixels > config.max_decoded_pixels {
        return Err(ImageError::ResourceLimit(format!(
            "图片像素过大：{} 像素（限制：{} 像素）",
            pixels, config.max_decoded_pixels
        )));
    }

    let estimated = pixels
        .checked_mul(4)
        .ok_or_else(|| ImageError::ResourceLimit("图片解码内存估算溢出".to_string()))?;

    if estimated > config.max_decoded_bytes {
        return Err(ImageError::ResourceLimit(format!(
            "图片解码预计内存过大：{:.2} MB（限制：{:.2} MB）",
            estimated as f64 / 1024.0 / 1024.0,
            config.max_decoded_bytes as f64 / 1024.0 / 1024.0
        )));
    }

    Ok(())
}
