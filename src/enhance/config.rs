//! # 配置模块
//!
//! ## 设计思路
//!
//! 将所有“可调策略”集中到 `EnhanceConfig`，保证运行时行为可观测、可调整、可测试。
//! 色调与量化常量（1.1 / 1.1 / 32 / 1.5）只作为默认值存在，不写死在算法里。
//! 输出档位（lossless / standard / compact）作为高层语义，映射到底层编码参数。
//!
//! ## 实现思路
//!
//! - `Default` 提供与线上一致的回退效果。
//! - `OutputProfile` 负责档位字符串解析与反向输出。
//! - `apply_output_profile` 将档位转换为具体编码参数。
//! - `infer_output_profile` 用于从当前配置反推档位。

use super::{ImageError, MediaType};

/// 色调调整的中点。
pub const TONE_MIDPOINT: f64 = 128.0;

/// 亮度 / 对比度参数。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ToneParameters {
    /// 亮度倍数。
    pub brightness: f64,
    /// 对比度倍数（围绕 128）。
    pub contrast: f64,
}

impl Default for ToneParameters {
    fn default() -> Self {
        Self {
            brightness: 1.1,
            contrast: 1.1,
        }
    }
}

impl ToneParameters {
    pub fn validate(&self) -> Result<(), ImageError> {
        validate_multiplier("brightness", self.brightness)?;
        validate_multiplier("contrast", self.contrast)
    }
}

/// 色彩量化（卡通化）参数。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuantizeParameters {
    /// 量化步长，每个通道最多保留 `ceil(256 / step)` 个色阶。
    pub step: u8,
    /// 量化后的对比度倍数（围绕 128）。
    pub contrast: f64,
}

impl Default for QuantizeParameters {
    fn default() -> Self {
        Self {
            step: 32,
            contrast: 1.5,
        }
    }
}

impl QuantizeParameters {
    pub fn validate(&self) -> Result<(), ImageError> {
        if self.step == 0 {
            return Err(ImageError::InvalidParameter("量化步长不能为 0".to_string()));
        }
        validate_multiplier("contrast", self.contrast)
    }
}

fn validate_multiplier(name: &str, value: f64) -> Result<(), ImageError> {
    if !value.is_finite() || !(0.0..=16.0).contains(&value) {
        return Err(ImageError::InvalidParameter(format!(
            "{} 必须在 0~16 之间，当前：{}",
            name, value
        )));
    }
    Ok(())
}

/// 增强流水线配置。
///
/// 字段覆盖了加载、解码、变换、编码与远程调用五个阶段。
#[derive(Debug, Clone)]
pub struct EnhanceConfig {
    /// 读取原始字节时允许的最大体积（字节）。
    pub max_file_size: u64,
    /// 解码后的像素上限（`width * height`）。
    pub max_decoded_pixels: u64,
    /// 解码阶段允许的预计内存上限（按 RGBA 估算，字节）。
    pub max_decoded_bytes: u64,
    /// “增强”回退参数。
    pub tone: ToneParameters,
    /// “卡通”回退参数。
    pub quantize: QuantizeParameters,
    /// 回退结果的输出格式。
    pub output_media_type: MediaType,
    /// 有损编码质量（1~100）。
    pub jpeg_quality: u8,
    /// 单次远程生成调用的超时（毫秒），超时按远程失败处理。
    pub remote_timeout_ms: u64,
    /// 草稿存储最多跟踪的商品数（LRU 淘汰）。
    pub max_tracked_listings: usize,
}

impl Default for EnhanceConfig {
    fn default() -> Self {
        Self {
            max_file_size: 50 * 1024 * 1024,
            max_decoded_pixels: 40_000_000,
            max_decoded_bytes: 160 * 1024 * 1024,
            tone: ToneParameters::default(),
            quantize: QuantizeParameters::default(),
            output_media_type: MediaType::Jpeg,
            jpeg_quality: 90,
            remote_timeout_ms: 30_000,
            max_tracked_listings: 64,
        }
    }
}

/// 输出档位（面向产品语义）。
///
/// - `Lossless`：PNG，保留透明度
/// - `Standard`：JPEG 90，与浏览器端回退一致
/// - `Compact`：JPEG 75，体积优先
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputProfile {
    Lossless,
    Standard,
    Compact,
}

impl OutputProfile {
    /// 从外部字符串解析档位。
    ///
    /// # 示例
    /// ```rust
    /// use listing_enhancer::enhance::OutputProfile;
    ///
    /// let p = OutputProfile::parse("standard")?;
    /// assert_eq!(p.as_str(), "standard");
    /// # Ok::<(), listing_enhancer::enhance::ImageError>(())
    /// ```
    pub fn parse(profile: &str) -> Result<Self, ImageError> {
        match profile.trim().to_lowercase().as_str() {
            "lossless" => Ok(Self::Lossless),
            "standard" => Ok(Self::Standard),
            "compact" => Ok(Self::Compact),
            other => Err(ImageError::InvalidParameter(format!(
                "未知输出档位：{}（可选：lossless / standard / compact）",
                other
            ))),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Lossless => "lossless",
            Self::Standard => "standard",
            Self::Compact => "compact",
        }
    }
}

impl EnhanceConfig {
    /// 基于当前参数反推输出档位。
    pub fn infer_output_profile(&self) -> OutputProfile {
        if self.output_media_type != MediaType::Jpeg {
            return OutputProfile::Lossless;
        }

        if self.jpeg_quality <= 80 {
            return OutputProfile::Compact;
        }

        OutputProfile::Standard
    }

    /// 应用指定输出档位到实际参数。
    pub fn apply_output_profile(&mut self, profile: OutputProfile) {
        match profile {
            OutputProfile::Lossless => {
                self.output_media_type = MediaType::Png;
            }
            OutputProfile::Standard => {
                self.output_media_type = MediaType::Jpeg;
                self.jpeg_quality = 90;
            }
            OutputProfile::Compact => {
                self.output_media_type = MediaType::Jpeg;
                self.jpeg_quality = 75;
            }
        }
    }

    /// 整体校验，加载外部设置后调用。
    pub fn validate(&self) -> Result<(), ImageError> {
        self.tone.validate()?;
        self.quantize.validate()?;
        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(ImageError::InvalidParameter(format!(
                "jpeg_quality 必须在 1~100 之间，当前：{}",
                self.jpeg_quality
            )));
        }
        if !matches!(self.output_media_type, MediaType::Png | MediaType::Jpeg) {
            return Err(ImageError::InvalidParameter(format!(
                "不支持的输出格式：{}",
                self.output_media_type.mime()
            )));
        }
        if !(100..=600_000).contains(&self.remote_timeout_ms) {
            return Err(ImageError::InvalidParameter(
                "remote_timeout_ms 必须在 100~600000 毫秒之间".to_string(),
            ));
        }
        if self.max_decoded_bytes < 8 * 1024 * 1024 {
            return Err(ImageError::InvalidParameter("max_decoded_bytes 不能小于 8MB".to_string()));
        }
        if self.max_file_size == 0 {
            return Err(ImageError::InvalidParameter("max_file_size 不能为 0".to_string()));
        }
        if self.max_tracked_listings == 0 {
            return Err(ImageError::InvalidParameter("max_tracked_listings 不能为 0".to_string()));
        }
        Ok(())
    }
}
