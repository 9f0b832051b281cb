//! # 像素增强引擎（enhance）
//!
//! ## 设计思路
//!
//! 远程 AI 图片服务不可用时，本模块在本地生成“增强”与“卡通”两个变体。
//! 按职责拆分为多个子模块，避免单文件膨胀与耦合。
//!
//! - `source`：编码图片 / 像素缓冲等数据模型
//! - `loader`：Data URL / 本地文件加载与签名校验
//! - `pipeline`：解码（含尺寸上限）与重新编码
//! - `tone`：亮度 + 对比度
//! - `quantize`：色阶化 + 对比度
//! - `handler`：`ImageEnhancer` 编排单张图片的两路回退
//! - `config/error`：配置与错误
//!
//! ## 调用链
//!
//! ```text
//! EncodedImage
//!    ↓
//! pipeline::decode（尺寸/内存上限）
//!    ↓
//! RasterBuffer ──┬─ tone::adjust_tone ──┐
//!                └─ quantize::stylize ──┤
//!                                       ↓
//!                          pipeline::encode（输出档位）
//!                                       ↓
//!                                 EncodedImage
//! ```

mod config;
mod error;
mod handler;
mod loader;
pub mod pipeline;
pub mod quantize;
mod source;
pub mod tone;

pub use config::{EnhanceConfig, OutputProfile, QuantizeParameters, ToneParameters};
pub use error::ImageError;
pub use handler::{ImageEnhancer, LocalFallbackOutput, LocalVariant};
pub use loader::load_from_file;
pub use pipeline::{decode, encode};
pub use quantize::stylize;
pub use source::{EncodedImage, MediaType, RasterBuffer};
pub use tone::adjust_tone;

pub(crate) use loader::sniff_media_type;
