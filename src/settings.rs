//! # 设置文件
//!
//! 设置以 camelCase JSON 保存，所有字段可选：缺省字段沿用 `EnhanceConfig` 默认值。
//! 文件不存在时视为“未配置”，不是错误。

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::enhance::{EnhanceConfig, OutputProfile};
use crate::error::AppError;

/// 用户可调整的增强设置。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EnhancerSettings {
    /// `lossless` / `standard` / `compact`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_profile: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jpeg_quality: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub brightness: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contrast: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quantize_step: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quantize_contrast: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_file_size_mb: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_endpoint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_api_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_timeout_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tracked_listings: Option<usize>,
}

impl EnhancerSettings {
    /// 从当前配置导出完整设置。
    pub fn from_config(config: &EnhanceConfig) -> Self {
        Self {
            output_profile: Some(config.infer_output_profile().as_str().to_string()),
            jpeg_quality: Some(config.jpeg_quality),
            brightness: Some(config.tone.brightness),
            contrast: Some(config.tone.contrast),
            quantize_step: Some(config.quantize.step),
            quantize_contrast: Some(config.quantize.contrast),
            max_file_size_mb: Some(config.max_file_size / 1024 / 1024),
            remote_endpoint: None,
            remote_api_key: None,
            remote_timeout_ms: Some(config.remote_timeout_ms),
            max_tracked_listings: Some(config.max_tracked_listings),
        }
    }

    /// 将设置叠加到配置上；先应用档位，再应用单项覆盖，最后整体校验。
    pub fn apply_to(&self, config: &mut EnhanceConfig) -> Result<(), AppError> {
        let mut candidate = config.clone();

        if let Some(profile) = &self.output_profile {
            candidate.apply_output_profile(OutputProfile::parse(profile)?);
        }
        if let Some(quality) = self.jpeg_quality {
            candidate.jpeg_quality = quality;
        }

        if let Some(brightness) = self.brightness {
            candidate.tone.brightness = brightness;
        }
        if let Some(contrast) = self.contrast {
            candidate.tone.contrast = contrast;
        }
        if let Some(step) = self.quantize_step {
            candidate.quantize.step = step;
        }
        if let Some(contrast) = self.quantize_contrast {
            candidate.quantize.contrast = contrast;
        }
        if let Some(size_mb) = self.max_file_size_mb {
            candidate.max_file_size = size_mb.saturating_mul(1024 * 1024);
        }
        if let Some(timeout) = self.remote_timeout_ms {
            candidate.remote_timeout_ms = timeout;
        }
        if let Some(listings) = self.max_tracked_listings {
            candidate.max_tracked_listings = listings;
        }

        candidate.validate()?;
        *config = candidate;
        Ok(())
    }
}

/// 读取设置文件；文件不存在时返回 `None`。
pub fn load_settings(path: impl AsRef<Path>) -> Result<Option<EnhancerSettings>, AppError> {
    let path = path.as_ref();
    if !path.exists() {
        return Ok(None);
    }

    let content = fs::read_to_string(path)?;
    let parsed = serde_json::from_str::<EnhancerSettings>(&content)
        .map_err(|e| AppError::Settings(format!("解析设置文件失败: {}", e)))?;

    log::info!("⚙️ 已加载设置文件：{}", path.display());
    Ok(Some(parsed))
}

/// 写入设置文件，必要时创建父目录。
pub fn save_settings(path: impl AsRef<Path>, settings: &EnhancerSettings) -> Result<(), AppError> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let content = serde_json::to_string_pretty(settings)
        .map_err(|e| AppError::Settings(format!("序列化设置失败: {}", e)))?;

    fs::write(path, content)?;
    Ok(())
}
