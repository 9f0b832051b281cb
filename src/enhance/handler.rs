//! # 本地增强编排模块
//!
//! ## 设计思路
//!
//! `ImageEnhancer` 只负责流程编排与配置管理，不直接与远程服务或草稿存储绑定。
//! 单张图片的处理链路固定为：
//! 1. 读取配置快照
//! 2. 解码原图为 RGBA
//! 3. 色调调整 / 色彩量化
//! 4. 按输出档位重新编码
//!
//! ## 实现思路
//!
//! - 配置通过 `Arc<RwLock<EnhanceConfig>>` 支持运行时动态调整。
//! - 单次请求内使用“同一配置快照”，避免处理中途配置漂移。
//! - 两条回退变换互不依赖，各自放到阻塞线程执行后并发等待，不阻塞 async 运行时。
//! - 记录 `decode/transform/encode` 阶段耗时，便于性能诊断。

use std::sync::{Arc, RwLock};
use std::time::Instant;

use super::{
    pipeline, quantize, tone, EncodedImage, EnhanceConfig, ImageError, OutputProfile,
    QuantizeParameters, RasterBuffer, ToneParameters,
};

/// 回退变体种类。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalVariant {
    /// 亮度 + 对比度。
    Enhanced,
    /// 色阶化 + 对比度。
    Cartoon,
}

impl LocalVariant {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Enhanced => "enhanced",
            Self::Cartoon => "cartoon",
        }
    }
}

/// 一次本地回退的两路结果，各自独立成功或失败。
#[derive(Debug)]
pub struct LocalFallbackOutput {
    pub enhanced: Result<EncodedImage, ImageError>,
    pub cartoon: Result<EncodedImage, ImageError>,
}

/// 本地像素增强器。
///
/// 克隆只复制配置句柄，所有克隆共享同一份配置。
#[derive(Debug, Clone)]
pub struct ImageEnhancer {
    config: Arc<RwLock<EnhanceConfig>>,
}

impl ImageEnhancer {
    /// 根据初始配置创建增强器，配置非法时直接拒绝。
    ///
    /// # 示例
    /// ```rust
    /// use listing_enhancer::enhance::{EnhanceConfig, ImageEnhancer};
    ///
    /// let enhancer = ImageEnhancer::new(EnhanceConfig::default())?;
    /// # Ok::<(), listing_enhancer::enhance::ImageError>(())
    /// ```
    pub fn new(config: EnhanceConfig) -> Result<Self, ImageError> {
        config.validate()?;
        Ok(Self {
            config: Arc::new(RwLock::new(config)),
        })
    }

    /// 获取配置快照。
    ///
    /// 作用：保证单次请求链路使用一致参数。
    pub fn config_snapshot(&self) -> Result<EnhanceConfig, ImageError> {
        self.config
            .read()
            .map(|cfg| cfg.clone())
            .map_err(|_| ImageError::ConfigLock("读取锁已中毒".to_string()))
    }

    fn update_config<F>(&self, update: F) -> Result<(), ImageError>
    where
        F: FnOnce(&mut EnhanceConfig),
    {
        let mut config = self
            .config
            .write()
            .map_err(|_| ImageError::ConfigLock("写入锁已中毒".to_string()))?;

        let mut candidate = config.clone();
        update(&mut candidate);
        candidate.validate()?;
        *config = candidate;
        Ok(())
    }

    /// 设置输出档位。
    pub fn set_output_profile(&self, profile: OutputProfile) -> Result<(), ImageError> {
        self.update_config(|config| config.apply_output_profile(profile))?;
        log::info!("⚙️ 已切换输出档位：{}", profile.as_str());
        Ok(())
    }

    /// 获取当前生效档位。
    pub fn get_output_profile(&self) -> Result<OutputProfile, ImageError> {
        Ok(self.config_snapshot()?.infer_output_profile())
    }

    /// 调整“增强”回退参数。
    pub fn set_tone_parameters(&self, params: ToneParameters) -> Result<(), ImageError> {
        self.update_config(|config| config.tone = params)?;
        log::info!(
            "⚙️ 色调参数已更新（brightness={}, contrast={}）",
            params.brightness,
            params.contrast
        );
        Ok(())
    }

    /// 调整“卡通”回退参数。
    pub fn set_quantize_parameters(&self, params: QuantizeParameters) -> Result<(), ImageError> {
        self.update_config(|config| config.quantize = params)?;
        log::info!(
            "⚙️ 量化参数已更新（step={}, contrast={}）",
            params.step,
            params.contrast
        );
        Ok(())
    }

    /// 整体替换配置（例如重新加载设置文件后）。
    pub fn replace_config(&self, next: EnhanceConfig) -> Result<(), ImageError> {
        self.update_config(|config| *config = next)
    }

    /// 生成“增强”变体：解码 → 色调调整 → 编码。
    pub fn enhance_locally(&self, original: &EncodedImage) -> Result<EncodedImage, ImageError> {
        let config = self.config_snapshot()?;
        Self::render_variant(original, &config, LocalVariant::Enhanced)
    }

    /// 生成“卡通”变体：解码 → 色彩量化 → 编码。
    pub fn cartoonize_locally(&self, original: &EncodedImage) -> Result<EncodedImage, ImageError> {
        let config = self.config_snapshot()?;
        Self::render_variant(original, &config, LocalVariant::Cartoon)
    }

    /// 本地回退主入口：两路变换并发执行，互不影响。
    ///
    /// # 示例
    /// ```rust,no_run
    /// use listing_enhancer::enhance::{load_from_file, EnhanceConfig, ImageEnhancer};
    ///
    /// # async fn demo() -> Result<(), listing_enhancer::enhance::ImageError> {
    /// let enhancer = ImageEnhancer::new(EnhanceConfig::default())?;
    /// let original = load_from_file("photo.jpg", 50 * 1024 * 1024)?;
    /// let output = enhancer.run_local_fallback(original).await;
    /// let _enhanced = output.enhanced?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn run_local_fallback(&self, original: EncodedImage) -> LocalFallbackOutput {
        let config = match self.config_snapshot() {
            Ok(config) => config,
            Err(err) => {
                return LocalFallbackOutput {
                    enhanced: Err(err.clone()),
                    cartoon: Err(err),
                };
            }
        };

        let total_start = Instant::now();

        let enhanced_task = {
            let original = original.clone();
            let config = config.clone();
            tokio::task::spawn_blocking(move || {
                Self::render_variant(&original, &config, LocalVariant::Enhanced)
            })
        };
        let cartoon_task = tokio::task::spawn_blocking(move || {
            Self::render_variant(&original, &config, LocalVariant::Cartoon)
        });

        let (enhanced, cartoon) = tokio::join!(enhanced_task, cartoon_task);
        let enhanced = enhanced
            .map_err(|e| ImageError::Task(format!("增强线程执行失败：{}", e)))
            .and_then(|result| result);
        let cartoon = cartoon
            .map_err(|e| ImageError::Task(format!("卡通线程执行失败：{}", e)))
            .and_then(|result| result);

        log::info!(
            "✅ 本地回退完成 - enhanced={} cartoon={} total={}ms",
            if enhanced.is_ok() { "ok" } else { "failed" },
            if cartoon.is_ok() { "ok" } else { "failed" },
            total_start.elapsed().as_millis()
        );

        LocalFallbackOutput { enhanced, cartoon }
    }

    /// 单路变体的完整链路（阻塞执行）。
    fn render_variant(
        original: &EncodedImage,
        config: &EnhanceConfig,
        variant: LocalVariant,
    ) -> Result<EncodedImage, ImageError> {
        let decode_start = Instant::now();
        let raster = pipeline::decode(original, config)?;
        let decode_elapsed = decode_start.elapsed();

        let transform_start = Instant::now();
        let transformed = Self::apply_variant(&raster, config, variant);
        drop(raster);
        let transform_elapsed = transform_start.elapsed();

        let encode_start = Instant::now();
        let encoded = pipeline::encode(
            &transformed,
            config.output_media_type,
            config.jpeg_quality,
        )?;
        let encode_elapsed = encode_start.elapsed();

        log::debug!(
            "🎨 {} 变体完成 - {}x{} decode={}ms transform={}ms encode={}ms",
            variant.as_str(),
            transformed.width,
            transformed.height,
            decode_elapsed.as_millis(),
            transform_elapsed.as_millis(),
            encode_elapsed.as_millis()
        );

        Ok(encoded)
    }

    fn apply_variant(raster: &RasterBuffer, config: &EnhanceConfig, variant: LocalVariant) -> RasterBuffer {
        match variant {
            LocalVariant::Enhanced => tone::adjust_tone(raster, &config.tone),
            LocalVariant::Cartoon => quantize::stylize(raster, &config.quantize),
        }
    }
}
