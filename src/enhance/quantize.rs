//! # 色彩量化（“卡通”回退）
//!
//! 每个颜色通道先向下取整到步长的倍数（色阶化），再围绕 128 提升对比度，Alpha 不变。
//! 色阶化使用 `floor(v / step) * step`，不能换成四舍五入或其他分带方式，
//! 否则输出与既有结果不一致。

use super::config::TONE_MIDPOINT;
use super::{QuantizeParameters, RasterBuffer};

/// 对比度之前的色阶值，恒为 `step` 的整数倍。
pub fn quantize_level(value: u8, step: u8) -> u8 {
    let step = step.max(1);
    (value / step) * step
}

/// 单个通道值的量化 + 对比度变换。
pub fn stylize_channel(value: u8, params: &QuantizeParameters) -> u8 {
    let level = quantize_level(value, params.step) as f64;
    let contrasted = ((level - TONE_MIDPOINT) * params.contrast + TONE_MIDPOINT).clamp(0.0, 255.0);
    contrasted.round() as u8
}

fn stylize_lut(params: &QuantizeParameters) -> [u8; 256] {
    let mut lut = [0_u8; 256];
    for (value, slot) in lut.iter_mut().enumerate() {
        *slot = stylize_channel(value as u8, params);
    }
    lut
}

/// 对整张图应用卡通化效果。
pub fn stylize(buffer: &RasterBuffer, params: &QuantizeParameters) -> RasterBuffer {
    buffer.map_color_channels(&stylize_lut(params))
}
