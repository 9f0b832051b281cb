//! # 色调调整（“增强”回退）
//!
//! 对每个颜色通道先乘亮度，再围绕 128 拉伸对比度，Alpha 不变。
//! 顺序不可交换：对比度作用在已提亮的值上。
//!
//! 每个通道值只依赖自身，因此先生成 256 项查找表，再整图映射。

use super::config::TONE_MIDPOINT;
use super::{RasterBuffer, ToneParameters};

/// 单个通道值的色调变换（浮点中间值，最后一步取整）。
pub fn tone_channel(value: u8, params: &ToneParameters) -> u8 {
    let brightened = (value as f64 * params.brightness).clamp(0.0, 255.0);
    let contrasted = ((brightened - TONE_MIDPOINT) * params.contrast + TONE_MIDPOINT).clamp(0.0, 255.0);
    contrasted.round() as u8
}

fn tone_lut(params: &ToneParameters) -> [u8; 256] {
    let mut lut = [0_u8; 256];
    for (value, slot) in lut.iter_mut().enumerate() {
        *slot = tone_channel(value as u8, params);
    }
    lut
}

/// 对整张图应用亮度 + 对比度。
///
/// 非幂等：重复调用会叠加提亮与对比度。
pub fn adjust_tone(buffer: &RasterBuffer, params: &ToneParameters) -> RasterBuffer {
    buffer.map_color_channels(&tone_lut(params))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mid_gray_becomes_108() {
        let params = ToneParameters::default();
        let input = RasterBuffer::filled(2, 2, [100, 100, 100, 255]);

        let output = adjust_tone(&input, &params);

        assert_eq!(output.samples, [108, 108, 108, 255].repeat(4));
    }

    #[test]
    fn brightness_applies_before_contrast() {
        let params = ToneParameters { brightness: 2.0, contrast: 2.0 };
        // 100 -> 200 -> (200-128)*2+128 = 272 -> 255
        assert_eq!(tone_channel(100, &params), 255);
        // 反序会得到 (100-128)*2+128 = 72 -> 144
    }

    #[test]
    fn identity_parameters_keep_values() {
        let params = ToneParameters { brightness: 1.0, contrast: 1.0 };
        for value in 0..=255_u8 {
            assert_eq!(tone_channel(value, &params), value);
        }
    }

    #[test]
    fn default_tone_rounds_on_double_precision() {
        let params = ToneParameters::default();
        // 30 -> 33.0 -> 23.4999... -> 23（单精度会得到 23.5 -> 24）
        assert_eq!(tone_channel(30, &params), 23);
        // 130 -> 143.0 -> 144.5 -> 145
        assert_eq!(tone_channel(130, &params), 145);
    }

    #[test]
    fn extremes_are_clamped() {
        let params = ToneParameters::default();
        assert_eq!(tone_channel(255, &params), 255);
        assert_eq!(tone_channel(0, &params), 0);
    }

    #[test]
    fn applying_twice_compounds() {
        let params = ToneParameters::default();
        let input = RasterBuffer::filled(1, 1, [200, 200, 200, 255]);

        let once = adjust_tone(&input, &params);
        let twice = adjust_tone(&once, &params);

        // 200 -> 220 -> 229.2 -> 229；229 -> 251.9 -> 264.3 -> 255
        assert_eq!(once.samples, vec![229, 229, 229, 255]);
        assert_eq!(twice.samples, vec![255, 255, 255, 255]);
        assert_ne!(once, twice);
    }

    #[test]
    fn alpha_is_untouched() {
        let params = ToneParameters::default();
        let input = RasterBuffer {
            width: 2,
            height: 1,
            samples: vec![10, 20, 30, 0, 40, 50, 60, 77],
        };

        let output = adjust_tone(&input, &params);

        assert_eq!(output.samples[3], 0);
        assert_eq!(output.samples[7], 77);
    }
}
