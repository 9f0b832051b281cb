//! # 错误模型模块
//!
//! ## 设计思路
//!
//! 使用单一错误枚举承载像素流水线中的所有错误来源，避免字符串拼接式错误处理。
//! 通过 `thiserror` 保持人类可读错误，同时让调用侧可按分支匹配。
//! `code()` / `stage()` 输出稳定字符串，供日志检索与上层展示。

/// 图片增强流水线统一错误类型。
///
/// 回退路径中的 `Decode` / `Encode` 会被编排层吞掉并降级为原图，
/// 其余分支在编排层被上转为 `AppError`。
#[derive(Debug, Clone, thiserror::Error)]
pub enum ImageError {
    #[error("解码错误：{0}")]
    Decode(String),

    #[error("编码错误：{0}")]
    Encode(String),

    #[error("格式错误：{0}")]
    InvalidFormat(String),

    #[error("参数错误：{0}")]
    InvalidParameter(String),

    #[error("资源限制：{0}")]
    ResourceLimit(String),

    #[error("文件错误：{0}")]
    FileSystem(String),

    #[error("后台任务失败：{0}")]
    Task(String),

    #[error("配置锁不可用：{0}")]
    ConfigLock(String),
}

impl ImageError {
    /// 机器可读错误码。
    pub fn code(&self) -> &'static str {
        match self {
            Self::Decode(_) => "decode_failed",
            Self::Encode(_) => "encode_failed",
            Self::InvalidFormat(_) => "invalid_format",
            Self::InvalidParameter(_) => "invalid_parameter",
            Self::ResourceLimit(_) => "resource_limit",
            Self::FileSystem(_) => "file_system",
            Self::Task(_) => "task_failed",
            Self::ConfigLock(_) => "config_unavailable",
        }
    }

    /// 出错所在阶段。
    pub fn stage(&self) -> &'static str {
        match self {
            Self::InvalidFormat(_) | Self::FileSystem(_) => "load",
            Self::Decode(_) | Self::ResourceLimit(_) => "decode",
            Self::InvalidParameter(_) | Self::ConfigLock(_) => "config",
            Self::Encode(_) => "encode",
            Self::Task(_) => "transform",
        }
    }

    /// 输入图片本身无效（而非处理过程失败）。
    ///
    /// 这类错误无法通过回退挽救，因为没有可处理的原图。
    pub fn is_invalid_input(&self) -> bool {
        matches!(self, Self::InvalidFormat(_) | Self::FileSystem(_))
    }
}

impl From<ImageError> for String {
    fn from(error: ImageError) -> Self {
        error.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_and_stages_are_stable() {
        let err = ImageError::Decode("bad".into());
        assert_eq!(err.code(), "decode_failed");
        assert_eq!(err.stage(), "decode");

        let err = ImageError::Encode("bad".into());
        assert_eq!(err.code(), "encode_failed");
        assert_eq!(err.stage(), "encode");

        let err = ImageError::ConfigLock("poisoned".into());
        assert_eq!(err.code(), "config_unavailable");
        assert_eq!(err.stage(), "config");
        assert!(!err.is_invalid_input());
    }

    #[test]
    fn only_load_errors_count_as_invalid_input() {
        assert!(ImageError::InvalidFormat("x".into()).is_invalid_input());
        assert!(!ImageError::Decode("x".into()).is_invalid_input());
        assert!(!ImageError::ResourceLimit("x".into()).is_invalid_input());
    }
}
