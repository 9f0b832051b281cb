//! # 远程失败分类
//!
//! ## 设计思路
//!
//! 远程 AI 服务的失败原因需要机器可读，编排层据此决定是否走本地回退。
//! 只有“输入图片本身无效”不可回退，其余原因一律回退。
//!
//! ## 实现思路
//!
//! - 上游 SDK 常只给出自由文本错误，使用 `RegexSet` 一次性匹配多种关键字。
//! - 通过 `once_cell::sync::Lazy` 在首次调用时编译正则，后续零成本复用。

use once_cell::sync::Lazy;
use regex::RegexSet;

/// 配额 / 限流关键字。
static QUOTA_PATTERNS: Lazy<RegexSet> = Lazy::new(|| {
    RegexSet::new([
        r"(?i)quota",
        r"\b429\b",
        r"(?i)too\s+many\s+requests",
        r"(?i)rate[\s_-]?limit",
        r"(?i)resource[\s_-]?exhausted",
    ])
    .unwrap_or_else(|_| RegexSet::empty())
});

/// 输入图片无效关键字。
static INVALID_INPUT_PATTERNS: Lazy<RegexSet> = Lazy::new(|| {
    RegexSet::new([
        r"(?i)invalid\s+(image|data\s*ur[il]|media)",
        r"(?i)unsupported\s+(image|mime|media)",
        r"(?i)(image|media)\s+(is\s+)?(corrupt|malformed|unreadable)",
    ])
    .unwrap_or_else(|_| RegexSet::empty())
});

/// 超时关键字。
static TIMEOUT_PATTERNS: Lazy<RegexSet> = Lazy::new(|| {
    RegexSet::new([r"(?i)timed?\s*out", r"(?i)deadline\s+exceeded"])
        .unwrap_or_else(|_| RegexSet::empty())
});

/// 远程生成失败原因。
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RemoteFailure {
    #[error("远程服务配额已用尽：{0}")]
    QuotaExceeded(String),

    #[error("远程调用失败：{0}")]
    Transport(String),

    #[error("远程调用超时：{0}")]
    Timeout(String),

    #[error("远程响应无效：{0}")]
    InvalidResponse(String),

    #[error("远程服务不可用：{0}")]
    Unavailable(String),

    #[error("输入图片无效：{0}")]
    InvalidInput(String),
}

impl RemoteFailure {
    /// 机器可读原因。
    pub fn reason(&self) -> &'static str {
        match self {
            Self::QuotaExceeded(_) => "quota_exceeded",
            Self::Transport(_) => "transport_error",
            Self::Timeout(_) => "timeout",
            Self::InvalidResponse(_) => "invalid_response",
            Self::Unavailable(_) => "unavailable",
            Self::InvalidInput(_) => "invalid_input",
        }
    }

    /// 是否应转入本地回退。
    pub fn triggers_fallback(&self) -> bool {
        !matches!(self, Self::InvalidInput(_))
    }

    /// 将自由文本错误归类。
    ///
    /// # 示例
    /// ```rust
    /// use listing_enhancer::remote::RemoteFailure;
    ///
    /// let failure = RemoteFailure::classify("429 Too Many Requests");
    /// assert_eq!(failure.reason(), "quota_exceeded");
    /// ```
    pub fn classify(message: &str) -> Self {
        let message = message.trim();

        if QUOTA_PATTERNS.is_match(message) {
            return Self::QuotaExceeded(message.to_string());
        }

        if INVALID_INPUT_PATTERNS.is_match(message) {
            return Self::InvalidInput(message.to_string());
        }

        if TIMEOUT_PATTERNS.is_match(message) {
            return Self::Timeout(message.to_string());
        }

        Self::Transport(message.to_string())
    }

    /// 按 HTTP 状态码与响应文本归类。
    pub fn classify_status(status: u16, body: &str) -> Self {
        match status {
            429 => Self::QuotaExceeded(format!("HTTP 429: {}", body.trim())),
            400 | 422 => match Self::classify(body) {
                Self::InvalidInput(msg) => Self::InvalidInput(msg),
                Self::QuotaExceeded(msg) => Self::QuotaExceeded(msg),
                _ => Self::Transport(format!("HTTP {}: {}", status, body.trim())),
            },
            408 | 504 => Self::Timeout(format!("HTTP {}: {}", status, body.trim())),
            401 | 403 => Self::Unavailable(format!("HTTP {}：鉴权失败", status)),
            _ => Self::Transport(format!("HTTP {}: {}", status, body.trim())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quota_messages_are_detected() {
        for message in [
            "You exceeded your current quota",
            "HTTP 429",
            "Too Many Requests",
            "RESOURCE_EXHAUSTED: try later",
            "rate-limit reached",
        ] {
            assert_eq!(
                RemoteFailure::classify(message).reason(),
                "quota_exceeded",
                "message: {}",
                message
            );
        }
    }

    #[test]
    fn invalid_image_is_not_fallback_eligible() {
        let failure = RemoteFailure::classify("Invalid image data uri provided");
        assert_eq!(failure.reason(), "invalid_input");
        assert!(!failure.triggers_fallback());
    }

    #[test]
    fn unknown_messages_are_transport_errors() {
        let failure = RemoteFailure::classify("connection reset by peer");
        assert_eq!(failure.reason(), "transport_error");
        assert!(failure.triggers_fallback());
    }

    #[test]
    fn timeout_messages_map_to_timeout_reason() {
        for message in ["deadline exceeded", "Request timed out", "upstream timeout"] {
            let failure = RemoteFailure::classify(message);
            assert_eq!(failure.reason(), "timeout", "message: {}", message);
            assert!(failure.triggers_fallback());
        }
    }

    #[test]
    fn status_mapping() {
        assert_eq!(RemoteFailure::classify_status(429, "").reason(), "quota_exceeded");
        assert_eq!(RemoteFailure::classify_status(503, "busy").reason(), "transport_error");
        assert_eq!(RemoteFailure::classify_status(400, "bad prompt").reason(), "transport_error");
        assert_eq!(
            RemoteFailure::classify_status(422, "unsupported image format").reason(),
            "invalid_input"
        );
        assert_eq!(RemoteFailure::classify_status(401, "").reason(), "unavailable");
        assert_eq!(RemoteFailure::classify_status(504, "").reason(), "timeout");
    }

    #[test]
    fn every_other_reason_triggers_fallback() {
        for failure in [
            RemoteFailure::QuotaExceeded(String::new()),
            RemoteFailure::Transport(String::new()),
            RemoteFailure::Timeout("10ms".to_string()),
            RemoteFailure::InvalidResponse(String::new()),
            RemoteFailure::Unavailable(String::new()),
        ] {
            assert!(failure.triggers_fallback());
        }
    }
}
