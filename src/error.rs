//! 统一错误类型模块
//!
//! # 设计思路
//!
//! 定义全局统一的 `AppError` 枚举，汇总像素流水线、远程生成、草稿存储与设置文件的错误。
//! 对最终用户而言，只有 `UnrecoverableImage` 需要以“失败”的形式展示，
//! 远程失败在编排层被转换为本地回退，不会直接冒泡。
//!
//! # 实现思路
//!
//! - 使用 `thiserror` 派生可读错误消息。
//! - 为 `ImageError` / `RemoteFailure` / `io::Error` 提供 `From` 转换，无需手动 map。
//! - 实现 `Serialize` 将错误序列化为字符串，方便下游 UI 直接展示。

use serde::Serialize;

use crate::enhance::ImageError;
use crate::remote::RemoteFailure;

/// 应用级统一错误类型
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// 图片处理流水线错误（加载 / 解码 / 编码）
    #[error("{0}")]
    Image(#[from] ImageError),

    /// 远程生成失败（通常已被编排层转换为回退）
    #[error("{0}")]
    Remote(#[from] RemoteFailure),

    /// 没有任何可用图片，无法回退
    #[error("图片不可用: {0}")]
    UnrecoverableImage(String),

    /// 草稿存储不可用
    #[error("草稿存储错误: {0}")]
    DraftStore(String),

    /// 设置文件读写失败
    #[error("设置错误: {0}")]
    Settings(String),

    /// 文件系统 I/O 错误
    #[error("文件系统错误: {0}")]
    Io(#[from] std::io::Error),
}

impl AppError {
    /// 是否需要以“失败”形式告知用户。
    pub fn is_user_visible(&self) -> bool {
        matches!(self, Self::UnrecoverableImage(_))
    }
}

/// 将错误序列化为人类可读的字符串。
impl Serialize for AppError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}
