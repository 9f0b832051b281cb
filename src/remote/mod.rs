//! # 远程生成能力（remote）
//!
//! ## 设计思路
//!
//! 远程 AI 图片服务被抽象为 `ImageGenerator` trait：
//! 输入“原图 + 指令文本”，输出一张新图或一个 `RemoteFailure`。
//! 编排层只依赖 trait，测试中可注入任意桩实现（配额耗尽、超时、延迟返回等）。
//!
//! - `failure`：失败原因与文本/状态码归类
//! - `http`：JSON over HTTP 的默认实现
//! - `UnavailableGenerator`：未配置远程服务时使用，永远失败并触发本地回退

use std::future::Future;

mod failure;
mod http;

pub use failure::RemoteFailure;
pub use http::HttpImageGenerator;

use crate::enhance::EncodedImage;

/// “增强”变体的指令文本。
pub const ENHANCE_INSTRUCTION: &str = "enhance the image";

/// “卡通”变体的指令文本。
pub const CARTOON_INSTRUCTION: &str = "generate a cartoon version of the image";

/// 单次远程生成请求。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    pub source: EncodedImage,
    pub instruction: String,
}

impl GenerationRequest {
    pub fn new(source: EncodedImage, instruction: impl Into<String>) -> Self {
        Self {
            source,
            instruction: instruction.into(),
        }
    }

    pub fn enhance(source: EncodedImage) -> Self {
        Self::new(source, ENHANCE_INSTRUCTION)
    }

    pub fn cartoon(source: EncodedImage) -> Self {
        Self::new(source, CARTOON_INSTRUCTION)
    }
}

/// 远程图片生成能力。
///
/// 实现方需要可跨线程共享，返回的 future 需要是 `Send`，
/// 以便编排层在多线程运行时中并发发起两次调用。
pub trait ImageGenerator: Send + Sync {
    fn generate(
        &self,
        request: GenerationRequest,
    ) -> impl Future<Output = Result<EncodedImage, RemoteFailure>> + Send;
}

/// 未配置远程服务时的生成器。
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableGenerator;

impl ImageGenerator for UnavailableGenerator {
    async fn generate(&self, _request: GenerationRequest) -> Result<EncodedImage, RemoteFailure> {
        Err(RemoteFailure::Unavailable("未配置远程服务".to_string()))
    }
}
