//! # HTTP 生成器
//!
//! ## 设计思路
//!
//! 远程 AI 服务以 JSON over HTTP 暴露：
//! `POST {endpoint}`，请求体 `{"image": "<data uri>", "prompt": "<instruction>"}`，
//! 成功响应体 `{"image": "<data uri>"}`。
//!
//! ## 实现思路
//!
//! - `reqwest::Client` 在构造时创建一次，连接超时与总超时都来自配置。
//! - 响应体按块读取并做体积上限检查，避免异常大响应吃满内存。
//! - 状态码与错误文本统一交给 `RemoteFailure` 归类。
//! - 日志中的 URL 只保留 scheme/host/path，不落 query（可能含 key）。

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use super::{GenerationRequest, ImageGenerator, RemoteFailure};
use crate::enhance::EncodedImage;

const CONNECT_TIMEOUT_MS: u64 = 5_000;

#[derive(Serialize)]
struct GenerateBody<'a> {
    image: String,
    prompt: &'a str,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    image: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// 基于 HTTP 的远程图片生成器。
#[derive(Debug, Clone)]
pub struct HttpImageGenerator {
    client: reqwest::Client,
    endpoint: reqwest::Url,
    api_key: Option<String>,
    timeout_ms: u64,
    max_file_size: u64,
}

impl HttpImageGenerator {
    /// 创建生成器，endpoint 必须是 http/https 地址。
    ///
    /// # 示例
    /// ```rust
    /// use listing_enhancer::remote::HttpImageGenerator;
    ///
    /// let generator = HttpImageGenerator::new("https://ai.example.com/v1/edit", 30_000, 50 * 1024 * 1024);
    /// assert!(generator.is_ok());
    /// assert!(HttpImageGenerator::new("ftp://example.com", 30_000, 1024).is_err());
    /// ```
    pub fn new(endpoint: &str, timeout_ms: u64, max_file_size: u64) -> Result<Self, RemoteFailure> {
        let endpoint = reqwest::Url::parse(endpoint)
            .map_err(|e| RemoteFailure::Unavailable(format!("endpoint 格式错误：{}", e)))?;

        if !matches!(endpoint.scheme(), "http" | "https") {
            return Err(RemoteFailure::Unavailable(format!(
                "仅支持 http/https：{}",
                endpoint.scheme()
            )));
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .connect_timeout(Duration::from_millis(CONNECT_TIMEOUT_MS.min(timeout_ms)))
            .build()
            .map_err(|e| RemoteFailure::Unavailable(format!("HTTP 客户端初始化失败：{}", e)))?;

        Ok(Self {
            client,
            endpoint,
            api_key: None,
            timeout_ms,
            max_file_size,
        })
    }

    /// 附带 Bearer 鉴权。
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        let key = api_key.into();
        self.api_key = (!key.trim().is_empty()).then_some(key);
        self
    }

    async fn send(&self, request: &GenerationRequest) -> Result<EncodedImage, RemoteFailure> {
        let body = serde_json::to_vec(&GenerateBody {
            image: request.source.to_data_uri(),
            prompt: &request.instruction,
        })
        .map_err(|e| RemoteFailure::Transport(format!("请求体序列化失败：{}", e)))?;

        let mut builder = self
            .client
            .post(self.endpoint.clone())
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .header(reqwest::header::ACCEPT, "application/json")
            .body(body);
        if let Some(key) = &self.api_key {
            builder = builder.header(reqwest::header::AUTHORIZATION, format!("Bearer {}", key));
        }

        let mut response = builder.send().await.map_err(|e| self.map_reqwest_error(e))?;
        let status = response.status();

        let max_body = self.max_response_bytes();
        let mut payload: Vec<u8> = Vec::new();
        while let Some(chunk) = response.chunk().await.map_err(|e| self.map_reqwest_error(e))? {
            if (payload.len() + chunk.len()) as u64 > max_body {
                return Err(RemoteFailure::InvalidResponse(format!(
                    "响应体超过上限 {:.2} MB",
                    max_body as f64 / 1024.0 / 1024.0
                )));
            }
            payload.extend_from_slice(&chunk);
        }

        if !status.is_success() {
            let text = String::from_utf8_lossy(&payload);
            let message = serde_json::from_slice::<GenerateResponse>(&payload)
                .ok()
                .and_then(|r| r.error)
                .unwrap_or_else(|| text.chars().take(512).collect());
            return Err(RemoteFailure::classify_status(status.as_u16(), &message));
        }

        let parsed: GenerateResponse = serde_json::from_slice(&payload)
            .map_err(|e| RemoteFailure::InvalidResponse(format!("响应 JSON 解析失败：{}", e)))?;

        if let Some(error) = parsed.error {
            return Err(RemoteFailure::classify(&error));
        }

        let image = parsed
            .image
            .ok_or_else(|| RemoteFailure::InvalidResponse("响应中缺少图片".to_string()))?;

        EncodedImage::from_data_uri(&image, self.max_file_size)
            .map_err(|e| RemoteFailure::InvalidResponse(e.to_string()))
    }

    /// base64 + JSON 包装后的响应上限。
    fn max_response_bytes(&self) -> u64 {
        self.max_file_size
            .saturating_mul(4)
            .div_ceil(3)
            .saturating_add(64 * 1024)
    }

    fn map_reqwest_error(&self, e: reqwest::Error) -> RemoteFailure {
        let err_msg = e
            .to_string()
            .replace(self.endpoint.as_str(), &redact_url_for_log(&self.endpoint));

        if e.is_timeout() {
            RemoteFailure::Timeout(format!("{}ms", self.timeout_ms))
        } else if e.is_connect() {
            RemoteFailure::Transport(format!("无法连接：{}", err_msg))
        } else {
            RemoteFailure::Transport(format!("请求失败：{}", err_msg))
        }
    }
}

impl ImageGenerator for HttpImageGenerator {
    async fn generate(&self, request: GenerationRequest) -> Result<EncodedImage, RemoteFailure> {
        let start = Instant::now();
        log::info!(
            "🌐 请求远程生成 - endpoint: {} instruction: {}",
            redact_url_for_log(&self.endpoint),
            request.instruction
        );

        let result = self.send(&request).await;
        match &result {
            Ok(image) => log::info!(
                "✅ 远程生成成功 - {} bytes, {}ms",
                image.len(),
                start.elapsed().as_millis()
            ),
            Err(failure) => log::warn!(
                "⚠️ 远程生成失败 - reason: {} ({}), {}ms",
                failure.reason(),
                failure,
                start.elapsed().as_millis()
            ),
        }
        result
    }
}

fn redact_url_for_log(url: &reqwest::Url) -> String {
    let host = url.host_str().unwrap_or("<unknown-host>");
    let port = url.port().map(|p| format!(":{}", p)).unwrap_or_default();
    format!("{}://{}{}{}", url.scheme(), host, port, url.path())
}
