//! # 回退编排器
//!
//! ## 设计思路
//!
//! 单次拍摄的处理是一个小状态机：
//!
//! ```text
//! Idle → RemoteRequested ─┬─ RemoteSucceeded
//!                         └─ RemoteFailed → LocalFallback ─┬─ Completed
//!                                                          └─ Failed（槽位复用原图）
//! ```
//!
//! - 远程失败不会冒泡给用户，只会变成“已使用本地增强”的提示。
//! - 本地回退失败的槽位直接复用原图，保证有图可显示时槽位不为空。
//! - 只有“原图本身无效”才会以错误形式返回。
//!
//! ## 实现思路
//!
//! - 两次远程调用并发发起，各自受 `remote_timeout_ms` 约束，任一失败即取消另一路并整体回退。
//! - 远程阶段结束后与写入时各检查一次代次：旧拍摄的结果直接丢弃（后拍摄者胜）。
//! - 远程失败后不重试，本地回退每张图只执行一次。
//! - 每次状态迁移都通过 `watch` 通道广播，UI 订阅后只关心最新进度。

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::sync::watch;

use super::{EnhancementSource, ListingDraftStore};
use crate::enhance::{EncodedImage, ImageEnhancer, ImageError, LocalFallbackOutput, sniff_media_type};
use crate::error::AppError;
use crate::remote::{GenerationRequest, ImageGenerator, RemoteFailure};

/// 单次处理的状态。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingState {
    Idle,
    RemoteRequested,
    RemoteSucceeded,
    RemoteFailed,
    LocalFallback,
    Completed,
    Failed,
}

impl ProcessingState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::RemoteRequested => "remote_requested",
            Self::RemoteSucceeded => "remote_succeeded",
            Self::RemoteFailed => "remote_failed",
            Self::LocalFallback => "local_fallback",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// 是否为终态。
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::RemoteSucceeded | Self::Completed | Self::Failed)
    }

    /// 合法迁移表。
    pub fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Idle, Self::RemoteRequested)
                | (Self::RemoteRequested, Self::RemoteSucceeded)
                | (Self::RemoteRequested, Self::RemoteFailed)
                | (Self::RemoteFailed, Self::LocalFallback)
                | (Self::LocalFallback, Self::Completed)
                | (Self::LocalFallback, Self::Failed)
        )
    }
}

/// 展示给用户的提示（非错误）。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UserNotice {
    AiEnhanced,
    LocalEnhancementApplied,
    OriginalUsed,
}

impl UserNotice {
    pub fn message(self) -> &'static str {
        match self {
            Self::AiEnhanced => "图片已由 AI 增强",
            Self::LocalEnhancementApplied => "已使用本地增强（AI 暂时不可用）",
            Self::OriginalUsed => "已使用原图（增强暂时不可用）",
        }
    }
}

/// 单次拍摄的处理结果。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingReport {
    pub listing_id: String,
    pub generation: u64,
    pub state: ProcessingState,
    /// 被取代的拍摄没有来源。
    pub source: Option<EnhancementSource>,
    /// 结果是否写入了草稿；被更新的拍摄取代时为 `false`。
    pub applied: bool,
    pub notice: Option<UserNotice>,
    /// 远程失败原因（仅回退时存在）。
    pub remote_failure: Option<String>,
}

/// 最近一次状态迁移。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressUpdate {
    pub listing_id: String,
    pub generation: u64,
    pub state: ProcessingState,
}

struct Outcome {
    enhanced: EncodedImage,
    cartoon: EncodedImage,
    state: ProcessingState,
    source: EnhancementSource,
    notice: UserNotice,
    remote_failure: Option<String>,
}

/// 远程优先、本地回退的编排器。
///
/// 克隆只复制句柄，所有克隆共享同一个生成器、增强器与草稿存储。
pub struct FallbackOrchestrator<G> {
    generator: Arc<G>,
    enhancer: ImageEnhancer,
    store: Arc<ListingDraftStore>,
    progress: Arc<watch::Sender<Option<ProgressUpdate>>>,
}

impl<G> Clone for FallbackOrchestrator<G> {
    fn clone(&self) -> Self {
        Self {
            generator: Arc::clone(&self.generator),
            enhancer: self.enhancer.clone(),
            store: Arc::clone(&self.store),
            progress: Arc::clone(&self.progress),
        }
    }
}

impl<G: ImageGenerator> FallbackOrchestrator<G> {
    pub fn new(generator: G, enhancer: ImageEnhancer, store: Arc<ListingDraftStore>) -> Self {
        let (progress, _) = watch::channel(None);
        Self {
            generator: Arc::new(generator),
            enhancer,
            store,
            progress: Arc::new(progress),
        }
    }

    pub fn enhancer(&self) -> &ImageEnhancer {
        &self.enhancer
    }

    pub fn store(&self) -> &Arc<ListingDraftStore> {
        &self.store
    }

    /// 订阅处理进度（所有商品共用一个通道，只保留最新一次迁移）。
    pub fn subscribe(&self) -> watch::Receiver<Option<ProgressUpdate>> {
        self.progress.subscribe()
    }

    /// 处理一次拍摄 / 上传。
    ///
    /// # 示例
    /// ```rust,no_run
    /// use std::sync::Arc;
    /// use listing_enhancer::enhance::{load_from_file, EnhanceConfig, ImageEnhancer};
    /// use listing_enhancer::listing::{FallbackOrchestrator, ListingDraftStore};
    /// use listing_enhancer::remote::UnavailableGenerator;
    ///
    /// # async fn demo() -> Result<(), listing_enhancer::error::AppError> {
    /// let enhancer = ImageEnhancer::new(EnhanceConfig::default())?;
    /// let store = Arc::new(ListingDraftStore::new(16));
    /// let orchestrator = FallbackOrchestrator::new(UnavailableGenerator, enhancer, store);
    ///
    /// let photo = load_from_file("photo.jpg", 50 * 1024 * 1024)?;
    /// let report = orchestrator.process_capture("listing-1", photo).await?;
    /// println!("{:?}", report.notice);
    /// # Ok(())
    /// # }
    /// ```
    pub async fn process_capture(
        &self,
        listing_id: &str,
        original: EncodedImage,
    ) -> Result<ProcessingReport, AppError> {
        let total_start = Instant::now();
        let original = Self::validate_original(original)?;

        let config = self.enhancer.config_snapshot()?;
        let generation = self.store.begin_capture(listing_id, original.clone())?;
        let mut state = ProcessingState::Idle;

        self.advance(&mut state, ProcessingState::RemoteRequested, listing_id, generation);
        let remote_start = Instant::now();
        let remote = self.request_remote(&original, config.remote_timeout_ms).await;
        let remote_elapsed = remote_start.elapsed();

        if !self.store.is_current(listing_id, generation)? {
            return Ok(self.superseded(listing_id, generation, state));
        }

        let outcome = match remote {
            Ok((enhanced, cartoon)) => {
                self.advance(&mut state, ProcessingState::RemoteSucceeded, listing_id, generation);
                Outcome {
                    enhanced,
                    cartoon,
                    state,
                    source: EnhancementSource::Remote,
                    notice: UserNotice::AiEnhanced,
                    remote_failure: None,
                }
            }
            Err(failure) if !failure.triggers_fallback() => {
                log::error!(
                    "❌ 原图被远程服务判定为无效，无法回退 - listing: {} reason: {}",
                    listing_id,
                    failure
                );
                self.store.discard(listing_id, generation)?;
                return Err(AppError::UnrecoverableImage(failure.to_string()));
            }
            Err(failure) => {
                self.advance(&mut state, ProcessingState::RemoteFailed, listing_id, generation);
                log::warn!(
                    "⚠️ 远程生成失败，转入本地回退 - listing: {} reason: {} ({})",
                    listing_id,
                    failure.reason(),
                    failure
                );

                self.advance(&mut state, ProcessingState::LocalFallback, listing_id, generation);
                let output = self.enhancer.run_local_fallback(original.clone()).await;
                let mut outcome = Self::settle_fallback(listing_id, &original, output);
                self.advance(&mut state, outcome.state, listing_id, generation);
                outcome.remote_failure = Some(failure.reason().to_string());
                outcome
            }
        };

        let applied = self.store.commit(
            listing_id,
            generation,
            outcome.enhanced,
            outcome.cartoon,
            outcome.source,
        )?;

        if !applied {
            return Ok(self.superseded(listing_id, generation, outcome.state));
        }

        log::info!(
            "✅ 拍摄处理完成 - listing: {} generation: {} state: {} source: {} remote={}ms total={}ms",
            listing_id,
            generation,
            outcome.state.as_str(),
            outcome.source.as_str(),
            remote_elapsed.as_millis(),
            total_start.elapsed().as_millis()
        );

        Ok(ProcessingReport {
            listing_id: listing_id.to_string(),
            generation,
            state: outcome.state,
            source: Some(outcome.source),
            applied: true,
            notice: Some(outcome.notice),
            remote_failure: outcome.remote_failure,
        })
    }

    /// 原图必须是可识别的图片，否则没有任何东西可以回退。
    ///
    /// 声明的媒体类型与文件签名不符时，以签名为准。
    fn validate_original(original: EncodedImage) -> Result<EncodedImage, AppError> {
        if original.is_empty() {
            log::error!("❌ 拍摄结果为空");
            return Err(AppError::UnrecoverableImage("拍摄结果为空".to_string()));
        }

        let sniffed = sniff_media_type(original.bytes()).map_err(|e| {
            log::error!("❌ 拍摄结果不是有效图片：{}", e);
            AppError::UnrecoverableImage(e.to_string())
        })?;

        if sniffed == original.media_type() {
            return Ok(original);
        }
        log::warn!(
            "⚠️ 拍摄结果的媒体类型与文件签名不符，按签名处理 - 声明: {} 实际: {}",
            original.media_type().mime(),
            sniffed.mime()
        );
        Ok(original.with_media_type(sniffed))
    }

    /// 并发请求两个变体，任一失败即整体失败。
    async fn request_remote(
        &self,
        original: &EncodedImage,
        timeout_ms: u64,
    ) -> Result<(EncodedImage, EncodedImage), RemoteFailure> {
        tokio::try_join!(
            self.generate_with_timeout(GenerationRequest::enhance(original.clone()), timeout_ms),
            self.generate_with_timeout(GenerationRequest::cartoon(original.clone()), timeout_ms),
        )
    }

    async fn generate_with_timeout(
        &self,
        request: GenerationRequest,
        timeout_ms: u64,
    ) -> Result<EncodedImage, RemoteFailure> {
        match tokio::time::timeout(
            Duration::from_millis(timeout_ms),
            self.generator.generate(request),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(RemoteFailure::Timeout(format!("{}ms", timeout_ms))),
        }
    }

    /// 失败的槽位复用原图。
    fn settle_fallback(listing_id: &str, original: &EncodedImage, output: LocalFallbackOutput) -> Outcome {
        let mut degraded = 0;
        let mut settle = |slot: &str, result: Result<EncodedImage, ImageError>| match result {
            Ok(image) => image,
            Err(err) => {
                log::warn!(
                    "⚠️ 本地回退失败，槽位复用原图 - listing: {} slot: {} stage: {} error: {}",
                    listing_id,
                    slot,
                    err.stage(),
                    err
                );
                degraded += 1;
                original.clone()
            }
        };

        let enhanced = settle("enhanced", output.enhanced);
        let cartoon = settle("cartoon", output.cartoon);

        let (state, source, notice) = match degraded {
            0 => (
                ProcessingState::Completed,
                EnhancementSource::LocalFallback,
                UserNotice::LocalEnhancementApplied,
            ),
            1 => (
                ProcessingState::Failed,
                EnhancementSource::LocalFallback,
                UserNotice::LocalEnhancementApplied,
            ),
            _ => (
                ProcessingState::Failed,
                EnhancementSource::Original,
                UserNotice::OriginalUsed,
            ),
        };

        Outcome {
            enhanced,
            cartoon,
            state,
            source,
            notice,
            remote_failure: None,
        }
    }

    fn superseded(&self, listing_id: &str, generation: u64, state: ProcessingState) -> ProcessingReport {
        log::info!(
            "⏭️ 拍摄已被更新的拍摄取代，丢弃结果 - listing: {} generation: {}",
            listing_id,
            generation
        );
        ProcessingReport {
            listing_id: listing_id.to_string(),
            generation,
            state,
            source: None,
            applied: false,
            notice: None,
            remote_failure: None,
        }
    }

    fn advance(
        &self,
        state: &mut ProcessingState,
        next: ProcessingState,
        listing_id: &str,
        generation: u64,
    ) {
        debug_assert!(state.can_transition_to(next), "{:?} -> {:?}", state, next);
        log::debug!(
            "🔀 {} → {} - listing: {} generation: {}",
            state.as_str(),
            next.as_str(),
            listing_id,
            generation
        );
        *state = next;
        self.progress.send_replace(Some(ProgressUpdate {
            listing_id: listing_id.to_string(),
            generation,
            state: next,
        }));
    }
}
