// End-to-end tests for remote-first / local-fallback processing
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use listing_enhancer::enhance::{
    decode, encode, EncodedImage, EnhanceConfig, ImageEnhancer, MediaType, OutputProfile, RasterBuffer,
};
use listing_enhancer::error::AppError;
use listing_enhancer::listing::{
    EnhancementSource, FallbackOrchestrator, ListingDraftStore, ProcessingState, ProgressUpdate,
    UserNotice,
};
use listing_enhancer::remote::{
    GenerationRequest, ImageGenerator, RemoteFailure, UnavailableGenerator, CARTOON_INSTRUCTION,
};
use tokio::sync::{Notify, Semaphore};

fn gray_png(value: u8) -> EncodedImage {
    gray_png_sized(2, 2, value)
}

fn gray_png_sized(width: u32, height: u32, value: u8) -> EncodedImage {
    let raster = RasterBuffer::filled(width, height, [value, value, value, 255]);
    encode(&raster, MediaType::Png, 90).expect("encode test image failed")
}

fn lossless_config() -> EnhanceConfig {
    let mut config = EnhanceConfig::default();
    config.apply_output_profile(OutputProfile::Lossless);
    config
}

fn orchestrator<G: ImageGenerator>(generator: G, config: EnhanceConfig) -> FallbackOrchestrator<G> {
    let enhancer = ImageEnhancer::new(config).expect("enhancer init failed");
    let store = Arc::new(ListingDraftStore::new(8));
    FallbackOrchestrator::new(generator, enhancer, store)
}

fn first_pixel(image: &EncodedImage) -> [u8; 4] {
    let raster = decode(image, &EnhanceConfig::default()).expect("decode failed");
    raster.pixel(0, 0).expect("pixel missing")
}

/// Rejects every request with a quota message, counting calls.
#[derive(Default)]
struct QuotaExhausted {
    calls: Arc<AtomicUsize>,
}

impl ImageGenerator for QuotaExhausted {
    async fn generate(&self, _request: GenerationRequest) -> Result<EncodedImage, RemoteFailure> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(RemoteFailure::classify(
            "[429 Too Many Requests] You exceeded your current quota",
        ))
    }
}

/// Returns a fixed image per instruction.
struct Echo {
    enhanced: EncodedImage,
    cartoon: EncodedImage,
}

impl ImageGenerator for Echo {
    async fn generate(&self, request: GenerationRequest) -> Result<EncodedImage, RemoteFailure> {
        if request.instruction == CARTOON_INSTRUCTION {
            Ok(self.cartoon.clone())
        } else {
            Ok(self.enhanced.clone())
        }
    }
}

/// Never answers within the configured timeout.
struct Stalled;

impl ImageGenerator for Stalled {
    async fn generate(&self, _request: GenerationRequest) -> Result<EncodedImage, RemoteFailure> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Err(RemoteFailure::Transport("unreachable".to_string()))
    }
}

/// Rejects the source image itself.
struct RejectsInput;

impl ImageGenerator for RejectsInput {
    async fn generate(&self, _request: GenerationRequest) -> Result<EncodedImage, RemoteFailure> {
        Err(RemoteFailure::InvalidInput("invalid image".to_string()))
    }
}

/// Holds requests for one specific photo until released, then fails with a quota error.
struct Gated {
    held: EncodedImage,
    entered: Arc<Notify>,
    release: Arc<Semaphore>,
}

impl ImageGenerator for Gated {
    async fn generate(&self, request: GenerationRequest) -> Result<EncodedImage, RemoteFailure> {
        if request.source == self.held {
            self.entered.notify_one();
            let _permit = self
                .release
                .acquire()
                .await
                .map_err(|e| RemoteFailure::Transport(e.to_string()))?;
        }
        Err(RemoteFailure::QuotaExceeded("quota".to_string()))
    }
}

#[tokio::test]
async fn quota_exceeded_fills_both_slots_locally() {
    let orchestrator = orchestrator(QuotaExhausted::default(), lossless_config());
    let photo = gray_png(100);

    let report = orchestrator
        .process_capture("listing-1", photo.clone())
        .await
        .expect("quota failure must not surface");

    assert!(report.applied);
    assert_eq!(report.state, ProcessingState::Completed);
    assert_eq!(report.source, Some(EnhancementSource::LocalFallback));
    assert_eq!(report.notice, Some(UserNotice::LocalEnhancementApplied));
    assert_eq!(report.remote_failure.as_deref(), Some("quota_exceeded"));

    let set = orchestrator
        .store()
        .snapshot("listing-1")
        .expect("snapshot failed")
        .expect("set missing");
    assert!(set.is_complete());
    assert_eq!(set.original, Some(photo));
    assert_eq!(first_pixel(set.enhanced.as_ref().expect("enhanced missing")), [108, 108, 108, 255]);
    assert_eq!(first_pixel(set.cartoon.as_ref().expect("cartoon missing")), [80, 80, 80, 255]);
}

#[tokio::test]
async fn remote_is_not_retried_after_failure() {
    let calls = Arc::new(AtomicUsize::new(0));
    let generator = QuotaExhausted {
        calls: Arc::clone(&calls),
    };
    let orchestrator = orchestrator(generator, lossless_config());

    orchestrator
        .process_capture("listing-1", gray_png(100))
        .await
        .expect("process failed");

    // 每个变体最多请求一次
    let calls = calls.load(Ordering::SeqCst);
    assert!((1..=2).contains(&calls), "calls: {}", calls);
}

#[tokio::test]
async fn remote_success_is_stored_as_is() {
    let enhanced = gray_png(10);
    let cartoon = gray_png(20);
    let orchestrator = orchestrator(
        Echo {
            enhanced: enhanced.clone(),
            cartoon: cartoon.clone(),
        },
        lossless_config(),
    );

    let report = orchestrator
        .process_capture("listing-1", gray_png(100))
        .await
        .expect("process failed");

    assert_eq!(report.state, ProcessingState::RemoteSucceeded);
    assert_eq!(report.notice, Some(UserNotice::AiEnhanced));
    assert_eq!(report.remote_failure, None);

    let set = orchestrator
        .store()
        .snapshot("listing-1")
        .expect("snapshot failed")
        .expect("set missing");
    assert_eq!(set.enhanced, Some(enhanced));
    assert_eq!(set.cartoon, Some(cartoon));
    assert_eq!(set.source, Some(EnhancementSource::Remote));
}

#[tokio::test]
async fn remote_timeout_triggers_fallback() {
    let mut config = lossless_config();
    config.remote_timeout_ms = 100;
    let orchestrator = orchestrator(Stalled, config);

    let report = orchestrator
        .process_capture("listing-1", gray_png(100))
        .await
        .expect("timeout must not surface");

    assert_eq!(report.state, ProcessingState::Completed);
    assert_eq!(report.remote_failure.as_deref(), Some("timeout"));
}

#[tokio::test]
async fn offline_mode_always_falls_back() {
    let orchestrator = orchestrator(UnavailableGenerator, lossless_config());

    let report = orchestrator
        .process_capture("listing-1", gray_png(100))
        .await
        .expect("process failed");

    assert_eq!(report.source, Some(EnhancementSource::LocalFallback));
    assert_eq!(report.remote_failure.as_deref(), Some("unavailable"));
}

#[tokio::test]
async fn undecodable_original_is_reused_in_both_slots() {
    let orchestrator = orchestrator(QuotaExhausted::default(), lossless_config());
    // PNG 签名正确，但数据损坏
    let corrupt = EncodedImage::new(MediaType::Png, vec![137_u8, 80, 78, 71, 13, 10, 26, 10, 0, 0, 0, 0]);

    let report = orchestrator
        .process_capture("listing-1", corrupt.clone())
        .await
        .expect("degradation must not surface");

    assert_eq!(report.state, ProcessingState::Failed);
    assert_eq!(report.source, Some(EnhancementSource::Original));
    assert_eq!(report.notice, Some(UserNotice::OriginalUsed));

    let set = orchestrator
        .store()
        .snapshot("listing-1")
        .expect("snapshot failed")
        .expect("set missing");
    assert_eq!(set.enhanced, Some(corrupt.clone()));
    assert_eq!(set.cartoon, Some(corrupt));
}

#[tokio::test]
async fn invalid_capture_is_unrecoverable() {
    let orchestrator = orchestrator(QuotaExhausted::default(), lossless_config());
    let not_an_image = EncodedImage::new(MediaType::Png, b"hello world".to_vec());

    let err = orchestrator
        .process_capture("listing-1", not_an_image)
        .await
        .expect_err("should fail");

    assert!(matches!(err, AppError::UnrecoverableImage(_)));
    assert!(err.is_user_visible());
    assert!(orchestrator.store().snapshot("listing-1").expect("snapshot failed").is_none());
}

#[tokio::test]
async fn remote_rejecting_input_is_unrecoverable() {
    let orchestrator = orchestrator(RejectsInput, lossless_config());

    let err = orchestrator
        .process_capture("listing-1", gray_png(100))
        .await
        .expect_err("should fail");

    assert!(matches!(err, AppError::UnrecoverableImage(_)));
    // 不会留下永远处于等待状态的草稿
    assert!(orchestrator.store().snapshot("listing-1").expect("snapshot failed").is_none());
}

#[tokio::test]
async fn mislabelled_capture_is_processed_by_its_signature() {
    let orchestrator = orchestrator(UnavailableGenerator, lossless_config());
    let jpeg = encode(&RasterBuffer::filled(4, 4, [100, 100, 100, 255]), MediaType::Jpeg, 90)
        .expect("encode test image failed");
    let mislabelled = EncodedImage::new(MediaType::Png, jpeg.bytes().to_vec());

    let report = orchestrator
        .process_capture("listing-1", mislabelled)
        .await
        .expect("process failed");

    assert_eq!(report.state, ProcessingState::Completed);
    assert_eq!(report.source, Some(EnhancementSource::LocalFallback));
    assert_eq!(report.notice, Some(UserNotice::LocalEnhancementApplied));

    let set = orchestrator
        .store()
        .snapshot("listing-1")
        .expect("snapshot failed")
        .expect("set missing");
    assert_eq!(set.original, Some(jpeg));
    assert_ne!(set.enhanced, set.original);
}

#[tokio::test]
async fn superseded_capture_never_overwrites_newer_one() {
    let first_photo = gray_png(200);
    let second_photo = gray_png(100);
    let entered = Arc::new(Notify::new());
    let release = Arc::new(Semaphore::new(0));

    let orchestrator = orchestrator(
        Gated {
            held: first_photo.clone(),
            entered: Arc::clone(&entered),
            release: Arc::clone(&release),
        },
        lossless_config(),
    );

    let first = tokio::spawn({
        let orchestrator = orchestrator.clone();
        let photo = first_photo.clone();
        async move { orchestrator.process_capture("listing-1", photo).await }
    });

    entered.notified().await;

    let second = orchestrator
        .process_capture("listing-1", second_photo.clone())
        .await
        .expect("second capture failed");
    assert!(second.applied);

    release.add_permits(2);
    let first = first
        .await
        .expect("first task panicked")
        .expect("first capture failed");

    assert!(!first.applied);
    assert_eq!(first.notice, None);
    assert!(first.generation < second.generation);

    let set = orchestrator
        .store()
        .snapshot("listing-1")
        .expect("snapshot failed")
        .expect("set missing");
    assert_eq!(set.generation, second.generation);
    assert_eq!(set.original, Some(second_photo));
    assert_eq!(first_pixel(set.enhanced.as_ref().expect("enhanced missing")), [108, 108, 108, 255]);
}

// 单线程运行时：观察到 LocalFallback 后，首个拍摄在测试任务让出之前无法继续写入
#[tokio::test(flavor = "current_thread")]
async fn capture_superseded_during_local_fallback_is_discarded() {
    let orchestrator = orchestrator(QuotaExhausted::default(), lossless_config());
    let mut progress = orchestrator.subscribe();
    let second_photo = gray_png(100);

    let first = tokio::spawn({
        let orchestrator = orchestrator.clone();
        let photo = gray_png_sized(256, 256, 200);
        async move { orchestrator.process_capture("listing-1", photo).await }
    });

    progress
        .wait_for(|update| {
            update
                .as_ref()
                .is_some_and(|u| u.state == ProcessingState::LocalFallback)
        })
        .await
        .expect("progress channel closed");

    let second = orchestrator
        .process_capture("listing-1", second_photo.clone())
        .await
        .expect("second capture failed");
    let first = first
        .await
        .expect("first task panicked")
        .expect("first capture failed");

    assert!(second.applied);
    assert!(!first.applied);
    assert_eq!(first.state, ProcessingState::Completed);
    assert_eq!(first.source, None);
    assert!(first.generation < second.generation);

    let set = orchestrator
        .store()
        .snapshot("listing-1")
        .expect("snapshot failed")
        .expect("set missing");
    assert_eq!(set.generation, second.generation);
    assert_eq!(set.original, Some(second_photo));
    assert_eq!(first_pixel(set.enhanced.as_ref().expect("enhanced missing")), [108, 108, 108, 255]);
}

#[tokio::test]
async fn progress_reports_latest_transition() {
    let orchestrator = orchestrator(UnavailableGenerator, lossless_config());
    let progress = orchestrator.subscribe();
    assert_eq!(*progress.borrow(), None);

    let report = orchestrator
        .process_capture("listing-1", gray_png(100))
        .await
        .expect("process failed");

    assert_eq!(
        *progress.borrow(),
        Some(ProgressUpdate {
            listing_id: "listing-1".to_string(),
            generation: report.generation,
            state: ProcessingState::Completed,
        })
    );
}

#[tokio::test]
async fn listings_are_isolated() {
    let orchestrator = orchestrator(QuotaExhausted::default(), lossless_config());

    orchestrator
        .process_capture("listing-a", gray_png(100))
        .await
        .expect("process failed");
    orchestrator
        .process_capture("listing-b", gray_png(200))
        .await
        .expect("process failed");

    let a = orchestrator
        .store()
        .snapshot("listing-a")
        .expect("snapshot failed")
        .expect("set missing");
    assert_eq!(first_pixel(a.enhanced.as_ref().expect("enhanced missing")), [108, 108, 108, 255]);
}
