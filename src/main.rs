//! # 商品图片增强 — 命令行入口
//!
//! 读取一张商品照片，走一遍“远程优先、本地回退”流程，
//! 把增强与卡通两张结果写到输出目录。

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;

use listing_enhancer::enhance::{EncodedImage, EnhanceConfig, ImageEnhancer, load_from_file};
use listing_enhancer::error::AppError;
use listing_enhancer::listing::{FallbackOrchestrator, ListingDraftStore, ProcessingReport};
use listing_enhancer::remote::{HttpImageGenerator, ImageGenerator, UnavailableGenerator};
use listing_enhancer::settings::{EnhancerSettings, load_settings};

/// 命令行参数
#[derive(Parser, Debug)]
#[command(name = "listing-enhancer")]
#[command(about = "Enhance a listing photo with AI, falling back to a local pixel pipeline")]
#[command(version)]
struct Args {
    /// 输入图片
    input: PathBuf,

    /// 输出目录（默认与输入同目录）
    #[arg(short, long, value_name = "DIR")]
    out_dir: Option<PathBuf>,

    /// JSON 设置文件
    #[arg(short, long, value_name = "FILE", env = "LISTING_ENHANCER_SETTINGS")]
    settings: Option<PathBuf>,

    /// 远程生成服务地址，未提供时直接使用本地回退
    #[arg(short, long, value_name = "URL", env = "LISTING_ENHANCER_ENDPOINT")]
    endpoint: Option<String>,

    /// 远程生成服务密钥
    #[arg(long, env = "LISTING_ENHANCER_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// 商品 / 会话 id
    #[arg(long, default_value = "draft")]
    listing_id: String,
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    match run(args).await {
        Ok(report) => {
            if let Some(notice) = report.notice {
                println!("{}", notice.message());
            }
            ExitCode::SUCCESS
        }
        Err(err) => {
            log::error!("❌ {}", err);
            eprintln!("{}", err);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<ProcessingReport, AppError> {
    let settings = match &args.settings {
        Some(path) => load_settings(path)?.unwrap_or_default(),
        None => EnhancerSettings::default(),
    };

    let mut config = EnhanceConfig::default();
    settings.apply_to(&mut config)?;

    let endpoint = args.endpoint.clone().or_else(|| settings.remote_endpoint.clone());
    let api_key = args.api_key.clone().or_else(|| settings.remote_api_key.clone());

    let original = load_from_file(&args.input, config.max_file_size)?;
    log::info!(
        "📁 已读取输入图片 - {} ({}, {} bytes)",
        args.input.display(),
        original.media_type().mime(),
        original.len()
    );

    match endpoint {
        Some(endpoint) => {
            let mut generator =
                HttpImageGenerator::new(&endpoint, config.remote_timeout_ms, config.max_file_size)?;
            if let Some(key) = api_key {
                generator = generator.with_api_key(key);
            }
            process(generator, config, &args, original).await
        }
        None => {
            log::info!("🔌 未配置远程服务，直接使用本地回退");
            process(UnavailableGenerator, config, &args, original).await
        }
    }
}

async fn process<G: ImageGenerator>(
    generator: G,
    config: EnhanceConfig,
    args: &Args,
    original: EncodedImage,
) -> Result<ProcessingReport, AppError> {
    let store = Arc::new(ListingDraftStore::new(config.max_tracked_listings));
    let enhancer = ImageEnhancer::new(config)?;
    let orchestrator = FallbackOrchestrator::new(generator, enhancer, Arc::clone(&store));

    let report = orchestrator.process_capture(&args.listing_id, original).await?;

    let set = store.snapshot(&args.listing_id)?.ok_or_else(|| {
        AppError::DraftStore(format!("草稿不存在：{}", args.listing_id))
    })?;

    let out_dir = match &args.out_dir {
        Some(dir) => dir.clone(),
        None => args
            .input
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default(),
    };
    std::fs::create_dir_all(&out_dir)?;

    let stem = args
        .input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());

    for (suffix, image) in [("enhanced", &set.enhanced), ("cartoon", &set.cartoon)] {
        let Some(image) = image else {
            continue;
        };
        let path = out_dir.join(format!("{}-{}.{}", stem, suffix, image.media_type().extension()));
        std::fs::write(&path, image.bytes())?;
        log::info!("💾 已写入 {}", path.display());
    }

    Ok(report)
}
