//! # 商品图片增强 — 库入口
//!
//! ## 架构总览
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │            拍摄 / 上传（EncodedImage，Data URL）          │
//! └───────┬──────────────────────────────────────────────────┘
//!         ↓
//! ┌───────┼──────────────────────────────────────────────────┐
//! │  listing::FallbackOrchestrator                           │
//! │       │                                                  │
//! │       ├─ remote ──── ImageGenerator（AI 增强 / 卡通）     │
//! │       │     └─ 失败（配额 / 超时 / 网络）                  │
//! │       │            ↓                                     │
//! │       ├─ enhance ─── ImageEnhancer 本地回退               │
//! │       │     ├─ tone      亮度 + 对比度                    │
//! │       │     └─ quantize  色阶化 + 对比度                  │
//! │       ↓                                                  │
//! │  listing::ListingDraftStore（代次校验，后拍摄者胜）       │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ## 模块职责
//!
//! | 模块 | 职责 |
//! |------|------|
//! | [`error`] | 统一错误类型 `AppError` |
//! | [`enhance`] | 解码、色调调整、色彩量化、重新编码 |
//! | [`remote`] | 远程 AI 生成能力抽象与 HTTP 实现 |
//! | [`listing`] | 商品图片集合、草稿存储、回退编排 |
//! | [`settings`] | JSON 设置文件读写 |

pub mod error;
pub mod enhance;
pub mod remote;
pub mod listing;
pub mod settings;
