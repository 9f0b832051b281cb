//! # 商品草稿与回退编排（listing）
//!
//! - `set`：`ListingImageSet`（原图 / 增强 / 卡通三槽位）
//! - `store`：按商品 id 保存草稿，代次计数保证后拍摄者胜
//! - `orchestrator`：远程优先、本地回退的状态机

mod orchestrator;
mod set;
mod store;

pub use orchestrator::{
    FallbackOrchestrator, ProcessingReport, ProcessingState, ProgressUpdate, UserNotice,
};
pub use set::{EnhancementSource, ListingImageSet};
pub use store::ListingDraftStore;
