//! # 商品草稿存储
//!
//! ## 设计思路
//!
//! 编排层把每次拍摄的结果写入以商品 / 会话 id 为键的 `ListingImageSet`，下游 UI 从这里读取预览。
//! 同一商品可能连续拍摄多次，而较早一次的处理可能更晚完成，
//! 因此每次拍摄都分配一个单调递增的代次（generation），只有当前代次允许写入结果。
//!
//! ## 实现思路
//!
//! - `Mutex<LruCache>` 保存草稿，超出容量时淘汰最久未使用的商品。
//! - 代次由全局计数器分配：即使商品被淘汰后重新拍摄，新代次也一定大于任何在途代次。
//! - 所有“检查代次 + 写入”在同一把锁内完成，不存在检查与写入之间的竞态。

use std::num::NonZeroUsize;
use std::sync::{Mutex, MutexGuard};

use lru::LruCache;

use super::{EnhancementSource, ListingImageSet};
use crate::enhance::EncodedImage;
use crate::error::AppError;

struct DraftState {
    drafts: LruCache<String, ListingImageSet>,
    next_generation: u64,
}

/// 商品草稿存储（进程内）。
pub struct ListingDraftStore {
    state: Mutex<DraftState>,
}

impl ListingDraftStore {
    /// 创建存储，`capacity` 为最多跟踪的商品数（0 按 1 处理）。
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            state: Mutex::new(DraftState {
                drafts: LruCache::new(capacity),
                next_generation: 1,
            }),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, DraftState>, AppError> {
        self.state
            .lock()
            .map_err(|_| AppError::DraftStore("草稿存储锁已中毒".to_string()))
    }

    /// 登记一次新拍摄，返回其代次。
    ///
    /// 旧代次的在途处理从此刻起都无法再写入。
    ///
    /// # 示例
    /// ```rust
    /// use listing_enhancer::enhance::{EncodedImage, MediaType};
    /// use listing_enhancer::listing::ListingDraftStore;
    ///
    /// let store = ListingDraftStore::new(8);
    /// let photo = EncodedImage::new(MediaType::Png, vec![1_u8, 2, 3]);
    /// let first = store.begin_capture("listing-1", photo.clone())?;
    /// let second = store.begin_capture("listing-1", photo)?;
    /// assert!(second > first);
    /// assert!(!store.is_current("listing-1", first)?);
    /// # Ok::<(), listing_enhancer::error::AppError>(())
    /// ```
    pub fn begin_capture(&self, listing_id: &str, original: EncodedImage) -> Result<u64, AppError> {
        let mut state = self.lock()?;
        let generation = state.next_generation;
        state.next_generation += 1;

        if let Some((evicted, _)) = state
            .drafts
            .push(listing_id.to_string(), ListingImageSet::captured(original, generation))
            .filter(|(key, _)| key != listing_id)
        {
            log::debug!("🗑️ 草稿数量超出上限，淘汰商品：{}", evicted);
        }

        log::debug!("📸 新拍摄 - listing: {} generation: {}", listing_id, generation);
        Ok(generation)
    }

    /// 写入处理结果；代次已过期（或草稿已被移除）时丢弃并返回 `false`。
    pub fn commit(
        &self,
        listing_id: &str,
        generation: u64,
        enhanced: EncodedImage,
        cartoon: EncodedImage,
        source: EnhancementSource,
    ) -> Result<bool, AppError> {
        let mut state = self.lock()?;

        let Some(set) = state.drafts.get_mut(listing_id) else {
            return Ok(false);
        };
        if set.generation != generation {
            return Ok(false);
        }

        set.enhanced = Some(enhanced);
        set.cartoon = Some(cartoon);
        set.source = Some(source);
        set.updated_at = chrono::Utc::now().timestamp_millis();
        Ok(true)
    }

    /// 读取当前图片集合（不影响 LRU 顺序）。
    pub fn snapshot(&self, listing_id: &str) -> Result<Option<ListingImageSet>, AppError> {
        Ok(self.lock()?.drafts.peek(listing_id).cloned())
    }

    /// 当前代次。
    pub fn current_generation(&self, listing_id: &str) -> Result<Option<u64>, AppError> {
        Ok(self.lock()?.drafts.peek(listing_id).map(|set| set.generation))
    }

    /// 给定代次是否仍是该商品的最新拍摄。
    pub fn is_current(&self, listing_id: &str, generation: u64) -> Result<bool, AppError> {
        Ok(self.current_generation(listing_id)? == Some(generation))
    }

    /// 放弃一次无法完成的拍摄：仅当给定代次仍是最新时移除草稿，返回是否移除。
    ///
    /// 更新的拍摄不受影响。
    pub fn discard(&self, listing_id: &str, generation: u64) -> Result<bool, AppError> {
        let mut state = self.lock()?;
        if state.drafts.peek(listing_id).map(|set| set.generation) != Some(generation) {
            return Ok(false);
        }
        state.drafts.pop(listing_id);
        log::debug!("🗑️ 放弃拍摄 - listing: {} generation: {}", listing_id, generation);
        Ok(true)
    }

    /// 移除草稿（例如商品发布或放弃编辑后）。
    pub fn remove(&self, listing_id: &str) -> Result<Option<ListingImageSet>, AppError> {
        Ok(self.lock()?.drafts.pop(listing_id))
    }

    pub fn len(&self) -> Result<usize, AppError> {
        Ok(self.lock()?.drafts.len())
    }

    pub fn is_empty(&self) -> Result<bool, AppError> {
        Ok(self.len()? == 0)
    }
}
