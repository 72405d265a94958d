use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use lru::LruCache;
use tokio::sync::{Mutex, Notify, RwLock};

use super::range_reader::check_range;
use super::RangeReader;
use crate::error::IoError;

/// Default block size: 64KB
pub const DEFAULT_BLOCK_SIZE: usize = 64 * 1024;

/// Default cache capacity in number of blocks (256 * 64KB = 16MB).
pub const DEFAULT_BLOCK_CACHE_CAPACITY: usize = 256;

/// Block-based caching layer that wraps any RangeReader.
///
/// Opening a slide walks every IFD and reads each tag array separately,
/// which means dozens of small reads clustered around the start of the file.
/// The cache turns those into a handful of block-sized reads.
///
/// - Fixed-size blocks with LRU eviction
/// - Singleflight: concurrent requests for the same block share one fetch
/// - Reads spanning several blocks are stitched together
pub struct BlockCache<R> {
    inner: Arc<R>,
    block_size: usize,
    cache: RwLock<LruCache<u64, Bytes>>,
    in_flight: Mutex<HashMap<u64, Arc<Notify>>>,
}

impl<R: RangeReader> BlockCache<R> {
    /// Wrap `inner` with the default block size and capacity.
    pub fn new(inner: R) -> Self {
        Self::with_capacity(inner, DEFAULT_BLOCK_SIZE, DEFAULT_BLOCK_CACHE_CAPACITY)
    }

    /// Wrap `inner` caching at most `capacity` blocks of `block_size` bytes.
    ///
    /// Zero values are raised to one.
    pub fn with_capacity(inner: R, block_size: usize, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Arc::new(inner),
            block_size: block_size.max(1),
            cache: RwLock::new(LruCache::new(capacity)),
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    /// The wrapped reader.
    pub fn inner(&self) -> &R {
        &self.inner
    }

    /// Number of blocks currently held.
    pub async fn cached_blocks(&self) -> usize {
        self.cache.read().await.len()
    }

    async fn get_block(&self, block_idx: u64) -> Result<Bytes, IoError> {
        loop {
            {
                let mut cache = self.cache.write().await;
                if let Some(data) = cache.get(&block_idx) {
                    return Ok(data.clone());
                }
            }

            let notify = {
                let mut in_flight = self.in_flight.lock().await;

                if let Some(notify) = in_flight.get(&block_idx) {
                    let notify = notify.clone();
                    // Register before releasing the lock so the leader's wakeup is not missed
                    let notified = notify.notified();
                    drop(in_flight);
                    notified.await;
                    continue;
                }

                let notify = Arc::new(Notify::new());
                in_flight.insert(block_idx, notify.clone());
                notify
            };

            let result = self.fetch_block(block_idx).await;

            {
                let mut cache = self.cache.write().await;
                let mut in_flight = self.in_flight.lock().await;

                if let Ok(ref data) = result {
                    cache.put(block_idx, data.clone());
                }
                in_flight.remove(&block_idx);
            }

            notify.notify_waiters();
            return result;
        }
    }

    async fn fetch_block(&self, block_idx: u64) -> Result<Bytes, IoError> {
        let offset = block_idx * self.block_size as u64;
        let size = self.inner.size();

        // The last block is usually short
        let remaining = size.saturating_sub(offset);
        if remaining == 0 {
            return Err(IoError::RangeOutOfBounds {
                offset,
                requested: self.block_size as u64,
                size,
            });
        }

        let len = remaining.min(self.block_size as u64) as usize;
        self.inner.read_exact_at(offset, len).await
    }

    #[inline]
    fn block_for_offset(&self, offset: u64) -> u64 {
        offset / self.block_size as u64
    }

    #[inline]
    fn offset_within_block(&self, offset: u64) -> usize {
        (offset % self.block_size as u64) as usize
    }
}

#[async_trait]
impl<R: RangeReader + 'static> RangeReader for BlockCache<R> {
    async fn read_exact_at(&self, offset: u64, len: usize) -> Result<Bytes, IoError> {
        check_range(offset, len, self.inner.size())?;

        if len == 0 {
            return Ok(Bytes::new());
        }

        let start_block = self.block_for_offset(offset);
        let end_block = self.block_for_offset(offset + len as u64 - 1);

        if start_block == end_block {
            let block = self.get_block(start_block).await?;
            let start = self.offset_within_block(offset);
            return Ok(block.slice(start..start + len));
        }

        let mut result = BytesMut::with_capacity(len);
        let mut position = offset;

        for block_idx in start_block..=end_block {
            let block = self.get_block(block_idx).await?;
            let start = self.offset_within_block(position);
            let take = (block.len() - start).min(len - result.len());

            result.extend_from_slice(&block[start..start + take]);
            position += take as u64;
        }

        Ok(result.freeze())
    }

    fn size(&self) -> u64 {
        self.inner.size()
    }

    fn identifier(&self) -> &str {
        self.inner.identifier()
    }
}
