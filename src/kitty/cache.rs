//! Image storage with a byte-budget LRU eviction policy.
//!
//! Stored images are accounted by payload size. When an insert pushes the
//! total over the configured limit the cache evicts least-recently-used
//! images that no placement references first, then falls back to global
//! LRU. The limit itself is clamped to a 4 GiB ceiling.

use rustc_hash::{FxHashMap, FxHashSet};

/// Hard ceiling on the configurable cache limit.
pub const MAX_CACHE_BYTES: usize = 4 << 30;
/// Largest accepted single image payload.
pub const MAX_IMAGE_BYTES: usize = 400 << 20;
/// Largest accepted image dimension per axis, in pixels.
pub const MAX_IMAGE_DIM: u32 = 10000;

/// Decoded-or-raw image payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageData {
    /// Undecoded PNG blob (the renderer decodes on demand).
    Png(Vec<u8>),
    /// Raw pixels, tightly packed.
    Rgba {
        width: u32,
        height: u32,
        bytes_per_pixel: u8,
        pixels: Vec<u8>,
    },
}

impl ImageData {
    #[must_use]
    pub fn byte_size(&self) -> usize {
        match self {
            Self::Png(blob) => blob.len(),
            Self::Rgba { pixels, .. } => pixels.len(),
        }
    }
}

/// A stored image.
#[derive(Debug, Clone)]
pub struct ImageEntry {
    pub id: u32,
    pub number: u32,
    pub data: ImageData,
    pub width: u32,
    pub height: u32,
    pub byte_size: usize,
    /// Monotonic access tick for LRU ordering.
    pub last_access: u64,
}

/// The image cache proper.
#[derive(Debug, Clone)]
pub struct ImageCache {
    images: FxHashMap<u32, ImageEntry>,
    number_to_id: FxHashMap<u32, u32>,
    next_image_id: u32,
    total_bytes: usize,
    limit: usize,
    tick: u64,
}

impl ImageCache {
    #[must_use]
    pub fn new(limit: usize) -> Self {
        Self {
            images: FxHashMap::default(),
            number_to_id: FxHashMap::default(),
            next_image_id: 1,
            total_bytes: 0,
            limit: limit.min(MAX_CACHE_BYTES),
            tick: 0,
        }
    }

    /// Total bytes currently stored. Always equals the sum of entry sizes.
    #[must_use]
    pub fn total_bytes(&self) -> usize {
        self.total_bytes
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.images.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    pub fn set_limit(&mut self, limit: usize) {
        self.limit = limit.min(MAX_CACHE_BYTES);
    }

    /// Allocate a fresh image id.
    pub fn allocate_id(&mut self) -> u32 {
        let id = self.next_image_id;
        self.next_image_id = self.next_image_id.wrapping_add(1).max(1);
        id
    }

    /// Resolve an image number to its most recent id.
    #[must_use]
    pub fn id_for_number(&self, number: u32) -> Option<u32> {
        self.number_to_id.get(&number).copied()
    }

    #[must_use]
    pub fn contains(&self, id: u32) -> bool {
        self.images.contains_key(&id)
    }

    #[must_use]
    pub fn get(&self, id: u32) -> Option<&ImageEntry> {
        self.images.get(&id)
    }

    /// Fetch and refresh the access tick.
    pub fn touch(&mut self, id: u32) -> Option<&ImageEntry> {
        self.tick += 1;
        let tick = self.tick;
        let entry = self.images.get_mut(&id)?;
        entry.last_access = tick;
        Some(entry)
    }

    /// Store an image under `id`, replacing any previous payload.
    ///
    /// Returns ids evicted to satisfy the byte budget; `used` lists images
    /// that placements currently reference (evicted last).
    pub fn insert(
        &mut self,
        id: u32,
        number: u32,
        data: ImageData,
        width: u32,
        height: u32,
        used: &FxHashSet<u32>,
    ) -> Vec<u32> {
        self.tick += 1;
        let byte_size = data.byte_size();
        if let Some(old) = self.images.remove(&id) {
            self.total_bytes -= old.byte_size;
        }
        self.images.insert(
            id,
            ImageEntry {
                id,
                number,
                data,
                width,
                height,
                byte_size,
                last_access: self.tick,
            },
        );
        self.total_bytes += byte_size;
        if number != 0 {
            self.number_to_id.insert(number, id);
        }
        self.evict_over_budget(used, id)
    }

    /// Remove an image outright (explicit delete).
    pub fn remove(&mut self, id: u32) -> Option<ImageEntry> {
        let entry = self.images.remove(&id)?;
        self.total_bytes -= entry.byte_size;
        if self.number_to_id.get(&entry.number) == Some(&id) {
            self.number_to_id.remove(&entry.number);
        }
        Some(entry)
    }

    /// Evict until under budget: unused LRU first, then global LRU.
    /// `pinned` is never evicted (the image just inserted).
    fn evict_over_budget(&mut self, used: &FxHashSet<u32>, pinned: u32) -> Vec<u32> {
        let mut evicted = Vec::new();
        while self.total_bytes > self.limit && self.images.len() > 1 {
            let victim = self
                .images
                .values()
                .filter(|e| e.id != pinned && !used.contains(&e.id))
                .min_by_key(|e| e.last_access)
                .map(|e| e.id)
                .or_else(|| {
                    self.images
                        .values()
                        .filter(|e| e.id != pinned)
                        .min_by_key(|e| e.last_access)
                        .map(|e| e.id)
                });
            match victim {
                Some(id) => {
                    self.remove(id);
                    evicted.push(id);
                }
                None => break,
            }
        }
        if !evicted.is_empty() {
            tracing::debug!(count = evicted.len(), "image cache evicted under byte budget");
        }
        evicted
    }

    /// Drop everything.
    pub fn clear(&mut self) {
        self.images.clear();
        self.number_to_id.clear();
        self.total_bytes = 0;
    }

    /// Iterate stored entries in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = &ImageEntry> {
        self.images.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rgba(len: usize) -> ImageData {
        ImageData::Rgba {
            width: 1,
            height: 1,
            bytes_per_pixel: 4,
            pixels: vec![0; len],
        }
    }

    fn no_used() -> FxHashSet<u32> {
        FxHashSet::default()
    }

    #[test]
    fn accounting_tracks_inserts_and_removes() {
        let mut cache = ImageCache::new(1000);
        cache.insert(1, 0, rgba(100), 1, 1, &no_used());
        cache.insert(2, 0, rgba(200), 1, 1, &no_used());
        assert_eq!(cache.total_bytes(), 300);
        cache.remove(1);
        assert_eq!(cache.total_bytes(), 200);
        let manual: usize = cache.iter().map(|e| e.byte_size).sum();
        assert_eq!(manual, cache.total_bytes());
    }

    #[test]
    fn replacing_an_id_releases_old_bytes() {
        let mut cache = ImageCache::new(1000);
        cache.insert(1, 0, rgba(400), 1, 1, &no_used());
        cache.insert(1, 0, rgba(100), 1, 1, &no_used());
        assert_eq!(cache.total_bytes(), 100);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn eviction_prefers_unused_lru() {
        let mut cache = ImageCache::new(250);
        cache.insert(1, 0, rgba(100), 1, 1, &no_used());
        cache.insert(2, 0, rgba(100), 1, 1, &no_used());
        // Image 1 is older but referenced by a placement.
        let mut used = FxHashSet::default();
        used.insert(1);
        let evicted = cache.insert(3, 0, rgba(100), 1, 1, &used);
        assert_eq!(evicted, vec![2]);
        assert!(cache.contains(1));
        assert!(cache.contains(3));
    }

    #[test]
    fn eviction_falls_back_to_global_lru() {
        let mut cache = ImageCache::new(250);
        let mut used = FxHashSet::default();
        used.insert(1);
        used.insert(2);
        cache.insert(1, 0, rgba(100), 1, 1, &used);
        cache.insert(2, 0, rgba(100), 1, 1, &used);
        cache.touch(1);
        let evicted = cache.insert(3, 0, rgba(100), 1, 1, &used);
        // Everything is "used": oldest access goes first, which is 2.
        assert_eq!(evicted, vec![2]);
    }

    #[test]
    fn number_maps_to_latest_id() {
        let mut cache = ImageCache::new(1000);
        cache.insert(10, 7, rgba(10), 1, 1, &no_used());
        cache.insert(11, 7, rgba(10), 1, 1, &no_used());
        assert_eq!(cache.id_for_number(7), Some(11));
    }

    #[test]
    fn limit_is_clamped() {
        let cache = ImageCache::new(usize::MAX);
        assert!(cache.limit <= MAX_CACHE_BYTES);
    }

    #[test]
    fn allocate_id_monotonic() {
        let mut cache = ImageCache::new(100);
        let a = cache.allocate_id();
        let b = cache.allocate_id();
        assert_ne!(a, b);
    }
}
