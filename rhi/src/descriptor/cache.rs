//! Content-addressed descriptor set cache.

use ash::vk;
use rustc_hash::FxHashMap;

/// Maps a content hash to a descriptor set that was already written.
///
/// The cache grows without bound; its owner clears it whenever the sets it
/// refers to are recycled.
#[derive(Debug, Default)]
pub struct DescriptorSetCache {
    sets: FxHashMap<u64, vk::DescriptorSet>,
    hits: u64,
    misses: u64,
}

impl DescriptorSetCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up `hash`, counting a hit or a miss.
    pub fn get(&mut self, hash: u64) -> Option<vk::DescriptorSet> {
        let set = self.sets.get(&hash).copied();
        if set.is_some() {
            self.hits += 1;
        } else {
            self.misses += 1;
        }
        set
    }

    pub fn insert(&mut self, hash: u64, set: vk::DescriptorSet) {
        self.sets.insert(hash, set);
    }

    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn misses(&self) -> u64 {
        self.misses
    }

    /// Forget every entry. Counters are kept.
    pub fn clear(&mut self) {
        self.sets.clear();
    }
}
