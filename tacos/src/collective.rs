use std::collections::BTreeSet;

use crate::{ChunkId, ChunkSize, CollectiveCondition, NpuId};

/// The collective to synthesize: which NPU holds which chunks initially
/// (precondition) and which chunks every NPU must end up with
/// (postcondition).
#[derive(Debug, Clone)]
pub struct Collective {
    npus_count: usize,
    chunk_size: ChunkSize,

    chunks: BTreeSet<ChunkId>,
    precondition: CollectiveCondition,
    postcondition: CollectiveCondition,
}

impl Collective {
    pub fn new(npus_count: usize, chunk_size: ChunkSize) -> Self {
        assert!(npus_count > 0);
        assert!(chunk_size > 0);

        // every NPU gets a precondition entry, even if it holds nothing;
        // postcondition entries exist only while chunks remain wanted
        let precondition = (0..npus_count).map(|npu| (npu, BTreeSet::new())).collect();

        Collective {
            npus_count,
            chunk_size,
            chunks: BTreeSet::new(),
            precondition,
            postcondition: CollectiveCondition::new(),
        }
    }

    /// All-Gather: NPU `i` starts with chunks `[i * c, (i + 1) * c)` and every
    /// NPU must end up holding every chunk.
    pub fn all_gather(npus_count: usize, chunk_size: ChunkSize, chunks_per_npu: usize) -> Self {
        assert!(chunks_per_npu > 0);

        let mut collective = Self::new(npus_count, chunk_size);
        for src in 0..npus_count {
            for offset in 0..chunks_per_npu {
                let chunk = src * chunks_per_npu + offset;
                for dest in 0..npus_count {
                    if dest == src {
                        continue;
                    }
                    collective.add(chunk, src, dest);
                }
            }
        }
        collective
    }

    /// Registers `chunk` as initially held by `src` and required at `dest`.
    pub fn add(&mut self, chunk: ChunkId, src: NpuId, dest: NpuId) {
        assert!(src < self.npus_count, "NPU {} out of range", src);
        assert!(dest < self.npus_count, "NPU {} out of range", dest);

        self.chunks.insert(chunk);
        self.precondition.get_mut(&src).unwrap().insert(chunk);
        self.postcondition.entry(dest).or_default().insert(chunk);
    }

    #[inline]
    pub fn npus_count(&self) -> usize {
        self.npus_count
    }

    #[inline]
    pub fn chunk_size(&self) -> ChunkSize {
        self.chunk_size
    }

    #[inline]
    pub fn chunks_count(&self) -> usize {
        self.chunks.len()
    }

    /// Owned copy; the synthesizer mutates it as chunks move.
    pub fn precondition(&self) -> CollectiveCondition {
        self.precondition.clone()
    }

    /// Owned copy; the synthesizer drains it as requirements are met.
    pub fn postcondition(&self) -> CollectiveCondition {
        self.postcondition.clone()
    }
}
