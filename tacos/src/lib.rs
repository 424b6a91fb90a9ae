use std::collections::{BTreeMap, BTreeSet};

pub mod bandwidth;

pub mod topology;

pub mod collective;

pub mod event_queue;

pub mod ten;

pub mod result;

pub mod synthesizer;
pub mod beam;

/// A compute endpoint in the topology graph.
pub type NpuId = usize;

/// An atomic unit of data moved by the collective.
pub type ChunkId = usize;

// picoseconds
pub type Time = u64;

// nanoseconds
pub type Latency = f64;

// bytes
pub type ChunkSize = u64;

/// Which NPU holds (precondition) or still requires (postcondition) which
/// chunks. Ordered so that seeded random index selection is reproducible.
pub type CollectiveCondition = BTreeMap<NpuId, BTreeSet<ChunkId>>;
