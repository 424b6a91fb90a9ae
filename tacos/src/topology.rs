use std::collections::BTreeSet;

use log::debug;

use crate::bandwidth::Bandwidth;
use crate::{ChunkSize, Latency, NpuId, Time};

/// The point-to-point interconnect between NPUs.
///
/// Built in two phases: `set_npus_count` allocates the link tables, then
/// `connect` adds directed links. Once `set_chunk_size` is called the
/// per-link delays are frozen and the topology becomes read only.
///
/// Misuse (out-of-range ids, duplicate links, querying delays before the
/// chunk size is set) is a bug in the caller and panics.
#[derive(Debug, Default, Clone)]
pub struct Topology {
    npus_count: usize,
    npus_count_set: bool,

    links_count: usize,

    connected: Vec<Vec<bool>>,
    latencies: Vec<Vec<Latency>>,
    bandwidths: Vec<Vec<Bandwidth>>,

    chunk_size: ChunkSize,
    chunk_size_set: bool,

    link_delays: Vec<Vec<Time>>,
    distinct_link_delays: BTreeSet<Time>,
}

impl Topology {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn set_npus_count(&mut self, npus_count: usize) {
        assert!(!self.npus_count_set, "NPUs count already set");
        assert!(npus_count > 0);

        self.npus_count = npus_count;
        self.npus_count_set = true;

        self.connected = vec![vec![false; npus_count]; npus_count];
        self.latencies = vec![vec![-1.0; npus_count]; npus_count];
        self.bandwidths = vec![vec![Bandwidth::default(); npus_count]; npus_count];
        self.link_delays = vec![vec![Time::MAX; npus_count]; npus_count];
    }

    pub fn connect(
        &mut self,
        src: NpuId,
        dest: NpuId,
        latency: Latency,
        bandwidth: Bandwidth,
        bidirectional: bool,
    ) {
        self.check_npu(src);
        self.check_npu(dest);
        assert_ne!(src, dest, "self-loop on NPU {}", src);
        assert!(latency >= 0.0);
        assert!(bandwidth.val() > 0.0);
        assert!(!self.connected[src][dest], "duplicate link {} -> {}", src, dest);
        assert!(!self.chunk_size_set, "topology is frozen");

        self.connected[src][dest] = true;
        self.latencies[src][dest] = latency;
        self.bandwidths[src][dest] = bandwidth;
        self.links_count += 1;

        if bidirectional {
            self.connect(dest, src, latency, bandwidth, false);
        }
    }

    /// Freezes the chunk size and computes every link delay in picoseconds.
    pub fn set_chunk_size(&mut self, chunk_size: ChunkSize) {
        assert!(!self.chunk_size_set, "chunk size already set");
        assert!(chunk_size > 0);

        self.chunk_size = chunk_size;
        self.chunk_size_set = true;

        for src in 0..self.npus_count {
            for dest in 0..self.npus_count {
                if !self.connected[src][dest] {
                    continue;
                }

                let link_delay = self.compute_link_delay(src, dest);
                self.link_delays[src][dest] = link_delay;
                self.distinct_link_delays.insert(link_delay);
            }
        }

        debug!(
            "chunk size {} B, distinct link delays: {:?}",
            chunk_size, self.distinct_link_delays
        );
    }

    // alpha-beta model: delay_ns = latency + chunk_size / (bandwidth in bytes/ns)
    fn compute_link_delay(&self, src: NpuId, dest: NpuId) -> Time {
        let beta = 1.0 / self.bandwidths[src][dest].bytes_per_ns();
        let link_delay_ns = self.latencies[src][dest] + beta * self.chunk_size as f64;
        let link_delay_ps = (link_delay_ns * 1e3) as Time;
        assert!(link_delay_ps > 0, "degenerate link delay {} -> {}", src, dest);
        link_delay_ps
    }

    #[inline]
    pub fn npus_count(&self) -> usize {
        assert!(self.npus_count_set);
        self.npus_count
    }

    #[inline]
    pub fn links_count(&self) -> usize {
        self.links_count
    }

    #[inline]
    pub fn is_connected(&self, src: NpuId, dest: NpuId) -> bool {
        self.check_npu(src);
        self.check_npu(dest);
        self.connected[src][dest]
    }

    #[inline]
    pub fn link_delay(&self, src: NpuId, dest: NpuId) -> Time {
        assert!(self.chunk_size_set, "chunk size not set");
        assert!(self.is_connected(src, dest), "no link {} -> {}", src, dest);
        self.link_delays[src][dest]
    }

    #[inline]
    pub fn latency(&self, src: NpuId, dest: NpuId) -> Latency {
        assert!(self.is_connected(src, dest), "no link {} -> {}", src, dest);
        self.latencies[src][dest]
    }

    #[inline]
    pub fn bandwidth(&self, src: NpuId, dest: NpuId) -> Bandwidth {
        assert!(self.is_connected(src, dest), "no link {} -> {}", src, dest);
        self.bandwidths[src][dest]
    }

    #[inline]
    pub fn chunk_size(&self) -> ChunkSize {
        assert!(self.chunk_size_set, "chunk size not set");
        self.chunk_size
    }

    pub fn distinct_link_delays(&self) -> &BTreeSet<Time> {
        assert!(self.chunk_size_set, "chunk size not set");
        &self.distinct_link_delays
    }

    #[inline]
    fn check_npu(&self, npu: NpuId) {
        assert!(self.npus_count_set);
        assert!(npu < self.npus_count, "NPU {} out of range", npu);
    }
}
