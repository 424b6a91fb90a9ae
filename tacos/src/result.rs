use std::collections::BTreeMap;

use serde::Serialize;

use crate::collective::Collective;
use crate::topology::Topology;
use crate::{ChunkId, NpuId, Time};

/// One chunk movement over one link: the chunk arrives at `arrival` and its
/// transmission started one link delay earlier at `start`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LinkChunkRecord {
    pub chunk: ChunkId,
    pub arrival: Time,
    pub start: Time,
}

/// Ingress and egress schedule of a single NPU, keyed by connected peer.
#[derive(Debug, Clone, PartialEq)]
pub struct NpuResult {
    npu: NpuId,

    ingress: BTreeMap<NpuId, Vec<LinkChunkRecord>>,
    egress: BTreeMap<NpuId, Vec<LinkChunkRecord>>,

    // chunk -> index of the last ingress record that delivered it
    dependency: Vec<Option<usize>>,
}

impl NpuResult {
    fn new(npu: NpuId, topology: &Topology, chunks_count: usize) -> Self {
        let npus_count = topology.npus_count();

        let mut ingress = BTreeMap::new();
        let mut egress = BTreeMap::new();
        for peer in 0..npus_count {
            if peer == npu {
                continue;
            }
            if topology.is_connected(npu, peer) {
                egress.insert(peer, Vec::new());
            }
            if topology.is_connected(peer, npu) {
                ingress.insert(peer, Vec::new());
            }
        }

        NpuResult {
            npu,
            ingress,
            egress,
            dependency: vec![None; chunks_count],
        }
    }

    fn add_ingress(&mut self, chunk: ChunkId, src: NpuId, arrival: Time, start: Time) {
        let npu = self.npu;
        let records = self
            .ingress
            .get_mut(&src)
            .unwrap_or_else(|| panic!("no link {} -> {}", src, npu));
        records.push(LinkChunkRecord { chunk, arrival, start });

        // last write wins
        self.dependency[chunk] = Some(records.len() - 1);
    }

    fn add_egress(&mut self, chunk: ChunkId, dest: NpuId, arrival: Time, start: Time) {
        let npu = self.npu;
        self.egress
            .get_mut(&dest)
            .unwrap_or_else(|| panic!("no link {} -> {}", npu, dest))
            .push(LinkChunkRecord { chunk, arrival, start });
    }

    #[inline]
    pub fn npu(&self) -> NpuId {
        self.npu
    }

    pub fn ingress_link_info(&self, src: NpuId) -> &[LinkChunkRecord] {
        self.ingress.get(&src).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn egress_link_info(&self, dest: NpuId) -> &[LinkChunkRecord] {
        self.egress.get(&dest).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Peers with a link into this NPU, ascending, with their delivery logs.
    pub fn ingress(&self) -> impl Iterator<Item = (NpuId, &[LinkChunkRecord])> + '_ {
        self.ingress.iter().map(|(&peer, records)| (peer, records.as_slice()))
    }

    /// Peers this NPU can transmit to, ascending, with their delivery logs.
    pub fn egress(&self) -> impl Iterator<Item = (NpuId, &[LinkChunkRecord])> + '_ {
        self.egress.iter().map(|(&peer, records)| (peer, records.as_slice()))
    }

    pub fn dependency(&self, chunk: ChunkId) -> Option<usize> {
        self.dependency[chunk]
    }
}

/// The synthesized schedule: per-NPU link-chunk timings plus the makespan.
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesisResult {
    npus_count: usize,
    chunks_count: usize,

    npu_results: Vec<NpuResult>,
    collective_time: Time,
}

impl SynthesisResult {
    pub fn new(topology: &Topology, collective: &Collective) -> Self {
        let npus_count = topology.npus_count();
        let chunks_count = collective.chunks_count();

        let npu_results = (0..npus_count)
            .map(|npu| NpuResult::new(npu, topology, chunks_count))
            .collect();

        SynthesisResult {
            npus_count,
            chunks_count,
            npu_results,
            collective_time: 0,
        }
    }

    pub fn mark_link_chunk_match(
        &mut self,
        chunk: ChunkId,
        src: NpuId,
        dest: NpuId,
        arrival: Time,
        start: Time,
    ) {
        assert!(chunk < self.chunks_count, "chunk {} out of range", chunk);
        assert!(src < self.npus_count, "NPU {} out of range", src);
        assert!(dest < self.npus_count, "NPU {} out of range", dest);

        self.npu_results[src].add_egress(chunk, dest, arrival, start);
        self.npu_results[dest].add_ingress(chunk, src, arrival, start);
    }

    pub fn set_collective_time(&mut self, collective_time: Time) {
        self.collective_time = collective_time;
    }

    #[inline]
    pub fn collective_time(&self) -> Time {
        self.collective_time
    }

    #[inline]
    pub fn npus_count(&self) -> usize {
        self.npus_count
    }

    pub fn npu_result(&self, npu: NpuId) -> &NpuResult {
        &self.npu_results[npu]
    }

    pub fn npu_results(&self) -> &[NpuResult] {
        &self.npu_results
    }

    pub fn egress_link_info(&self, src: NpuId, dest: NpuId) -> &[LinkChunkRecord] {
        self.npu_results[src].egress_link_info(dest)
    }

    pub fn ingress_link_info(&self, src: NpuId, dest: NpuId) -> &[LinkChunkRecord] {
        self.npu_results[dest].ingress_link_info(src)
    }
}
