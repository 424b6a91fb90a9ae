use std::collections::BTreeSet;

use crate::topology::Topology;
use crate::{NpuId, Time};

/// Time-expanded view of the topology: each link at each point in time is a
/// distinct resource, realized as a per-link busy-until timestamp.
///
/// An arrival over `(src, dest)` at the current time reflects a transmission
/// initiated one link delay earlier. A link can deliver only if that start
/// time is not before time zero and its previous occupation has drained.
#[derive(Debug, Clone)]
pub struct TimeExpandedNetwork<'a> {
    topology: &'a Topology,
    npus_count: usize,

    current_time: Time,

    link_busy_until: Vec<Vec<Time>>,
    link_available: Vec<Vec<bool>>,
}

impl<'a> TimeExpandedNetwork<'a> {
    pub fn new(topology: &'a Topology) -> Self {
        let npus_count = topology.npus_count();

        let mut ten = TimeExpandedNetwork {
            topology,
            npus_count,
            current_time: 0,
            link_busy_until: vec![vec![0; npus_count]; npus_count],
            link_available: vec![vec![false; npus_count]; npus_count],
        };
        ten.update_link_availability();
        ten
    }

    pub fn update_current_time(&mut self, new_current_time: Time) {
        assert!(new_current_time >= self.current_time);
        self.current_time = new_current_time;
        self.update_link_availability();
    }

    /// One-hop backtrack: sources whose link into `dest` could have finished
    /// a transmission by the current time.
    pub fn backtrack(&self, dest: NpuId) -> BTreeSet<NpuId> {
        assert!(dest < self.npus_count, "NPU {} out of range", dest);

        (0..self.npus_count)
            .filter(|&src| self.topology.is_connected(src, dest) && self.link_available[src][dest])
            .collect()
    }

    pub fn mark_link_occupied(&mut self, src: NpuId, dest: NpuId) {
        assert!(self.link_available[src][dest], "link {} -> {} is busy", src, dest);

        self.link_busy_until[src][dest] = self.current_time + self.topology.link_delay(src, dest);
        self.link_available[src][dest] = false;
    }

    /// True when no link has an occupation extending past the current time.
    pub fn all_links_idle(&self) -> bool {
        (0..self.npus_count).all(|src| {
            (0..self.npus_count)
                .all(|dest| !self.topology.is_connected(src, dest) || self.link_available[src][dest])
        })
    }

    fn update_link_availability(&mut self) {
        for src in 0..self.npus_count {
            for dest in 0..self.npus_count {
                if !self.topology.is_connected(src, dest) {
                    continue;
                }
                // a delivery now must have started at current_time - delay
                let ripe = self.current_time >= self.topology.link_delay(src, dest);
                self.link_available[src][dest] =
                    ripe && self.link_busy_until[src][dest] <= self.current_time;
            }
        }
    }
}
