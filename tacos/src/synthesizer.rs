use std::collections::BTreeSet;

use log::{debug, trace};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use thiserror::Error;

use crate::collective::Collective;
use crate::event_queue::EventQueue;
use crate::result::SynthesisResult;
use crate::ten::TimeExpandedNetwork;
use crate::topology::Topology;
use crate::{ChunkId, CollectiveCondition, NpuId, Time};

#[derive(Error, Debug)]
pub enum SynthesisError {
    /// The postcondition cannot be met on this topology: an event tick made
    /// no match while every link was idle, so no later tick can do better.
    #[error("postcondition unreachable: no link-chunk match possible at {0} ps")]
    Unsatisfiable(Time),
}

/// How the engine picks the transmitting NPU among the candidates that hold
/// the wanted chunk and have an idle link into the destination.
pub trait SourceSelection {
    fn select(
        &mut self,
        candidates: &BTreeSet<NpuId>,
        dest: NpuId,
        topology: &Topology,
        rng: &mut StdRng,
    ) -> NpuId;
}

/// Uniform choice among the candidates.
#[derive(Debug, Default)]
pub struct RandomSelection;

impl SourceSelection for RandomSelection {
    fn select(
        &mut self,
        candidates: &BTreeSet<NpuId>,
        _dest: NpuId,
        _topology: &Topology,
        rng: &mut StdRng,
    ) -> NpuId {
        assert!(!candidates.is_empty());

        // a single candidate costs no randomness
        if candidates.len() == 1 {
            return *candidates.iter().next().unwrap();
        }

        let idx = rng.gen_range(0..candidates.len());
        *candidates.iter().nth(idx).unwrap()
    }
}

/// Deterministic choice: order candidates from slowest to fastest link and
/// take the second-slowest. With exactly two candidates this picks the
/// faster one; kept as is since the schedules it yields balance load across
/// co-equal links. Delay ties fall back to ascending NPU id.
#[derive(Debug, Default)]
pub struct GreedySelection;

impl SourceSelection for GreedySelection {
    fn select(
        &mut self,
        candidates: &BTreeSet<NpuId>,
        dest: NpuId,
        topology: &Topology,
        _rng: &mut StdRng,
    ) -> NpuId {
        assert!(!candidates.is_empty());

        if candidates.len() == 1 {
            return *candidates.iter().next().unwrap();
        }

        // candidates iterate ascending, so the stable sort keeps equal-delay
        // sources in NPU id order
        let mut by_delay: Vec<(NpuId, Time)> = candidates
            .iter()
            .map(|&src| (src, topology.link_delay(src, dest)))
            .collect();
        by_delay.sort_by(|a, b| b.1.cmp(&a.1));

        trace!("candidates into {} by descending delay: {:?}", dest, by_delay);

        by_delay[1].0
    }
}

/// One independent search over the time-expanded network: its own link
/// occupation state, working conditions, result log, and RNG stream.
pub(crate) struct SearchState<'a> {
    ten: TimeExpandedNetwork<'a>,
    precondition: CollectiveCondition,
    postcondition: CollectiveCondition,
    result: SynthesisResult,
    rng: StdRng,
}

impl<'a> SearchState<'a> {
    pub(crate) fn new(topology: &'a Topology, collective: &Collective, seed: u64) -> Self {
        SearchState {
            ten: TimeExpandedNetwork::new(topology),
            precondition: collective.precondition(),
            postcondition: collective.postcondition(),
            result: SynthesisResult::new(topology, collective),
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub(crate) fn advance(&mut self, current_time: Time) {
        self.ten.update_current_time(current_time);
    }

    /// Matches as many (destination, chunk) requirements as the idle links
    /// allow at this event time. Candidate sources are judged against the
    /// precondition as it stood when the tick began, so a chunk deposited
    /// at its destination within this tick is not forwarded again until the
    /// next one.
    pub(crate) fn run_matching<S: SourceSelection>(
        &mut self,
        topology: &Topology,
        selection: &mut S,
        current_time: Time,
    ) -> usize {
        let snapshot = self.precondition.clone();
        let mut pending = self.postcondition.clone();
        let mut matches = 0;

        while !pending.is_empty() {
            let (dest, chunk) = select_postcondition(&mut pending, &mut self.rng);

            let sources = self.ten.backtrack(dest);
            let candidates = candidate_sources(chunk, &snapshot, &sources);

            // this requirement may still be met at a later event
            if candidates.is_empty() {
                continue;
            }

            let src = selection.select(&candidates, dest, topology, &mut self.rng);
            self.mark_link_chunk_match(topology, src, dest, chunk, current_time);
            matches += 1;
        }

        matches
    }

    fn mark_link_chunk_match(
        &mut self,
        topology: &Topology,
        src: NpuId,
        dest: NpuId,
        chunk: ChunkId,
        current_time: Time,
    ) {
        let link_delay = topology.link_delay(src, dest);
        let transmission_start_time = current_time - link_delay;

        debug!(
            "[event {} ps] chunk {}: {} -> {} (started {} ps)",
            current_time, chunk, src, dest, transmission_start_time
        );

        self.result
            .mark_link_chunk_match(chunk, src, dest, current_time, transmission_start_time);

        self.ten.mark_link_occupied(src, dest);

        self.precondition.get_mut(&dest).unwrap().insert(chunk);

        let remaining = self.postcondition.get_mut(&dest).unwrap();
        remaining.remove(&chunk);
        if remaining.is_empty() {
            self.postcondition.remove(&dest);
        }
    }

    #[inline]
    pub(crate) fn completed(&self) -> bool {
        self.postcondition.is_empty()
    }

    #[inline]
    pub(crate) fn idle(&self) -> bool {
        self.ten.all_links_idle()
    }

    /// Stamps the makespan on first completion.
    pub(crate) fn finish(&mut self, current_time: Time) {
        if self.result.collective_time() == 0 {
            self.result.set_collective_time(current_time);
        }
    }

    #[inline]
    pub(crate) fn collective_time(&self) -> Time {
        self.result.collective_time()
    }

    pub(crate) fn into_result(self) -> SynthesisResult {
        self.result
    }
}

fn select_postcondition(
    pending: &mut CollectiveCondition,
    rng: &mut StdRng,
) -> (NpuId, ChunkId) {
    assert!(!pending.is_empty());

    let npu_idx = rng.gen_range(0..pending.len());
    let &dest = pending.keys().nth(npu_idx).unwrap();

    let chunks = pending.get_mut(&dest).unwrap();
    let chunk_idx = rng.gen_range(0..chunks.len());
    let chunk = *chunks.iter().nth(chunk_idx).unwrap();

    chunks.remove(&chunk);
    if chunks.is_empty() {
        pending.remove(&dest);
    }

    (dest, chunk)
}

fn candidate_sources(
    chunk: ChunkId,
    precondition: &CollectiveCondition,
    sources: &BTreeSet<NpuId>,
) -> BTreeSet<NpuId> {
    sources
        .iter()
        .copied()
        .filter(|src| precondition[src].contains(&chunk))
        .collect()
}

/// Event-driven synthesis over a single search state.
pub struct Synthesizer<'a, S> {
    topology: &'a Topology,

    event_queue: EventQueue,
    current_time: Time,

    state: SearchState<'a>,
    selection: S,

    distinct_link_delays: BTreeSet<Time>,
}

impl<'a, S: SourceSelection> Synthesizer<'a, S> {
    /// The topology's chunk size must already be frozen to the collective's.
    pub fn new(topology: &'a Topology, collective: &Collective, selection: S, seed: u64) -> Self {
        assert_eq!(topology.npus_count(), collective.npus_count());
        assert_eq!(topology.chunk_size(), collective.chunk_size());

        let distinct_link_delays = topology.distinct_link_delays().clone();
        debug!("distinct link delays: {:?}", distinct_link_delays);

        let event_queue = EventQueue::new();
        let current_time = event_queue.current_time();

        let mut synthesizer = Synthesizer {
            topology,
            event_queue,
            current_time,
            state: SearchState::new(topology, collective, seed),
            selection,
            distinct_link_delays,
        };
        synthesizer.schedule_next_events();
        synthesizer
    }

    pub fn synthesize(mut self) -> Result<SynthesisResult, SynthesisError> {
        while !self.event_queue.is_empty() {
            self.current_time = self.event_queue.pop();

            self.state.advance(self.current_time);

            let matches =
                self.state
                    .run_matching(self.topology, &mut self.selection, self.current_time);
            trace!("[event {} ps] {} matches", self.current_time, matches);

            if self.state.completed() {
                break;
            }

            if matches == 0 && self.state.idle() {
                return Err(SynthesisError::Unsatisfiable(self.current_time));
            }

            self.schedule_next_events();
        }

        assert!(self.state.completed());

        let mut result = self.state.into_result();
        result.set_collective_time(self.current_time);
        Ok(result)
    }

    fn schedule_next_events(&mut self) {
        assert!(!self.distinct_link_delays.is_empty());

        for &link_delay in &self.distinct_link_delays {
            self.event_queue.schedule(self.current_time + link_delay);
        }
    }
}

/// Runs the random synthesizer `trials` times with seeds `seed`, `seed + 1`,
/// ... and keeps the schedule with the smallest collective time. Ties go to
/// the earlier trial.
pub fn synthesize_multiple(
    topology: &Topology,
    collective: &Collective,
    trials: usize,
    seed: u64,
) -> Result<SynthesisResult, SynthesisError> {
    assert!(trials > 0);

    let mut best: Option<SynthesisResult> = None;
    for trial in 0..trials {
        let trial_seed = seed + trial as u64;
        let synthesizer = Synthesizer::new(topology, collective, RandomSelection, trial_seed);
        let result = synthesizer.synthesize()?;

        debug!(
            "trial {} (seed {}): collective time {} ps",
            trial,
            trial_seed,
            result.collective_time()
        );

        best = match best {
            Some(current) if current.collective_time() <= result.collective_time() => {
                Some(current)
            }
            _ => Some(result),
        };
    }

    Ok(best.expect("at least one trial"))
}
