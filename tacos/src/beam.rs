use std::collections::BTreeSet;

use log::debug;

use crate::collective::Collective;
use crate::event_queue::EventQueue;
use crate::result::SynthesisResult;
use crate::synthesizer::{RandomSelection, SearchState, SynthesisError};
use crate::topology::Topology;
use crate::Time;

/// Beam search over the event timeline: `beams` independent search states
/// (each with its own link occupations, working conditions, and RNG stream)
/// advance in lockstep to every popped event time. The best finished
/// schedule wins.
///
/// Beam `i` is seeded with `seed + i`, so beams explore different schedules;
/// beam 0 reproduces the plain random synthesizer for the same seed.
pub struct BeamSynthesizer<'a> {
    topology: &'a Topology,

    event_queue: EventQueue,
    current_time: Time,

    beams: Vec<SearchState<'a>>,

    distinct_link_delays: BTreeSet<Time>,
}

impl<'a> BeamSynthesizer<'a> {
    /// The topology's chunk size must already be frozen to the collective's.
    pub fn new(topology: &'a Topology, collective: &Collective, beams: usize, seed: u64) -> Self {
        assert!(beams > 0);
        assert_eq!(topology.npus_count(), collective.npus_count());
        assert_eq!(topology.chunk_size(), collective.chunk_size());

        let beams = (0..beams)
            .map(|beam| SearchState::new(topology, collective, seed + beam as u64))
            .collect();

        let event_queue = EventQueue::new();
        let current_time = event_queue.current_time();

        let mut synthesizer = BeamSynthesizer {
            topology,
            event_queue,
            current_time,
            beams,
            distinct_link_delays: topology.distinct_link_delays().clone(),
        };
        synthesizer.schedule_next_events();
        synthesizer
    }

    pub fn synthesize(mut self) -> Result<SynthesisResult, SynthesisError> {
        let mut selection = RandomSelection;

        while !self.event_queue.is_empty() {
            self.current_time = self.event_queue.pop();

            let mut all_stuck = true;
            for beam in &mut self.beams {
                if beam.completed() {
                    beam.finish(self.current_time);
                    continue;
                }

                beam.advance(self.current_time);
                let matches = beam.run_matching(self.topology, &mut selection, self.current_time);

                if beam.completed() {
                    beam.finish(self.current_time);
                } else if matches > 0 || !beam.idle() {
                    all_stuck = false;
                }
            }

            if self.beams.iter().all(|beam| beam.completed()) {
                break;
            }

            // every unfinished beam failed to match with all links idle
            if all_stuck {
                return Err(SynthesisError::Unsatisfiable(self.current_time));
            }

            self.schedule_next_events();
        }

        assert!(self.beams.iter().all(|beam| beam.completed()));

        for (beam, state) in self.beams.iter().enumerate() {
            debug!(
                "beam {}: collective time {} ps",
                beam,
                state.collective_time()
            );
        }

        // smallest collective time; ties go to the lowest beam index
        let mut best: Option<SearchState<'a>> = None;
        for state in self.beams {
            best = match best {
                Some(current) if current.collective_time() <= state.collective_time() => {
                    Some(current)
                }
                _ => Some(state),
            };
        }

        Ok(best.expect("at least one beam").into_result())
    }

    fn schedule_next_events(&mut self) {
        assert!(!self.distinct_link_delays.is_empty());

        for &link_delay in &self.distinct_link_delays {
            self.event_queue.schedule(self.current_time + link_delay);
        }
    }
}
