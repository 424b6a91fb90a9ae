use tacos::bandwidth::BandwidthTrait;
use tacos::beam::BeamSynthesizer;
use tacos::collective::Collective;
use tacos::result::{LinkChunkRecord, SynthesisResult};
use tacos::synthesizer::{
    synthesize_multiple, GreedySelection, RandomSelection, SynthesisError, Synthesizer,
};
use tacos::topology::Topology;
use tacos::Time;

const MIB: u64 = 1 << 20;

fn expected_delay_ps(latency_ns: f64, bandwidth_gbps: f64, chunk_size: u64) -> Time {
    let bytes_per_ns = bandwidth_gbps * (1u64 << 30) as f64 / 1e9;
    ((latency_ns + chunk_size as f64 / bytes_per_ns) * 1e3) as Time
}

fn two_npu_ring(chunk_size: u64) -> Topology {
    let mut topology = Topology::new();
    topology.set_npus_count(2);
    topology.connect(0, 1, 500.0, 50.gbps(), true);
    topology.set_chunk_size(chunk_size);
    topology
}

// directed ring 0 -> 1 -> 2 -> 3 -> 4 -> 0
fn unidirectional_ring(chunk_size: u64) -> Topology {
    let mut topology = Topology::new();
    topology.set_npus_count(5);
    for src in 0..5 {
        topology.connect(src, (src + 1) % 5, 500.0, 50.gbps(), false);
    }
    topology.set_chunk_size(chunk_size);
    topology
}

fn full_mesh(chunk_size: u64) -> Topology {
    let mut topology = Topology::new();
    topology.set_npus_count(4);
    for src in 0..4 {
        for dest in (src + 1)..4 {
            topology.connect(src, dest, 100.0, 100.gbps(), true);
        }
    }
    topology.set_chunk_size(chunk_size);
    topology
}

// uneven triangle: 0 -> 1 and 2 -> 0 are fast, their reverses slow,
// 1 <-> 2 moderate
fn asymmetric_triangle(chunk_size: u64) -> Topology {
    let mut topology = Topology::new();
    topology.set_npus_count(3);
    topology.connect(0, 1, 100.0, 100.gbps(), false);
    topology.connect(1, 0, 700.0, 10.gbps(), false);
    topology.connect(0, 2, 700.0, 10.gbps(), false);
    topology.connect(2, 0, 100.0, 100.gbps(), false);
    topology.connect(1, 2, 300.0, 50.gbps(), true);
    topology.set_chunk_size(chunk_size);
    topology
}

/// Structural checks every synthesized All-Gather schedule must pass.
fn check_schedule(topology: &Topology, collective: &Collective, result: &SynthesisResult) {
    let initial = collective.precondition();
    let chunks_count = collective.chunks_count();
    let mut last_arrival: Time = 0;

    for npu_result in result.npu_results() {
        let npu = npu_result.npu();

        for (peer, records) in npu_result.egress() {
            assert!(topology.is_connected(npu, peer));

            // the peer logged the same deliveries
            assert_eq!(records, result.ingress_link_info(npu, peer));

            let delay = topology.link_delay(npu, peer);
            for record in records {
                assert!(record.arrival >= delay);
                assert_eq!(record.start, record.arrival - delay);
                last_arrival = last_arrival.max(record.arrival);
            }

            // one chunk at a time per link
            for window in records.windows(2) {
                assert!(window[1].arrival >= window[0].arrival + delay);
            }
        }

        for (peer, _) in npu_result.ingress() {
            assert!(topology.is_connected(peer, npu));
        }

        // chunks arrive exactly once where wanted and never where already held
        let held = &initial[&npu];
        for chunk in 0..chunks_count {
            let deliveries: usize = (0..topology.npus_count())
                .map(|src| {
                    npu_result
                        .ingress_link_info(src)
                        .iter()
                        .filter(|record| record.chunk == chunk)
                        .count()
                })
                .sum();

            if held.contains(&chunk) {
                assert_eq!(deliveries, 0, "chunk {} re-delivered to NPU {}", chunk, npu);
                assert!(npu_result.dependency(chunk).is_none());
            } else {
                assert_eq!(deliveries, 1, "chunk {} delivered {} times to NPU {}", chunk, deliveries, npu);

                let idx = npu_result.dependency(chunk).unwrap();
                let found = (0..topology.npus_count()).any(|src| {
                    npu_result
                        .ingress_link_info(src)
                        .get(idx)
                        .map_or(false, |record| record.chunk == chunk)
                });
                assert!(found, "dependency of chunk {} at NPU {} is dangling", chunk, npu);
            }
        }
    }

    // the makespan is the last arrival
    assert_eq!(result.collective_time(), last_arrival);

    // replaying every delivery fills every NPU
    let mut holdings = initial;
    for npu_result in result.npu_results() {
        for (_, records) in npu_result.ingress() {
            for record in records {
                holdings.get_mut(&npu_result.npu()).unwrap().insert(record.chunk);
            }
        }
    }
    for (npu, held) in &holdings {
        assert_eq!(held.len(), chunks_count, "NPU {} is missing chunks", npu);
    }
}

#[test]
fn two_npus_swap_their_chunks_in_one_delay() {
    logging::init_log();

    let topology = two_npu_ring(MIB);
    let collective = Collective::all_gather(2, MIB, 1);
    let delay = expected_delay_ps(500.0, 50.0, MIB);
    assert_eq!(topology.link_delay(0, 1), delay);

    let result = Synthesizer::new(&topology, &collective, RandomSelection, 1)
        .synthesize()
        .unwrap();

    assert_eq!(result.collective_time(), delay);
    assert_eq!(
        result.egress_link_info(0, 1),
        &[LinkChunkRecord { chunk: 0, arrival: delay, start: 0 }][..]
    );
    assert_eq!(
        result.egress_link_info(1, 0),
        &[LinkChunkRecord { chunk: 1, arrival: delay, start: 0 }][..]
    );
    check_schedule(&topology, &collective, &result);
}

#[test]
fn two_chunks_per_npu_serialize_on_the_link() {
    let topology = two_npu_ring(MIB);
    let collective = Collective::all_gather(2, MIB, 2);
    let delay = topology.link_delay(0, 1);

    let result = Synthesizer::new(&topology, &collective, RandomSelection, 5)
        .synthesize()
        .unwrap();

    // each direction carries two chunks back to back
    assert_eq!(result.collective_time(), 2 * delay);
    assert_eq!(result.egress_link_info(0, 1).len(), 2);
    assert_eq!(result.egress_link_info(1, 0).len(), 2);
    check_schedule(&topology, &collective, &result);
}

#[test]
fn unidirectional_ring_pipelines_chunks() {
    let topology = unidirectional_ring(MIB);
    let collective = Collective::all_gather(5, MIB, 1);
    let delay = expected_delay_ps(500.0, 50.0, MIB);

    for seed in [3u64, 17, 98] {
        let result = Synthesizer::new(&topology, &collective, RandomSelection, seed)
            .synthesize()
            .unwrap();

        // every chunk takes four hops around the ring
        assert_eq!(result.collective_time(), 4 * delay);
        for npu in 0..5 {
            let prev = (npu + 4) % 5;
            assert_eq!(result.npu_result(npu).ingress_link_info(prev).len(), 4);
        }
        check_schedule(&topology, &collective, &result);
    }
}

#[test]
fn full_mesh_finishes_in_a_single_round() {
    let topology = full_mesh(MIB);
    let collective = Collective::all_gather(4, MIB, 1);
    let delay = expected_delay_ps(100.0, 100.0, MIB);

    let result = Synthesizer::new(&topology, &collective, RandomSelection, 12)
        .synthesize()
        .unwrap();

    assert_eq!(result.collective_time(), delay);

    // every link carries exactly its owner's chunk
    for src in 0..4 {
        for dest in 0..4 {
            if src == dest {
                continue;
            }
            assert_eq!(
                result.egress_link_info(src, dest),
                &[LinkChunkRecord { chunk: src, arrival: delay, start: 0 }][..]
            );
        }
    }
    check_schedule(&topology, &collective, &result);
}

#[test]
fn greedy_matches_random_when_candidates_are_forced() {
    let topology = unidirectional_ring(MIB);
    let collective = Collective::all_gather(5, MIB, 1);

    // one inbound link per NPU leaves no choice to make
    let random = Synthesizer::new(&topology, &collective, RandomSelection, 9)
        .synthesize()
        .unwrap();
    let greedy = Synthesizer::new(&topology, &collective, GreedySelection, 9)
        .synthesize()
        .unwrap();

    assert_eq!(random, greedy);
}

#[test]
fn greedy_synthesizes_a_valid_mesh_schedule() {
    let topology = full_mesh(MIB);
    let collective = Collective::all_gather(4, MIB, 1);

    let result = Synthesizer::new(&topology, &collective, GreedySelection, 2)
        .synthesize()
        .unwrap();

    assert_eq!(result.collective_time(), expected_delay_ps(100.0, 100.0, MIB));
    check_schedule(&topology, &collective, &result);
}

#[test]
fn multiple_trials_keep_the_best_schedule() {
    let topology = asymmetric_triangle(MIB);
    let collective = Collective::all_gather(3, MIB, 1);
    let seed = 11;

    let trial_times: Vec<Time> = (0..5)
        .map(|trial| {
            Synthesizer::new(&topology, &collective, RandomSelection, seed + trial)
                .synthesize()
                .unwrap()
                .collective_time()
        })
        .collect();

    let best = synthesize_multiple(&topology, &collective, 5, seed).unwrap();
    check_schedule(&topology, &collective, &best);

    assert_eq!(
        best.collective_time(),
        *trial_times.iter().min().unwrap()
    );
    for trial_time in trial_times {
        assert!(best.collective_time() <= trial_time);
    }
}

#[test]
fn fixed_seed_reproduces_the_schedule() {
    let topology = asymmetric_triangle(MIB);
    let collective = Collective::all_gather(3, MIB, 1);

    let first = Synthesizer::new(&topology, &collective, RandomSelection, 21)
        .synthesize()
        .unwrap();
    let second = Synthesizer::new(&topology, &collective, RandomSelection, 21)
        .synthesize()
        .unwrap();
    assert_eq!(first, second);

    let first = synthesize_multiple(&topology, &collective, 3, 21).unwrap();
    let second = synthesize_multiple(&topology, &collective, 3, 21).unwrap();
    assert_eq!(first, second);
}

#[test]
fn beam_search_never_loses_to_its_first_beam() {
    let topology = asymmetric_triangle(MIB);
    let collective = Collective::all_gather(3, MIB, 1);
    let seed = 11;

    let single = Synthesizer::new(&topology, &collective, RandomSelection, seed)
        .synthesize()
        .unwrap();
    let beam = BeamSynthesizer::new(&topology, &collective, 4, seed)
        .synthesize()
        .unwrap();

    // beam 0 shares the single run's seed, so the winner can only improve
    assert!(beam.collective_time() <= single.collective_time());
    check_schedule(&topology, &collective, &beam);
}

#[test]
fn beam_search_pipelines_the_ring() {
    let topology = unidirectional_ring(MIB);
    let collective = Collective::all_gather(5, MIB, 1);
    let delay = expected_delay_ps(500.0, 50.0, MIB);

    let result = BeamSynthesizer::new(&topology, &collective, 3, 7)
        .synthesize()
        .unwrap();

    assert_eq!(result.collective_time(), 4 * delay);
    check_schedule(&topology, &collective, &result);
}

#[test]
fn disconnected_topology_is_reported_not_spun_on() {
    let mut topology = Topology::new();
    topology.set_npus_count(3);
    topology.connect(0, 1, 500.0, 50.gbps(), true);
    topology.set_chunk_size(MIB);

    let collective = Collective::all_gather(3, MIB, 1);

    let err = Synthesizer::new(&topology, &collective, RandomSelection, 1)
        .synthesize()
        .unwrap_err();
    assert!(matches!(err, SynthesisError::Unsatisfiable(_)));

    let err = BeamSynthesizer::new(&topology, &collective, 3, 1)
        .synthesize()
        .unwrap_err();
    assert!(matches!(err, SynthesisError::Unsatisfiable(_)));
}
