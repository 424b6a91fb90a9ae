use anyhow::ensure;
use log::info;
use structopt::StructOpt;

use tacos::beam::BeamSynthesizer;
use tacos::collective::Collective;
use tacos::synthesizer::{synthesize_multiple, GreedySelection, RandomSelection, Synthesizer};

use allgather::argument::Opt;
use allgather::{reader, writer, SynthesizerKind};

fn main() {
    let opt = Opt::from_args();

    if opt.verbose {
        std::env::set_var("RUST_LOG", "debug");
    }
    logging::init_log();

    if let Err(err) = run(&opt) {
        log::error!("{:#}", err);
        std::process::exit(1);
    }
}

fn run(opt: &Opt) -> anyhow::Result<()> {
    info!("Opts: {:#?}", opt);

    let kind = opt.kind();
    match kind {
        SynthesizerKind::Multiple(trials) => ensure!(trials > 0, "--multiple requires K >= 1"),
        SynthesizerKind::Beam(beams) => ensure!(beams > 0, "--beam requires K >= 1"),
        _ => {}
    }
    ensure!(opt.chunk_size > 0, "--chunk-size must be positive");
    ensure!(opt.chunks_per_npu > 0, "--chunks-per-npu must be positive");

    let mut topology = reader::read_topology(&opt.topology)?;
    info!(
        "topology: {} NPUs, {} links",
        topology.npus_count(),
        topology.links_count()
    );

    let collective =
        Collective::all_gather(topology.npus_count(), opt.chunk_size, opt.chunks_per_npu);
    info!(
        "collective: {} chunks of {} B each",
        collective.chunks_count(),
        collective.chunk_size()
    );

    topology.set_chunk_size(collective.chunk_size());

    let seed = opt.seed.unwrap_or_else(rand::random);
    info!("seed: {}", seed);

    let start = std::time::Instant::now();
    let result = match kind {
        SynthesizerKind::Random => {
            Synthesizer::new(&topology, &collective, RandomSelection, seed).synthesize()?
        }
        SynthesizerKind::Greedy => {
            Synthesizer::new(&topology, &collective, GreedySelection, seed).synthesize()?
        }
        SynthesizerKind::Multiple(trials) => {
            synthesize_multiple(&topology, &collective, trials, seed)?
        }
        SynthesizerKind::Beam(beams) => {
            BeamSynthesizer::new(&topology, &collective, beams, seed).synthesize()?
        }
    };
    let elapsed = start.elapsed();

    info!("time to solve: {} us", elapsed.as_micros());
    info!(
        "synthesized collective time: {} ps ({:.2} us)",
        result.collective_time(),
        result.collective_time() as f64 / 1e6
    );

    let output = writer::result_file_name(&opt.topology, &kind.variant_label());
    writer::write_result(&output, &result)?;
    info!("result written to {}", output.display());

    Ok(())
}
