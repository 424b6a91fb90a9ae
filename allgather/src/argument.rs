use structopt::StructOpt;

use crate::SynthesizerKind;

#[derive(Debug, Clone, StructOpt)]
#[structopt(name = "AllGather", about = "All-Gather Schedule Synthesizer")]
pub struct Opt {
    /// Topology description CSV
    #[structopt(parse(from_os_str))]
    pub topology: std::path::PathBuf,

    /// Pick sources greedily instead of at random
    #[structopt(long = "greedy", conflicts_with_all = &["multiple", "beam"])]
    pub greedy: bool,

    /// Run K independent random trials, keep the best schedule
    #[structopt(long = "multiple", value_name = "K", conflicts_with = "beam")]
    pub multiple: Option<usize>,

    /// Advance K beam states in lockstep, keep the best schedule
    #[structopt(long = "beam", value_name = "K")]
    pub beam: Option<usize>,

    /// Chunk size in bytes.
    #[structopt(long = "chunk-size", default_value = "1048576")]
    pub chunk_size: u64,

    /// Initial chunks held by each NPU.
    #[structopt(long = "chunks-per-npu", default_value = "1")]
    pub chunks_per_npu: usize,

    /// RNG seed; defaults to OS entropy.
    #[structopt(long = "seed")]
    pub seed: Option<u64>,

    /// Log every link-chunk matching decision.
    #[structopt(short = "v", long = "verbose")]
    pub verbose: bool,
}

impl Opt {
    pub fn kind(&self) -> SynthesizerKind {
        if self.greedy {
            SynthesizerKind::Greedy
        } else if let Some(trials) = self.multiple {
            SynthesizerKind::Multiple(trials)
        } else if let Some(beams) = self.beam {
            SynthesizerKind::Beam(beams)
        } else {
            SynthesizerKind::Random
        }
    }
}
