pub mod argument;

pub mod reader;

pub mod writer;

/// Which search strategy drives the synthesis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SynthesizerKind {
    Random,
    Greedy,
    /// Independent random trials, best schedule wins.
    Multiple(usize),
    /// Lockstep beam states over one event timeline, best schedule wins.
    Beam(usize),
}

impl SynthesizerKind {
    /// Label used in the result file name.
    pub fn variant_label(&self) -> String {
        match self {
            SynthesizerKind::Random => "tacos".to_string(),
            SynthesizerKind::Greedy => "greedy".to_string(),
            SynthesizerKind::Multiple(trials) => format!("multiple_{}", trials),
            SynthesizerKind::Beam(beams) => format!("beam_{}", beams),
        }
    }
}
