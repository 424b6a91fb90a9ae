//! Result CSV writer.
//!
//! Serializes every link-chunk timing of the synthesized schedule, one row
//! per `(npu, direction, peer, chunk, arrival, start)` tuple, followed by the
//! total collective time. Rows are emitted in a fixed order so reruns with
//! the same seed produce byte-identical files.

use std::io::Write;
use std::path::{Path, PathBuf};

use thiserror::Error;

use tacos::result::SynthesisResult;

#[derive(Error, Debug)]
pub enum WriteError {
    #[error("cannot write {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
}

/// `<input_basename>_<variant>_result.csv`, in the current directory.
pub fn result_file_name(input: &Path, variant: &str) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "topology".to_string());
    PathBuf::from(format!("{}_{}_result.csv", stem, variant))
}

pub fn write_result<P: AsRef<Path>>(path: P, result: &SynthesisResult) -> Result<(), WriteError> {
    let path = path.as_ref();

    let mut content = String::new();
    content.push_str("Npu,Direction,Peer,Chunk,ArrivalTime (ps),TransmissionStartTime (ps)\n");

    for npu_result in result.npu_results() {
        let npu = npu_result.npu();
        for (peer, records) in npu_result.ingress() {
            for record in records {
                content.push_str(&format!(
                    "{},ingress,{},{},{},{}\n",
                    npu, peer, record.chunk, record.arrival, record.start
                ));
            }
        }
        for (peer, records) in npu_result.egress() {
            for record in records {
                content.push_str(&format!(
                    "{},egress,{},{},{},{}\n",
                    npu, peer, record.chunk, record.arrival, record.start
                ));
            }
        }
    }

    content.push_str(&format!("CollectiveTime (ps),{}\n", result.collective_time()));

    let io_err = |source| WriteError::Io {
        path: path.display().to_string(),
        source,
    };
    let mut file = std::fs::File::create(path).map_err(io_err)?;
    file.write_all(content.as_bytes()).map_err(io_err)?;
    Ok(())
}
