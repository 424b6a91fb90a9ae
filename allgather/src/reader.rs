//! Topology CSV reader.
//!
//! Line 1 holds the NPU count, line 2 the column header
//! (`Src,Dest,Latency (ns),Bandwidth (GB/s)`), and every following line one
//! bidirectional link.

use std::path::Path;

use log::debug;
use thiserror::Error;

use tacos::bandwidth::BandwidthTrait;
use tacos::topology::Topology;

#[derive(Error, Debug)]
pub enum ReadError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("{path}:{line}: {reason}")]
    Malformed {
        path: String,
        line: usize,
        reason: String,
    },
}

pub fn read_topology<P: AsRef<Path>>(path: P) -> Result<Topology, ReadError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|source| ReadError::Io {
        path: path.display().to_string(),
        source,
    })?;

    let malformed = |line: usize, reason: String| ReadError::Malformed {
        path: path.display().to_string(),
        line,
        reason,
    };

    let mut lines = content.lines().enumerate();

    let (_, first) = lines
        .next()
        .ok_or_else(|| malformed(1, "missing NPU count".to_string()))?;
    let npus_count: usize = first
        .trim()
        .parse()
        .map_err(|_| malformed(1, format!("invalid NPU count: {:?}", first.trim())))?;
    if npus_count == 0 {
        return Err(malformed(1, "NPU count must be positive".to_string()));
    }

    // header line, content not interpreted
    lines
        .next()
        .ok_or_else(|| malformed(2, "missing header".to_string()))?;

    let mut topology = Topology::new();
    topology.set_npus_count(npus_count);

    let mut rows = 0;
    for (idx, line) in lines {
        let lineno = idx + 1;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let fields: Vec<&str> = line.split(',').map(str::trim).collect();
        if fields.len() != 4 {
            return Err(malformed(
                lineno,
                format!("expected 4 fields, got {}", fields.len()),
            ));
        }

        let src: usize = fields[0]
            .parse()
            .map_err(|_| malformed(lineno, format!("invalid src: {:?}", fields[0])))?;
        let dest: usize = fields[1]
            .parse()
            .map_err(|_| malformed(lineno, format!("invalid dest: {:?}", fields[1])))?;
        let latency: f64 = fields[2]
            .parse()
            .map_err(|_| malformed(lineno, format!("invalid latency: {:?}", fields[2])))?;
        let bandwidth: f64 = fields[3]
            .parse()
            .map_err(|_| malformed(lineno, format!("invalid bandwidth: {:?}", fields[3])))?;

        if src >= npus_count || dest >= npus_count {
            return Err(malformed(
                lineno,
                format!("NPU id out of range (count is {})", npus_count),
            ));
        }
        if src == dest {
            return Err(malformed(lineno, format!("self-loop on NPU {}", src)));
        }
        if latency < 0.0 {
            return Err(malformed(lineno, format!("negative latency {}", latency)));
        }
        if bandwidth <= 0.0 {
            return Err(malformed(
                lineno,
                format!("non-positive bandwidth {}", bandwidth),
            ));
        }
        if topology.is_connected(src, dest) || topology.is_connected(dest, src) {
            return Err(malformed(
                lineno,
                format!("duplicate link {} <-> {}", src, dest),
            ));
        }

        topology.connect(src, dest, latency, bandwidth.gbps(), true);
        rows += 1;
    }

    if rows == 0 {
        return Err(malformed(3, "no links".to_string()));
    }

    debug!(
        "read topology: {} NPUs, {} links",
        npus_count,
        topology.links_count()
    );
    Ok(topology)
}
