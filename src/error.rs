//! Structured errors surfaced at API boundaries. Internal modules never use
//! exceptions for control flow; numerical guards (distance floor, non-finite
//! drop, out-of-universe exclusion) are silent policies, not errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum GravError {
    #[error("ingest failed: {0}")]
    Ingest(#[from] IngestError),

    #[error("FMM build failed: {0}")]
    Geometry(#[from] GeometryError),
}

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("could not open input file: {0}")]
    Open(String),

    #[error("missing body count header")]
    MissingCount,

    #[error("short record for body {index}: {detail}")]
    ShortRecord { index: usize, detail: String },
}

#[derive(Debug, Error)]
pub enum GeometryError {
    #[error(
        "interaction-list partner at distance {distance} is closer than \
         1.99x the box length {box_length} (node depth {depth}); this \
         indicates a bug in neighborhood construction"
    )]
    InteractionListTooClose {
        distance: f64,
        box_length: f64,
        depth: usize,
    },
}
