use std::path::PathBuf;

use thiserror::Error;

use crate::warnings::Warnings;

#[derive(Debug, Error)]
pub enum TriageError {
    #[error("No readable DICOM series found")]
    NoReadableSeries,

    #[error("Series {series_id} has no readable slices")]
    EmptySeries { series_id: String },

    #[error(
        "Series {series_id}: slice {} is {}x{}, expected {}x{}",
        path.display(), found.0, found.1, expected.0, expected.1
    )]
    InconsistentGeometry {
        series_id: String,
        path: PathBuf,
        expected: (usize, usize),
        found: (usize, usize),
    },

    #[error("Series {series_id} has {} slices of {}x{} pixels", depth, plane.0, plane.1)]
    EmptyPlane {
        series_id: String,
        depth: usize,
        plane: (usize, usize),
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A fatal error together with the warnings gathered before it happened.
#[derive(Debug, Error)]
#[error("{error}")]
pub struct AnalysisFailure {
    #[source]
    pub error: TriageError,
    pub warnings: Warnings,
}

impl AnalysisFailure {
    pub fn new(error: TriageError, warnings: Warnings) -> Self {
        Self { error, warnings }
    }
}
