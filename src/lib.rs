//! # CT triage library
//!
//! This crate turns a folder of CT DICOM slices into a normal/pathology
//! verdict using a cheap 2.5D classifier and, only for uncertain scores, a
//! costlier volumetric estimate.
//!
//! It builds on the dicom-rs ecosystem for header and pixel decoding. The
//! stages are:
//!  - [`SeriesSelector`]: reads headers only, groups files by
//!    SeriesInstanceUID and orders slices by InstanceNumber
//!  - [`VolumeReconstructor`]: decodes pixel data and applies
//!    `raw * slope + intercept` to build a (depth, height, width) volume
//!  - [`MultiWindowEncoder`]: averages `k` neighbouring slices, applies the
//!    base, lung and mediastinum windows and resizes to a square input
//!  - [`ConfidenceRouter`]: averages in the volumetric score when the 2.5D
//!    score falls inside the uncertainty band
//!
//! Per-file problems (unreadable headers, broken pixel data, a missing
//! classifier) never abort a request. They are collected as [`Warnings`]
//! and returned with the result. Headers, pixel data and slices are processed
//! in parallel using rayon, results keep their order.
//!
//! Classifier models are not part of this crate. Plug one in through the
//! [`Classifier`] trait, for example with [`MeanSigmoid`] around a per-slice
//! model. Without one, a neutral score of 0.5 is used.
//!
//! # Examples
//!
//! ## Analysing the largest series of a study
//!
//! ```no_run
//! # use ct_triage::{Config, Pipeline, SelectionMode};
//! let pipeline = Pipeline::new(Config::default()).expect("default config is valid");
//! let analysis = pipeline
//!     .analyze_directory("study", SelectionMode::Single)
//!     .expect("should have analysed the study");
//! let outcome = &analysis.outcomes[0];
//! println!("{}: {}", outcome.series_id, outcome.decision.label);
//! ```

pub mod classifier;
pub mod config;
pub mod decoder;
pub mod encoder;
pub mod enums;
pub mod error;
mod interpolator;
pub mod pipeline;
pub mod router;
pub mod series_selector;
pub mod volume;
pub mod volume_reconstructor;
pub mod warnings;

pub use classifier::{Classifier, ClassifierError, MeanSigmoid, NeutralEstimator, VolumetricEstimator};
pub use config::Config;
pub use decoder::{DecodeError, DicomDecoder, SliceDecoder, SliceHeader, SlicePixels};
pub use encoder::{EncodedStack, MultiWindowEncoder, WindowSpec};
pub use enums::{Label, SelectionMode};
pub use error::{AnalysisFailure, TriageError};
pub use pipeline::{Analysis, Pipeline, SeriesOutcome};
pub use router::{ConfidenceRouter, RoutingDecision};
pub use series_selector::{Series, SeriesSelector, SliceFile};
pub use volume::Volume;
pub use volume_reconstructor::VolumeReconstructor;
pub use warnings::Warnings;
