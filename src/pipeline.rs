use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::{
    classifier::{Classifier, FALLBACK_SCORE, NeutralEstimator, VolumetricEstimator},
    config::Config,
    decoder::{DicomDecoder, SliceDecoder},
    encoder::{EncodedStack, MultiWindowEncoder},
    enums::SelectionMode,
    error::{AnalysisFailure, TriageError},
    router::{ConfidenceRouter, RoutingDecision},
    series_selector::{Series, SeriesSelector},
    volume_reconstructor::VolumeReconstructor,
    warnings::Warnings,
};

/// Verdict for one analysed series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesOutcome {
    pub series_id: String,
    pub num_slices: usize,
    #[serde(flatten)]
    pub decision: RoutingDecision,
}

/// Result of one request: a verdict per surviving series, in series id
/// order, plus every recoverable problem in the order it was met.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Analysis {
    pub outcomes: Vec<SeriesOutcome>,
    pub warnings: Warnings,
}

/// Runs select, reconstruct, encode, classify and route for one request.
///
/// Holds no per-request state, so one pipeline can serve concurrent
/// requests.
pub struct Pipeline {
    config: Config,
    encoder: MultiWindowEncoder,
    router: ConfidenceRouter,
    decoder: Box<dyn SliceDecoder>,
    classifier: Option<Box<dyn Classifier>>,
    estimator: Box<dyn VolumetricEstimator>,
}

impl Pipeline {
    /// DICOM decoding, no classifier and the neutral volumetric estimator.
    pub fn new(config: Config) -> Result<Self, TriageError> {
        config.validate()?;
        Ok(Self {
            encoder: MultiWindowEncoder::from_config(&config)?,
            router: ConfidenceRouter::from_config(&config)?,
            config,
            decoder: Box::new(DicomDecoder),
            classifier: None,
            estimator: Box::new(NeutralEstimator),
        })
    }

    pub fn with_decoder(mut self, decoder: impl SliceDecoder + 'static) -> Self {
        self.decoder = Box::new(decoder);
        self
    }

    pub fn with_classifier(mut self, classifier: impl Classifier + 'static) -> Self {
        self.classifier = Some(Box::new(classifier));
        self
    }

    pub fn with_estimator(mut self, estimator: impl VolumetricEstimator + 'static) -> Self {
        self.estimator = Box::new(estimator);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Analyse every file below `root`.
    pub fn analyze_directory(
        &self,
        root: impl AsRef<Path>,
        mode: SelectionMode,
    ) -> Result<Analysis, AnalysisFailure> {
        self.analyze_directory_with(root, mode, |_, _| {})
    }

    /// Like [`Pipeline::analyze_directory`], handing every encoded stack to
    /// `inspect`. Entries skipped while listing `root` lead the warnings.
    pub fn analyze_directory_with<F>(
        &self,
        root: impl AsRef<Path>,
        mode: SelectionMode,
        inspect: F,
    ) -> Result<Analysis, AnalysisFailure>
    where
        F: Fn(&str, &EncodedStack),
    {
        let mut warnings = Warnings::default();
        match SeriesSelector::collect_paths(root, &mut warnings) {
            Ok(paths) => self.run(&paths, mode, &inspect, warnings),
            Err(error) => Err(AnalysisFailure::new(error, warnings)),
        }
    }

    pub fn analyze_files(
        &self,
        paths: &[PathBuf],
        mode: SelectionMode,
    ) -> Result<Analysis, AnalysisFailure> {
        self.analyze_files_with(paths, mode, |_, _| {})
    }

    /// Like [`Pipeline::analyze_files`], handing every encoded stack to
    /// `inspect` before it is classified.
    ///
    /// # Errors
    ///
    /// In single-series mode any series-level error of the selected series
    /// is returned. In multi-series mode failing series are dropped with a
    /// warning and [`TriageError::NoReadableSeries`] is returned only when
    /// none survives.
    pub fn analyze_files_with<F>(
        &self,
        paths: &[PathBuf],
        mode: SelectionMode,
        inspect: F,
    ) -> Result<Analysis, AnalysisFailure>
    where
        F: Fn(&str, &EncodedStack),
    {
        self.run(paths, mode, &inspect, Warnings::default())
    }

    /// Series are processed one at a time so only one volume and one stack
    /// are alive at once; the stages parallelise internally.
    fn run<F>(
        &self,
        paths: &[PathBuf],
        mode: SelectionMode,
        inspect: &F,
        mut warnings: Warnings,
    ) -> Result<Analysis, AnalysisFailure>
    where
        F: Fn(&str, &EncodedStack),
    {
        let selected = match SeriesSelector::select(self.decoder.as_ref(), paths, mode, &mut warnings) {
            Ok(selected) => selected,
            Err(error) => return Err(AnalysisFailure::new(error, warnings)),
        };

        let mut outcomes = Vec::with_capacity(selected.len());
        for series in &selected {
            match (self.process_series(series, inspect, &mut warnings), mode) {
                (Ok(outcome), _) => outcomes.push(outcome),
                (Err(error), SelectionMode::Single) => {
                    return Err(AnalysisFailure::new(error, warnings));
                }
                (Err(error), SelectionMode::Multi) => {
                    warnings.push(format_args!("{}: series dropped ({error})", series.series_id()));
                }
            }
        }

        if outcomes.is_empty() {
            return Err(AnalysisFailure::new(TriageError::NoReadableSeries, warnings));
        }

        log::info!(
            "Analysed {} series with {} warnings",
            outcomes.len(),
            warnings.len()
        );
        Ok(Analysis { outcomes, warnings })
    }

    fn process_series<F>(
        &self,
        series: &Series,
        inspect: &F,
        warnings: &mut Warnings,
    ) -> Result<SeriesOutcome, TriageError>
    where
        F: Fn(&str, &EncodedStack),
    {
        let volume = VolumeReconstructor::reconstruct(self.decoder.as_ref(), series, warnings)?;
        let stack = self.encoder.encode(&volume)?;
        inspect(series.series_id(), &stack);

        let score_2d = self.score_stack(&stack, warnings);
        let decision = self.router.route(score_2d, || {
            let score = self.estimator.score_volume(&volume);
            sanitize_score(score, "volumetric estimator", warnings)
        });

        log::info!(
            "Series {}: {} slices, score {:.4} ({}), volumetric: {}",
            series.series_id(),
            volume.depth(),
            decision.final_score,
            decision.label,
            decision.used_volumetric
        );

        Ok(SeriesOutcome {
            series_id: series.series_id().to_string(),
            num_slices: volume.depth(),
            decision,
        })
    }

    fn score_stack(&self, stack: &EncodedStack, warnings: &mut Warnings) -> f32 {
        let Some(classifier) = &self.classifier else {
            warnings.push(format_args!(
                "classifier not loaded, using fallback score {FALLBACK_SCORE}"
            ));
            return FALLBACK_SCORE;
        };

        match classifier.score_stack(stack) {
            Ok(score) => sanitize_score(score, "classifier", warnings),
            Err(error) => {
                warnings.push(format_args!("{error}, using fallback score {FALLBACK_SCORE}"));
                FALLBACK_SCORE
            }
        }
    }
}

/// NaN becomes the fallback score, anything else is clamped into [0, 1].
fn sanitize_score(score: f32, source: &str, warnings: &mut Warnings) -> f32 {
    if score.is_nan() {
        warnings.push(format_args!(
            "{source} returned NaN, using fallback score {FALLBACK_SCORE}"
        ));
        FALLBACK_SCORE
    } else if !(0.0..=1.0).contains(&score) {
        let clamped = score.clamp(0.0, 1.0);
        warnings.push(format_args!("{source} score {score} clamped to {clamped}"));
        clamped
    } else {
        score
    }
}
