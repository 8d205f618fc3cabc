use ndarray::{ArrayView3, Axis};
use rayon::prelude::*;
use thiserror::Error;

use crate::{encoder::EncodedStack, volume::Volume};

/// Score used when no classifier result is available.
pub const FALLBACK_SCORE: f32 = 0.5;

#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("classifier unavailable: {0}")]
    Unavailable(String),

    #[error("inference failed: {0}")]
    Inference(String),
}

/// Fast 2.5D classifier scoring a whole encoded stack.
///
/// Shared across threads, so implementations must not mutate their weights
/// during inference.
pub trait Classifier: Sync {
    /// Probability of pathology in [0, 1].
    fn score_stack(&self, stack: &EncodedStack) -> Result<f32, ClassifierError>;
}

/// Slower estimator working on the calibrated volume.
pub trait VolumetricEstimator: Sync {
    /// Probability of pathology in [0, 1].
    fn score_volume(&self, volume: &Volume) -> f32;
}

/// Estimator without a model, always answers [`FALLBACK_SCORE`].
#[derive(Debug, Default, Clone, Copy)]
pub struct NeutralEstimator;

impl VolumetricEstimator for NeutralEstimator {
    fn score_volume(&self, _volume: &Volume) -> f32 {
        FALLBACK_SCORE
    }
}

/// Turns a per-slice logit model into a stack classifier by averaging the
/// sigmoid of every slice's logit.
pub struct MeanSigmoid<F> {
    logit: F,
}

impl<F> MeanSigmoid<F>
where
    F: Fn(ArrayView3<'_, f32>) -> f32 + Sync,
{
    pub fn new(logit: F) -> Self {
        Self { logit }
    }
}

#[inline]
fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

impl<F> Classifier for MeanSigmoid<F>
where
    F: Fn(ArrayView3<'_, f32>) -> f32 + Sync,
{
    fn score_stack(&self, stack: &EncodedStack) -> Result<f32, ClassifierError> {
        if stack.is_empty() {
            return Err(ClassifierError::Inference("empty stack".to_string()));
        }
        let probabilities: Vec<f32> = stack
            .data()
            .axis_iter(Axis(0))
            .into_par_iter()
            .map(|channels| sigmoid((self.logit)(channels)))
            .collect();
        // Summed in z order so the score does not depend on thread scheduling.
        let total: f32 = probabilities.iter().sum();
        Ok(total / stack.len() as f32)
    }
}
