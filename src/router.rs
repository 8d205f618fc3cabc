use serde::Serialize;

use crate::{config::Config, enums::Label, error::TriageError};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RoutingDecision {
    pub score_2d: f32,
    pub used_volumetric: bool,
    pub final_score: f32,
    pub label: Label,
}

/// Sends fast-path scores that fall inside the open uncertainty band to the
/// volumetric estimator and averages both scores.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConfidenceRouter {
    low: f32,
    high: f32,
}

impl Default for ConfidenceRouter {
    fn default() -> Self {
        Self {
            low: 0.45,
            high: 0.55,
        }
    }
}

impl ConfidenceRouter {
    pub fn new(low: f32, high: f32) -> Result<Self, TriageError> {
        if !(low < high) {
            return Err(TriageError::InvalidConfig(format!(
                "uncertainty band ({low}, {high}) is empty"
            )));
        }
        Ok(Self { low, high })
    }

    pub fn from_config(config: &Config) -> Result<Self, TriageError> {
        Self::new(config.uncert_low, config.uncert_high)
    }

    /// Both bounds are exclusive.
    pub fn is_uncertain(&self, score: f32) -> bool {
        self.low < score && score < self.high
    }

    /// `score_3d` is only evaluated when `score_2d` is uncertain.
    pub fn route(&self, score_2d: f32, score_3d: impl FnOnce() -> f32) -> RoutingDecision {
        let used_volumetric = self.is_uncertain(score_2d);
        let final_score = if used_volumetric {
            (score_2d + score_3d()) / 2.0
        } else {
            score_2d
        };

        RoutingDecision {
            score_2d,
            used_volumetric,
            final_score,
            label: Label::from_score(final_score),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;

    #[test]
    fn uncertain_score_is_ensembled() {
        let decision = ConfidenceRouter::default().route(0.46, || 0.60);

        assert!(decision.used_volumetric);
        assert!((decision.final_score - 0.53).abs() < 1e-6);
        assert_eq!(decision.label, Label::Pathology);
        assert_eq!(decision.score_2d, 0.46);
    }

    #[test]
    fn confident_score_skips_estimator() {
        let calls = Cell::new(0);
        let decision = ConfidenceRouter::default().route(0.30, || {
            calls.set(calls.get() + 1);
            0.9
        });

        assert!(!decision.used_volumetric);
        assert_eq!(decision.final_score, 0.30);
        assert_eq!(decision.label, Label::Normal);
        assert_eq!(calls.get(), 0);
    }

    #[test]
    fn upper_bound_is_exclusive() {
        let decision = ConfidenceRouter::default().route(0.55, || 0.0);

        assert!(!decision.used_volumetric);
        assert_eq!(decision.final_score, 0.55);
        assert_eq!(decision.label, Label::Pathology);
    }

    #[test]
    fn lower_bound_is_exclusive() {
        let decision = ConfidenceRouter::default().route(0.45, || 1.0);

        assert!(!decision.used_volumetric);
        assert_eq!(decision.label, Label::Normal);
    }

    #[test]
    fn ensemble_can_flip_label() {
        let decision = ConfidenceRouter::default().route(0.52, || 0.2);

        assert!(decision.used_volumetric);
        assert!((decision.final_score - 0.36).abs() < 1e-6);
        assert_eq!(decision.label, Label::Normal);
    }

    #[test]
    fn band_follows_config() {
        let config = Config {
            uncert_low: 0.2,
            uncert_high: 0.8,
            ..Config::default()
        };
        let router = ConfidenceRouter::from_config(&config).unwrap();

        assert!(router.is_uncertain(0.3));
        assert!(!ConfidenceRouter::default().is_uncertain(0.3));
        assert!(ConfidenceRouter::new(0.5, 0.5).is_err());
    }

    #[test]
    fn serializes_snake_case() {
        let decision = ConfidenceRouter::default().route(0.9, || 0.0);
        let json = serde_json::to_value(decision).unwrap();

        assert_eq!(json["used_volumetric"], false);
        assert_eq!(json["label"], "pathology");
    }
}
