use std::{env, str::FromStr};

use serde::Deserialize;

use crate::error::TriageError;

/// Analysis settings, built once per process and passed by reference.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Odd number of neighbouring slices averaged per encoded slice.
    pub k_slices: usize,
    /// Side length of the square classifier input.
    pub img_size: usize,
    /// Open uncertainty band: scores strictly between the bounds are routed
    /// to the volumetric estimator.
    pub uncert_low: f32,
    pub uncert_high: f32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            k_slices: 5,
            img_size: 320,
            uncert_low: 0.45,
            uncert_high: 0.55,
        }
    }
}

impl Config {
    /// Defaults overridden by `K_SLICES`, `IMG_SIZE`, `UNCERT_LOW` and
    /// `UNCERT_HIGH` when they are set.
    pub fn from_env() -> Result<Self, TriageError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub(crate) fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, TriageError> {
        let defaults = Self::default();
        let config = Self {
            k_slices: parse_var(&lookup, "K_SLICES", defaults.k_slices)?,
            img_size: parse_var(&lookup, "IMG_SIZE", defaults.img_size)?,
            uncert_low: parse_var(&lookup, "UNCERT_LOW", defaults.uncert_low)?,
            uncert_high: parse_var(&lookup, "UNCERT_HIGH", defaults.uncert_high)?,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), TriageError> {
        if self.k_slices == 0 || self.k_slices % 2 == 0 {
            return Err(TriageError::InvalidConfig(format!(
                "k_slices must be odd and at least 1, got {}",
                self.k_slices
            )));
        }
        if self.img_size == 0 {
            return Err(TriageError::InvalidConfig(
                "img_size must be positive".to_string(),
            ));
        }
        let in_unit = |v: f32| (0.0..=1.0).contains(&v);
        if !in_unit(self.uncert_low)
            || !in_unit(self.uncert_high)
            || self.uncert_low >= self.uncert_high
        {
            return Err(TriageError::InvalidConfig(format!(
                "uncertainty band ({}, {}) must be an increasing range within [0, 1]",
                self.uncert_low, self.uncert_high
            )));
        }
        Ok(())
    }
}

fn parse_var<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
    default: T,
) -> Result<T, TriageError> {
    match lookup(name) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| TriageError::InvalidConfig(format!("{name}={raw:?} is not valid"))),
        None => Ok(default),
    }
}
