//! Configuration for the voxel GLM driver.

use serde::Deserialize;

use crate::error::GlmError;

/// Temporal noise model used by [`run_glm`](crate::run_glm).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoiseModel {
    /// Plain least squares for every voxel.
    Ols,
    /// Per-voxel AR(1) prewhitening, with voxels grouped by their
    /// discretised lag-1 autocorrelation.
    #[default]
    Ar1,
}

/// Settings for a mass-univariate GLM fit.
///
/// # Example
///
/// ```
/// use voxel_glm::{GlmConfig, NoiseModel};
///
/// let config = GlmConfig::new()
///     .with_noise_model(NoiseModel::Ar1)
///     .with_bins(50);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GlmConfig {
    #[serde(default)]
    noise_model: NoiseModel,
    #[serde(default = "default_bins")]
    bins: usize,
}

fn default_bins() -> usize {
    100
}

impl Default for GlmConfig {
    fn default() -> Self {
        Self {
            noise_model: NoiseModel::default(),
            bins: default_bins(),
        }
    }
}

impl GlmConfig {
    /// Creates a configuration with defaults: `noise_model = Ar1`,
    /// `bins = 100`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a flat TOML table and validates it.
    ///
    /// ```
    /// use voxel_glm::{GlmConfig, NoiseModel};
    ///
    /// let config = GlmConfig::from_toml_str("noise_model = \"ols\"\nbins = 10").unwrap();
    /// assert_eq!(config.noise_model(), NoiseModel::Ols);
    /// assert_eq!(config.bins(), 10);
    /// ```
    ///
    /// # Errors
    ///
    /// [`GlmError::Config`] for malformed TOML or unknown keys, and any
    /// error from [`GlmConfig::validate`].
    pub fn from_toml_str(s: &str) -> Result<Self, GlmError> {
        let config: Self = toml::from_str(s).map_err(|e| GlmError::Config {
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Sets the noise model.
    pub fn with_noise_model(mut self, noise_model: NoiseModel) -> Self {
        self.noise_model = noise_model;
        self
    }

    /// Sets the number of AR(1) bins per unit of autocorrelation.
    pub fn with_bins(mut self, bins: usize) -> Self {
        self.bins = bins;
        self
    }

    /// Returns the noise model.
    pub fn noise_model(&self) -> NoiseModel {
        self.noise_model
    }

    /// Returns the number of AR(1) bins.
    pub fn bins(&self) -> usize {
        self.bins
    }

    /// Checks that `bins` is at least 1.
    pub fn validate(&self) -> Result<(), GlmError> {
        if self.bins < 1 {
            return Err(GlmError::InvalidBins { bins: self.bins });
        }
        Ok(())
    }
}
