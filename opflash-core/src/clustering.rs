//! Flash clustering and late-light configuration.

use crate::config::{require_fraction, require_positive};
use crate::error::ConfigError;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Configuration for grouping hits into flash candidates.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ClusteringConfig {
    /// Coincidence window measured from the first hit of a cluster (ns).
    pub flash_width_ns: f64,
    /// Largest allowed gap between consecutive hits inside a cluster (ns).
    pub refine_width_ns: f64,
    /// Minimum number of hits for a cluster to form a flash.
    pub min_hits: usize,
    /// Minimum number of distinct channels for a cluster to form a flash.
    pub min_channels: usize,
    /// Minimum summed photoelectrons for a cluster to form a flash.
    pub min_pe: f64,
}

impl Default for ClusteringConfig {
    fn default() -> Self {
        Self {
            flash_width_ns: 100.0,
            refine_width_ns: 40.0,
            min_hits: 1,
            min_channels: 1,
            min_pe: 2.0,
        }
    }
}

impl ClusteringConfig {
    /// Creates a new clustering configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the coincidence window.
    #[must_use]
    pub fn with_flash_width(mut self, width_ns: f64) -> Self {
        self.flash_width_ns = width_ns;
        self
    }

    /// Sets the refinement gap.
    #[must_use]
    pub fn with_refine_width(mut self, width_ns: f64) -> Self {
        self.refine_width_ns = width_ns;
        self
    }

    /// Sets the minimum hit count.
    #[must_use]
    pub fn with_min_hits(mut self, n: usize) -> Self {
        self.min_hits = n;
        self
    }

    /// Sets the minimum channel count.
    #[must_use]
    pub fn with_min_channels(mut self, n: usize) -> Self {
        self.min_channels = n;
        self
    }

    /// Sets the minimum summed PE.
    #[must_use]
    pub fn with_min_pe(mut self, pe: f64) -> Self {
        self.min_pe = pe;
        self
    }

    /// Checks that windows are positive and the refinement window is the tighter one.
    pub fn validate(&self) -> Result<(), ConfigError> {
        require_positive("flash_width_ns", self.flash_width_ns)?;
        require_positive("refine_width_ns", self.refine_width_ns)?;
        if self.refine_width_ns > self.flash_width_ns {
            return Err(ConfigError::Invalid(format!(
                "refine_width_ns ({}) must not exceed flash_width_ns ({})",
                self.refine_width_ns, self.flash_width_ns
            )));
        }
        if self.min_pe < 0.0 || !self.min_pe.is_finite() {
            return Err(ConfigError::Invalid(format!(
                "min_pe must be a finite non-negative value (got {})",
                self.min_pe
            )));
        }
        Ok(())
    }
}

/// Configuration for removing delayed-scintillation duplicates.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct LateLightConfig {
    /// Run the filter at all.
    pub enabled: bool,
    /// How long after a flash a later one may be its tail (ns).
    pub window_ns: f64,
    /// A later flash is a tail candidate below this fraction of the earlier PE.
    pub pe_fraction: f64,
    /// Fraction of the later flash's channels that must also be lit in the earlier one.
    pub overlap_fraction: f64,
}

impl Default for LateLightConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            window_ns: 1600.0,
            pe_fraction: 0.1,
            overlap_fraction: 0.5,
        }
    }
}

impl LateLightConfig {
    /// Creates a new late-light configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Disables the filter.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    /// Sets the late-light window.
    #[must_use]
    pub fn with_window(mut self, window_ns: f64) -> Self {
        self.window_ns = window_ns;
        self
    }

    /// Sets the PE fraction.
    #[must_use]
    pub fn with_pe_fraction(mut self, fraction: f64) -> Self {
        self.pe_fraction = fraction;
        self
    }

    /// Sets the channel overlap fraction.
    #[must_use]
    pub fn with_overlap_fraction(mut self, fraction: f64) -> Self {
        self.overlap_fraction = fraction;
        self
    }

    /// Checks the window and both fractions.
    pub fn validate(&self) -> Result<(), ConfigError> {
        require_positive("late_light.window_ns", self.window_ns)?;
        require_fraction("late_light.pe_fraction", self.pe_fraction)?;
        require_fraction("late_light.overlap_fraction", self.overlap_fraction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clustering_config() {
        let config = ClusteringConfig::new()
            .with_flash_width(50.0)
            .with_refine_width(20.0)
            .with_min_hits(2)
            .with_min_channels(2)
            .with_min_pe(5.0);

        assert!((config.flash_width_ns - 50.0).abs() < f64::EPSILON);
        assert!((config.refine_width_ns - 20.0).abs() < f64::EPSILON);
        assert_eq!(config.min_hits, 2);
        assert_eq!(config.min_channels, 2);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_non_positive_window_rejected() {
        let config = ClusteringConfig::new().with_flash_width(0.0);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::NonPositive {
                name: "flash_width_ns",
                ..
            })
        ));
    }

    #[test]
    fn test_refine_wider_than_flash_rejected() {
        let config = ClusteringConfig::new()
            .with_flash_width(50.0)
            .with_refine_width(80.0);
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_late_light_fractions_checked() {
        assert!(LateLightConfig::default().validate().is_ok());
        assert!(LateLightConfig::new().with_pe_fraction(1.5).validate().is_err());
        assert!(LateLightConfig::new()
            .with_overlap_fraction(0.0)
            .validate()
            .is_err());
        assert!(LateLightConfig::new().with_window(-1.0).validate().is_err());
    }
}
