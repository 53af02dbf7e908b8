//! Pulse finding, calibration and run configuration.
//!
//! All knobs are numeric and leave the algorithm structure unchanged.
//! [`FlashFinderConfig::validate`] must succeed before any frame is processed.

use crate::clustering::{ClusteringConfig, LateLightConfig};
use crate::error::ConfigError;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

pub(crate) fn require_positive(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if value > 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::NonPositive { name, value })
    }
}

pub(crate) fn require_fraction(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if value > 0.0 && value <= 1.0 {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            name,
            value,
            min: 0.0,
            max: 1.0,
        })
    }
}

/// Hit-time assignment strategy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum PulseAlgorithm {
    /// Pulse time at the largest sample of the region.
    #[default]
    Threshold,
    /// Pulse time at the first local maximum of the region.
    FirstPeak,
}

/// Where the pedestal is measured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum PedestalMode {
    /// Mean and RMS over the first `samples` samples (pre-pulse region).
    Leading { samples: usize },
    /// Mean and RMS over the whole waveform.
    Whole,
}

impl Default for PedestalMode {
    fn default() -> Self {
        Self::Leading { samples: 16 }
    }
}

/// Configuration for per-channel pulse finding.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct PulseRecoConfig {
    /// Which hit-time strategy to run.
    pub algorithm: PulseAlgorithm,
    /// Absolute start threshold above baseline (ADC).
    pub adc_threshold: f64,
    /// Start threshold in units of baseline RMS.
    pub nsigma: f64,
    /// Absolute end threshold above baseline; defaults to the start threshold.
    pub end_adc_threshold: Option<f64>,
    /// End threshold in units of baseline RMS; defaults to `nsigma`.
    pub end_nsigma: Option<f64>,
    /// Pulses narrower than this many samples are noise.
    pub min_width: usize,
    /// Pedestal estimation region.
    pub pedestal: PedestalMode,
    /// Waveforms shorter than this produce no pulses.
    pub min_waveform_len: usize,
}

impl Default for PulseRecoConfig {
    fn default() -> Self {
        Self {
            algorithm: PulseAlgorithm::Threshold,
            adc_threshold: 5.0,
            nsigma: 5.0,
            end_adc_threshold: None,
            end_nsigma: None,
            min_width: 2,
            pedestal: PedestalMode::default(),
            min_waveform_len: 8,
        }
    }
}

impl PulseRecoConfig {
    /// Creates a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Selects the hit-time strategy.
    #[must_use]
    pub fn with_algorithm(mut self, algorithm: PulseAlgorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    /// Sets the absolute ADC threshold.
    #[must_use]
    pub fn with_adc_threshold(mut self, threshold: f64) -> Self {
        self.adc_threshold = threshold;
        self
    }

    /// Sets the sigma multiplier.
    #[must_use]
    pub fn with_nsigma(mut self, nsigma: f64) -> Self {
        self.nsigma = nsigma;
        self
    }

    /// Sets a lower hysteresis level for ending pulses.
    #[must_use]
    pub fn with_end_threshold(mut self, adc_threshold: f64, nsigma: f64) -> Self {
        self.end_adc_threshold = Some(adc_threshold);
        self.end_nsigma = Some(nsigma);
        self
    }

    /// Sets the minimum pulse width in samples.
    #[must_use]
    pub fn with_min_width(mut self, samples: usize) -> Self {
        self.min_width = samples;
        self
    }

    /// Sets the pedestal region.
    #[must_use]
    pub fn with_pedestal(mut self, pedestal: PedestalMode) -> Self {
        self.pedestal = pedestal;
        self
    }

    /// Sets the minimum waveform length.
    #[must_use]
    pub fn with_min_waveform_len(mut self, len: usize) -> Self {
        self.min_waveform_len = len;
        self
    }

    /// Start level above baseline for a given baseline RMS.
    #[inline]
    pub fn start_level(&self, rms: f64) -> f64 {
        self.adc_threshold.max(self.nsigma * rms)
    }

    /// End level above baseline for a given baseline RMS.
    ///
    /// Never above the start level, so a pulse that starts always has at
    /// least its first sample.
    #[inline]
    pub fn end_level(&self, rms: f64) -> f64 {
        let adc = self.end_adc_threshold.unwrap_or(self.adc_threshold);
        let nsigma = self.end_nsigma.unwrap_or(self.nsigma);
        adc.max(nsigma * rms).min(self.start_level(rms))
    }

    /// Checks thresholds and sizes.
    pub fn validate(&self) -> Result<(), ConfigError> {
        require_positive("adc_threshold", self.adc_threshold)?;
        require_positive("nsigma", self.nsigma)?;
        if let Some(end) = self.end_adc_threshold {
            require_positive("end_adc_threshold", end)?;
            if end > self.adc_threshold {
                return Err(ConfigError::Invalid(format!(
                    "end_adc_threshold ({end}) must not exceed adc_threshold ({})",
                    self.adc_threshold
                )));
            }
        }
        if let Some(end) = self.end_nsigma {
            require_positive("end_nsigma", end)?;
            if end > self.nsigma {
                return Err(ConfigError::Invalid(format!(
                    "end_nsigma ({end}) must not exceed nsigma ({})",
                    self.nsigma
                )));
            }
        }
        if self.min_width == 0 {
            return Err(ConfigError::Invalid("min_width must be at least 1".into()));
        }
        if let PedestalMode::Leading { samples: 0 } = self.pedestal {
            return Err(ConfigError::Invalid(
                "leading pedestal region must contain at least 1 sample".into(),
            ));
        }
        Ok(())
    }
}

/// ADC to photoelectron conversion.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Calibration {
    /// Integral of a single-photoelectron pulse (ADC x samples).
    pub spe_area: f64,
    /// Amplitude of a single-photoelectron pulse (ADC).
    pub spe_amplitude: f64,
    /// Per-channel overrides of `spe_area`; non-positive entries fall back.
    pub channel_spe_area: Vec<f64>,
    /// Hits below this PE are dropped.
    pub hit_pe_threshold: f64,
}

impl Default for Calibration {
    fn default() -> Self {
        Self {
            spe_area: 20.0,
            spe_amplitude: 5.0,
            channel_spe_area: Vec::new(),
            hit_pe_threshold: 0.0,
        }
    }
}

impl Calibration {
    /// Creates a calibration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the single-PE area and amplitude.
    #[must_use]
    pub fn with_spe(mut self, area: f64, amplitude: f64) -> Self {
        self.spe_area = area;
        self.spe_amplitude = amplitude;
        self
    }

    /// Sets per-channel single-PE areas.
    #[must_use]
    pub fn with_channel_spe_area(mut self, areas: Vec<f64>) -> Self {
        self.channel_spe_area = areas;
        self
    }

    /// Sets the minimum hit PE.
    #[must_use]
    pub fn with_hit_pe_threshold(mut self, pe: f64) -> Self {
        self.hit_pe_threshold = pe;
        self
    }

    /// Single-PE area used for one channel.
    #[inline]
    pub fn spe_area_for(&self, channel: u32) -> f64 {
        match self.channel_spe_area.get(channel as usize) {
            Some(&area) if area > 0.0 => area,
            _ => self.spe_area,
        }
    }

    /// Checks the conversion constants.
    pub fn validate(&self) -> Result<(), ConfigError> {
        require_positive("spe_area", self.spe_area)?;
        require_positive("spe_amplitude", self.spe_amplitude)?;
        if self.hit_pe_threshold < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "hit_pe_threshold must not be negative (got {})",
                self.hit_pe_threshold
            )));
        }
        Ok(())
    }
}

/// Sample clock and frame layout.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct TimeCalibration {
    /// Time per ADC sample (ns).
    pub sample_period_ns: f64,
    /// Samples per readout frame.
    pub frame_samples: u32,
    /// Constant added to every hit time (ns).
    pub time_offset_ns: f64,
}

impl Default for TimeCalibration {
    fn default() -> Self {
        Self {
            sample_period_ns: 15.625,
            frame_samples: 102_400,
            time_offset_ns: 0.0,
        }
    }
}

impl TimeCalibration {
    /// Creates a time calibration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the sample period.
    #[must_use]
    pub fn with_sample_period(mut self, period_ns: f64) -> Self {
        self.sample_period_ns = period_ns;
        self
    }

    /// Sets the frame length in samples.
    #[must_use]
    pub fn with_frame_samples(mut self, samples: u32) -> Self {
        self.frame_samples = samples;
        self
    }

    /// Sets the constant time offset.
    #[must_use]
    pub fn with_time_offset(mut self, offset_ns: f64) -> Self {
        self.time_offset_ns = offset_ns;
        self
    }

    /// Frame length in ns.
    #[inline]
    pub fn frame_length_ns(&self) -> f64 {
        f64::from(self.frame_samples) * self.sample_period_ns
    }

    /// Start time of a frame in ns.
    #[inline]
    pub fn frame_start_ns(&self, frame: u32) -> f64 {
        f64::from(frame) * self.frame_length_ns()
    }

    /// Checks the clock constants.
    pub fn validate(&self) -> Result<(), ConfigError> {
        require_positive("sample_period_ns", self.sample_period_ns)?;
        require_positive("frame_samples", f64::from(self.frame_samples))
    }
}

/// Complete configuration of a flash-finding run.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct FlashFinderConfig {
    /// Number of optical channels; sets the length of per-channel PE vectors.
    pub n_channels: usize,
    /// Pulse finding.
    pub pulse: PulseRecoConfig,
    /// ADC to PE conversion.
    pub calibration: Calibration,
    /// Clock and frame layout.
    pub timing: TimeCalibration,
    /// Hit clustering.
    pub clustering: ClusteringConfig,
    /// Late-light removal.
    pub late_light: LateLightConfig,
    /// Earliest beam-gate time accepted as the trigger (ns).
    pub trigger_lower_bound_ns: f64,
}

impl Default for FlashFinderConfig {
    fn default() -> Self {
        Self {
            n_channels: 32,
            pulse: PulseRecoConfig::default(),
            calibration: Calibration::default(),
            timing: TimeCalibration::default(),
            clustering: ClusteringConfig::default(),
            late_light: LateLightConfig::default(),
            trigger_lower_bound_ns: 0.0,
        }
    }
}

impl FlashFinderConfig {
    /// Creates a configuration with default values for `n_channels` channels.
    pub fn new(n_channels: usize) -> Self {
        Self {
            n_channels,
            ..Self::default()
        }
    }

    /// Sets the pulse finding configuration.
    #[must_use]
    pub fn with_pulse(mut self, pulse: PulseRecoConfig) -> Self {
        self.pulse = pulse;
        self
    }

    /// Sets the calibration.
    #[must_use]
    pub fn with_calibration(mut self, calibration: Calibration) -> Self {
        self.calibration = calibration;
        self
    }

    /// Sets the time calibration.
    #[must_use]
    pub fn with_timing(mut self, timing: TimeCalibration) -> Self {
        self.timing = timing;
        self
    }

    /// Sets the clustering configuration.
    #[must_use]
    pub fn with_clustering(mut self, clustering: ClusteringConfig) -> Self {
        self.clustering = clustering;
        self
    }

    /// Sets the late-light configuration.
    #[must_use]
    pub fn with_late_light(mut self, late_light: LateLightConfig) -> Self {
        self.late_light = late_light;
        self
    }

    /// Sets the trigger lower bound.
    #[must_use]
    pub fn with_trigger_lower_bound(mut self, bound_ns: f64) -> Self {
        self.trigger_lower_bound_ns = bound_ns;
        self
    }

    /// Validates every section.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.n_channels == 0 {
            return Err(ConfigError::Invalid("n_channels must be at least 1".into()));
        }
        if self.n_channels > u32::MAX as usize {
            return Err(ConfigError::Invalid(format!(
                "n_channels ({}) does not fit a channel id",
                self.n_channels
            )));
        }
        self.pulse.validate()?;
        self.calibration.validate()?;
        self.timing.validate()?;
        self.clustering.validate()?;
        if self.late_light.enabled {
            self.late_light.validate()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(FlashFinderConfig::default().validate().is_ok());
    }

    #[test]
    fn test_levels_take_the_larger_term() {
        let config = PulseRecoConfig::new().with_adc_threshold(5.0).with_nsigma(3.0);
        assert!((config.start_level(1.0) - 5.0).abs() < f64::EPSILON);
        assert!((config.start_level(2.0) - 6.0).abs() < f64::EPSILON);
        assert!((config.end_level(2.0) - 6.0).abs() < f64::EPSILON);

        let hysteresis = config.with_end_threshold(2.0, 1.0);
        assert!((hysteresis.end_level(1.5) - 2.0).abs() < f64::EPSILON);
        assert!((hysteresis.end_level(3.0) - 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_non_positive_threshold_rejected() {
        let config = FlashFinderConfig::default()
            .with_pulse(PulseRecoConfig::new().with_adc_threshold(0.0));
        assert!(matches!(
            config.validate(),
            Err(ConfigError::NonPositive {
                name: "adc_threshold",
                ..
            })
        ));
    }

    #[test]
    fn test_end_threshold_above_start_rejected() {
        let config = PulseRecoConfig::new()
            .with_adc_threshold(5.0)
            .with_end_threshold(8.0, 1.0);
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_end_nsigma_above_start_rejected() {
        let config = PulseRecoConfig::new()
            .with_adc_threshold(5.0)
            .with_nsigma(3.0)
            .with_end_threshold(2.0, 10.0);
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
        // Unvalidated configs still never end a pulse above its start level.
        assert!((config.end_level(1.0) - config.start_level(1.0)).abs() < f64::EPSILON);
    }

    #[test]
    fn test_zero_channels_rejected() {
        assert!(FlashFinderConfig::new(0).validate().is_err());
    }

    #[test]
    fn test_disabled_late_light_skips_validation() {
        let mut config = FlashFinderConfig::default();
        config.late_light = LateLightConfig::disabled().with_pe_fraction(7.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_channel_spe_area_override() {
        let calibration = Calibration::new()
            .with_spe(20.0, 5.0)
            .with_channel_spe_area(vec![10.0, 0.0]);
        assert!((calibration.spe_area_for(0) - 10.0).abs() < f64::EPSILON);
        assert!((calibration.spe_area_for(1) - 20.0).abs() < f64::EPSILON);
        assert!((calibration.spe_area_for(5) - 20.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_frame_start() {
        let timing = TimeCalibration::new()
            .with_sample_period(2.0)
            .with_frame_samples(100);
        assert!((timing.frame_length_ns() - 200.0).abs() < f64::EPSILON);
        assert!((timing.frame_start_ns(3) - 600.0).abs() < f64::EPSILON);
    }
}
