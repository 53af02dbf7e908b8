//! Pulse finding strategies.
//!
//! Both strategies share the same region search: a pulse starts at the first
//! sample strictly above `baseline + max(adc_threshold, nsigma * rms)` and
//! extends while samples stay at or above the end level (the start level
//! unless a lower hysteresis level is configured). They differ only in which
//! sample is reported as the pulse time.
#![allow(clippy::doc_markdown)]

use opflash_core::config::PulseRecoConfig;
use opflash_core::waveform::{Pedestal, Pulse, Sample};

/// Trait for pulse finding algorithms.
///
/// Implementations keep per-waveform accumulators; [`reset`](Self::reset)
/// clears them between channels.
pub trait PulseRecoAlgorithm: Send {
    /// Algorithm name.
    fn name(&self) -> &'static str;

    /// Clears pulses and accumulators from the previous waveform.
    fn reset(&mut self);

    /// Scans one waveform. Returns false on degenerate input (empty waveform).
    fn reco_pulse(&mut self, samples: &[Sample], pedestal: Pedestal) -> bool;

    /// Pulses found by the last call to [`reco_pulse`](Self::reco_pulse).
    fn pulses(&self) -> &[Pulse];
}

/// Threshold levels in absolute ADC for one waveform.
#[derive(Clone, Copy, Debug)]
struct Levels {
    start: f64,
    end: f64,
}

impl Levels {
    fn new(config: &PulseRecoConfig, pedestal: Pedestal) -> Self {
        Self {
            start: pedestal.mean + config.start_level(pedestal.rms),
            end: pedestal.mean + config.end_level(pedestal.rms),
        }
    }
}

/// Finds above-threshold regions and turns those wide enough into pulses.
///
/// `pick_peak` receives the region's samples and returns the offset of the
/// sample used as the pulse time.
fn find_pulses<F>(
    samples: &[Sample],
    pedestal: Pedestal,
    config: &PulseRecoConfig,
    pick_peak: F,
    pulses: &mut Vec<Pulse>,
) where
    F: Fn(&[Sample]) -> usize,
{
    let levels = Levels::new(config, pedestal);
    let n = samples.len();
    let mut i = 0;

    while i < n {
        if f64::from(samples[i]) <= levels.start {
            i += 1;
            continue;
        }

        let start = i;
        let mut end = i;
        while end + 1 < n && f64::from(samples[end + 1]) >= levels.end {
            end += 1;
        }
        i = end + 1;

        if end - start + 1 < config.min_width {
            continue;
        }

        let region = &samples[start..=end];
        let mut amplitude = f64::MIN;
        let mut integral = 0.0;
        for &s in region {
            let above = f64::from(s) - pedestal.mean;
            amplitude = amplitude.max(above);
            integral += above;
        }

        pulses.push(Pulse {
            start,
            peak: start + pick_peak(region),
            end,
            amplitude,
            integral,
            baseline: pedestal.mean,
            baseline_rms: pedestal.rms,
        });
    }
}

/// Offset of the largest sample; the earliest one on ties.
fn global_maximum(region: &[Sample]) -> usize {
    let mut best = 0;
    for (k, &s) in region.iter().enumerate().skip(1) {
        if s > region[best] {
            best = k;
        }
    }
    best
}

/// Offset of the first local maximum reached on a rising edge.
///
/// A plateau reports its first sample, so a single-peak region agrees with
/// [`global_maximum`].
fn first_local_maximum(region: &[Sample]) -> usize {
    let mut peak = region
        .windows(2)
        .position(|pair| pair[1] < pair[0])
        .unwrap_or(region.len() - 1);
    while peak > 0 && region[peak - 1] == region[peak] {
        peak -= 1;
    }
    peak
}

/// Threshold pulse finder: pulse time at the largest sample of the region.
#[derive(Clone, Debug)]
pub struct AlgoThreshold {
    config: PulseRecoConfig,
    pulses: Vec<Pulse>,
}

impl AlgoThreshold {
    /// Create with the given configuration.
    pub fn new(config: &PulseRecoConfig) -> Self {
        Self {
            config: config.clone(),
            pulses: Vec::new(),
        }
    }
}

impl PulseRecoAlgorithm for AlgoThreshold {
    fn name(&self) -> &'static str {
        "Threshold"
    }

    fn reset(&mut self) {
        self.pulses.clear();
    }

    fn reco_pulse(&mut self, samples: &[Sample], pedestal: Pedestal) -> bool {
        self.reset();
        if samples.is_empty() {
            return false;
        }
        find_pulses(
            samples,
            pedestal,
            &self.config,
            global_maximum,
            &mut self.pulses,
        );
        true
    }

    fn pulses(&self) -> &[Pulse] {
        &self.pulses
    }
}

/// First-peak pulse finder.
///
/// Same regions as [`AlgoThreshold`], but the pulse time is pinned to the
/// first local maximum so a later, taller bump does not pull the time.
#[derive(Clone, Debug)]
pub struct AlgoFirstPeak {
    config: PulseRecoConfig,
    pulses: Vec<Pulse>,
}

impl AlgoFirstPeak {
    /// Create with the given configuration.
    pub fn new(config: &PulseRecoConfig) -> Self {
        Self {
            config: config.clone(),
            pulses: Vec::new(),
        }
    }
}

impl PulseRecoAlgorithm for AlgoFirstPeak {
    fn name(&self) -> &'static str {
        "FirstPeak"
    }

    fn reset(&mut self) {
        self.pulses.clear();
    }

    fn reco_pulse(&mut self, samples: &[Sample], pedestal: Pedestal) -> bool {
        self.reset();
        if samples.is_empty() {
            return false;
        }
        find_pulses(
            samples,
            pedestal,
            &self.config,
            first_local_maximum,
            &mut self.pulses,
        );
        true
    }

    fn pulses(&self) -> &[Pulse] {
        &self.pulses
    }
}
