//! Digitized waveform and pulse types.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// ADC sample value as produced by the digitizer.
pub type Sample = i16;

/// One channel's digitized trace over (part of) one frame.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Waveform {
    /// Optical detector channel id.
    pub channel: u32,
    /// Readout frame index.
    pub frame: u32,
    /// Offset of the first sample inside the frame, in samples.
    #[cfg_attr(feature = "serde", serde(default))]
    pub time_slice: u32,
    /// Raw ADC samples.
    pub samples: Vec<Sample>,
}

impl Waveform {
    /// Creates a waveform starting at the beginning of its frame.
    pub fn new(channel: u32, frame: u32, samples: Vec<Sample>) -> Self {
        Self {
            channel,
            frame,
            time_slice: 0,
            samples,
        }
    }

    /// Sets the sample offset inside the frame.
    #[must_use]
    pub fn with_time_slice(mut self, time_slice: u32) -> Self {
        self.time_slice = time_slice;
        self
    }

    /// Returns the number of samples.
    #[inline]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Returns true if the waveform has no samples.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Baseline level and noise of a waveform.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Pedestal {
    /// Mean no-signal level in ADC.
    pub mean: f64,
    /// Standard deviation around the mean in ADC.
    pub rms: f64,
}

impl Pedestal {
    /// Creates a pedestal estimate.
    #[inline]
    pub fn new(mean: f64, rms: f64) -> Self {
        Self { mean, rms }
    }
}

/// A contiguous above-threshold excursion found in one waveform.
///
/// Indices are sample positions inside the waveform; `end` is inclusive.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pulse {
    /// First sample above the start threshold.
    pub start: usize,
    /// Sample used as the pulse time.
    pub peak: usize,
    /// Last sample above the end threshold.
    pub end: usize,
    /// Largest baseline-subtracted sample in the pulse (ADC).
    pub amplitude: f64,
    /// Sum of baseline-subtracted samples over `start..=end` (ADC x samples).
    pub integral: f64,
    /// Baseline the pulse was measured against.
    pub baseline: f64,
    /// Baseline noise the threshold was derived from.
    pub baseline_rms: f64,
}

impl Pulse {
    /// Number of samples in the pulse.
    #[inline]
    pub fn width(&self) -> usize {
        self.end - self.start + 1
    }
}
