//! Optical hit traits and types.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A calibrated, timed, channel-tagged record derived from one pulse.
///
/// Times are in nanoseconds. `peak_time` and `start_time` are relative to the
/// trigger (see [`crate::TriggerTime`]); `peak_time_abs` is not shifted.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct OpHit {
    /// Optical detector channel id.
    pub channel: u32,
    /// Readout frame index.
    pub frame: u32,
    /// Time of the first sample above threshold.
    pub start_time: f64,
    /// Time of the pulse peak.
    pub peak_time: f64,
    /// Peak time without the trigger shift.
    pub peak_time_abs: f64,
    /// Pulse duration.
    pub width: f64,
    /// Raw integral in ADC x samples.
    pub area: f64,
    /// Raw peak amplitude in ADC.
    pub amplitude: f64,
    /// Photoelectron-equivalent integral.
    pub pe: f64,
    /// Photoelectron-equivalent amplitude.
    pub pe_amplitude: f64,
}

/// Trait for hits that can be grouped into flashes.
///
/// The clusterer only needs a time, a channel, a frame and a photoelectron
/// weight, so alternative hit sources can be clustered without conversion.
pub trait Hit: Send + Sync {
    /// Time used for coincidence tests (ns).
    fn time(&self) -> f64;

    /// Optical detector channel id.
    fn channel(&self) -> u32;

    /// Readout frame index.
    fn frame(&self) -> u32;

    /// Photoelectron weight.
    fn pe(&self) -> f64;
}

impl Hit for OpHit {
    #[inline]
    fn time(&self) -> f64 {
        self.peak_time
    }

    #[inline]
    fn channel(&self) -> u32 {
        self.channel
    }

    #[inline]
    fn frame(&self) -> u32 {
        self.frame
    }

    #[inline]
    fn pe(&self) -> f64 {
        self.pe
    }
}

impl OpHit {
    /// Creates a hit with the fields the clusterer looks at; the rest are zero.
    pub fn new(channel: u32, frame: u32, peak_time: f64, pe: f64) -> Self {
        Self {
            channel,
            frame,
            start_time: peak_time,
            peak_time,
            peak_time_abs: peak_time,
            pe,
            ..Default::default()
        }
    }
}
