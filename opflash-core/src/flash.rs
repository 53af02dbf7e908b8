//! Optical flash data types.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A cross-channel, time-coincident cluster of hits.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct OpFlash {
    /// PE-weighted mean of the constituent hit times (trigger relative, ns).
    pub time: f64,
    /// PE-weighted standard deviation of the constituent hit times (ns).
    pub time_width: f64,
    /// PE-weighted mean of the un-shifted hit times (ns).
    pub abs_time: f64,
    /// Total photoelectrons; always the sum of `pe_per_channel`.
    pub total_pe: f64,
    /// Summed PE per channel, dense over the detector channel count.
    pub pe_per_channel: Vec<f64>,
    /// PE-weighted position along x, y, z.
    pub center: [f64; 3],
    /// PE-weighted spread along x, y, z.
    pub width: [f64; 3],
    /// Readout frame index.
    pub frame: u32,
    /// Flash falls inside the triggering beam gate.
    pub on_beam: bool,
    /// Flash was recorded in the frame containing the trigger.
    pub in_beam_frame: bool,
    /// Number of hits that formed the flash.
    pub n_hits: usize,
}

impl OpFlash {
    /// Iterates over channels that collected light.
    #[allow(clippy::cast_possible_truncation)]
    pub fn active_channels(&self) -> impl Iterator<Item = u32> + '_ {
        self.pe_per_channel
            .iter()
            .enumerate()
            .filter(|(_, &pe)| pe > 0.0)
            .map(|(channel, _)| channel as u32)
    }

    /// Returns the number of channels that collected light.
    pub fn n_active_channels(&self) -> usize {
        self.pe_per_channel.iter().filter(|&&pe| pe > 0.0).count()
    }

    /// Returns the PE collected on one channel, zero for unknown channels.
    #[inline]
    pub fn pe_on(&self, channel: u32) -> f64 {
        self.pe_per_channel
            .get(channel as usize)
            .copied()
            .unwrap_or(0.0)
    }
}
