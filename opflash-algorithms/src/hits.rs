//! Conversion of pulses into calibrated optical hits.
#![allow(clippy::cast_precision_loss)]

use opflash_core::config::{Calibration, TimeCalibration};
use opflash_core::hit::OpHit;
use opflash_core::trigger::TriggerTime;
use opflash_core::waveform::{Pulse, Waveform};

/// Builds [`OpHit`]s from the pulses of one waveform.
///
/// Hit time = frame start + (time slice + sample) x period + time offset
/// - trigger time.
#[derive(Clone, Debug, Default)]
pub struct HitBuilder {
    calibration: Calibration,
    timing: TimeCalibration,
}

impl HitBuilder {
    /// Create with the given calibration constants.
    pub fn new(calibration: Calibration, timing: TimeCalibration) -> Self {
        Self {
            calibration,
            timing,
        }
    }

    /// Returns the ADC to PE calibration.
    pub fn calibration(&self) -> &Calibration {
        &self.calibration
    }

    /// Returns the time calibration.
    pub fn timing(&self) -> &TimeCalibration {
        &self.timing
    }

    /// Un-shifted time of a waveform sample (ns).
    #[inline]
    pub fn sample_time(&self, waveform: &Waveform, sample: usize) -> f64 {
        self.timing.frame_start_ns(waveform.frame)
            + (f64::from(waveform.time_slice) + sample as f64) * self.timing.sample_period_ns
            + self.timing.time_offset_ns
    }

    /// Appends one hit per pulse to `hits` and returns how many were added.
    ///
    /// Pulses below the hit PE threshold are dropped. A waveform without pulses
    /// adds nothing.
    pub fn construct_hits(
        &self,
        waveform: &Waveform,
        pulses: &[Pulse],
        trigger: &TriggerTime,
        hits: &mut Vec<OpHit>,
    ) -> usize {
        let before = hits.len();
        let spe_area = self.calibration.spe_area_for(waveform.channel);

        for pulse in pulses {
            let pe = pulse.integral / spe_area;
            if pe < self.calibration.hit_pe_threshold {
                continue;
            }
            let peak_time_abs = self.sample_time(waveform, pulse.peak);
            hits.push(OpHit {
                channel: waveform.channel,
                frame: waveform.frame,
                start_time: self.sample_time(waveform, pulse.start) - trigger.time_ns,
                peak_time: peak_time_abs - trigger.time_ns,
                peak_time_abs,
                width: pulse.width() as f64 * self.timing.sample_period_ns,
                area: pulse.integral,
                amplitude: pulse.amplitude,
                pe,
                pe_amplitude: pulse.amplitude / self.calibration.spe_amplitude,
            });
        }

        hits.len() - before
    }
}
