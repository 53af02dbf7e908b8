//! Pedestal estimation and pulse finder dispatch.
#![allow(clippy::cast_precision_loss)]

use crate::pulse_reco::{AlgoFirstPeak, AlgoThreshold, PulseRecoAlgorithm};
use opflash_core::config::{PedestalMode, PulseAlgorithm, PulseRecoConfig};
use opflash_core::error::PulseError;
use opflash_core::waveform::{Pedestal, Pulse, Sample, Waveform};

/// Estimates the baseline of each waveform and runs the configured pulse finder.
///
/// The manager holds configuration only. Every call builds its own algorithm
/// instance, so one manager can serve many channels concurrently.
#[derive(Clone, Debug)]
pub struct PulseRecoManager {
    config: PulseRecoConfig,
}

impl PulseRecoManager {
    /// Create with custom configuration.
    pub fn new(config: PulseRecoConfig) -> Self {
        Self { config }
    }

    /// Get current configuration.
    pub fn config(&self) -> &PulseRecoConfig {
        &self.config
    }

    /// Mean and standard deviation over the configured pedestal region.
    pub fn estimate_pedestal(&self, samples: &[Sample]) -> Pedestal {
        let region = match self.config.pedestal {
            PedestalMode::Leading { samples: n } => &samples[..n.min(samples.len())],
            PedestalMode::Whole => samples,
        };
        if region.is_empty() {
            return Pedestal::default();
        }

        let n = region.len() as f64;
        let mean = region.iter().map(|&s| f64::from(s)).sum::<f64>() / n;
        let variance = region
            .iter()
            .map(|&s| {
                let d = f64::from(s) - mean;
                d * d
            })
            .sum::<f64>()
            / n;
        Pedestal::new(mean, variance.sqrt())
    }

    /// Finds pulses in one waveform, reporting malformed input as an error.
    pub fn try_reconstruct(&self, waveform: &Waveform) -> Result<Vec<Pulse>, PulseError> {
        if waveform.is_empty() {
            return Err(PulseError::EmptyWaveform {
                channel: waveform.channel,
            });
        }
        if waveform.len() < self.config.min_waveform_len {
            return Err(PulseError::TooShort {
                channel: waveform.channel,
                len: waveform.len(),
                min: self.config.min_waveform_len,
            });
        }

        let pedestal = self.estimate_pedestal(&waveform.samples);
        let pulses = match self.config.algorithm {
            PulseAlgorithm::Threshold => {
                run(AlgoThreshold::new(&self.config), &waveform.samples, pedestal)
            }
            PulseAlgorithm::FirstPeak => {
                run(AlgoFirstPeak::new(&self.config), &waveform.samples, pedestal)
            }
        };
        log::trace!(
            "channel {} frame {}: baseline {:.2} rms {:.2}, {} pulse(s)",
            waveform.channel,
            waveform.frame,
            pedestal.mean,
            pedestal.rms,
            pulses.len()
        );
        Ok(pulses)
    }

    /// Finds pulses in one waveform; malformed input yields no pulses.
    pub fn reconstruct(&self, waveform: &Waveform) -> Vec<Pulse> {
        self.try_reconstruct(waveform).unwrap_or_else(|err| {
            log::debug!("skipping waveform: {err}");
            Vec::new()
        })
    }
}

impl Default for PulseRecoManager {
    fn default() -> Self {
        Self::new(PulseRecoConfig::default())
    }
}

fn run<A: PulseRecoAlgorithm>(mut algo: A, samples: &[Sample], pedestal: Pedestal) -> Vec<Pulse> {
    if algo.reco_pulse(samples, pedestal) {
        algo.pulses().to_vec()
    } else {
        Vec::new()
    }
}
