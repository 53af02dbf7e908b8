//! Frame-level orchestration: pulses to hits to clusters to flashes.

use crate::clustering::{ClusteringStatistics, FlashClusterer};
use crate::flash::FlashBuilder;
use crate::hits::HitBuilder;
use crate::late_light::LateLightFilter;
use crate::manager::PulseRecoManager;
use opflash_core::config::FlashFinderConfig;
use opflash_core::error::{ConfigError, Result};
use opflash_core::flash::OpFlash;
use opflash_core::geometry::OpDetGeometry;
use opflash_core::hit::OpHit;
use opflash_core::trigger::{get_trigger_time, BeamGate, TriggerTime};
use opflash_core::waveform::Waveform;
use rayon::prelude::*;
use std::collections::BTreeMap;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Counters collected over a run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FlashFinderStatistics {
    /// Frames processed.
    pub frames: usize,
    /// Waveforms handed to pulse finding.
    pub waveforms_processed: usize,
    /// Waveforms skipped as malformed or outside the channel range.
    pub waveforms_rejected: usize,
    /// Clustering counters.
    pub clustering: ClusteringStatistics,
    /// Flashes dropped as late light.
    pub late_light_removed: usize,
}

impl FlashFinderStatistics {
    /// Adds another set of counters to this one.
    pub fn merge(&mut self, other: &Self) {
        self.frames += other.frames;
        self.waveforms_processed += other.waveforms_processed;
        self.waveforms_rejected += other.waveforms_rejected;
        self.clustering.merge(&other.clustering);
        self.late_light_removed += other.late_light_removed;
    }
}

/// Result of processing one frame. Cluster indices point into `hits`.
#[derive(Clone, Debug, Default)]
pub struct FrameOutput {
    /// Frame index.
    pub frame: u32,
    /// Hits of this frame, in waveform order.
    pub hits: Vec<OpHit>,
    /// Flashes of this frame.
    pub flashes: Vec<OpFlash>,
    /// One hit-index list per flash, frame-local.
    pub clusters: Vec<Vec<usize>>,
    /// Counters for this frame.
    pub statistics: FlashFinderStatistics,
}

/// Result of a full readout.
///
/// `clusters[i]` lists the indices into `hits` of the hits that formed
/// `flashes[i]`.
#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FlashFinderOutput {
    /// Trigger used for hit times.
    pub trigger: TriggerTime,
    /// All hits, frame by frame.
    pub hits: Vec<OpHit>,
    /// All flashes, frame by frame.
    pub flashes: Vec<OpFlash>,
    /// Hit indices per flash, absolute into `hits`.
    pub clusters: Vec<Vec<usize>>,
    /// Run counters.
    pub statistics: FlashFinderStatistics,
}

impl FlashFinderOutput {
    /// Appends a frame, shifting its cluster indices by the hits already held.
    pub fn append_frame(&mut self, frame: FrameOutput) {
        let offset = self.hits.len();
        self.hits.extend(frame.hits);
        self.flashes.extend(frame.flashes);
        self.clusters.extend(
            frame
                .clusters
                .into_iter()
                .map(|cluster| cluster.into_iter().map(|i| i + offset).collect()),
        );
        self.statistics.merge(&frame.statistics);
    }
}

/// Hits extracted from one waveform.
struct ChannelHits {
    hits: Vec<OpHit>,
    rejected: bool,
}

/// Runs the full reconstruction chain.
#[derive(Clone, Debug)]
pub struct FlashFinder {
    config: FlashFinderConfig,
    manager: PulseRecoManager,
    hit_builder: HitBuilder,
    clusterer: FlashClusterer,
    late_light: LateLightFilter,
}

impl FlashFinder {
    /// Validates the configuration and builds every stage.
    pub fn new(config: FlashFinderConfig) -> std::result::Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            manager: PulseRecoManager::new(config.pulse.clone()),
            hit_builder: HitBuilder::new(config.calibration.clone(), config.timing.clone()),
            clusterer: FlashClusterer::new(config.clustering.clone()),
            late_light: LateLightFilter::new(config.late_light.clone()),
            config,
        })
    }

    /// Get current configuration.
    pub fn config(&self) -> &FlashFinderConfig {
        &self.config
    }

    /// Builds a flash builder with channel positions cached from `geometry`.
    pub fn flash_builder<G: OpDetGeometry + ?Sized>(&self, geometry: &G) -> FlashBuilder {
        FlashBuilder::new(self.config.n_channels, geometry)
    }

    /// Pulse finding and hit building for one waveform.
    fn extract_hits(&self, waveform: &Waveform, trigger: &TriggerTime) -> ChannelHits {
        if waveform.channel as usize >= self.config.n_channels {
            log::warn!(
                "frame {}: channel {} is outside the detector's {} channels, skipped",
                waveform.frame,
                waveform.channel,
                self.config.n_channels
            );
            return ChannelHits {
                hits: Vec::new(),
                rejected: true,
            };
        }

        match self.manager.try_reconstruct(waveform) {
            Ok(pulses) => {
                let mut hits = Vec::with_capacity(pulses.len());
                self.hit_builder.construct_hits(waveform, &pulses, trigger, &mut hits);
                ChannelHits {
                    hits,
                    rejected: false,
                }
            }
            Err(err) => {
                log::warn!("frame {}: {err}, no pulses", waveform.frame);
                ChannelHits {
                    hits: Vec::new(),
                    rejected: true,
                }
            }
        }
    }

    /// Processes every waveform of one frame.
    ///
    /// Hit extraction runs per channel in parallel and is joined before
    /// clustering. Waveforms from other frames are ignored. An error means
    /// no output for the frame.
    pub fn process_frame(
        &self,
        frame: u32,
        waveforms: &[&Waveform],
        trigger: &TriggerTime,
        flash_builder: &FlashBuilder,
    ) -> Result<FrameOutput> {
        let mut statistics = FlashFinderStatistics {
            frames: 1,
            ..Default::default()
        };

        let selected: Vec<&Waveform> = waveforms
            .iter()
            .copied()
            .filter(|wf| {
                if wf.frame == frame {
                    true
                } else {
                    log::warn!(
                        "channel {}: waveform from frame {} handed to frame {frame}",
                        wf.channel,
                        wf.frame
                    );
                    false
                }
            })
            .collect();
        statistics.waveforms_processed = selected.len();

        let per_channel: Vec<ChannelHits> = selected
            .par_iter()
            .map(|wf| self.extract_hits(wf, trigger))
            .collect();

        let mut hits = Vec::with_capacity(per_channel.iter().map(|c| c.hits.len()).sum());
        for channel in per_channel {
            if channel.rejected {
                statistics.waveforms_rejected += 1;
            }
            hits.extend(channel.hits);
        }

        let (mut clusters, clustering) = self.clusterer.cluster(&hits);
        statistics.clustering = clustering;

        let trigger_frame = trigger.frame(self.config.timing.frame_length_ns());
        let mut flashes =
            flash_builder.construct_flashes(&hits, &clusters, trigger, trigger_frame)?;
        statistics.late_light_removed = self
            .late_light
            .remove_late_light(&mut flashes, &mut clusters)?;

        log::debug!(
            "frame {frame}: {} waveform(s), {} hit(s), {} flash(es)",
            statistics.waveforms_processed,
            hits.len(),
            flashes.len()
        );

        Ok(FrameOutput {
            frame,
            hits,
            flashes,
            clusters,
            statistics,
        })
    }

    /// Processes a full readout, frame by frame in ascending frame order.
    ///
    /// The trigger is the earliest beam gate at or after the configured lower
    /// bound. Cluster indices in the output are absolute into the run's hits.
    pub fn run_flash_finder<G: OpDetGeometry + ?Sized>(
        &self,
        waveforms: &[Waveform],
        beam_gates: &[BeamGate],
        geometry: &G,
    ) -> Result<FlashFinderOutput> {
        let trigger = get_trigger_time(beam_gates, self.config.trigger_lower_bound_ns);
        if !trigger.found {
            log::debug!(
                "no beam gate at or after {} ns",
                self.config.trigger_lower_bound_ns
            );
        }
        let flash_builder = self.flash_builder(geometry);

        let mut frames: BTreeMap<u32, Vec<&Waveform>> = BTreeMap::new();
        for waveform in waveforms {
            frames.entry(waveform.frame).or_default().push(waveform);
        }

        let mut output = FlashFinderOutput {
            trigger,
            ..Default::default()
        };
        for (frame, frame_waveforms) in frames {
            let frame_output =
                self.process_frame(frame, &frame_waveforms, &trigger, &flash_builder)?;
            output.append_frame(frame_output);
        }

        log::debug!(
            "{} frame(s): {} hit(s), {} flash(es), {} late-light flash(es) removed",
            output.statistics.frames,
            output.hits.len(),
            output.flashes.len(),
            output.statistics.late_light_removed
        );
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opflash_core::clustering::{ClusteringConfig, LateLightConfig};
    use opflash_core::config::{Calibration, PulseRecoConfig, TimeCalibration};
    use opflash_core::error::Error;
    use opflash_core::geometry::ChannelPositions;

    fn config() -> FlashFinderConfig {
        FlashFinderConfig::new(4)
            .with_pulse(PulseRecoConfig::new().with_adc_threshold(5.0).with_nsigma(3.0))
            .with_calibration(Calibration::new().with_spe(4.0, 1.0))
            .with_timing(
                TimeCalibration::new()
                    .with_sample_period(1.0)
                    .with_frame_samples(1000),
            )
            .with_clustering(
                ClusteringConfig::new()
                    .with_flash_width(50.0)
                    .with_refine_width(50.0)
                    .with_min_pe(1.0),
            )
            .with_late_light(LateLightConfig::disabled())
    }

    fn pulse_at(channel: u32, frame: u32, peak: usize) -> Waveform {
        let mut samples = vec![10; 200];
        for (k, v) in [20, 40, 80, 40, 20].into_iter().enumerate() {
            samples[peak - 2 + k] += v;
        }
        Waveform::new(channel, frame, samples)
    }

    #[test]
    fn test_invalid_config_fails_before_processing() {
        let bad = config().with_clustering(ClusteringConfig::new().with_flash_width(-1.0));
        assert!(FlashFinder::new(bad).is_err());
    }

    #[test]
    fn test_out_of_range_channel_skipped() {
        let finder = FlashFinder::new(config()).unwrap();
        let geometry = ChannelPositions::unplaced(4);
        let waveforms = vec![pulse_at(0, 0, 100), pulse_at(7, 0, 100)];
        let output = finder.run_flash_finder(&waveforms, &[], &geometry).unwrap();

        assert_eq!(output.hits.len(), 1);
        assert_eq!(output.statistics.waveforms_rejected, 1);
        assert_eq!(output.flashes.len(), 1);
    }

    #[test]
    fn test_malformed_waveform_does_not_abort_frame() {
        let finder = FlashFinder::new(config()).unwrap();
        let geometry = ChannelPositions::unplaced(4);
        let waveforms = vec![Waveform::new(1, 0, Vec::new()), pulse_at(2, 0, 60)];
        let output = finder.run_flash_finder(&waveforms, &[], &geometry).unwrap();

        assert_eq!(output.statistics.waveforms_processed, 2);
        assert_eq!(output.statistics.waveforms_rejected, 1);
        assert_eq!(output.flashes.len(), 1);
    }

    #[test]
    fn test_process_frame_ignores_foreign_frames() {
        let finder = FlashFinder::new(config()).unwrap();
        let builder = finder.flash_builder(&ChannelPositions::unplaced(4));
        let a = pulse_at(0, 0, 100);
        let b = pulse_at(1, 3, 100);
        let output = finder
            .process_frame(0, &[&a, &b], &TriggerTime::NONE, &builder)
            .unwrap();
        assert_eq!(output.hits.len(), 1);
        assert_eq!(output.statistics.waveforms_processed, 1);
    }

    #[test]
    fn test_consistency_violation_aborts() {
        let finder = FlashFinder::new(config()).unwrap();
        // A builder sized for fewer channels than the hits use.
        let builder = FlashBuilder::new(1, &ChannelPositions::unplaced(1));
        let wf = pulse_at(3, 0, 100);
        let result = finder.process_frame(0, &[&wf], &TriggerTime::NONE, &builder);
        assert!(matches!(result, Err(Error::Flash(_))));
    }

    #[test]
    fn test_trigger_shifts_times_and_flags_beam() {
        let finder = FlashFinder::new(config()).unwrap();
        let geometry = ChannelPositions::unplaced(4);
        let waveforms = vec![pulse_at(0, 0, 150), pulse_at(1, 0, 150)];
        let gates = [BeamGate::new(-50.0, 500.0), BeamGate::new(100.0, 100.0)];
        let output = finder.run_flash_finder(&waveforms, &gates, &geometry).unwrap();

        assert!(output.trigger.found);
        assert_eq!(output.flashes.len(), 1);
        let flash = &output.flashes[0];
        assert!((flash.time - 50.0).abs() < 1e-9);
        assert!((flash.abs_time - 150.0).abs() < 1e-9);
        assert!(flash.on_beam);
        assert!(flash.in_beam_frame);
    }

    #[test]
    fn test_append_frame_offsets_clusters() {
        let mut output = FlashFinderOutput::default();
        output.append_frame(FrameOutput {
            frame: 0,
            hits: vec![OpHit::new(0, 0, 1.0, 1.0); 3],
            flashes: vec![OpFlash::default()],
            clusters: vec![vec![0, 1, 2]],
            statistics: FlashFinderStatistics::default(),
        });
        output.append_frame(FrameOutput {
            frame: 1,
            hits: vec![OpHit::new(0, 1, 1.0, 1.0); 2],
            flashes: vec![OpFlash::default()],
            clusters: vec![vec![0, 1]],
            statistics: FlashFinderStatistics::default(),
        });
        assert_eq!(output.clusters, vec![vec![0, 1, 2], vec![3, 4]]);
    }
}
