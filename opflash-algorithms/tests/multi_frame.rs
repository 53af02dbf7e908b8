//! Readouts that span several frames.
use approx::assert_relative_eq;
use opflash_algorithms::{FlashFinder, FlashFinderConfig};
use opflash_core::clustering::{ClusteringConfig, LateLightConfig};
use opflash_core::config::{Calibration, PulseRecoConfig, TimeCalibration};
use opflash_core::geometry::ChannelPositions;
use opflash_core::trigger::BeamGate;
use opflash_core::waveform::Waveform;

const FRAME_SAMPLES: u32 = 1000;

fn waveform(channel: u32, frame: u32, peak: usize) -> Waveform {
    let mut samples = vec![10i16; 200];
    for (k, v) in [20i16, 40, 80, 40, 20].iter().enumerate() {
        samples[peak - 2 + k] += v;
    }
    Waveform::new(channel, frame, samples)
}

fn finder() -> FlashFinder {
    FlashFinder::new(
        FlashFinderConfig::new(4)
            .with_pulse(PulseRecoConfig::new().with_adc_threshold(5.0).with_nsigma(3.0))
            .with_calibration(Calibration::new().with_spe(4.0, 1.0))
            .with_timing(
                TimeCalibration::new()
                    .with_sample_period(1.0)
                    .with_frame_samples(FRAME_SAMPLES),
            )
            .with_clustering(
                ClusteringConfig::new()
                    .with_flash_width(50.0)
                    .with_refine_width(50.0)
                    .with_min_pe(1.0),
            )
            .with_late_light(LateLightConfig::disabled()),
    )
    .unwrap()
}

fn geometry() -> ChannelPositions {
    ChannelPositions::unplaced(4)
}

#[test]
fn test_cluster_indices_are_absolute_across_frames() {
    // Frames arrive out of order; frame 1 has a single channel.
    let waveforms = vec![
        waveform(0, 2, 60),
        waveform(1, 2, 60),
        waveform(2, 2, 60),
        waveform(0, 0, 50),
        waveform(1, 0, 50),
        waveform(3, 1, 150),
    ];

    let output = finder().run_flash_finder(&waveforms, &[], &geometry()).unwrap();

    assert_eq!(output.statistics.frames, 3);
    assert_eq!(output.hits.len(), 6);
    assert_eq!(output.flashes.len(), 3);

    let frames: Vec<u32> = output.flashes.iter().map(|f| f.frame).collect();
    assert_eq!(frames, vec![0, 1, 2]);

    for (flash, cluster) in output.flashes.iter().zip(&output.clusters) {
        for &i in cluster {
            let hit = &output.hits[i];
            assert_eq!(hit.frame, flash.frame);
        }
    }
    assert_eq!(output.clusters[0], vec![0, 1]);
    assert_eq!(output.clusters[1], vec![2]);
    assert_eq!(output.clusters[2], vec![3, 4, 5]);

    assert_relative_eq!(output.flashes[0].time, 50.0);
    assert_relative_eq!(output.flashes[1].time, 1150.0);
    assert_relative_eq!(output.flashes[2].time, 2060.0);
    assert_relative_eq!(output.flashes[2].total_pe, 150.0);
}

#[test]
fn test_trigger_shifts_times_and_marks_beam_frame() {
    let waveforms = vec![waveform(0, 0, 100), waveform(1, 1, 100)];
    let gates = [
        BeamGate::new(1000.0, 200.0),
        BeamGate::new(5000.0, 200.0),
    ];

    let output = finder()
        .run_flash_finder(&waveforms, &gates, &geometry())
        .unwrap();

    assert!(output.trigger.found);
    assert_relative_eq!(output.trigger.time_ns, 1000.0);
    assert_eq!(output.flashes.len(), 2);

    let early = &output.flashes[0];
    assert_relative_eq!(early.time, -900.0);
    assert_relative_eq!(early.abs_time, 100.0);
    assert!(!early.on_beam);
    assert!(!early.in_beam_frame);

    let beam = &output.flashes[1];
    assert_relative_eq!(beam.time, 100.0);
    assert_relative_eq!(beam.abs_time, 1100.0);
    assert!(beam.on_beam);
    assert!(beam.in_beam_frame);
}

#[test]
fn test_empty_readout() {
    let output = finder().run_flash_finder(&[], &[], &geometry()).unwrap();
    assert!(output.hits.is_empty());
    assert!(output.flashes.is_empty());
    assert!(!output.trigger.found);
}

#[test]
fn test_malformed_waveforms_are_skipped() {
    let waveforms = vec![
        Waveform::new(0, 0, Vec::new()),
        Waveform::new(1, 0, vec![10; 3]),
        Waveform::new(7, 0, vec![10; 200]),
        waveform(2, 0, 100),
    ];
    let output = finder().run_flash_finder(&waveforms, &[], &geometry()).unwrap();
    assert_eq!(output.statistics.waveforms_rejected, 3);
    assert_eq!(output.hits.len(), 1);
    assert_eq!(output.flashes.len(), 1);
}
