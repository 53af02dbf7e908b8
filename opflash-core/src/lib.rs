//! opflash-core: Core types for optical detector flash reconstruction.
//!
//! This crate provides the data model shared by the reconstruction stages
//! (waveforms, pulses, hits and flashes), their configuration, the geometry
//! lookup seam and the beam-gate trigger lookup.
//!

pub mod clustering;
pub mod config;
pub mod error;
pub mod flash;
pub mod geometry;
pub mod hit;
pub mod trigger;
pub mod waveform;

pub use clustering::{ClusteringConfig, LateLightConfig};
pub use config::{
    Calibration, FlashFinderConfig, PedestalMode, PulseAlgorithm, PulseRecoConfig,
    TimeCalibration,
};
pub use error::{ConfigError, Error, FlashError, PulseError, Result};
pub use flash::OpFlash;
pub use geometry::{ChannelPositions, OpDetGeometry};
pub use hit::{Hit, OpHit};
pub use trigger::{get_trigger_time, BeamGate, TriggerTime};
pub use waveform::{Pedestal, Pulse, Sample, Waveform};
