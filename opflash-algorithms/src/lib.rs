//! opflash-algorithms: Optical hit and flash reconstruction.
//!
//! This crate provides the reconstruction chain, leaves first:
//! - **Pulse finding** - threshold and first-peak strategies
//! - **PulseRecoManager** - pedestal estimation and strategy dispatch
//! - **HitBuilder** - calibrated, timed hits from pulses
//! - **FlashClusterer** - fixed-window time clustering plus refinement
//! - **FlashBuilder** - PE totals, weighted time and position per cluster
//! - **LateLightFilter** - removal of delayed-scintillation duplicates
//! - **FlashFinder** - per-frame and per-readout orchestration
//!
#![warn(missing_docs)]

mod clustering;
mod flash;
mod hits;
mod late_light;
mod manager;
mod processing;
pub mod pulse_reco;

pub use clustering::{ClusteringStatistics, FlashClusterer};
pub use flash::FlashBuilder;
pub use hits::HitBuilder;
pub use late_light::LateLightFilter;
pub use manager::PulseRecoManager;
pub use processing::{FlashFinder, FlashFinderOutput, FlashFinderStatistics, FrameOutput};
pub use pulse_reco::{AlgoFirstPeak, AlgoThreshold, PulseRecoAlgorithm};

// Re-export core configuration types
pub use opflash_core::clustering::{ClusteringConfig, LateLightConfig};
pub use opflash_core::config::FlashFinderConfig;
