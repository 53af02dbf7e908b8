//! Error types for opflash-core.

use thiserror::Error;

/// Result type alias for opflash operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for opflash operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration rejected before processing.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Malformed waveform input.
    #[error("pulse error: {0}")]
    Pulse(#[from] PulseError),

    /// Internal invariant failure while forming flashes.
    #[error("flash error: {0}")]
    Flash(#[from] FlashError),
}

/// Configuration errors. Fatal at startup.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// A parameter that must be strictly positive was not.
    #[error("{name} must be positive (got {value})")]
    NonPositive { name: &'static str, value: f64 },

    /// A parameter fell outside its allowed range.
    #[error("{name} = {value} is outside [{min}, {max}]")]
    OutOfRange {
        name: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    /// Any other inconsistency between parameters.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Malformed waveform input. Recovered by producing zero pulses.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PulseError {
    /// Waveform has no samples.
    #[error("channel {channel}: empty waveform")]
    EmptyWaveform { channel: u32 },

    /// Waveform is shorter than the configured minimum.
    #[error("channel {channel}: waveform of {len} samples is shorter than {min}")]
    TooShort { channel: u32, len: usize, min: usize },
}

/// Consistency violations while converting clusters to flashes.
///
/// These indicate a clustering bug rather than bad input and abort the frame.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FlashError {
    /// A cluster accumulated no photoelectrons.
    #[error("cluster {cluster} accumulated {total_pe} PE")]
    ZeroPhotoelectrons { cluster: usize, total_pe: f64 },

    /// A cluster contains hits from more than one frame.
    #[error("cluster {cluster} spans frames {first} and {other}")]
    MixedFrames { cluster: usize, first: u32, other: u32 },

    /// A hit channel does not fit in the per-channel PE vector.
    #[error("channel {channel} is outside the detector's {n_channels} channels")]
    ChannelOutOfRange { channel: u32, n_channels: usize },

    /// A cluster contains no hits.
    #[error("cluster {cluster} is empty")]
    EmptyCluster { cluster: usize },

    /// A cluster refers to a hit that does not exist.
    #[error("cluster {cluster} refers to hit {index} but only {n_hits} hits exist")]
    HitIndexOutOfRange {
        cluster: usize,
        index: usize,
        n_hits: usize,
    },

    /// Flash and cluster collections fell out of step.
    #[error("{flashes} flashes but {clusters} hit clusters")]
    ClusterCountMismatch { flashes: usize, clusters: usize },
}
