//! Optical detector geometry lookup.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Maps channel ids to physical positions.
///
/// Lookups are synchronous and read-only; callers may cache the results for
/// the lifetime of a run.
pub trait OpDetGeometry: Send + Sync {
    /// Number of optical channels in the detector.
    fn n_channels(&self) -> usize;

    /// Center of the optical detector read out by `channel`, if known.
    fn channel_position(&self, channel: u32) -> Option<[f64; 3]>;
}

/// Geometry backed by an in-memory position table indexed by channel id.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct ChannelPositions {
    positions: Vec<[f64; 3]>,
}

impl ChannelPositions {
    /// Creates a table where entry `i` is the position of channel `i`.
    pub fn new(positions: Vec<[f64; 3]>) -> Self {
        Self { positions }
    }

    /// Creates a table with every channel at the origin.
    pub fn unplaced(n_channels: usize) -> Self {
        Self {
            positions: vec![[0.0; 3]; n_channels],
        }
    }

    /// Returns the positions as a slice.
    pub fn as_slice(&self) -> &[[f64; 3]] {
        &self.positions
    }
}

impl OpDetGeometry for ChannelPositions {
    fn n_channels(&self) -> usize {
        self.positions.len()
    }

    fn channel_position(&self, channel: u32) -> Option<[f64; 3]> {
        self.positions.get(channel as usize).copied()
    }
}
