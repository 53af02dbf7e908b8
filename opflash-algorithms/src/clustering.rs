//! Temporal clustering of hits into flash candidates.
//!
//! Key characteristics:
//! - One global sort by time, then a single sweep
//! - Fixed window measured from the first hit of each cluster, closed at the edge
//! - Refinement splits clusters at internal gaps and drops clusters that are
//!   too small to be a flash; dropped hits are not reassigned

use opflash_core::clustering::ClusteringConfig;
use opflash_core::hit::Hit;
use std::cmp::Ordering;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Counters reported by the clusterer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ClusteringStatistics {
    /// Hits seen by the sweep.
    pub hits_processed: usize,
    /// Clusters closed by the sweep.
    pub clusters_formed: usize,
    /// Sweep clusters cut in pieces by refinement.
    pub clusters_split: usize,
    /// Clusters (or pieces) below the flash criteria.
    pub clusters_rejected: usize,
}

impl ClusteringStatistics {
    /// Adds another set of counters to this one.
    pub fn merge(&mut self, other: &Self) {
        self.hits_processed += other.hits_processed;
        self.clusters_formed += other.clusters_formed;
        self.clusters_split += other.clusters_split;
        self.clusters_rejected += other.clusters_rejected;
    }
}

/// Orders hits by time, breaking ties by channel, frame and PE.
fn time_order<H: Hit>(a: &H, b: &H) -> Ordering {
    a.time()
        .total_cmp(&b.time())
        .then_with(|| a.channel().cmp(&b.channel()))
        .then_with(|| a.frame().cmp(&b.frame()))
        .then_with(|| a.pe().total_cmp(&b.pe()))
}

/// Groups hits from one frame into time-coincident clusters.
#[derive(Clone, Debug, Default)]
pub struct FlashClusterer {
    config: ClusteringConfig,
}

impl FlashClusterer {
    /// Create with custom configuration.
    pub fn new(config: ClusteringConfig) -> Self {
        Self { config }
    }

    /// Get current configuration.
    pub fn config(&self) -> &ClusteringConfig {
        &self.config
    }

    /// First pass: sweep the time-sorted hits with a fixed window.
    ///
    /// A cluster opens at the earliest unassigned hit and takes every later hit
    /// whose time is within `flash_width_ns` of that opening hit (inclusive).
    /// The first hit outside the window opens the next cluster. Returned
    /// clusters hold indices into `hits`, each sorted by time.
    pub fn assign_hits_to_flash<H: Hit>(
        &self,
        hits: &[H],
        stats: &mut ClusteringStatistics,
    ) -> Vec<Vec<usize>> {
        let mut order: Vec<usize> = (0..hits.len()).collect();
        order.sort_by(|&a, &b| time_order(&hits[a], &hits[b]).then(a.cmp(&b)));

        let mut clusters = Vec::new();
        let mut current: Vec<usize> = Vec::new();
        let mut origin = 0.0;

        for idx in order {
            let time = hits[idx].time();
            if !current.is_empty() && time - origin <= self.config.flash_width_ns {
                current.push(idx);
                continue;
            }
            if !current.is_empty() {
                clusters.push(std::mem::take(&mut current));
            }
            origin = time;
            current.push(idx);
        }
        if !current.is_empty() {
            clusters.push(current);
        }

        stats.hits_processed += hits.len();
        stats.clusters_formed += clusters.len();
        clusters
    }

    /// Second pass: split at gaps wider than `refine_width_ns`, then drop
    /// pieces below the hit-count, channel-count or PE minimums.
    pub fn refine_hits_to_flash<H: Hit>(
        &self,
        hits: &[H],
        clusters: &[Vec<usize>],
        stats: &mut ClusteringStatistics,
    ) -> Vec<Vec<usize>> {
        let mut refined = Vec::with_capacity(clusters.len());

        for cluster in clusters {
            let mut sorted = cluster.clone();
            sorted.sort_by(|&a, &b| time_order(&hits[a], &hits[b]).then(a.cmp(&b)));

            let mut pieces = 0;
            let mut piece_start = 0;
            for k in 1..=sorted.len() {
                let at_gap = k == sorted.len()
                    || hits[sorted[k]].time() - hits[sorted[k - 1]].time()
                        > self.config.refine_width_ns;
                if !at_gap {
                    continue;
                }
                pieces += 1;
                let piece = &sorted[piece_start..k];
                piece_start = k;
                if self.passes(hits, piece) {
                    refined.push(piece.to_vec());
                } else {
                    stats.clusters_rejected += 1;
                }
            }
            if pieces > 1 {
                stats.clusters_split += 1;
            }
        }

        refined
    }

    /// Runs both passes.
    pub fn cluster<H: Hit>(&self, hits: &[H]) -> (Vec<Vec<usize>>, ClusteringStatistics) {
        let mut stats = ClusteringStatistics::default();
        let coarse = self.assign_hits_to_flash(hits, &mut stats);
        let refined = self.refine_hits_to_flash(hits, &coarse, &mut stats);
        (refined, stats)
    }

    fn passes<H: Hit>(&self, hits: &[H], piece: &[usize]) -> bool {
        if piece.is_empty() || piece.len() < self.config.min_hits {
            return false;
        }
        let mut channels: Vec<u32> = piece.iter().map(|&i| hits[i].channel()).collect();
        channels.sort_unstable();
        channels.dedup();
        if channels.len() < self.config.min_channels {
            return false;
        }
        let pe: f64 = piece.iter().map(|&i| hits[i].pe()).sum();
        pe >= self.config.min_pe
    }
}
