//! Removal of delayed-scintillation duplicates.
//!
//! A flash B is treated as the late light of an earlier flash A when
//! - B comes strictly after A and within `window_ns` of it,
//! - B carries less than `pe_fraction` of A's photoelectrons, and
//! - at least `overlap_fraction` of B's lit channels are also lit in A.
//!
//! Flashes are visited in time order and only flashes that survive can act as
//! A, which makes the outcome independent of input order.
#![allow(clippy::cast_precision_loss)]

use opflash_core::clustering::LateLightConfig;
use opflash_core::error::FlashError;
use opflash_core::flash::OpFlash;

/// Late-light filter.
#[derive(Clone, Debug, Default)]
pub struct LateLightFilter {
    config: LateLightConfig,
}

impl LateLightFilter {
    /// Create with custom configuration.
    pub fn new(config: LateLightConfig) -> Self {
        Self { config }
    }

    /// Get current configuration.
    pub fn config(&self) -> &LateLightConfig {
        &self.config
    }

    /// Fraction of `later`'s lit channels that are also lit in `earlier`.
    pub fn channel_overlap(later: &OpFlash, earlier: &OpFlash) -> f64 {
        let mut lit = 0usize;
        let mut shared = 0usize;
        for channel in later.active_channels() {
            lit += 1;
            if earlier.pe_on(channel) > 0.0 {
                shared += 1;
            }
        }
        if lit == 0 {
            0.0
        } else {
            shared as f64 / lit as f64
        }
    }

    fn is_tail_of(&self, later: &OpFlash, earlier: &OpFlash) -> bool {
        let dt = later.time - earlier.time;
        dt > 0.0
            && dt <= self.config.window_ns
            && later.total_pe < self.config.pe_fraction * earlier.total_pe
            && Self::channel_overlap(later, earlier) >= self.config.overlap_fraction
    }

    /// Marks flashes recognised as late light. `mask[i]` is true to remove.
    pub fn find_late_light(&self, flashes: &[OpFlash]) -> Vec<bool> {
        let mut remove = vec![false; flashes.len()];
        if !self.config.enabled {
            return remove;
        }

        let mut order: Vec<usize> = (0..flashes.len()).collect();
        order.sort_by(|&a, &b| {
            flashes[a]
                .time
                .total_cmp(&flashes[b].time)
                .then(a.cmp(&b))
        });

        let mut kept: Vec<usize> = Vec::with_capacity(flashes.len());
        for &b in &order {
            let later = &flashes[b];
            let tail = kept
                .iter()
                .rev()
                .take_while(|&&a| later.time - flashes[a].time <= self.config.window_ns)
                .any(|&a| self.is_tail_of(later, &flashes[a]));
            if tail {
                remove[b] = true;
            } else {
                kept.push(b);
            }
        }
        remove
    }

    /// Drops late-light flashes together with their hit clusters.
    ///
    /// Returns the number of flashes removed.
    pub fn remove_late_light(
        &self,
        flashes: &mut Vec<OpFlash>,
        clusters: &mut Vec<Vec<usize>>,
    ) -> Result<usize, FlashError> {
        if flashes.len() != clusters.len() {
            return Err(FlashError::ClusterCountMismatch {
                flashes: flashes.len(),
                clusters: clusters.len(),
            });
        }

        let remove = self.find_late_light(flashes);
        let removed = remove.iter().filter(|&&r| r).count();
        if removed > 0 {
            let mut flags = remove.iter();
            flashes.retain(|_| !flags.next().copied().unwrap_or(false));
            let mut flags = remove.iter();
            clusters.retain(|_| !flags.next().copied().unwrap_or(false));
            log::debug!("removed {removed} late-light flash(es)");
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flash(time: f64, pe_per_channel: Vec<f64>) -> OpFlash {
        OpFlash {
            time,
            total_pe: pe_per_channel.iter().sum(),
            pe_per_channel,
            ..Default::default()
        }
    }

    fn filter() -> LateLightFilter {
        LateLightFilter::new(
            LateLightConfig::new()
                .with_window(1000.0)
                .with_pe_fraction(0.2)
                .with_overlap_fraction(0.5),
        )
    }

    #[test]
    fn test_tail_removed_with_its_cluster() {
        let mut flashes = vec![
            flash(0.0, vec![100.0, 100.0, 0.0]),
            flash(500.0, vec![10.0, 10.0, 0.0]),
        ];
        let mut clusters = vec![vec![0, 1], vec![2, 3]];

        let removed = filter()
            .remove_late_light(&mut flashes, &mut clusters)
            .unwrap();
        assert_eq!(removed, 1);
        assert_eq!(flashes.len(), 1);
        assert!((flashes[0].total_pe - 200.0).abs() < f64::EPSILON);
        assert_eq!(clusters, vec![vec![0, 1]]);
    }

    #[test]
    fn test_outside_window_kept() {
        let flashes = vec![
            flash(0.0, vec![100.0, 100.0]),
            flash(1000.5, vec![10.0, 10.0]),
        ];
        assert_eq!(filter().find_late_light(&flashes), vec![false, false]);
    }

    #[test]
    fn test_bright_follower_kept() {
        let flashes = vec![
            flash(0.0, vec![100.0, 100.0]),
            flash(200.0, vec![30.0, 20.0]),
        ];
        assert_eq!(filter().find_late_light(&flashes), vec![false, false]);
    }

    #[test]
    fn test_disjoint_channels_kept() {
        let flashes = vec![
            flash(0.0, vec![100.0, 100.0, 0.0, 0.0]),
            flash(200.0, vec![0.0, 1.0, 5.0, 5.0]),
        ];
        let overlap = LateLightFilter::channel_overlap(&flashes[1], &flashes[0]);
        assert!((overlap - 1.0 / 3.0).abs() < 1e-12);
        assert_eq!(filter().find_late_light(&flashes), vec![false, false]);
    }

    #[test]
    fn test_earlier_small_flash_never_removes_larger() {
        let flashes = vec![
            flash(300.0, vec![100.0, 100.0]),
            flash(0.0, vec![5.0, 5.0]),
        ];
        // The small flash comes first in time, so nothing qualifies as a tail.
        assert_eq!(filter().find_late_light(&flashes), vec![false, false]);
    }

    #[test]
    fn test_simultaneous_flashes_kept() {
        let flashes = vec![
            flash(100.0, vec![100.0, 100.0]),
            flash(100.0, vec![1.0, 1.0]),
        ];
        assert_eq!(filter().find_late_light(&flashes), vec![false, false]);
    }

    #[test]
    fn test_disabled_filter() {
        let flashes = vec![flash(0.0, vec![100.0]), flash(10.0, vec![1.0])];
        let filter = LateLightFilter::new(LateLightConfig::disabled());
        assert_eq!(filter.find_late_light(&flashes), vec![false, false]);
    }

    #[test]
    fn test_mismatched_clusters_rejected() {
        let mut flashes = vec![flash(0.0, vec![1.0])];
        let mut clusters = Vec::new();
        assert!(matches!(
            filter().remove_late_light(&mut flashes, &mut clusters),
            Err(FlashError::ClusterCountMismatch { .. })
        ));
    }

    #[test]
    fn test_largest_flash_of_each_pair_survives() {
        let flashes = vec![
            flash(0.0, vec![500.0, 500.0, 0.0]),
            flash(100.0, vec![40.0, 40.0, 0.0]),
            flash(250.0, vec![20.0, 0.0, 1.0]),
            flash(400.0, vec![1.0, 1.0, 0.0]),
        ];
        let remove = filter().find_late_light(&flashes);
        assert_eq!(remove, vec![false, true, true, true]);

        let brightest = flashes
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_pe.total_cmp(&b.1.total_pe))
            .map(|(i, _)| i)
            .unwrap();
        assert!(!remove[brightest]);
    }
}
