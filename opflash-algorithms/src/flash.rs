//! Flash construction from hit clusters.
#![allow(clippy::cast_possible_truncation)]

use opflash_core::error::FlashError;
use opflash_core::flash::OpFlash;
use opflash_core::geometry::OpDetGeometry;
use opflash_core::hit::OpHit;
use opflash_core::trigger::TriggerTime;

/// Running PE-weighted first and second moments.
#[derive(Clone, Copy, Debug, Default)]
struct Moments {
    weight: f64,
    sum: f64,
    sum_sq: f64,
}

impl Moments {
    #[inline]
    fn add(&mut self, value: f64, weight: f64) {
        self.weight += weight;
        self.sum += weight * value;
        self.sum_sq += weight * value * value;
    }

    fn mean(&self) -> f64 {
        if self.weight > 0.0 {
            self.sum / self.weight
        } else {
            0.0
        }
    }

    fn spread(&self) -> f64 {
        if self.weight > 0.0 {
            let mean = self.mean();
            (self.sum_sq / self.weight - mean * mean).max(0.0).sqrt()
        } else {
            0.0
        }
    }
}

/// Turns refined hit clusters into [`OpFlash`]es.
///
/// Channel positions are looked up once, when the builder is created, and
/// reused for every flash of the run.
#[derive(Clone, Debug)]
pub struct FlashBuilder {
    n_channels: usize,
    positions: Vec<Option<[f64; 3]>>,
}

impl FlashBuilder {
    /// Create for `n_channels` channels, caching positions from `geometry`.
    pub fn new<G: OpDetGeometry + ?Sized>(n_channels: usize, geometry: &G) -> Self {
        if geometry.n_channels() != n_channels {
            log::warn!(
                "geometry describes {} channels, configuration expects {}",
                geometry.n_channels(),
                n_channels
            );
        }
        let positions = (0..n_channels)
            .map(|channel| geometry.channel_position(channel as u32))
            .collect();
        Self {
            n_channels,
            positions,
        }
    }

    /// Number of channels in every per-channel PE vector.
    pub fn n_channels(&self) -> usize {
        self.n_channels
    }

    /// Builds one flash per cluster, in cluster order.
    ///
    /// Any inconsistency (empty cluster, unknown hit, mixed frames, channel
    /// outside the detector, no light) aborts the whole call.
    pub fn construct_flashes(
        &self,
        hits: &[OpHit],
        clusters: &[Vec<usize>],
        trigger: &TriggerTime,
        trigger_frame: Option<u32>,
    ) -> Result<Vec<OpFlash>, FlashError> {
        clusters
            .iter()
            .enumerate()
            .map(|(index, cluster)| {
                self.construct_flash(index, hits, cluster, trigger, trigger_frame)
            })
            .collect()
    }

    fn construct_flash(
        &self,
        index: usize,
        hits: &[OpHit],
        cluster: &[usize],
        trigger: &TriggerTime,
        trigger_frame: Option<u32>,
    ) -> Result<OpFlash, FlashError> {
        let lookup = |i: usize| {
            hits.get(i).ok_or(FlashError::HitIndexOutOfRange {
                cluster: index,
                index: i,
                n_hits: hits.len(),
            })
        };

        let first = lookup(*cluster.first().ok_or(FlashError::EmptyCluster { cluster: index })?)?;
        let frame = first.frame;
        // Moments are taken relative to the first hit to keep precision on late frames.
        let (origin, abs_origin) = (first.peak_time, first.peak_time_abs);

        let mut pe_per_channel = vec![0.0; self.n_channels];
        let mut time = Moments::default();
        let mut abs_time = Moments::default();
        let (mut t_min, mut t_max) = (f64::INFINITY, f64::NEG_INFINITY);
        let (mut abs_min, mut abs_max) = (f64::INFINITY, f64::NEG_INFINITY);

        for &i in cluster {
            let hit = lookup(i)?;
            if hit.frame != frame {
                return Err(FlashError::MixedFrames {
                    cluster: index,
                    first: frame,
                    other: hit.frame,
                });
            }
            let slot = pe_per_channel.get_mut(hit.channel as usize).ok_or(
                FlashError::ChannelOutOfRange {
                    channel: hit.channel,
                    n_channels: self.n_channels,
                },
            )?;
            *slot += hit.pe;

            time.add(hit.peak_time - origin, hit.pe);
            abs_time.add(hit.peak_time_abs - abs_origin, hit.pe);
            t_min = t_min.min(hit.peak_time);
            t_max = t_max.max(hit.peak_time);
            abs_min = abs_min.min(hit.peak_time_abs);
            abs_max = abs_max.max(hit.peak_time_abs);
        }

        let total_pe: f64 = pe_per_channel.iter().sum();
        if !(total_pe > 0.0 && time.weight > 0.0) {
            return Err(FlashError::ZeroPhotoelectrons {
                cluster: index,
                total_pe,
            });
        }

        let mut position = [Moments::default(); 3];
        for (channel, &pe) in pe_per_channel.iter().enumerate() {
            if pe <= 0.0 {
                continue;
            }
            if let Some(Some(xyz)) = self.positions.get(channel) {
                for (axis, &coord) in position.iter_mut().zip(xyz) {
                    axis.add(coord, pe);
                }
            }
        }

        let flash_time = (origin + time.mean()).clamp(t_min, t_max);
        Ok(OpFlash {
            time: flash_time,
            time_width: time.spread(),
            abs_time: (abs_origin + abs_time.mean()).clamp(abs_min, abs_max),
            total_pe,
            pe_per_channel,
            center: position.map(|m| m.mean()),
            width: position.map(|m| m.spread()),
            frame,
            on_beam: trigger.is_on_beam(flash_time),
            in_beam_frame: trigger_frame == Some(frame),
            n_hits: cluster.len(),
        })
    }
}
