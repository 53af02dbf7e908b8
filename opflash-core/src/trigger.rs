//! Beam-gate records and trigger time lookup.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// An external beam-gate / trigger marker.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BeamGate {
    /// Gate opening time (ns, same clock as frame start times).
    pub start_ns: f64,
    /// Gate length (ns).
    pub width_ns: f64,
}

impl BeamGate {
    /// Creates a beam gate.
    pub fn new(start_ns: f64, width_ns: f64) -> Self {
        Self { start_ns, width_ns }
    }
}

/// Result of the trigger lookup.
///
/// When no marker qualifies, `found` is false and both times are zero, so hit
/// times stay absolute and no flash is flagged on-beam.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TriggerTime {
    /// A qualifying marker was found.
    pub found: bool,
    /// Trigger time subtracted from every hit time (ns).
    pub time_ns: f64,
    /// Length of the triggering gate (ns).
    pub gate_width_ns: f64,
}

impl TriggerTime {
    /// The no-trigger sentinel.
    pub const NONE: Self = Self {
        found: false,
        time_ns: 0.0,
        gate_width_ns: 0.0,
    };

    /// Returns true if a trigger-relative time lies inside the gate.
    #[inline]
    pub fn is_on_beam(&self, relative_time: f64) -> bool {
        self.found && (0.0..=self.gate_width_ns).contains(&relative_time)
    }

    /// Frame containing the trigger, given the frame length in ns.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn frame(&self, frame_length_ns: f64) -> Option<u32> {
        if !self.found || frame_length_ns <= 0.0 || self.time_ns < 0.0 {
            return None;
        }
        Some((self.time_ns / frame_length_ns).floor() as u32)
    }
}

/// Returns the earliest gate opening at or after `lower_bound_ns`.
///
/// Markers need not be sorted. Without a qualifying marker the
/// [`TriggerTime::NONE`] sentinel is returned; this is not an error.
pub fn get_trigger_time(gates: &[BeamGate], lower_bound_ns: f64) -> TriggerTime {
    gates
        .iter()
        .filter(|gate| gate.start_ns >= lower_bound_ns)
        .min_by(|a, b| a.start_ns.total_cmp(&b.start_ns))
        .map_or(TriggerTime::NONE, |gate| TriggerTime {
            found: true,
            time_ns: gate.start_ns,
            gate_width_ns: gate.width_ns,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_gates_gives_sentinel() {
        let trigger = get_trigger_time(&[], 0.0);
        assert_eq!(trigger, TriggerTime::NONE);
        assert!(!trigger.is_on_beam(0.0));
    }

    #[test]
    fn test_earliest_gate_at_or_after_bound() {
        let gates = [
            BeamGate::new(5000.0, 1600.0),
            BeamGate::new(-200.0, 1600.0),
            BeamGate::new(1200.0, 800.0),
        ];
        let trigger = get_trigger_time(&gates, 0.0);
        assert!(trigger.found);
        assert!((trigger.time_ns - 1200.0).abs() < f64::EPSILON);
        assert!((trigger.gate_width_ns - 800.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_gate_exactly_at_bound_qualifies() {
        let gates = [BeamGate::new(100.0, 10.0)];
        assert!(get_trigger_time(&gates, 100.0).found);
        assert!(!get_trigger_time(&gates, 100.5).found);
    }

    #[test]
    fn test_on_beam_window_is_closed() {
        let trigger = TriggerTime {
            found: true,
            time_ns: 1000.0,
            gate_width_ns: 1600.0,
        };
        assert!(trigger.is_on_beam(0.0));
        assert!(trigger.is_on_beam(1600.0));
        assert!(!trigger.is_on_beam(-0.5));
        assert!(!trigger.is_on_beam(1600.5));
    }

    #[test]
    fn test_trigger_frame() {
        let trigger = TriggerTime {
            found: true,
            time_ns: 2500.0,
            gate_width_ns: 10.0,
        };
        assert_eq!(trigger.frame(1000.0), Some(2));
        assert_eq!(TriggerTime::NONE.frame(1000.0), None);
    }
}
