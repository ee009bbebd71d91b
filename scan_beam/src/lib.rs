//! # scan_beam
//!
//! Fixed-step integrator for the palm-scan beam.
//!
//! The beam lives in `[0, H - B]` where `H` is the live panel height and `B`
//! the beam thickness.  `H - B` is the rewound (idle) end, `0` is the fully
//! scanned end.  Each tick the beam either walks toward `0` (contact held) or
//! snaps back toward `H - B` (contact lost), and reports a [`Crossing`] when it
//! lands on a bound.
//!
//! ```rust
//! use scan_beam::{BeamSimulator, BeamParams, Crossing};
//!
//! let mut beam = BeamSimulator::new(BeamParams::default(), 300.0);
//! let mut ticks = 0;
//! loop {
//!     ticks += 1;
//!     if let Some(c) = beam.tick(true, 300.0).crossing {
//!         assert_eq!(c, Crossing::Success);
//!         break;
//!     }
//! }
//! assert_eq!(ticks, 64);
//! ```

use serde::{Deserialize, Serialize};

// ════════════════════════════════════════════════════════════════════════════
// Constants
// ════════════════════════════════════════════════════════════════════════════

/// Beam thickness in panel units.
pub const BEAM_HEIGHT: f64 = 14.0;

/// Distance moved toward the success bound per tick while contact is held.
pub const SCAN_SPEED: f64 = 4.5;

/// Distance moved toward the idle bound per tick while contact is lost.
/// Strictly faster than [`SCAN_SPEED`].
pub const REWIND_SPEED: f64 = 15.0;

/// Simulation period in milliseconds (~60 Hz).
pub const TICK_MS: u64 = 16;

// ════════════════════════════════════════════════════════════════════════════
// BeamParams
// ════════════════════════════════════════════════════════════════════════════

/// Speeds and thickness of the beam.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BeamParams {
    pub scan_speed:   f64,
    pub rewind_speed: f64,
    pub beam_height:  f64,
}

impl Default for BeamParams {
    fn default() -> Self {
        BeamParams {
            scan_speed:   SCAN_SPEED,
            rewind_speed: REWIND_SPEED,
            beam_height:  BEAM_HEIGHT,
        }
    }
}

impl BeamParams {
    /// Travel span `H - B` for a given panel height.  Never negative.
    pub fn span(&self, panel_height: f64) -> f64 {
        (panel_height - self.beam_height).max(0.0)
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Crossing / BeamTick
// ════════════════════════════════════════════════════════════════════════════

/// The beam reached one of its bounds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Crossing {
    /// Position hit `0` while contact was held.
    Success,
    /// Position hit `H - B` while contact was lost.
    Fail,
}

/// Outcome of a single integration step.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BeamTick {
    pub position: f64,
    pub crossing: Option<Crossing>,
}

// ════════════════════════════════════════════════════════════════════════════
// BeamSimulator
// ════════════════════════════════════════════════════════════════════════════

/// The beam of one scan session.
#[derive(Clone, Debug)]
pub struct BeamSimulator {
    params:   BeamParams,
    position: f64,
    ticks:    u64,
}

impl BeamSimulator {
    /// A beam parked at the rewound end of a panel of `panel_height`.
    pub fn new(params: BeamParams, panel_height: f64) -> Self {
        BeamSimulator {
            params,
            position: params.span(panel_height),
            ticks:    0,
        }
    }

    /// A beam starting at an arbitrary position (clamped to `>= 0`).
    pub fn at(params: BeamParams, position: f64) -> Self {
        BeamSimulator { params, position: position.max(0.0), ticks: 0 }
    }

    pub fn position(&self) -> f64        { self.position }
    pub fn ticks(&self)    -> u64        { self.ticks }

    /// Advance one step.
    ///
    /// `panel_height` is read fresh every call so the panel may be resized
    /// mid-session.  The returned position is always within
    /// `[0, panel_height - beam_height]`.
    pub fn tick(&mut self, contact: bool, panel_height: f64) -> BeamTick {
        self.ticks += 1;
        let span = self.params.span(panel_height);

        let crossing = if contact {
            self.position = (self.position - self.params.scan_speed).min(span);
            if self.position <= 0.0 {
                self.position = 0.0;
                Some(Crossing::Success)
            } else {
                None
            }
        } else {
            self.position += self.params.rewind_speed;
            if self.position >= span {
                self.position = span;
                Some(Crossing::Fail)
            } else {
                None
            }
        };

        BeamTick { position: self.position, crossing }
    }
}

/// Number of ticks needed to cover `distance` at `speed` per tick.
pub fn ticks_to_cross(distance: f64, speed: f64) -> u64 {
    if speed <= 0.0 { return u64::MAX; }
    (distance.max(0.0) / speed).ceil() as u64
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    /// Tick until a crossing fires; returns the tick count and the crossing.
    fn run_until_crossing(beam: &mut BeamSimulator, contact: bool, h: f64) -> (u64, Crossing) {
        for n in 1..10_000u64 {
            if let Some(c) = beam.tick(contact, h).crossing {
                return (n, c);
            }
        }
        panic!("beam never crossed");
    }

    #[test]
    fn new_beam_starts_rewound() {
        let beam = BeamSimulator::new(BeamParams::default(), 300.0);
        assert_eq!(beam.position(), 286.0);
    }

    #[test]
    fn held_contact_succeeds_after_ceil_ticks() {
        for h in [100.0, 240.0, 300.0, 480.5] {
            let p = BeamParams::default();
            let mut beam = BeamSimulator::new(p, h);
            let (n, c) = run_until_crossing(&mut beam, true, h);
            assert_eq!(c, Crossing::Success);
            assert_eq!(n, ticks_to_cross(p.span(h), SCAN_SPEED), "height {}", h);
            assert_eq!(beam.position(), 0.0);
        }
    }

    #[test]
    fn lost_contact_fails_after_ceil_ticks_from_scanned_end() {
        for h in [100.0, 300.0, 512.0] {
            let p = BeamParams::default();
            let mut beam = BeamSimulator::at(p, 0.0);
            let (n, c) = run_until_crossing(&mut beam, false, h);
            assert_eq!(c, Crossing::Fail);
            assert_eq!(n, ticks_to_cross(p.span(h), REWIND_SPEED), "height {}", h);
            assert_eq!(beam.position(), p.span(h));
        }
    }

    #[test]
    fn lost_contact_at_rewound_end_fails_on_first_tick() {
        let mut beam = BeamSimulator::new(BeamParams::default(), 300.0);
        let t = beam.tick(false, 300.0);
        assert_eq!(t.crossing, Some(Crossing::Fail));
        assert_eq!(t.position, 286.0);
    }

    #[test]
    fn no_crossing_strictly_between_bounds() {
        let mut beam = BeamSimulator::new(BeamParams::default(), 300.0);
        for _ in 0..10 {
            let t = beam.tick(true, 300.0);
            assert!(t.position > 0.0 && t.position < 286.0);
            assert_eq!(t.crossing, None);
        }
        // Brief release rewinds without reaching the idle end.
        let t = beam.tick(false, 300.0);
        assert_eq!(t.position, 286.0 - 45.0 + 15.0);
        assert_eq!(t.crossing, None);
    }

    #[test]
    fn rewind_is_faster_than_scan() {
        let p = BeamParams::default();
        assert!(p.rewind_speed > p.scan_speed);
    }

    #[test]
    fn shrinking_panel_clamps_position() {
        let mut beam = BeamSimulator::new(BeamParams::default(), 300.0);
        let t = beam.tick(true, 100.0);
        assert_eq!(t.position, 86.0);
        assert_eq!(t.crossing, None);
    }

    #[test]
    fn panel_shorter_than_beam_has_zero_span() {
        let p = BeamParams::default();
        assert_eq!(p.span(10.0), 0.0);
        let mut beam = BeamSimulator::new(p, 10.0);
        assert_eq!(beam.tick(true, 10.0).crossing, Some(Crossing::Success));
    }

    #[test]
    fn ticks_to_cross_rounds_up() {
        assert_eq!(ticks_to_cross(286.0, 4.5), 64);
        assert_eq!(ticks_to_cross(286.0, 15.0), 20);
        assert_eq!(ticks_to_cross(9.0, 4.5), 2);
    }

    proptest! {
        #[test]
        fn position_stays_within_bounds(
            start_h in 20.0f64..800.0,
            steps in proptest::collection::vec((any::<bool>(), 0.0f64..800.0), 1..400),
        ) {
            let p = BeamParams::default();
            let mut beam = BeamSimulator::new(p, start_h);
            for (contact, h) in steps {
                let t = beam.tick(contact, h);
                prop_assert!(t.position >= 0.0);
                prop_assert!(t.position <= p.span(h));
            }
        }

        #[test]
        fn held_contact_fires_exactly_one_success(h in (20u32..800).prop_map(f64::from)) {
            let p = BeamParams::default();
            let mut beam = BeamSimulator::new(p, h);
            let expected = ticks_to_cross(p.span(h), p.scan_speed);
            let mut fired = Vec::new();
            for n in 1..=expected {
                if let Some(c) = beam.tick(true, h).crossing {
                    fired.push((n, c));
                }
            }
            prop_assert_eq!(fired, vec![(expected, Crossing::Success)]);
        }
    }
}
