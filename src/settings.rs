//! Exposure ladders.
//!
//! Aperture and shutter speed are discrete on the device: each is a fixed,
//! ordered list of values the firmware accepts. A [`Ladder`] pairs such a
//! list with a current position; stepping saturates at the ends instead of
//! wrapping or erroring, so "one stop darker" at the boundary is a no-op.

/// gphoto2 capture-settings key for aperture.
pub const SETTING_APERTURE: &str = "f-number";
/// gphoto2 capture-settings key for shutter speed.
pub const SETTING_SHUTTER: &str = "shutterspeed";

/// Aperture values of the target body, ascending f-number (widest first).
pub const F_NUMBERS: &[&str] = &[
    "f/4.8", "f/5", "f/5.6", "f/6.3", "f/7.1", "f/8", "f/9", "f/10", "f/11", "f/13", "f/14",
    "f/16", "f/18", "f/20", "f/22", "f/25", "f/29", "f/32",
];

/// Shutter speeds, ascending duration (fastest first).
pub const SHUTTER_SPEEDS: &[&str] = &[
    "1/4000", "1/2000", "1/1000", "1/500", "1/250", "1/125", "1/60", "1/30", "1/15", "1/8",
    "1/4", "1/2", "1", "2", "4", "8", "15", "30",
];

/// A fixed ordered list of discrete setting values plus a current position.
///
/// The position is always a valid index; construction clamps and stepping
/// saturates.
#[derive(Debug, Clone)]
pub struct Ladder {
    values: Vec<String>,
    pos: usize,
}

impl Ladder {
    /// Build a ladder from its ordered values, positioned at `pos`
    /// (clamped into range). Empty ladders are not meaningful and panic
    /// in debug builds.
    pub fn new(values: &[&str], pos: usize) -> Self {
        debug_assert!(!values.is_empty());
        let values: Vec<String> = values.iter().map(|v| (*v).to_string()).collect();
        let pos = pos.min(values.len().saturating_sub(1));
        Self { values, pos }
    }

    /// Default aperture ladder, positioned at its widest stop.
    pub fn apertures() -> Self {
        Self::new(F_NUMBERS, 0)
    }

    /// Default shutter ladder, positioned at its fastest speed.
    pub fn shutter_speeds() -> Self {
        Self::new(SHUTTER_SPEEDS, 0)
    }

    /// Current value.
    pub fn current(&self) -> &str {
        &self.values[self.pos]
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Step toward the end of the ladder. Saturates; returns whether the
    /// position moved.
    pub fn up(&mut self) -> bool {
        if self.pos + 1 < self.values.len() {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    /// Step toward the start of the ladder. Saturates; returns whether the
    /// position moved.
    pub fn down(&mut self) -> bool {
        if self.pos > 0 {
            self.pos -= 1;
            true
        } else {
            false
        }
    }

    /// Move to the value if it is on the ladder; returns whether it was.
    pub fn seek(&mut self, value: &str) -> bool {
        match self.values.iter().position(|v| v == value) {
            Some(pos) => {
                self.pos = pos;
                true
            }
            None => false,
        }
    }

    /// Values in ladder order.
    pub fn values(&self) -> impl Iterator<Item = &str> {
        self.values.iter().map(String::as_str)
    }

    /// Values from the last rung down to the first. The bracket sweep
    /// iterates both ladders this way.
    pub fn values_rev(&self) -> impl Iterator<Item = &str> {
        self.values.iter().rev().map(String::as_str)
    }
}

/// Ladder-driven exposure mutators for a live session.
///
/// Tracks the position of both ladders and pushes each step to the camera
/// as a whole-block settings commit. Steps that would leave a ladder
/// saturate silently, mirroring the ladder semantics.
#[derive(Debug, Clone)]
pub struct ExposureControl {
    apertures: Ladder,
    shutter_speeds: Ladder,
}

impl Default for ExposureControl {
    fn default() -> Self {
        Self::new()
    }
}

impl ExposureControl {
    pub fn new() -> Self {
        Self {
            apertures: Ladder::apertures(),
            shutter_speeds: Ladder::shutter_speeds(),
        }
    }

    /// Align both ladders with the camera's current values. Values the
    /// ladder does not know keep the previous position.
    pub fn sync_from(&mut self, session: &mut crate::session::Session) -> crate::device::Result<()> {
        let aperture = session.aperture()?;
        if !self.apertures.seek(&aperture) {
            log::warn!("aperture {aperture} is not on the ladder");
        }
        let shutter = session.shutter_speed()?;
        if !self.shutter_speeds.seek(&shutter) {
            log::warn!("shutter speed {shutter} is not on the ladder");
        }
        Ok(())
    }

    pub fn aperture(&self) -> &str {
        self.apertures.current()
    }

    pub fn shutter_speed(&self) -> &str {
        self.shutter_speeds.current()
    }

    /// Step to a smaller aperture (larger f-number). Saturating.
    pub fn aperture_down(
        &mut self,
        session: &mut crate::session::Session,
    ) -> crate::device::Result<&str> {
        if self.apertures.up() {
            session.set_aperture(self.apertures.current())?;
        }
        Ok(self.apertures.current())
    }

    /// Step to a wider aperture (smaller f-number). Saturating.
    pub fn aperture_up(
        &mut self,
        session: &mut crate::session::Session,
    ) -> crate::device::Result<&str> {
        if self.apertures.down() {
            session.set_aperture(self.apertures.current())?;
        }
        Ok(self.apertures.current())
    }

    /// Step to a longer exposure. Saturating.
    pub fn shutter_speed_down(
        &mut self,
        session: &mut crate::session::Session,
    ) -> crate::device::Result<&str> {
        if self.shutter_speeds.up() {
            session.set_shutter_speed(self.shutter_speeds.current())?;
        }
        Ok(self.shutter_speeds.current())
    }

    /// Step to a shorter exposure. Saturating.
    pub fn shutter_speed_up(
        &mut self,
        session: &mut crate::session::Session,
    ) -> crate::device::Result<&str> {
        if self.shutter_speeds.down() {
            session.set_shutter_speed(self.shutter_speeds.current())?;
        }
        Ok(self.shutter_speeds.current())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Session;
    use crate::stub::ScriptedCamera;

    #[test]
    fn up_saturates_at_top() {
        let mut ladder = Ladder::new(&["1/125", "1/250"], 1);
        assert!(!ladder.up());
        assert_eq!(ladder.current(), "1/250");
        assert_eq!(ladder.position(), 1);
    }

    #[test]
    fn down_saturates_at_bottom() {
        let mut ladder = Ladder::new(&["1/125", "1/250"], 0);
        assert!(!ladder.down());
        assert_eq!(ladder.current(), "1/125");
    }

    #[test]
    fn construction_clamps_position() {
        let ladder = Ladder::new(&["f/8", "f/11"], 99);
        assert_eq!(ladder.current(), "f/11");
    }

    #[test]
    fn seek_finds_value_on_ladder() {
        let mut ladder = Ladder::apertures();
        assert!(ladder.seek("f/11"));
        assert_eq!(ladder.current(), "f/11");
        assert!(!ladder.seek("f/0.95"));
        assert_eq!(ladder.current(), "f/11");
    }

    #[test]
    fn step_then_step_back_round_trips() {
        let mut ladder = Ladder::shutter_speeds();
        let start = ladder.current().to_string();
        assert!(ladder.up());
        assert!(ladder.down());
        assert_eq!(ladder.current(), start);
    }

    #[test]
    fn exposure_control_steps_reach_the_camera() {
        let cam = ScriptedCamera::new();
        let mut session = Session::open(Box::new(cam)).unwrap();
        let mut control = ExposureControl::new();
        control.sync_from(&mut session).unwrap();

        assert_eq!(control.aperture(), "f/8");
        let next = control.aperture_down(&mut session).unwrap().to_string();
        assert_eq!(next, "f/9");
        assert_eq!(session.aperture().unwrap(), "f/9");
    }

    #[test]
    fn exposure_control_saturates_without_touching_the_camera() {
        let cam = ScriptedCamera::new();
        let probe = cam.probe();
        let mut session = Session::open(Box::new(cam)).unwrap();
        let mut control = ExposureControl::new();
        control.sync_from(&mut session).unwrap();
        let commits_after_sync = probe.committed_blocks();

        // Default shutter position is the fastest rung; stepping faster
        // saturates and commits nothing.
        assert_eq!(control.shutter_speed(), "1/125");
        for _ in 0..SHUTTER_SPEEDS.len() {
            control.shutter_speed_up(&mut session).unwrap();
        }
        assert_eq!(control.shutter_speed(), "1/4000");
        let extra = probe.committed_blocks() - commits_after_sync;
        // One commit per rung actually climbed, none for saturated steps.
        assert_eq!(extra as usize, SHUTTER_SPEEDS.iter().position(|s| *s == "1/125").unwrap());
    }
}
