//! Exposure bracket sweep.
//!
//! Walks the full (aperture, shutter speed) grid on a live session: outer
//! loop over apertures from the largest f-number down, inner loop over
//! shutter speeds from the last ladder rung down, one capture per pair.
//! The fixed order makes brackets comparable across runs, and the file
//! name records the shot counter plus both setting values.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::session::Session;
use crate::settings::Ladder;

/// One planned capture of a sweep.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BracketShot {
    pub counter: u32,
    pub aperture: String,
    pub shutter_speed: String,
}

impl BracketShot {
    /// Deterministic file name, e.g. `bracket0001_f-11_1-250.jpg`.
    /// Slashes in setting values are not path-safe and become dashes.
    pub fn file_name(&self) -> String {
        format!(
            "bracket{:04}_{}_{}.jpg",
            self.counter,
            sanitize(&self.aperture),
            sanitize(&self.shutter_speed)
        )
    }
}

fn sanitize(value: &str) -> String {
    value.replace('/', "-")
}

/// A full or fixed-aperture bracket over two exposure ladders.
#[derive(Debug, Clone)]
pub struct BracketSweep {
    apertures: Ladder,
    shutter_speeds: Ladder,
    fixed_aperture: Option<String>,
}

impl BracketSweep {
    pub fn new(apertures: Ladder, shutter_speeds: Ladder) -> Self {
        Self {
            apertures,
            shutter_speeds,
            fixed_aperture: None,
        }
    }

    /// Default body ladders.
    pub fn full() -> Self {
        Self::new(Ladder::apertures(), Ladder::shutter_speeds())
    }

    /// Pin the aperture; only the shutter sweep runs.
    #[must_use]
    pub fn at_aperture(mut self, aperture: &str) -> Self {
        self.fixed_aperture = Some(aperture.to_string());
        self
    }

    /// The capture plan in execution order.
    pub fn plan(&self) -> Vec<BracketShot> {
        let apertures: Vec<&str> = match &self.fixed_aperture {
            Some(fixed) => vec![fixed.as_str()],
            None => self.apertures.values_rev().collect(),
        };
        let mut shots = Vec::new();
        let mut counter = 1;
        for aperture in apertures {
            for shutter_speed in self.shutter_speeds.values_rev() {
                shots.push(BracketShot {
                    counter,
                    aperture: aperture.to_string(),
                    shutter_speed: shutter_speed.to_string(),
                });
                counter += 1;
            }
        }
        shots
    }

    /// Execute the sweep: set both settings, capture, name the file from
    /// the plan. Returns the capture paths in shot order.
    pub fn run(&self, session: &mut Session, out_dir: &Path) -> Result<Vec<PathBuf>> {
        std::fs::create_dir_all(out_dir)
            .with_context(|| format!("failed to create bracket directory {}", out_dir.display()))?;
        let plan = self.plan();
        log::info!("bracket sweep: {} shots", plan.len());
        let mut captured = Vec::with_capacity(plan.len());
        for shot in &plan {
            session
                .set_aperture(&shot.aperture)
                .with_context(|| format!("bracket shot {}: aperture", shot.counter))?;
            session
                .set_shutter_speed(&shot.shutter_speed)
                .with_context(|| format!("bracket shot {}: shutter speed", shot.counter))?;
            let dest = out_dir.join(shot.file_name());
            session
                .capture(&dest)
                .with_context(|| format!("bracket shot {}: capture", shot.counter))?;
            log::info!(
                "bracket shot {}: {} {} -> {}",
                shot.counter,
                shot.aperture,
                shot.shutter_speed,
                dest.display()
            );
            captured.push(dest);
        }
        Ok(captured)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_plan_walks_both_ladders_in_reverse() {
        let sweep = BracketSweep::new(
            Ladder::new(&["f/8", "f/11"], 0),
            Ladder::new(&["1/125", "1/250"], 0),
        );
        let pairs: Vec<(String, String)> = sweep
            .plan()
            .into_iter()
            .map(|shot| (shot.aperture, shot.shutter_speed))
            .collect();
        assert_eq!(
            pairs,
            vec![
                ("f/11".to_string(), "1/250".to_string()),
                ("f/11".to_string(), "1/125".to_string()),
                ("f/8".to_string(), "1/250".to_string()),
                ("f/8".to_string(), "1/125".to_string()),
            ]
        );
    }

    #[test]
    fn fixed_aperture_runs_only_the_shutter_sweep() {
        let sweep = BracketSweep::new(
            Ladder::new(&["f/8", "f/11"], 0),
            Ladder::new(&["1/125", "1/250"], 0),
        )
        .at_aperture("f/8");
        let plan = sweep.plan();
        assert_eq!(plan.len(), 2);
        assert!(plan.iter().all(|shot| shot.aperture == "f/8"));
        assert_eq!(plan[0].shutter_speed, "1/250");
        assert_eq!(plan[1].shutter_speed, "1/125");
    }

    #[test]
    fn file_names_carry_counter_and_sanitized_values() {
        let shot = BracketShot {
            counter: 3,
            aperture: "f/11".to_string(),
            shutter_speed: "1/250".to_string(),
        };
        assert_eq!(shot.file_name(), "bracket0003_f-11_1-250.jpg");
    }
}
