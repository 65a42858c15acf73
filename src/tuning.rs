//! Data-driven physics balance
//!
//! Every physical constant the engine consumes lives here, so levels or a
//! debug overlay can reload balance from JSON without touching code. The
//! engine receives its tuning at construction; nothing reads these values
//! through globals.

use serde::{Deserialize, Serialize};

use crate::consts;

/// Tuned constants for gravity, friction and the fixed-step clock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicsTuning {
    /// Gravity acceleration, pixels/second².
    pub gravity: f32,
    /// Terminal fall speed, pixels/second.
    pub terminal_velocity: f32,
    /// Default horizontal friction coefficient; entities may override.
    pub friction: f32,
    /// Speeds below this snap to zero.
    pub min_velocity_threshold: f32,
    /// Restitution for the elastic collision response.
    pub restitution: f32,
    /// Fixed simulation step, seconds.
    pub fixed_dt: f32,
    /// Hard cap on fixed steps per host callback.
    pub max_steps_per_tick: u32,
}

impl Default for PhysicsTuning {
    fn default() -> Self {
        Self {
            gravity: consts::GRAVITY,
            terminal_velocity: consts::TERMINAL_VELOCITY,
            friction: consts::FRICTION,
            min_velocity_threshold: consts::MIN_VELOCITY_THRESHOLD,
            restitution: consts::BOUNCE_DAMPING,
            fixed_dt: consts::SIM_DT,
            max_steps_per_tick: consts::MAX_STEPS_PER_TICK,
        }
    }
}

impl PhysicsTuning {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Rescale to a different coordinate space. Gravity and terminal
    /// velocity scale together, keeping their ratio and therefore the
    /// shape of every jump arc.
    pub fn rescaled(&self, factor: f32) -> Self {
        Self {
            gravity: self.gravity * factor,
            terminal_velocity: self.terminal_velocity * factor,
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_consts() {
        let t = PhysicsTuning::default();
        assert_eq!(t.gravity, 980.0);
        assert_eq!(t.terminal_velocity, 600.0);
        assert_eq!(t.friction, 0.8);
        assert_eq!(t.max_steps_per_tick, 5);
    }

    #[test]
    fn test_json_round_trip() {
        let t = PhysicsTuning {
            gravity: 1200.0,
            ..Default::default()
        };
        let json = t.to_json().unwrap();
        let back = PhysicsTuning::from_json(&json).unwrap();
        assert_eq!(t, back);
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let t = PhysicsTuning::from_json(r#"{"friction": 0.5}"#).unwrap();
        assert_eq!(t.friction, 0.5);
        assert_eq!(t.gravity, 980.0);
    }

    #[test]
    fn test_rescale_preserves_gravity_ratio() {
        let t = PhysicsTuning::default();
        let scaled = t.rescaled(2.5);
        assert_eq!(
            scaled.gravity / scaled.terminal_velocity,
            t.gravity / t.terminal_velocity
        );
        assert_eq!(scaled.fixed_dt, t.fixed_dt);
    }

    #[test]
    fn test_malformed_json_is_an_error() {
        assert!(PhysicsTuning::from_json("{not json").is_err());
    }
}
