//! Player Intents
//!
//! The write-only surface a UI uses to drive a peer. Raw values coming out
//! of a pointer or gamepad are normalised here before they reach the state
//! machine: aim angles are clamped to the legal arc, power to `0.0..=1.0`,
//! and non-finite values are refused outright.

use serde::{Serialize, Deserialize};

use crate::core::rng::SeededRng;
use crate::core::vec2::Vec2;
use crate::game::surface::{MAX_LAUNCH_ANGLE, MAX_LAUNCH_SPEED, MAX_WOBBLE, MIN_LAUNCH_SPEED};

/// Something the local player wants to do.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "intent", rename_all = "snake_case")]
pub enum Intent {
    /// Fix the aim direction
    LockAim,
    /// Release the stone
    ConfirmThrow {
        /// Angle from straight up the sheet, radians (positive towards +X)
        direction: f64,
        /// Throw strength, 0.0 to 1.0
        power: f64,
    },
    /// Go back to free aiming
    CancelAim,
    /// Sweep in front of the moving stone
    Sweep {
        /// Sheet X
        x: f64,
        /// Sheet Y
        y: f64,
    },
    /// Dismiss the opponent-left notice
    AcknowledgeInterrupt,
}

impl Intent {
    /// Normalise raw input.
    ///
    /// Returns `None` if the intent carries non-finite numbers.
    pub fn sanitize(self) -> Option<Self> {
        match self {
            Intent::ConfirmThrow { direction, power } => {
                if !direction.is_finite() || !power.is_finite() {
                    return None;
                }
                Some(Intent::ConfirmThrow {
                    direction: clamp_direction(direction),
                    power: power.clamp(0.0, 1.0),
                })
            }
            Intent::Sweep { x, y } => {
                if !x.is_finite() || !y.is_finite() {
                    return None;
                }
                Some(self)
            }
            other => Some(other),
        }
    }
}

/// Clamp an aim angle to the legal arc.
#[inline]
pub fn clamp_direction(direction: f64) -> f64 {
    direction.clamp(-MAX_LAUNCH_ANGLE, MAX_LAUNCH_ANGLE)
}

/// Launch speed for a power setting.
#[inline]
pub fn launch_speed(power: f64) -> f64 {
    MIN_LAUNCH_SPEED + power.clamp(0.0, 1.0) * (MAX_LAUNCH_SPEED - MIN_LAUNCH_SPEED)
}

/// Velocity for a throw, with a small random wobble on the angle.
///
/// The wobble is drawn here, on the throwing peer, and travels inside the
/// launch velocity; the receiving peer never draws it.
pub fn launch_velocity(direction: f64, power: f64, rng: &mut SeededRng) -> Vec2 {
    let wobble = rng.next_f64_range(-MAX_WOBBLE, MAX_WOBBLE);
    Vec2::from_heading(clamp_direction(direction) + wobble).scale(launch_speed(power))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_clamps() {
        let raw = Intent::ConfirmThrow { direction: 3.0, power: 1.7 };
        assert_eq!(
            raw.sanitize(),
            Some(Intent::ConfirmThrow { direction: MAX_LAUNCH_ANGLE, power: 1.0 })
        );
        let raw = Intent::ConfirmThrow { direction: -3.0, power: -0.2 };
        assert_eq!(
            raw.sanitize(),
            Some(Intent::ConfirmThrow { direction: -MAX_LAUNCH_ANGLE, power: 0.0 })
        );
    }

    #[test]
    fn test_sanitize_rejects_nan() {
        assert_eq!(Intent::ConfirmThrow { direction: f64::NAN, power: 0.5 }.sanitize(), None);
        assert_eq!(Intent::Sweep { x: 1.0, y: f64::INFINITY }.sanitize(), None);
        assert_eq!(Intent::LockAim.sanitize(), Some(Intent::LockAim));
    }

    #[test]
    fn test_launch_velocity_range() {
        let mut rng = SeededRng::new(99);
        for i in 0..100 {
            let power = i as f64 / 99.0;
            let v = launch_velocity(0.0, power, &mut rng);
            let speed = v.length();
            assert!(speed >= MIN_LAUNCH_SPEED - 1e-9 && speed <= MAX_LAUNCH_SPEED + 1e-9);
            // Up the sheet, nearly straight
            assert!(v.y < 0.0);
            assert!((v.x / v.y).abs() < 0.02);
        }
    }

    #[test]
    fn test_launch_velocity_reproducible() {
        let mut a = SeededRng::new(5);
        let mut b = SeededRng::new(5);
        assert_eq!(launch_velocity(0.1, 0.6, &mut a), launch_velocity(0.1, 0.6, &mut b));
    }

    #[test]
    fn test_intent_json() {
        let json = serde_json::to_string(&Intent::Sweep { x: 10.0, y: 20.0 }).unwrap();
        assert!(json.contains("\"intent\":\"sweep\""));
    }
}
