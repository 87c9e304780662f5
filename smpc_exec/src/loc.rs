//! # Localisation types
//!
//! Planar pose and control types shared by every planner module. Positions
//! are in the world (W) frame, headings are measured anticlockwise from the
//! W_X axis.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use nalgebra::{Vector2, Vector3};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// The planar pose (position and heading) of a vehicle.
#[derive(Debug, Copy, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Pose {
    /// The position in the W frame
    pub position_m: Vector2<f64>,

    /// Heading angle from the W_X axis
    pub heading_rad: f64,
}

/// A control action in the W frame.
///
/// The controlled vehicle is holonomic in the plane, so the velocity is given
/// directly in world coordinates alongside the turn rate.
#[derive(Debug, Copy, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Control {
    /// Velocity in the W frame
    pub vel_ms: Vector2<f64>,

    /// Turn rate about the vertical axis
    pub rate_rads: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Pose {
    pub fn new(x_m: f64, y_m: f64, heading_rad: f64) -> Self {
        Self {
            position_m: Vector2::new(x_m, y_m),
            heading_rad,
        }
    }

    /// Build a pose from an `[x, y, heading]` state vector.
    pub fn from_state(state: &Vector3<f64>) -> Self {
        Self::new(state[0], state[1], state[2])
    }

    /// Return the `[x, y, heading]` state vector of this pose.
    pub fn state(&self) -> Vector3<f64> {
        Vector3::new(self.position_m[0], self.position_m[1], self.heading_rad)
    }

    /// Planar distance between the positions of two poses.
    pub fn distance_to(&self, other: &Pose) -> f64 {
        (self.position_m - other.position_m).norm()
    }
}

impl Control {
    pub fn new(vx_ms: f64, vy_ms: f64, rate_rads: f64) -> Self {
        Self {
            vel_ms: Vector2::new(vx_ms, vy_ms),
            rate_rads,
        }
    }

    /// Build a control from a `[vx, vy, omega]` vector.
    pub fn from_vector(vec: &Vector3<f64>) -> Self {
        Self::new(vec[0], vec[1], vec[2])
    }

    /// Return the `[vx, vy, omega]` vector of this control.
    pub fn vector(&self) -> Vector3<f64> {
        Vector3::new(self.vel_ms[0], self.vel_ms[1], self.rate_rads)
    }

    /// Velocity expressed in a body frame with the given heading, as
    /// `(longitudinal, lateral)`.
    pub fn body_vel_ms(&self, heading_rad: f64) -> (f64, f64) {
        let (sin, cos) = heading_rad.sin_cos();
        (
            self.vel_ms[0] * cos + self.vel_ms[1] * sin,
            -self.vel_ms[0] * sin + self.vel_ms[1] * cos,
        )
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_body_vel() {
        let ctrl = Control::new(1.0, 0.0, 0.0);

        let (lon, lat) = ctrl.body_vel_ms(0.0);
        assert!((lon - 1.0).abs() < 1e-12 && lat.abs() < 1e-12);

        // Facing +Y, a +X world velocity is entirely to the right (negative lateral)
        let (lon, lat) = ctrl.body_vel_ms(std::f64::consts::FRAC_PI_2);
        assert!(lon.abs() < 1e-12);
        assert!((lat + 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_state_round_trip() {
        let pose = Pose::new(1.0, -2.0, 0.3);
        assert_eq!(Pose::from_state(&pose.state()), pose);
        assert!((pose.distance_to(&Pose::new(4.0, 2.0, 0.0)) - 5.0).abs() < 1e-12);
    }
}
