use bevy_math::{DMat3, DVec3};
use constants::coordinate_system::normalize_angle;

/// Rotation from the vehicle frame (x forward, y port, z up) into the world frame.
/// Yaw is the heading plus the sensor mounting offset; pitch and roll default to level.
pub fn vehicle_to_world(heading: f64, sensor_yaw: f64, pitch: Option<f64>, roll: Option<f64>) -> DMat3 {
    let yaw = normalize_angle(heading + sensor_yaw);
    DMat3::from_rotation_z(yaw)
        * DMat3::from_rotation_y(pitch.unwrap_or(0.0))
        * DMat3::from_rotation_x(roll.unwrap_or(0.0))
}

/// Launch direction in the vehicle frame for a beam depressed `theta` from the
/// vertical towards one side (`across_sign` +1 for port, -1 for starboard).
pub fn across_track_direction(theta: f64, across_sign: f64) -> DVec3 {
    DVec3::new(0.0, across_sign * theta.sin(), -theta.cos())
}

/// Apply a rotation to a direction and renormalize.
pub fn transform_direction(rotation: &DMat3, direction: DVec3) -> DVec3 {
    (*rotation * direction).normalize()
}
