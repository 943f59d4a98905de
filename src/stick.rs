/// Polar conversion for analog sticks: raw (x, y) → angle + magnitude.
///
/// Angle is in degrees with 0° pointing right and 90° pointing up (assuming
/// y-up axis data from the backend). Magnitude is deliberately not clamped
/// to [0, 1]: pads with non-circular gates (the square hole on a Logitech
/// Dual Action, worn sticks) can report corner positions past unit length,
/// and callers that care can clamp themselves.

/// Convert a stick position to (angle in degrees, magnitude).
pub fn polar(x: f32, y: f32) -> (f32, f32) {
    let angle = y.atan2(x).to_degrees();
    let magnitude = (x * x + y * y).sqrt();
    (angle, magnitude)
}
