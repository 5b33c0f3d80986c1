use crate::Vector3f;
use nalgebra as na;
use nalgebra::clamp;

//map a value from the range [inMin, inMax] to [outMin, outMax]
pub fn map(value: f32, in_min: f32, in_max: f32, out_min: f32, out_max: f32) -> f32 {
    let value_clamped = clamp(value, in_min, in_max);
    out_min + (out_max - out_min) * (value_clamped - in_min) / (in_max - in_min)
}

/// Angle between two vectors, robust near 0 and PI. The naive
/// `acos(dot(a,b))` loses precision exactly where the bone directions matter
/// most, so we go through `atan2` of the cross norm instead and clamp the dot
/// against floating point spill outside [-1,1].
pub fn angle_between(a: &Vector3f, b: &Vector3f) -> f32 {
    let an = a.norm();
    let bn = b.norm();
    if an < 1e-6 || bn < 1e-6 {
        return 0.0;
    }
    let a = a / an;
    let b = b / bn;
    let cross_norm = a.cross(&b).norm();
    let dot = clamp(a.dot(&b), -1.0, 1.0);
    f32::atan2(cross_norm, dot)
}

/// Some unit vector orthogonal to `v`. Used as a fallback rotation axis when
/// two directions are antiparallel and their cross product vanishes.
pub fn any_orthogonal(v: &Vector3f) -> Vector3f {
    let candidate = if v.x.abs() < 0.9 {
        Vector3f::x_axis().into_inner()
    } else {
        Vector3f::y_axis().into_inner()
    };
    let ortho = v.cross(&candidate);
    let n = ortho.norm();
    if n < 1e-6 {
        // v itself was degenerate
        return Vector3f::x_axis().into_inner();
    }
    ortho / n
}

/// Snap near-zero components to exact zero so noise from matrix inversion does
/// not propagate down a joint hierarchy
pub fn snap_zero(v: &mut Vector3f, tolerance: f32) {
    for c in v.iter_mut() {
        if c.abs() < tolerance {
            *c = 0.0;
        }
    }
}

/// Interpolates between two unit quaternions with a slerp, falling back to the
/// closest representation when the rotations are almost opposite
pub fn slerp_quat(a: &na::UnitQuaternion<f32>, b: &na::UnitQuaternion<f32>, t: f32) -> na::UnitQuaternion<f32> {
    a.try_slerp(b, t, 1e-6).unwrap_or(*a)
}
