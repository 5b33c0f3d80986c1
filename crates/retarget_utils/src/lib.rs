pub mod numerical;

use na::{Point3, Vector3};
extern crate nalgebra as na;

pub type Point3f = Point3<f32>;
pub type Vector3f = Vector3<f32>;

pub fn subv3f(a: &Vector3f, b: &Vector3f) -> Vector3f {
    Vector3::new(a.x - b.x, a.y - b.y, a.z - b.z)
}
pub fn addv3f_scaled(a: &Vector3f, b: &Vector3f, scale: f32) -> Vector3f {
    Vector3::new(a.x + b.x * scale, a.y + b.y * scale, a.z + b.z * scale)
}
/// Linear interpolation between two points, `t` in [0,1] picks between `a` and
/// `b`
pub fn lerpv3f(a: &Vector3f, b: &Vector3f, t: f32) -> Vector3f {
    addv3f_scaled(a, &subv3f(b, a), t)
}
pub fn midv3f(a: &Vector3f, b: &Vector3f) -> Vector3f {
    lerpv3f(a, b, 0.5)
}
