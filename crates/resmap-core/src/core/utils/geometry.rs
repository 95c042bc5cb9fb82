use nalgebra::{Point3, Vector3};
use std::f64::consts::PI;

/// Angle in radians between two vectors sharing their origin, in `[0, π]`.
pub fn angle(ba: &Vector3<f64>, bc: &Vector3<f64>) -> f64 {
    ba.cross(bc).norm().atan2(ba.dot(bc))
}

/// Torsion angle in radians around the `b-c` axis of four points, in `(-π, π]`.
///
/// Points in a cis arrangement give 0, trans gives π.
pub fn dihedral(points: &[Point3<f64>; 4]) -> f64 {
    let ab = points[1] - points[0];
    let bc = points[2] - points[1];
    let cd = points[3] - points[2];
    let y = bc.norm() * ab.dot(&bc.cross(&cd));
    let x = ab.cross(&bc).dot(&bc.cross(&cd));
    wrap(y.atan2(x))
}

/// Torsion angle measured from the trans arrangement: trans gives 0, cis gives π.
pub fn dihedral_left(points: &[Point3<f64>; 4]) -> f64 {
    wrap(dihedral(points) + PI)
}

fn wrap(angle: f64) -> f64 {
    if angle > PI {
        angle - 2.0 * PI
    } else if angle <= -PI {
        angle + 2.0 * PI
    } else {
        angle
    }
}
