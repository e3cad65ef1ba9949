// Re-export the double-precision glam types used by the tracer
pub use glam::{DMat3, DMat4, DQuat, DVec2, DVec3};

/// Vector type used for points, directions and colors.
pub type Vec3 = DVec3;

/// Shared numeric tolerance.
///
/// Divisors with a smaller magnitude mean "no motion along this axis",
/// and ray parameters at or below it count as behind the origin.
pub const EPSILON: f64 = 1e-6;

mod aabb;
mod interval;
mod ray;

pub use aabb::Aabb;
pub use interval::Interval;
pub use ray::Ray;

/// Returns true if `value` is too small to divide by.
#[inline]
pub fn is_near_zero(value: f64) -> bool {
    value.abs() < EPSILON
}

/// Builds an orthonormal basis `(u, v)` perpendicular to the unit vector `w`.
pub fn orthonormal_basis(w: Vec3) -> (Vec3, Vec3) {
    let helper = if w.x.abs() > 0.9 { Vec3::Y } else { Vec3::X };
    let u = helper.cross(w).normalize();
    let v = w.cross(u);
    (u, v)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vec3_operations() {
        let a = Vec3::new(1.0, 2.0, 3.0);
        let b = Vec3::new(4.0, 5.0, 6.0);
        assert_eq!(a + b, Vec3::new(5.0, 7.0, 9.0));
        assert_eq!(a[2], 3.0);
    }

    #[test]
    fn test_near_zero() {
        assert!(is_near_zero(0.0));
        assert!(is_near_zero(-1e-7));
        assert!(!is_near_zero(1e-5));
    }

    #[test]
    fn test_orthonormal_basis() {
        for w in [Vec3::X, Vec3::Y, Vec3::Z, Vec3::new(1.0, -2.0, 0.5).normalize()] {
            let (u, v) = orthonormal_basis(w);
            assert!(u.dot(w).abs() < 1e-12);
            assert!(v.dot(w).abs() < 1e-12);
            assert!(u.dot(v).abs() < 1e-12);
            assert!((u.length() - 1.0).abs() < 1e-12);
            assert!((v.length() - 1.0).abs() < 1e-12);
        }
    }
}
