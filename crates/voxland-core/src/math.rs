//! Rays and boxes for picking and collision queries.

use glam::Vec3;

/// Half-line used for block picking. `direction` always has unit length.
#[derive(Clone, Copy, Debug)]
pub struct Ray {
    pub origin: Vec3,
    pub direction: Vec3,
}

impl Ray {
    /// Returns `None` when `direction` is zero or not finite.
    #[inline]
    pub fn new(origin: Vec3, direction: Vec3) -> Option<Self> {
        direction.try_normalize().map(|direction| Self { origin, direction })
    }

    /// Sample `t` units from the origin.
    #[inline]
    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }
}

/// Box aligned to the world axes, given by its lower and upper corners.
#[derive(Clone, Copy, Debug, Default)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    #[inline]
    pub const fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Upright box standing on `feet`, `radius` wide on X/Z and `height` tall.
    #[inline]
    pub fn from_feet(feet: Vec3, radius: f32, height: f32) -> Self {
        let half = Vec3::new(radius, 0.0, radius);
        Self::new(feet - half, feet + half + Vec3::Y * height)
    }

    /// The voxel cell whose lower corner is `corner`.
    #[inline]
    pub fn unit_cube(corner: Vec3) -> Self {
        Self::new(corner, corner + Vec3::ONE)
    }

    /// Whether the two boxes share some volume.
    ///
    /// Boxes that only touch along a face do not overlap, so a mover
    /// resting on a block is not reported as colliding with it.
    #[inline]
    pub fn overlaps(&self, other: &Self) -> bool {
        self.min.cmplt(other.max).all() && other.min.cmplt(self.max).all()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn samples_along_unit_direction() {
        let ray = Ray::new(Vec3::new(1.0, 2.0, 3.0), Vec3::new(0.0, 0.0, -4.0)).unwrap();
        assert_eq!(ray.direction, Vec3::NEG_Z);
        assert_eq!(ray.at(0.0), Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(ray.at(2.5), Vec3::new(1.0, 2.0, 0.5));
    }

    #[test]
    fn diagonal_direction_is_normalized() {
        let ray = Ray::new(Vec3::ONE, Vec3::new(1.0, 1.0, 0.0)).unwrap();
        assert_relative_eq!(ray.direction.length(), 1.0, epsilon = 1e-6);
    }

    #[test]
    fn zero_direction_is_rejected() {
        assert!(Ray::new(Vec3::ZERO, Vec3::ZERO).is_none());
        assert!(Ray::new(Vec3::ZERO, Vec3::new(f32::NAN, 0.0, 0.0)).is_none());
    }

    #[test]
    fn feet_box_dimensions() {
        let body = Aabb::from_feet(Vec3::new(0.5, 1.0, 0.5), 0.3, 1.8);
        assert_relative_eq!(body.min.x, 0.2, epsilon = 1e-6);
        assert_relative_eq!(body.max.z, 0.8, epsilon = 1e-6);
        assert_relative_eq!(body.min.y, 1.0);
        assert_relative_eq!(body.max.y, 2.8, epsilon = 1e-6);
    }

    #[test]
    fn touching_boxes_do_not_overlap() {
        let floor = Aabb::unit_cube(Vec3::ZERO);
        let standing = Aabb::from_feet(Vec3::new(0.5, 1.0, 0.5), 0.3, 1.8);
        assert!(!floor.overlaps(&standing));

        let sunk = Aabb::from_feet(Vec3::new(0.5, 0.9, 0.5), 0.3, 1.8);
        assert!(floor.overlaps(&sunk));
        assert!(sunk.overlaps(&floor));
    }

    #[test]
    fn separated_on_one_axis_do_not_overlap() {
        let a = Aabb::unit_cube(Vec3::ZERO);
        let b = Aabb::unit_cube(Vec3::new(0.5, 0.5, 3.0));
        assert!(!a.overlaps(&b));
    }
}
