//! Indexed triangle meshes and their placement transforms.
//!
//! Meshes are decoupled from any file format; loaders fill in positions and
//! indices and the scene turns every face into a [`crate::Triangle`].

use refrax_math::{Aabb, DMat4, DQuat, Vec3};

use crate::scene::SceneError;

/// A mesh consisting of vertex positions and triangle indices.
#[derive(Clone, Debug)]
pub struct Mesh {
    /// Vertex positions (one Vec3 per vertex)
    pub positions: Vec<Vec3>,

    /// Triangle indices (every 3 indices form a triangle)
    pub indices: Vec<u32>,

    /// Axis-aligned bounding box
    pub bounds: Aabb,
}

impl Mesh {
    /// Create a new mesh from positions and indices.
    pub fn new(positions: Vec<Vec3>, indices: Vec<u32>) -> Self {
        let bounds = Self::compute_bounds(&positions);
        Self {
            positions,
            indices,
            bounds,
        }
    }

    /// Axis-aligned unit cube centered on the origin, outward winding.
    pub fn cube() -> Self {
        let positions = vec![
            Vec3::new(-0.5, -0.5, -0.5),
            Vec3::new(0.5, -0.5, -0.5),
            Vec3::new(0.5, 0.5, -0.5),
            Vec3::new(-0.5, 0.5, -0.5),
            Vec3::new(-0.5, -0.5, 0.5),
            Vec3::new(0.5, -0.5, 0.5),
            Vec3::new(0.5, 0.5, 0.5),
            Vec3::new(-0.5, 0.5, 0.5),
        ];
        #[rustfmt::skip]
        let indices = vec![
            0, 2, 1, 0, 3, 2, // -Z
            4, 5, 6, 4, 6, 7, // +Z
            0, 1, 5, 0, 5, 4, // -Y
            3, 7, 6, 3, 6, 2, // +Y
            0, 4, 7, 0, 7, 3, // -X
            1, 2, 6, 1, 6, 5, // +X
        ];
        Self::new(positions, indices)
    }

    /// Compute axis-aligned bounding box from positions.
    fn compute_bounds(positions: &[Vec3]) -> Aabb {
        if positions.is_empty() {
            return Aabb::EMPTY;
        }

        let mut min = Vec3::splat(f64::INFINITY);
        let mut max = Vec3::splat(f64::NEG_INFINITY);

        for pos in positions {
            min = min.min(*pos);
            max = max.max(*pos);
        }

        Aabb::from_points(min, max)
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Check that indices describe whole triangles of existing vertices.
    pub fn validate(&self) -> Result<(), SceneError> {
        if self.indices.len() % 3 != 0 {
            return Err(SceneError::InvalidMesh(format!(
                "index count {} is not a multiple of 3",
                self.indices.len()
            )));
        }
        if let Some(bad) = self
            .indices
            .iter()
            .find(|&&i| i as usize >= self.positions.len())
        {
            return Err(SceneError::InvalidMesh(format!(
                "index {} out of range for {} vertices",
                bad,
                self.positions.len()
            )));
        }
        Ok(())
    }

    /// Iterate over the corner positions of every face.
    pub fn triangles(&self) -> impl Iterator<Item = [Vec3; 3]> + '_ {
        self.indices.chunks_exact(3).map(move |face| {
            [
                self.positions[face[0] as usize],
                self.positions[face[1] as usize],
                self.positions[face[2] as usize],
            ]
        })
    }

    /// Copy of the mesh with every vertex moved by `transform`.
    pub fn transformed(&self, transform: &Transform) -> Mesh {
        let matrix = transform.to_matrix();
        let positions = self
            .positions
            .iter()
            .map(|&p| matrix.transform_point3(p))
            .collect();
        Mesh::new(positions, self.indices.clone())
    }
}

/// Transform components that can be composed into a matrix.
#[derive(Clone, Debug)]
pub struct Transform {
    /// Translation
    pub translation: Vec3,

    /// Rotation (as quaternion)
    pub rotation: DQuat,

    /// Scale
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            translation: Vec3::ZERO,
            rotation: DQuat::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

impl Transform {
    /// Create a new transform with only translation.
    pub fn from_translation(translation: Vec3) -> Self {
        Self {
            translation,
            ..Default::default()
        }
    }

    pub fn with_rotation(mut self, rotation: DQuat) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn with_scale(mut self, scale: Vec3) -> Self {
        self.scale = scale;
        self
    }

    /// Convert to a 4x4 transformation matrix.
    ///
    /// Order: Scale -> Rotate -> Translate (SRT)
    pub fn to_matrix(&self) -> DMat4 {
        DMat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cube_is_valid() {
        let cube = Mesh::cube();
        assert!(cube.validate().is_ok());
        assert_eq!(cube.triangle_count(), 12);
        assert_eq!(cube.bounds.min(), Vec3::splat(-0.5));
    }

    #[test]
    fn test_cube_winding_points_outward() {
        let cube = Mesh::cube();
        for [a, b, c] in cube.triangles() {
            let normal = (b - a).cross(c - a);
            let centroid = (a + b + c) / 3.0;
            assert!(normal.dot(centroid) > 0.0);
        }
    }

    #[test]
    fn test_validate_rejects_bad_indices() {
        let mesh = Mesh::new(vec![Vec3::ZERO, Vec3::X, Vec3::Y], vec![0, 1, 3]);
        assert!(matches!(mesh.validate(), Err(SceneError::InvalidMesh(_))));

        let mesh = Mesh::new(vec![Vec3::ZERO, Vec3::X, Vec3::Y], vec![0, 1]);
        assert!(mesh.validate().is_err());
    }

    #[test]
    fn test_transformed() {
        let cube = Mesh::cube();
        let moved = cube.transformed(
            &Transform::from_translation(Vec3::new(0.0, 2.0, 0.0)).with_scale(Vec3::splat(2.0)),
        );
        assert!((moved.bounds.min() - Vec3::new(-1.0, 1.0, -1.0)).length() < 1e-12);
        assert!((moved.bounds.max() - Vec3::new(1.0, 3.0, 1.0)).length() < 1e-12);
    }
}
