//! Scene container.
//!
//! The scene owns every primitive, material and light. Spatial indexes and
//! the shading integrator borrow it read-only for the duration of a render.

use std::ops::Range;

use refrax_math::Aabb;
use thiserror::Error;

use crate::environment::{Environment, SolidColor};
use crate::light::Light;
use crate::material::{Color, Material};
use crate::mesh::{Mesh, Transform};
use crate::primitive::{MaterialId, Primitive, PrimitiveId};
use crate::triangle::Triangle;

/// Errors raised while assembling a scene.
#[derive(Error, Debug)]
pub enum SceneError {
    #[error("Unknown material id: {0}")]
    UnknownMaterial(MaterialId),

    #[error("Primitive has non-finite bounds")]
    UnboundedPrimitive,

    #[error("Invalid light: {0}")]
    InvalidLight(String),

    #[error("Invalid mesh: {0}")]
    InvalidMesh(String),

    #[error("Scene exceeds {0} primitives")]
    TooManyPrimitives(usize),
}

pub type SceneResult<T> = Result<T, SceneError>;

/// A complete scene: geometry, materials, lights and background.
pub struct Scene {
    primitives: Vec<Box<dyn Primitive>>,
    materials: Vec<Box<dyn Material>>,
    lights: Vec<Light>,
    environment: Box<dyn Environment>,
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

impl Scene {
    /// Create an empty scene with a black background.
    pub fn new() -> Self {
        Self {
            primitives: Vec::new(),
            materials: Vec::new(),
            lights: Vec::new(),
            environment: Box::new(SolidColor(Color::ZERO)),
        }
    }

    pub fn with_environment(mut self, environment: impl Environment + 'static) -> Self {
        self.environment = Box::new(environment);
        self
    }

    /// Register a material and return its id.
    pub fn add_material(&mut self, material: impl Material + 'static) -> MaterialId {
        self.materials.push(Box::new(material));
        (self.materials.len() - 1) as MaterialId
    }

    /// Add a primitive and return its identity.
    pub fn add_primitive(&mut self, primitive: impl Primitive + 'static) -> SceneResult<PrimitiveId> {
        self.add_boxed(Box::new(primitive))
    }

    pub fn add_boxed(&mut self, primitive: Box<dyn Primitive>) -> SceneResult<PrimitiveId> {
        let material = primitive.material();
        if material as usize >= self.materials.len() {
            return Err(SceneError::UnknownMaterial(material));
        }
        if !primitive.bounds().is_finite() {
            return Err(SceneError::UnboundedPrimitive);
        }
        if self.primitives.len() >= PrimitiveId::MAX as usize {
            return Err(SceneError::TooManyPrimitives(PrimitiveId::MAX as usize));
        }
        self.primitives.push(primitive);
        Ok((self.primitives.len() - 1) as PrimitiveId)
    }

    /// Add every face of a mesh as a triangle, placed by `transform`.
    pub fn add_mesh(
        &mut self,
        mesh: &Mesh,
        transform: &Transform,
        material: MaterialId,
    ) -> SceneResult<Range<PrimitiveId>> {
        mesh.validate()?;
        let placed = mesh.transformed(transform);
        let start = self.primitives.len() as PrimitiveId;
        for [a, b, c] in placed.triangles() {
            self.add_primitive(Triangle::new(a, b, c, material))?;
        }
        let end = self.primitives.len() as PrimitiveId;
        log::debug!("Added mesh with {} triangles", end - start);
        Ok(start..end)
    }

    pub fn add_light(&mut self, light: Light) -> SceneResult<()> {
        if !(light.radius >= 0.0) {
            return Err(SceneError::InvalidLight(format!(
                "radius must be non-negative, got {}",
                light.radius
            )));
        }
        if light.samples == 0 {
            return Err(SceneError::InvalidLight("sample count must be at least 1".into()));
        }
        if !light.position.is_finite() {
            return Err(SceneError::InvalidLight("position is not finite".into()));
        }
        self.lights.push(light);
        Ok(())
    }

    pub fn primitives(&self) -> &[Box<dyn Primitive>] {
        &self.primitives
    }

    pub fn primitive(&self, id: PrimitiveId) -> &dyn Primitive {
        self.primitives[id as usize].as_ref()
    }

    /// Look up a material. Ids are checked when primitives are added.
    pub fn material(&self, id: MaterialId) -> &dyn Material {
        self.materials[id as usize].as_ref()
    }

    pub fn lights(&self) -> &[Light] {
        &self.lights
    }

    pub fn environment(&self) -> &dyn Environment {
        self.environment.as_ref()
    }

    pub fn primitive_count(&self) -> usize {
        self.primitives.len()
    }

    /// Bounds of all geometry in the scene.
    pub fn bounds(&self) -> Aabb {
        self.primitives
            .iter()
            .fold(Aabb::EMPTY, |acc, p| Aabb::surrounding(&acc, &p.bounds()))
    }
}
