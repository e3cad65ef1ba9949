//! refrax core - scene description for the refrax ray tracer.
//!
//! This crate provides:
//!
//! - **Primitives**: the `Primitive` trait plus `Triangle`, `Quad`, `Sphere`
//! - **Shading inputs**: `Material` / `PhongMaterial`, `Light`, `Environment`
//! - **Scene container**: `Scene`, `Mesh`, `Transform`
//!
//! # Example
//!
//! ```
//! use refrax_core::{Light, PhongMaterial, Scene, Sphere, SkyGradient};
//! use refrax_math::Vec3;
//!
//! let mut scene = Scene::new().with_environment(SkyGradient::default());
//! let red = scene.add_material(PhongMaterial::matte(Vec3::new(0.8, 0.1, 0.1)));
//! scene.add_primitive(Sphere::new(Vec3::ZERO, 1.0, red))?;
//! scene.add_light(Light::point(Vec3::new(0.0, 5.0, 5.0), Vec3::ONE))?;
//! # Ok::<(), refrax_core::SceneError>(())
//! ```

pub mod environment;
pub mod light;
pub mod material;
pub mod mesh;
pub mod polygon;
pub mod primitive;
pub mod quad;
pub mod scene;
pub mod sphere;
pub mod triangle;

// Re-export commonly used types
pub use environment::{Environment, SkyGradient, SolidColor};
pub use light::Light;
pub use material::{Checker, Color, Material, MaterialResponse, PhongMaterial, ShadingPoint};
pub use mesh::{Mesh, Transform};
pub use primitive::{MaterialId, Primitive, PrimitiveId, SplitBounds, SurfaceHit};
pub use quad::Quad;
pub use scene::{Scene, SceneError, SceneResult};
pub use sphere::Sphere;
pub use triangle::Triangle;
