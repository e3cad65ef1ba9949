//! refrax renderer - accelerated Whitted ray tracing on the CPU.
//!
//! A frame is rendered in three layers:
//!
//! - [`Renderer`] splits the image into row bands and traces them in
//!   parallel on a rayon pool
//! - [`ShadingIntegrator`] computes the color along each ray: direct light
//!   with soft shadows plus recursive reflection and refraction
//! - a [`SpatialIndex`] (uniform grid, octree or plane-split tree) answers
//!   the nearest-hit queries, with leaf reference lists packed by the
//!   [`ReferenceCompactor`]
//!
//! # Example
//!
//! ```
//! use refrax_core::{Light, PhongMaterial, Scene, SkyGradient, Sphere};
//! use refrax_renderer::{Camera, RenderConfig, Renderer};
//! use refrax_math::Vec3;
//!
//! let mut scene = Scene::new().with_environment(SkyGradient::default());
//! let red = scene.add_material(PhongMaterial::matte(Vec3::new(0.8, 0.1, 0.1)));
//! scene.add_primitive(Sphere::new(Vec3::new(0.0, 0.0, -3.0), 1.0, red))?;
//! scene.add_light(Light::point(Vec3::new(0.0, 5.0, 0.0), Vec3::ONE))?;
//!
//! let camera = Camera::new().with_resolution(32, 18);
//! let image = Renderer::new(&scene, RenderConfig::default())?.render(&camera)?;
//! assert_eq!(image.pixels.len(), 32 * 18);
//! # Ok::<(), refrax_renderer::RenderError>(())
//! ```

pub mod accel;
mod band;
mod camera;
pub mod compact;
mod error;
mod integrator;
mod renderer;

pub use accel::{
    build_index, AccelKind, AccelSettings, Hit, IndexStats, NaiveIndex, Octree, PlaneSplitTree,
    SpatialIndex, UniformGrid,
};
pub use band::{generate_bands, Band};
pub use camera::Camera;
pub use compact::{CompactedReferences, CompactionStats, ReferenceCompactor};
pub use error::{ConfigError, RenderError, Result};
pub use integrator::{reflect, refract, Attenuation, ShadingIntegrator, TraceScratch};
pub use renderer::{
    color_to_rgba, linear_to_gamma, render_pixel, spectral_samples, ImageBuffer, RenderConfig,
    Renderer, MAX_DEPTH_LIMIT,
};

/// Re-export common types from the scene and math crates
pub use refrax_core::Color;
pub use refrax_math::{Aabb, Interval, Ray, Vec3};
