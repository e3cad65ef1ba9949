//! Frame scheduling and image output.
//!
//! The image is cut into one row band per worker and each band is traced
//! on a dedicated rayon pool. Within a pixel, antialiasing sub-samples
//! and dispersion sub-samples are nested loops averaged into one color.

use std::path::Path;
use std::time::Instant;

use rand::Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use refrax_core::{Color, Scene};

use crate::accel::{build_index, AccelSettings, SpatialIndex};
use crate::band::{generate_bands, Band};
use crate::camera::Camera;
use crate::error::{ConfigError, Result};
use crate::integrator::{Attenuation, ShadingIntegrator, TraceScratch};

/// Largest accepted recursion depth.
pub const MAX_DEPTH_LIMIT: u32 = 32;

/// Render configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Antialiasing sub-samples per pixel axis
    pub antialias: u32,
    /// Wavelength sub-samples per antialiasing sample
    pub dispersion_samples: u32,
    /// Maximum reflection/refraction recursion depth
    pub max_depth: u32,
    /// Recursive rays carrying less weight than this are not traced
    pub min_contribution: f64,
    pub ambient_light: Color,
    pub attenuation: Attenuation,
    /// Exponential extinction per unit of hit distance
    pub distance_loss: f64,
    /// Distance secondary rays start off the surface
    pub shadow_offset: f64,
    /// Worker count; rayon's default when unset
    pub threads: Option<usize>,
    pub seed: u64,
    pub accel: AccelSettings,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            antialias: 1,
            dispersion_samples: 1,
            max_depth: 5,
            min_contribution: 0.01,
            ambient_light: Color::ONE,
            attenuation: Attenuation::default(),
            distance_loss: 0.0,
            shadow_offset: 1e-4,
            threads: None,
            seed: 0,
            accel: AccelSettings::default(),
        }
    }
}

impl RenderConfig {
    /// Parse and validate a JSON config. Missing fields take their defaults.
    pub fn from_json_str(json: &str) -> std::result::Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json_string(&self) -> std::result::Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.antialias == 0 {
            return Err(ConfigError::ZeroSamples("antialias"));
        }
        if self.dispersion_samples == 0 {
            return Err(ConfigError::ZeroSamples("dispersion_samples"));
        }
        if self.max_depth > MAX_DEPTH_LIMIT {
            return Err(ConfigError::DepthTooLarge {
                depth: self.max_depth,
                limit: MAX_DEPTH_LIMIT,
            });
        }

        let coefficients = [
            ("min_contribution", self.min_contribution),
            ("distance_loss", self.distance_loss),
            ("shadow_offset", self.shadow_offset),
            ("attenuation.constant", self.attenuation.constant),
            ("attenuation.linear", self.attenuation.linear),
            ("attenuation.quadratic", self.attenuation.quadratic),
            ("ambient_light", self.ambient_light.min_element()),
        ];
        for (name, value) in coefficients {
            // Also rejects NaN
            if !(value >= 0.0) {
                return Err(ConfigError::Negative { name, value });
            }
        }

        if self.threads == Some(0) {
            return Err(ConfigError::ZeroThreads);
        }

        let accel = &self.accel;
        if !(accel.grid_density > 0.0 && accel.grid_density.is_finite()) {
            return Err(ConfigError::InvalidAccel(format!(
                "grid_density must be positive, got {}",
                accel.grid_density
            )));
        }
        if accel.octree_max_items == 0 || accel.split_min_items == 0 {
            return Err(ConfigError::InvalidAccel(
                "leaf item limits must be at least 1".into(),
            ));
        }
        if accel.split_normals.iter().any(|n| !n.is_finite()) {
            return Err(ConfigError::InvalidAccel("split normals must be finite".into()));
        }
        Ok(())
    }
}

/// Per-sample shifts and RGB weights for dispersion.
///
/// Shifts run evenly from -1 (red) to +1 (blue). Each channel's weights sum
/// to one, so a material without dispersion renders exactly as it would
/// with a single sample.
pub fn spectral_samples(count: u32) -> Vec<(f64, Color)> {
    if count <= 1 {
        return vec![(0.0, Color::ONE)];
    }

    let shifts: Vec<f64> = (0..count)
        .map(|i| -1.0 + 2.0 * i as f64 / (count - 1) as f64)
        .collect();
    // Triangular response centered on each primary
    let centers = Color::new(-1.0, 0.0, 1.0);
    let raw: Vec<Color> = shifts
        .iter()
        .map(|&s| (Color::ONE - (Color::splat(s) - centers).abs() / 1.5).max(Color::ZERO))
        .collect();

    let total = raw.iter().copied().fold(Color::ZERO, |acc, w| acc + w);
    let uniform = 1.0 / count as f64;
    shifts
        .into_iter()
        .zip(raw)
        .map(|(shift, w)| {
            let mut weight = Color::ZERO;
            for channel in 0..3 {
                weight[channel] = if total[channel] > 0.0 {
                    w[channel] / total[channel]
                } else {
                    uniform
                };
            }
            (shift, weight)
        })
        .collect()
}

/// Average color of pixel `(x, y)` over all antialiasing and dispersion
/// sub-samples.
pub fn render_pixel(
    integrator: &ShadingIntegrator,
    camera: &Camera,
    config: &RenderConfig,
    spectrum: &[(f64, Color)],
    x: u32,
    y: u32,
    scratch: &mut TraceScratch,
) -> Color {
    let k = config.antialias.max(1);
    let mut total = Color::ZERO;

    for sy in 0..k {
        for sx in 0..k {
            // Jittered within its stratum, or the pixel center for one sample
            let offset = if k == 1 {
                (0.0, 0.0)
            } else {
                let rng = scratch.rng();
                (
                    (sx as f64 + rng.gen::<f64>()) / k as f64 - 0.5,
                    (sy as f64 + rng.gen::<f64>()) / k as f64 - 0.5,
                )
            };
            let ray = camera.get_ray(x, y, offset);

            for &(shift, weight) in spectrum {
                scratch.set_dispersion_shift(shift);
                total += weight * integrator.calculate_color(&ray, 0, 1.0, scratch);
            }
        }
    }
    scratch.set_dispersion_shift(0.0);

    total / (k * k) as f64
}

/// Apply gamma correction (gamma = 2.0).
#[inline]
pub fn linear_to_gamma(linear: f64) -> f64 {
    if linear > 0.0 {
        linear.sqrt()
    } else {
        0.0
    }
}

/// Convert a linear color to gamma-corrected 8-bit RGBA.
pub fn color_to_rgba(color: Color) -> [u8; 4] {
    let to_byte = |c: f64| (255.0 * linear_to_gamma(c).clamp(0.0, 1.0)) as u8;
    [to_byte(color.x), to_byte(color.y), to_byte(color.z), 255]
}

/// Linear color image in row-major order.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageBuffer {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<Color>,
}

impl ImageBuffer {
    /// Create a new image buffer filled with black.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![Color::ZERO; width as usize * height as usize],
        }
    }

    /// Get the pixel at (x, y).
    pub fn get(&self, x: u32, y: u32) -> Color {
        self.pixels[y as usize * self.width as usize + x as usize]
    }

    /// Set the pixel at (x, y).
    pub fn set(&mut self, x: u32, y: u32, color: Color) {
        self.pixels[y as usize * self.width as usize + x as usize] = color;
    }

    /// Convert to RGBA bytes (for display or saving).
    pub fn to_rgba(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.pixels.len() * 4);
        for color in &self.pixels {
            bytes.extend_from_slice(&color_to_rgba(*color));
        }
        bytes
    }

    pub fn save_png(&self, path: impl AsRef<Path>) -> Result<()> {
        image::save_buffer(
            path.as_ref(),
            &self.to_rgba(),
            self.width,
            self.height,
            image::ColorType::Rgba8,
        )?;
        log::info!("Saved {}x{} image to {}", self.width, self.height, path.as_ref().display());
        Ok(())
    }
}

/// Renders frames of one scene with one configuration.
///
/// The spatial index is built once in [`Renderer::new`] and shared
/// read-only by every worker.
pub struct Renderer<'a> {
    scene: &'a Scene,
    config: RenderConfig,
    index: Box<dyn SpatialIndex + 'a>,
}

impl<'a> Renderer<'a> {
    pub fn new(scene: &'a Scene, config: RenderConfig) -> Result<Self> {
        config.validate()?;
        let index = build_index(scene.primitives(), &config.accel);
        Ok(Self {
            scene,
            config,
            index,
        })
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    pub fn index(&self) -> &dyn SpatialIndex {
        self.index.as_ref()
    }

    /// Render the full frame seen by `camera`.
    pub fn render(&self, camera: &Camera) -> Result<ImageBuffer> {
        let start = Instant::now();
        let threads = self.config.threads.unwrap_or_else(rayon::current_num_threads);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("refrax-band-{i}"))
            .build()?;

        let (width, height) = (camera.image_width, camera.image_height);
        let mut image = ImageBuffer::new(width, height);
        let bands = generate_bands(height, threads);

        // Hand each band exclusive ownership of its rows
        let mut work = Vec::with_capacity(bands.len());
        let mut rest: &mut [Color] = &mut image.pixels;
        for band in bands {
            let (rows, tail) = std::mem::take(&mut rest).split_at_mut(band.pixel_count(width));
            work.push((band, rows));
            rest = tail;
        }

        let integrator = ShadingIntegrator::new(self.scene, self.index.as_ref(), &self.config);
        let spectrum = spectral_samples(self.config.dispersion_samples);
        pool.install(|| {
            work.into_par_iter().for_each(|(band, rows)| {
                self.render_band(&integrator, camera, &spectrum, band, rows);
            });
        });

        log::info!(
            "Rendered {}x{} with {} workers in {:.2?}",
            width,
            height,
            threads,
            start.elapsed()
        );
        Ok(image)
    }

    fn render_band(
        &self,
        integrator: &ShadingIntegrator,
        camera: &Camera,
        spectrum: &[(f64, Color)],
        band: Band,
        rows: &mut [Color],
    ) {
        let start = Instant::now();
        let seed = self.config.seed.wrapping_add(band.index as u64);
        let mut scratch = TraceScratch::new(self.config.max_depth, seed);
        let width = camera.image_width as usize;

        for (offset, pixel) in rows.iter_mut().enumerate() {
            let x = (offset % width) as u32;
            let y = band.y_start + (offset / width) as u32;
            *pixel = render_pixel(integrator, camera, &self.config, spectrum, x, y, &mut scratch);
        }

        log::debug!(
            "Band {} (rows {}..{}) done in {:.2?}",
            band.index,
            band.y_start,
            band.y_end,
            start.elapsed()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accel::AccelKind;
    use crate::error::RenderError;
    use refrax_core::{Light, PhongMaterial, Quad, SolidColor, Sphere};
    use refrax_math::Vec3;

    const BACKGROUND: Color = Color::new(0.1, 0.2, 0.3);

    fn test_scene() -> Scene {
        let mut scene = Scene::new().with_environment(SolidColor(BACKGROUND));
        let red = scene.add_material(PhongMaterial::plastic(Color::new(0.8, 0.1, 0.1), 0.5, 32.0));
        let floor = scene.add_material(PhongMaterial::matte(Color::splat(0.6)));
        let glass = scene.add_material(PhongMaterial::glass(1.5).with_dispersion(0.05));
        scene.add_primitive(Sphere::new(Vec3::new(0.0, 0.0, -4.0), 1.0, red)).unwrap();
        scene
            .add_primitive(Sphere::new(Vec3::new(1.5, -0.5, -3.0), 0.5, glass))
            .unwrap();
        scene
            .add_primitive(Quad::new(
                Vec3::new(-4.0, -1.0, 0.0),
                Vec3::new(8.0, 0.0, 0.0),
                Vec3::new(0.0, 0.0, -8.0),
                floor,
            ))
            .unwrap();
        scene.add_light(Light::point(Vec3::new(2.0, 4.0, 0.0), Color::ONE)).unwrap();
        scene
    }

    fn test_camera() -> Camera {
        Camera::new()
            .with_resolution(16, 12)
            .with_position(Vec3::ZERO, Vec3::new(0.0, 0.0, -1.0), Vec3::Y)
            .with_fov(60.0)
    }

    fn render_with(scene: &Scene, config: RenderConfig) -> ImageBuffer {
        Renderer::new(scene, config).unwrap().render(&test_camera()).unwrap()
    }

    fn assert_images_near(a: &ImageBuffer, b: &ImageBuffer) {
        assert_eq!((a.width, a.height), (b.width, b.height));
        for (pa, pb) in a.pixels.iter().zip(&b.pixels) {
            assert!((*pa - *pb).abs().max_element() < 1e-9, "{pa:?} != {pb:?}");
        }
    }

    #[test]
    fn test_linear_to_gamma() {
        assert_eq!(linear_to_gamma(0.0), 0.0);
        assert!((linear_to_gamma(1.0) - 1.0).abs() < 0.0001);
        assert!((linear_to_gamma(0.25) - 0.5).abs() < 0.0001);
    }

    #[test]
    fn test_color_to_rgba() {
        assert_eq!(color_to_rgba(Color::new(0.0, 0.25, 4.0)), [0, 127, 255, 255]);
        assert_eq!(color_to_rgba(Color::splat(-1.0)), [0, 0, 0, 255]);
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(RenderConfig::default().validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let cases: Vec<(RenderConfig, fn(&ConfigError) -> bool)> = vec![
            (
                RenderConfig { antialias: 0, ..Default::default() },
                |e| matches!(e, ConfigError::ZeroSamples("antialias")),
            ),
            (
                RenderConfig { dispersion_samples: 0, ..Default::default() },
                |e| matches!(e, ConfigError::ZeroSamples("dispersion_samples")),
            ),
            (
                RenderConfig { max_depth: 33, ..Default::default() },
                |e| matches!(e, ConfigError::DepthTooLarge { depth: 33, .. }),
            ),
            (
                RenderConfig { min_contribution: -0.1, ..Default::default() },
                |e| matches!(e, ConfigError::Negative { name: "min_contribution", .. }),
            ),
            (
                RenderConfig { distance_loss: f64::NAN, ..Default::default() },
                |e| matches!(e, ConfigError::Negative { name: "distance_loss", .. }),
            ),
            (
                RenderConfig {
                    attenuation: Attenuation { quadratic: -1.0, ..Default::default() },
                    ..Default::default()
                },
                |e| matches!(e, ConfigError::Negative { name: "attenuation.quadratic", .. }),
            ),
            (
                RenderConfig { threads: Some(0), ..Default::default() },
                |e| matches!(e, ConfigError::ZeroThreads),
            ),
            (
                RenderConfig {
                    accel: AccelSettings { grid_density: 0.0, ..Default::default() },
                    ..Default::default()
                },
                |e| matches!(e, ConfigError::InvalidAccel(_)),
            ),
        ];

        for (config, expected) in cases {
            let err = config.validate().unwrap_err();
            assert!(expected(&err), "unexpected error: {err}");
        }
        assert!(RenderConfig { max_depth: 32, ..Default::default() }.validate().is_ok());
    }

    #[test]
    fn test_config_json_round_trip() {
        let config = RenderConfig {
            antialias: 3,
            max_depth: 7,
            threads: Some(4),
            seed: 99,
            accel: AccelSettings::default().with_kind(AccelKind::PlaneSplit),
            ..Default::default()
        };
        let json = config.to_json_string().unwrap();
        assert_eq!(RenderConfig::from_json_str(&json).unwrap(), config);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config =
            RenderConfig::from_json_str(r#"{"max_depth": 3, "accel": {"kind": "octree"}}"#).unwrap();
        assert_eq!(config.max_depth, 3);
        assert_eq!(config.accel.kind, AccelKind::Octree);
        assert_eq!(config.accel.octree_max_items, 8);
        assert_eq!(config.antialias, 1);
    }

    #[test]
    fn test_bad_json_is_rejected() {
        assert!(matches!(
            RenderConfig::from_json_str("{not json"),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            RenderConfig::from_json_str(r#"{"threads": 0}"#),
            Err(ConfigError::ZeroThreads)
        ));
    }

    #[test]
    fn test_renderer_rejects_invalid_config() {
        let scene = Scene::new();
        let result = Renderer::new(&scene, RenderConfig { antialias: 0, ..Default::default() });
        assert!(matches!(result, Err(RenderError::Config(ConfigError::ZeroSamples(_)))));
    }

    #[test]
    fn test_spectral_weights_normalized() {
        assert_eq!(spectral_samples(1), vec![(0.0, Color::ONE)]);
        for count in 2..8 {
            let samples = spectral_samples(count);
            assert_eq!(samples.len(), count as usize);
            let total = samples.iter().fold(Color::ZERO, |acc, (_, w)| acc + *w);
            assert!((total - Color::ONE).abs().max_element() < 1e-12);
        }

        // Red dominates the low end, blue the high end
        let three = spectral_samples(3);
        assert_eq!(three[0].0, -1.0);
        assert!(three[0].1.x > three[0].1.z);
        assert!(three[2].1.z > three[2].1.x);
    }

    #[test]
    fn test_render_small_scene() {
        let scene = test_scene();
        let image = render_with(&scene, RenderConfig { threads: Some(2), ..Default::default() });
        assert_eq!(image.pixels.len(), 16 * 12);
        assert!(image.pixels.iter().all(|p| p.is_finite()));

        // Top row looks over everything at the background
        for x in 0..16 {
            assert_eq!(image.get(x, 0), BACKGROUND);
        }
        // The image center looks at the red sphere
        let center = image.get(8, 6);
        assert_ne!(center, BACKGROUND);
        assert!(center.x > center.y);
    }

    #[test]
    fn test_render_independent_of_worker_count() {
        let scene = test_scene();
        let reference = render_with(&scene, RenderConfig { threads: Some(1), ..Default::default() });
        for threads in [2, 3, 5, 32] {
            let image = render_with(
                &scene,
                RenderConfig { threads: Some(threads), ..Default::default() },
            );
            assert_eq!(image, reference);
        }
    }

    #[test]
    fn test_render_same_with_every_index() {
        let scene = test_scene();
        let reference = render_with(
            &scene,
            RenderConfig {
                accel: AccelSettings::default().with_kind(AccelKind::Naive),
                ..Default::default()
            },
        );
        for kind in AccelKind::ALL {
            let image = render_with(
                &scene,
                RenderConfig {
                    accel: AccelSettings::default().with_kind(kind),
                    ..Default::default()
                },
            );
            assert_images_near(&image, &reference);
        }
    }

    #[test]
    fn test_render_with_dispersion_and_antialiasing() {
        let scene = test_scene();
        let image = render_with(
            &scene,
            RenderConfig {
                antialias: 2,
                dispersion_samples: 3,
                threads: Some(2),
                seed: 5,
                ..Default::default()
            },
        );
        assert!(image.pixels.iter().all(|p| p.is_finite()));
        // Same seed, same picture
        let again = render_with(
            &scene,
            RenderConfig {
                antialias: 2,
                dispersion_samples: 3,
                threads: Some(2),
                seed: 5,
                ..Default::default()
            },
        );
        assert_eq!(image, again);
    }

    #[test]
    fn test_save_png() {
        let mut image = ImageBuffer::new(4, 3);
        image.set(1, 2, Color::ONE);
        let path = std::env::temp_dir().join(format!("refrax_test_{}.png", std::process::id()));
        image.save_png(&path).unwrap();

        let loaded = image::open(&path).unwrap().to_rgba8();
        assert_eq!(loaded.dimensions(), (4, 3));
        assert_eq!(loaded.get_pixel(1, 2).0, [255, 255, 255, 255]);
        assert_eq!(loaded.get_pixel(0, 0).0, [0, 0, 0, 255]);
        std::fs::remove_file(&path).unwrap();
    }
}
