//! Pinhole camera for ray generation.

use refrax_math::{Ray, Vec3};
use serde::{Deserialize, Serialize};

/// Camera for generating primary rays into the scene.
///
/// Sub-pixel positions are chosen by the caller, so a fixed set of offsets
/// always produces the same rays.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "CameraSettings", into = "CameraSettings")]
pub struct Camera {
    // Image settings
    pub image_width: u32,
    pub image_height: u32,

    // Camera positioning
    look_from: Vec3,
    look_at: Vec3,
    vup: Vec3,

    /// Vertical field of view in degrees
    vfov: f64,

    // Cached computed values (set by initialize())
    center: Vec3,
    pixel00_loc: Vec3,
    pixel_delta_u: Vec3,
    pixel_delta_v: Vec3,
    w: Vec3,
}

/// Serialized form of a [`Camera`]: only the user-facing settings. Missing
/// fields fall back to [`Camera::new`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
struct CameraSettings {
    image_width: u32,
    image_height: u32,
    look_from: Vec3,
    look_at: Vec3,
    vup: Vec3,
    vfov: f64,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Camera::new().into()
    }
}

impl From<CameraSettings> for Camera {
    fn from(settings: CameraSettings) -> Self {
        let mut camera = Self {
            image_width: settings.image_width,
            image_height: settings.image_height,
            look_from: settings.look_from,
            look_at: settings.look_at,
            vup: settings.vup,
            vfov: settings.vfov,
            center: Vec3::ZERO,
            pixel00_loc: Vec3::ZERO,
            pixel_delta_u: Vec3::ZERO,
            pixel_delta_v: Vec3::ZERO,
            w: Vec3::Z,
        };
        camera.initialize();
        camera
    }
}

impl From<Camera> for CameraSettings {
    fn from(camera: Camera) -> Self {
        Self {
            image_width: camera.image_width,
            image_height: camera.image_height,
            look_from: camera.look_from,
            look_at: camera.look_at,
            vup: camera.vup,
            vfov: camera.vfov,
        }
    }
}

impl Camera {
    /// Create a new camera with default settings.
    pub fn new() -> Self {
        CameraSettings {
            image_width: 400,
            image_height: 225,
            look_from: Vec3::ZERO,
            look_at: Vec3::new(0.0, 0.0, -1.0),
            vup: Vec3::Y,
            vfov: 90.0,
        }
        .into()
    }

    /// Set image resolution.
    pub fn with_resolution(mut self, width: u32, height: u32) -> Self {
        self.image_width = width;
        self.image_height = height;
        self.initialize();
        self
    }

    /// Set camera position.
    pub fn with_position(mut self, look_from: Vec3, look_at: Vec3, vup: Vec3) -> Self {
        self.look_from = look_from;
        self.look_at = look_at;
        self.vup = vup;
        self.initialize();
        self
    }

    /// Set the vertical field of view in degrees.
    pub fn with_fov(mut self, vfov: f64) -> Self {
        self.vfov = vfov;
        self.initialize();
        self
    }

    /// Recompute the cached viewport. Construction, deserialization and every
    /// builder method call this already.
    pub fn initialize(&mut self) {
        let width = self.image_width.max(1) as f64;
        let height = self.image_height.max(1) as f64;
        self.center = self.look_from;

        // Viewport on the plane one unit in front of the camera
        let h = (self.vfov.to_radians() / 2.0).tan();
        let viewport_height = 2.0 * h;
        let viewport_width = viewport_height * (width / height);

        self.w = (self.look_from - self.look_at).normalize_or_zero();
        let u = self.vup.cross(self.w).normalize_or_zero();
        let v = self.w.cross(u);

        let viewport_u = viewport_width * u;
        let viewport_v = -viewport_height * v;
        self.pixel_delta_u = viewport_u / width;
        self.pixel_delta_v = viewport_v / height;

        let viewport_upper_left = self.center - self.w - viewport_u / 2.0 - viewport_v / 2.0;
        self.pixel00_loc = viewport_upper_left + 0.5 * (self.pixel_delta_u + self.pixel_delta_v);
    }

    /// Ray through pixel `(x, y)` displaced by `offset` within the pixel,
    /// each component in `[-0.5, 0.5]`. Directions are normalized.
    pub fn get_ray(&self, x: u32, y: u32, offset: (f64, f64)) -> Ray {
        let pixel_sample = self.pixel00_loc
            + (x as f64 + offset.0) * self.pixel_delta_u
            + (y as f64 + offset.1) * self.pixel_delta_v;
        Ray::normalized(self.center, pixel_sample - self.center)
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::new()
    }
}
