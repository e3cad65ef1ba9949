//! Light sources.

use crate::material::Color;
use refrax_math::Vec3;

/// A spherical light.
///
/// A zero radius makes it a point light. `samples` is the number of shadow
/// rays cast toward points spread over the light's disk when estimating
/// soft shadows.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Light {
    pub position: Vec3,
    pub color: Color,
    pub intensity: f64,
    pub radius: f64,
    pub samples: u32,
}

impl Light {
    /// Point light of unit intensity.
    pub fn point(position: Vec3, color: Color) -> Self {
        Self {
            position,
            color,
            intensity: 1.0,
            radius: 0.0,
            samples: 1,
        }
    }

    /// Give the light a physical extent for soft shadows.
    pub fn with_area(mut self, radius: f64, samples: u32) -> Self {
        self.radius = radius;
        self.samples = samples;
        self
    }

    pub fn with_intensity(mut self, intensity: f64) -> Self {
        self.intensity = intensity;
        self
    }

    /// Emitted color scaled by intensity.
    pub fn radiance(&self) -> Color {
        self.color * self.intensity
    }
}
