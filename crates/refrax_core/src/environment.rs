//! Background lookups for rays that leave the scene.

use crate::material::Color;
use refrax_math::Vec3;

/// Maps a ray direction to the background color seen along it.
pub trait Environment: Send + Sync {
    fn lookup(&self, direction: Vec3) -> Color;
}

/// Uniform background.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolidColor(pub Color);

impl Environment for SolidColor {
    fn lookup(&self, _direction: Vec3) -> Color {
        self.0
    }
}

/// Vertical blend from `horizon` (looking down) to `zenith` (looking up).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SkyGradient {
    pub horizon: Color,
    pub zenith: Color,
}

impl Default for SkyGradient {
    fn default() -> Self {
        Self {
            horizon: Color::new(1.0, 1.0, 1.0),
            zenith: Color::new(0.5, 0.7, 1.0),
        }
    }
}

impl Environment for SkyGradient {
    fn lookup(&self, direction: Vec3) -> Color {
        let unit_direction = direction.normalize_or_zero();
        let a = 0.5 * (unit_direction.y + 1.0);
        self.horizon * (1.0 - a) + self.zenith * a
    }
}
