//! Material trait and the Phong surface model.

use refrax_math::Vec3;

/// Color type alias (RGB values typically 0-1)
pub type Color = Vec3;

/// Everything a material needs to know about the surface being shaded.
#[derive(Debug, Clone, Copy)]
pub struct ShadingPoint {
    pub point: Vec3,
    /// Unit normal facing the viewer
    pub normal: Vec3,
    /// Unit vector from the surface toward the viewer
    pub view: Vec3,
    pub u: f64,
    pub v: f64,
    /// True when the viewer is outside the surface
    pub front_face: bool,
}

/// Per-hit material response consumed by the shading integrator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MaterialResponse {
    pub ambient: Color,
    pub diffuse: Color,
    pub specular: Color,
    /// Phong exponent
    pub shininess: f64,
    /// Weight of the mirror-reflected ray
    pub reflection: Color,
    /// Weight of the refracted ray
    pub refraction: Color,
    /// Index of refraction of the material's interior
    pub ior: f64,
    /// Relative IOR spread across wavelengths
    pub dispersion: f64,
}

/// Trait for materials that describe how light interacts with surfaces.
pub trait Material: Send + Sync {
    fn respond(&self, point: &ShadingPoint) -> MaterialResponse;
}

/// Two-color checker pattern over surface uv coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Checker {
    /// Squares per unit of uv
    pub scale: f64,
    /// Color of the alternate squares
    pub odd: Color,
}

impl Checker {
    pub fn new(scale: f64, odd: Color) -> Self {
        Self { scale, odd }
    }

    /// Returns `even` or the odd color for the given uv.
    pub fn color_at(&self, u: f64, v: f64, even: Color) -> Color {
        let parity = (u * self.scale).floor() as i64 + (v * self.scale).floor() as i64;
        if parity.rem_euclid(2) == 0 {
            even
        } else {
            self.odd
        }
    }
}

/// Classic Whitted-style material.
///
/// Reflection and refraction weights come from Schlick's Fresnel
/// approximation whenever the material is transparent.
#[derive(Debug, Clone, PartialEq)]
pub struct PhongMaterial {
    pub color: Color,
    pub ambient: f64,
    pub diffuse: f64,
    pub specular: f64,
    pub shininess: f64,
    /// Fraction of light mirrored regardless of view angle
    pub reflectivity: f64,
    /// Fraction of light transmitted before Fresnel weighting
    pub transparency: f64,
    pub ior: f64,
    pub dispersion: f64,
    pub checker: Option<Checker>,
}

impl Default for PhongMaterial {
    fn default() -> Self {
        Self {
            color: Color::splat(0.5),
            ambient: 0.1,
            diffuse: 0.9,
            specular: 0.0,
            shininess: 32.0,
            reflectivity: 0.0,
            transparency: 0.0,
            ior: 1.0,
            dispersion: 0.0,
            checker: None,
        }
    }
}

impl PhongMaterial {
    /// Diffuse-only surface.
    pub fn matte(color: Color) -> Self {
        Self {
            color,
            ..Default::default()
        }
    }

    /// Diffuse surface with a specular highlight.
    pub fn plastic(color: Color, specular: f64, shininess: f64) -> Self {
        Self {
            color,
            specular,
            shininess,
            ..Default::default()
        }
    }

    /// Perfect mirror.
    pub fn mirror(tint: Color) -> Self {
        Self {
            color: tint,
            ambient: 0.0,
            diffuse: 0.0,
            specular: 0.0,
            reflectivity: 1.0,
            ..Default::default()
        }
    }

    /// Clear dielectric with the given index of refraction.
    pub fn glass(ior: f64) -> Self {
        Self {
            color: Color::ONE,
            ambient: 0.0,
            diffuse: 0.0,
            specular: 0.5,
            shininess: 128.0,
            transparency: 1.0,
            ior,
            ..Default::default()
        }
    }

    pub fn with_checker(mut self, checker: Checker) -> Self {
        self.checker = Some(checker);
        self
    }

    pub fn with_dispersion(mut self, dispersion: f64) -> Self {
        self.dispersion = dispersion;
        self
    }
}

impl Material for PhongMaterial {
    fn respond(&self, point: &ShadingPoint) -> MaterialResponse {
        let base = match &self.checker {
            Some(checker) => checker.color_at(point.u, point.v, self.color),
            None => self.color,
        };

        let (reflection, refraction) = if self.transparency > 0.0 {
            let cos_theta = point.view.dot(point.normal).clamp(0.0, 1.0);
            let (n1, n2) = if point.front_face {
                (1.0, self.ior)
            } else {
                (self.ior, 1.0)
            };
            let fresnel = schlick(cos_theta, n1, n2);
            (
                self.reflectivity + self.transparency * fresnel,
                self.transparency * (1.0 - fresnel),
            )
        } else {
            (self.reflectivity, 0.0)
        };

        MaterialResponse {
            ambient: base * self.ambient,
            diffuse: base * self.diffuse,
            specular: Color::splat(self.specular),
            shininess: self.shininess,
            reflection: self.color * reflection,
            refraction: self.color * refraction,
            ior: self.ior,
            dispersion: self.dispersion,
        }
    }
}

/// Schlick's approximation of the Fresnel reflectance going from medium
/// `n1` into medium `n2`. Returns 1 under total internal reflection.
pub fn schlick(cos_theta: f64, n1: f64, n2: f64) -> f64 {
    let r0 = ((n1 - n2) / (n1 + n2)).powi(2);
    let mut cos = cos_theta;
    if n1 > n2 {
        let ratio = n1 / n2;
        let sin2_t = ratio * ratio * (1.0 - cos * cos);
        if sin2_t > 1.0 {
            return 1.0;
        }
        cos = (1.0 - sin2_t).sqrt();
    }
    r0 + (1.0 - r0) * (1.0 - cos).powi(5)
}
