//! Recursive Whitted-style shading.
//!
//! The integrator asks the spatial index for the nearest hit, lights the
//! hit point with every scene light (soft shadows for lights with an
//! extent), then recurses along the mirror and refracted directions while
//! the accumulated contribution is still significant.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use refrax_core::{Color, Light, MaterialResponse, Scene, ShadingPoint};
use refrax_math::{orthonormal_basis, Ray, Vec3, EPSILON};

use crate::accel::SpatialIndex;
use crate::renderer::RenderConfig;

/// Lights whose disk subtends less than this (radius over distance) are
/// treated as points.
const MIN_ANGULAR_RADIUS: f64 = 1e-3;

/// Distance falloff `1 / (constant + linear·d + quadratic·d²)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Attenuation {
    pub constant: f64,
    pub linear: f64,
    pub quadratic: f64,
}

impl Default for Attenuation {
    fn default() -> Self {
        Self {
            constant: 1.0,
            linear: 0.0,
            quadratic: 0.0,
        }
    }
}

impl Attenuation {
    /// Inverse-square style falloff.
    pub fn inverse_square() -> Self {
        Self {
            constant: 0.0,
            linear: 0.0,
            quadratic: 1.0,
        }
    }

    pub fn factor(&self, distance: f64) -> f64 {
        let denominator = self.constant + self.linear * distance + self.quadratic * distance * distance;
        if denominator > EPSILON {
            1.0 / denominator
        } else {
            1.0
        }
    }
}

/// Per-worker scratch state reused across every sample a worker traces.
pub struct TraceScratch {
    /// One ray slot per recursion depth
    rays: Vec<Ray>,
    light_samples: Vec<Vec3>,
    rng: StdRng,
    dispersion_shift: f64,
}

impl TraceScratch {
    pub fn new(max_depth: u32, seed: u64) -> Self {
        Self {
            rays: vec![Ray::default(); max_depth as usize + 1],
            light_samples: Vec::new(),
            rng: StdRng::seed_from_u64(seed),
            dispersion_shift: 0.0,
        }
    }

    /// Wavelength offset applied to material IORs, in units of the
    /// material's dispersion.
    pub fn set_dispersion_shift(&mut self, shift: f64) {
        self.dispersion_shift = shift;
    }

    pub fn rng(&mut self) -> &mut StdRng {
        &mut self.rng
    }

    fn store_ray(&mut self, depth: u32, ray: Ray) {
        let slot = depth as usize;
        if slot >= self.rays.len() {
            self.rays.resize(slot + 1, Ray::default());
        }
        self.rays[slot] = ray;
    }
}

/// Mirror `direction` about `normal`.
pub fn reflect(direction: Vec3, normal: Vec3) -> Vec3 {
    direction - 2.0 * direction.dot(normal) * normal
}

/// Snell refraction of the unit `direction` through a surface whose unit
/// `normal` faces against it, with `eta` the ratio of indices (from / to).
///
/// Returns a NaN vector under total internal reflection.
pub fn refract(direction: Vec3, normal: Vec3, eta: f64) -> Vec3 {
    let cos_i = (-direction).dot(normal).min(1.0);
    let sin2_t = eta * eta * (1.0 - cos_i * cos_i);
    if sin2_t > 1.0 {
        return Vec3::NAN;
    }
    let perpendicular = eta * (direction + normal * cos_i);
    let parallel = -normal * (1.0 - sin2_t).sqrt();
    perpendicular + parallel
}

pub struct ShadingIntegrator<'a> {
    scene: &'a Scene,
    index: &'a dyn SpatialIndex,
    config: &'a RenderConfig,
}

impl<'a> ShadingIntegrator<'a> {
    pub fn new(scene: &'a Scene, index: &'a dyn SpatialIndex, config: &'a RenderConfig) -> Self {
        Self {
            scene,
            index,
            config,
        }
    }

    /// Color seen along `ray`.
    ///
    /// `depth` is the recursion level of this ray (0 for camera rays) and
    /// `contribution` the weight it carries into the final pixel.
    pub fn calculate_color(
        &self,
        ray: &Ray,
        depth: u32,
        contribution: f64,
        scratch: &mut TraceScratch,
    ) -> Color {
        scratch.store_ray(depth, *ray);
        self.shade(depth, contribution, scratch)
    }

    fn shade(&self, depth: u32, contribution: f64, scratch: &mut TraceScratch) -> Color {
        let ray = scratch.rays[depth as usize];
        let Some(hit) = self.index.calculate_hit(&ray, f64::INFINITY) else {
            return self.scene.environment().lookup(ray.direction);
        };

        let primitive = self.scene.primitive(hit.primitive);
        let surface = primitive.intersect(&ray, hit.distance);
        let point = ShadingPoint {
            point: surface.point,
            normal: surface.normal,
            view: -ray.direction.normalize_or_zero(),
            u: surface.u,
            v: surface.v,
            front_face: surface.front_face,
        };
        let response = self.scene.material(primitive.material()).respond(&point);

        let mut color = response.ambient * self.config.ambient_light;
        color += self.direct_light(&point, &response, scratch);
        if depth < self.config.max_depth {
            color += self.reflected(&point, &response, depth, contribution, scratch);
            color += self.refracted(&point, &response, depth, contribution, scratch);
        }

        if self.config.distance_loss > 0.0 {
            color *= (-self.config.distance_loss * hit.distance).exp();
        }
        color
    }

    fn direct_light(
        &self,
        point: &ShadingPoint,
        response: &MaterialResponse,
        scratch: &mut TraceScratch,
    ) -> Color {
        let mut total = Color::ZERO;
        if response.diffuse == Color::ZERO && response.specular == Color::ZERO {
            return total;
        }

        let origin = point.point + point.normal * self.config.shadow_offset;
        for light in self.scene.lights() {
            let to_light = light.position - point.point;
            let distance = to_light.length();
            if distance <= EPSILON {
                continue;
            }
            let direction = to_light / distance;
            let n_dot_l = point.normal.dot(direction);
            if n_dot_l <= 0.0 {
                continue;
            }

            let visibility = self.light_visibility(origin, light, scratch);
            if visibility <= 0.0 {
                continue;
            }

            let radiance = light.radiance() * (visibility * self.config.attenuation.factor(distance));
            total += response.diffuse * radiance * n_dot_l;

            if response.specular != Color::ZERO {
                let mirrored = reflect(-direction, point.normal);
                let highlight = mirrored.dot(point.view).max(0.0).powf(response.shininess);
                total += response.specular * radiance * highlight;
            }
        }
        total
    }

    /// Fraction of `light` visible from `origin`.
    ///
    /// Lights with an extent are sampled over their disk, facing `origin`,
    /// with `light.samples` rays stratified in radius.
    pub fn light_visibility(&self, origin: Vec3, light: &Light, scratch: &mut TraceScratch) -> f64 {
        let to_center = light.position - origin;
        let distance = to_center.length();
        if distance <= EPSILON {
            return 1.0;
        }

        if light.samples <= 1 || light.radius <= 0.0 || light.radius / distance < MIN_ANGULAR_RADIUS {
            return if self.occluded(origin, light.position) { 0.0 } else { 1.0 };
        }

        let (u, v) = orthonormal_basis(to_center / distance);
        let count = light.samples as usize;
        scratch.light_samples.clear();
        for i in 0..count {
            let r = light.radius * ((i as f64 + scratch.rng.gen::<f64>()) / count as f64).sqrt();
            let theta = std::f64::consts::TAU * scratch.rng.gen::<f64>();
            scratch
                .light_samples
                .push(light.position + u * (r * theta.cos()) + v * (r * theta.sin()));
        }

        let visible = scratch
            .light_samples
            .iter()
            .filter(|&&target| !self.occluded(origin, target))
            .count();
        visible as f64 / count as f64
    }

    /// Whether something lies strictly between `origin` and `target`.
    fn occluded(&self, origin: Vec3, target: Vec3) -> bool {
        let offset = target - origin;
        let distance = offset.length();
        if distance <= EPSILON {
            return false;
        }
        let ray = Ray::new(origin, offset / distance);
        self.index
            .calculate_hit(&ray, distance)
            .is_some_and(|hit| hit.distance < distance - EPSILON)
    }

    fn reflected(
        &self,
        point: &ShadingPoint,
        response: &MaterialResponse,
        depth: u32,
        contribution: f64,
        scratch: &mut TraceScratch,
    ) -> Color {
        let weight = contribution * response.reflection.max_element();
        if weight <= 0.0 || weight < self.config.min_contribution {
            return Color::ZERO;
        }

        let direction = reflect(-point.view, point.normal);
        let origin = point.point + point.normal * self.config.shadow_offset;
        scratch.store_ray(depth + 1, Ray::new(origin, direction));
        response.reflection * self.shade(depth + 1, weight, scratch)
    }

    fn refracted(
        &self,
        point: &ShadingPoint,
        response: &MaterialResponse,
        depth: u32,
        contribution: f64,
        scratch: &mut TraceScratch,
    ) -> Color {
        let weight = contribution * response.refraction.max_element();
        if weight <= 0.0 || weight < self.config.min_contribution {
            return Color::ZERO;
        }

        let ior = response.ior * (1.0 + response.dispersion * scratch.dispersion_shift);
        if ior <= EPSILON {
            return Color::ZERO;
        }
        let eta = if point.front_face { 1.0 / ior } else { ior };
        let direction = refract(-point.view, point.normal, eta);
        if !direction.is_finite() {
            return Color::ZERO;
        }

        let origin = point.point - point.normal * self.config.shadow_offset;
        scratch.store_ray(depth + 1, Ray::new(origin, direction));
        response.refraction * self.shade(depth + 1, weight, scratch)
    }
}
