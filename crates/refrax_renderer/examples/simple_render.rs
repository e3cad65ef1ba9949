//! Simple ray tracer example.
//!
//! Renders a scene of spheres, a glass prism cube and a mirror wall, and
//! saves it as a PNG.
//!
//! Usage: `cargo run --example simple_render -- [config.json] [output.png]`

use std::time::Instant;

use anyhow::{Context, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use refrax_core::{Checker, Light, Mesh, PhongMaterial, Quad, Scene, SkyGradient, Sphere, Transform};
use refrax_math::DQuat;
use refrax_renderer::{Camera, Color, RenderConfig, Renderer, Vec3};

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut args = std::env::args().skip(1);
    let config = match args.next() {
        Some(path) => {
            let json = std::fs::read_to_string(&path)
                .with_context(|| format!("reading render config {path}"))?;
            RenderConfig::from_json_str(&json).with_context(|| format!("parsing {path}"))?
        }
        None => RenderConfig {
            antialias: 2,
            dispersion_samples: 3,
            max_depth: 6,
            ..Default::default()
        },
    };
    let output = args.next().unwrap_or_else(|| "output.png".to_string());

    let start = Instant::now();
    let scene = build_scene()?;
    log::info!(
        "Scene built with {} primitives in {:.2?}",
        scene.primitive_count(),
        start.elapsed()
    );

    let camera = Camera::new()
        .with_resolution(800, 450)
        .with_position(Vec3::new(13.0, 2.0, 3.0), Vec3::ZERO, Vec3::Y)
        .with_fov(20.0);

    log::info!(
        "Rendering {}x{} with the {} index, {}x{} antialiasing",
        camera.image_width,
        camera.image_height,
        config.accel.kind.name(),
        config.antialias,
        config.antialias
    );
    let renderer = Renderer::new(&scene, config)?;
    let image = renderer.render(&camera)?;
    image.save_png(&output)?;

    Ok(())
}

fn build_scene() -> Result<Scene> {
    let mut scene = Scene::new().with_environment(SkyGradient::default());

    // Ground
    let ground = scene.add_material(
        PhongMaterial::matte(Color::splat(0.8)).with_checker(Checker::new(1.0, Color::splat(0.2))),
    );
    scene.add_primitive(Quad::new(
        Vec3::new(-20.0, 0.0, 20.0),
        Vec3::new(40.0, 0.0, 0.0),
        Vec3::new(0.0, 0.0, -40.0),
        ground,
    ))?;

    // Three main spheres
    let glass = scene.add_material(PhongMaterial::glass(1.5).with_dispersion(0.02));
    let brown = scene.add_material(PhongMaterial::plastic(Color::new(0.4, 0.2, 0.1), 0.3, 16.0));
    let mirror = scene.add_material(PhongMaterial::mirror(Color::new(0.7, 0.6, 0.5)));
    scene.add_primitive(Sphere::new(Vec3::new(0.0, 1.0, 0.0), 1.0, glass))?;
    scene.add_primitive(Sphere::new(Vec3::new(-4.0, 1.0, 0.0), 1.0, brown))?;
    scene.add_primitive(Sphere::new(Vec3::new(4.0, 1.0, 0.0), 1.0, mirror))?;

    // Glass cube as a triangle mesh
    let prism = scene.add_material(PhongMaterial::glass(1.7).with_dispersion(0.05));
    let transform = Transform::from_translation(Vec3::new(2.0, 0.5, 2.5))
        .with_rotation(DQuat::from_rotation_y(0.6))
        .with_scale(Vec3::splat(0.8));
    scene.add_mesh(&Mesh::cube(), &transform, prism)?;

    // Mirror wall behind everything
    let wall = scene.add_material(PhongMaterial::mirror(Color::splat(0.9)));
    scene.add_primitive(Quad::new(
        Vec3::new(-10.0, 0.0, -6.0),
        Vec3::new(20.0, 0.0, 0.0),
        Vec3::new(0.0, 5.0, 0.0),
        wall,
    ))?;

    // Small random spheres
    let mut rng = StdRng::seed_from_u64(7);
    for a in -5..5 {
        for b in -5..5 {
            let center = Vec3::new(
                a as f64 + 0.9 * rng.gen::<f64>(),
                0.2,
                b as f64 + 0.9 * rng.gen::<f64>(),
            );
            if (center - Vec3::new(4.0, 0.2, 0.0)).length() <= 0.9 {
                continue;
            }

            let choose_mat: f64 = rng.gen();
            let material = if choose_mat < 0.8 {
                let albedo = Color::new(
                    rng.gen::<f64>() * rng.gen::<f64>(),
                    rng.gen::<f64>() * rng.gen::<f64>(),
                    rng.gen::<f64>() * rng.gen::<f64>(),
                );
                PhongMaterial::plastic(albedo, 0.2, 32.0)
            } else if choose_mat < 0.95 {
                let tint = Color::new(
                    0.5 + 0.5 * rng.gen::<f64>(),
                    0.5 + 0.5 * rng.gen::<f64>(),
                    0.5 + 0.5 * rng.gen::<f64>(),
                );
                PhongMaterial::mirror(tint)
            } else {
                PhongMaterial::glass(1.5)
            };
            let id = scene.add_material(material);
            scene.add_primitive(Sphere::new(center, 0.2, id))?;
        }
    }

    scene.add_light(Light::point(Vec3::new(5.0, 10.0, 5.0), Color::ONE).with_area(1.0, 16))?;
    scene.add_light(
        Light::point(Vec3::new(-8.0, 6.0, 4.0), Color::new(0.6, 0.7, 1.0)).with_intensity(0.5),
    )?;

    Ok(scene)
}
