//! Keel Runtime
//!
//! Boots a world from an optional JSON config and drives a small scene for a
//! few frames.
//!
//! Usage: `keel [config.json]`

use anyhow::{Context, Result};
use keel_core::config::CoreConfig;
use keel_core::ecs::{DataComponentSystem, Entity, World};
use keel_core::math::{Quat, Vec3};

const FRAMES: usize = 3;

#[derive(Clone, Default, Debug)]
struct Spin(f32);

fn load_config() -> Result<CoreConfig> {
    let Some(path) = std::env::args().nth(1) else {
        return Ok(CoreConfig::default());
    };
    let text =
        std::fs::read_to_string(&path).with_context(|| format!("reading config {path}"))?;
    let config: CoreConfig =
        serde_json::from_str(&text).with_context(|| format!("parsing config {path}"))?;
    config.validate()?;
    tracing::info!(%path, "config loaded");
    Ok(config)
}

/// Sun with two planets, one of which has a moon.
fn build_scene(world: &mut World) -> Vec<Entity> {
    let sun = world.spawn();
    let earth = world.spawn();
    let moon = world.spawn();
    let mars = world.spawn();

    world.set_parent(earth, sun);
    world.set_parent(moon, earth);
    world.set_parent(mars, sun);

    let offsets = [
        (earth, Vec3::new(10.0, 0.0, 0.0)),
        (moon, Vec3::new(2.0, 0.0, 0.0)),
        (mars, Vec3::new(0.0, 0.0, 15.0)),
    ];
    for (entity, offset) in offsets {
        let node = world.transform_of(entity);
        world.transforms_mut().set_local_position(node, offset);
    }

    for (entity, rate) in [(sun, 0.5), (earth, 2.0)] {
        let handle = world.add_component::<DataComponentSystem<Spin>>(entity);
        if let Some(spin) = world
            .system_mut::<DataComponentSystem<Spin>>()
            .and_then(|system| system.get_mut(handle))
        {
            spin.0 = rate;
        }
    }

    vec![sun, earth, moon, mars]
}

fn step(world: &mut World, dt: f32) {
    let spins: Vec<(Entity, f32)> = match world.system::<DataComponentSystem<Spin>>() {
        Some(system) => system.iter().map(|(owner, spin)| (owner, spin.0)).collect(),
        None => return,
    };
    for (owner, rate) in spins {
        let node = world.transform_of(owner);
        let transforms = world.transforms_mut();
        if let Some(rotation) = transforms.local_rotation(node) {
            transforms.set_local_rotation(node, Quat::from_rotation_y(rate * dt) * rotation);
        }
    }
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    tracing::info!("Keel v{}", keel_core::VERSION);
    let config = load_config()?;

    let mut world = World::new(config);
    world.register_data::<Spin>()?;
    world.initialize()?;
    for ty in world.component_types() {
        let name = world.system_name(ty)?;
        tracing::debug!(%ty, name, "system ready");
    }

    let bodies = build_scene(&mut world);
    for frame in 0..FRAMES {
        step(&mut world, 1.0 / 60.0);
        for body in &bodies {
            let node = world.transform_of(*body);
            if let Some(position) = world.transforms_mut().world_position(node) {
                tracing::info!(frame, entity = %body, %position, "world position");
            }
        }
        world.end_frame();
    }

    let destroyed = world.destroy_entity(bodies[1]);
    tracing::info!(
        destroyed,
        remaining = world.entity_count(),
        transforms = world.transforms().len(),
        "destroyed earth subtree"
    );

    world.terminate()?;
    tracing::info!("Runtime shut down cleanly");
    Ok(())
}
