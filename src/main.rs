//! Headless demo driver for the hopscotch engine
//!
//! Builds a small level (ground, a one-way ledge, a moving platform, a
//! falling crate, a patrolling enemy), then pumps the fixed-step loop from
//! the host clock for a few seconds and reports frame stats. This is the
//! host contract in miniature: the host owns scheduling, the engine owns
//! simulation.

use std::thread;
use std::time::{Duration, Instant};

use glam::Vec2;
use hopscotch::sim::{Behavior, ContactKind, Direction, Engine, Entity, EntityKind, Rect};
use hopscotch::tuning::PhysicsTuning;

/// Walks back and forth, reversing at walls and world edges.
struct Patrol {
    speed: f32,
    heading: f32,
}

impl Behavior for Patrol {
    fn update(&mut self, body: &mut Entity, _h: f32) {
        body.velocity.x = self.speed * self.heading;
    }

    fn on_collision(
        &mut self,
        _body: &mut Entity,
        _other: Option<&Entity>,
        direction: Direction,
        kind: ContactKind,
    ) {
        // Boundary directions name the crossed edge; contact directions
        // name the side of the obstacle that was hit.
        match (kind, direction) {
            (ContactKind::Boundary, Direction::Left) => self.heading = 1.0,
            (ContactKind::Boundary, Direction::Right) => self.heading = -1.0,
            (_, Direction::Left) => self.heading = -1.0,
            (_, Direction::Right) => self.heading = 1.0,
            _ => {}
        }
    }
}

fn main() {
    env_logger::init();

    let viewport = Rect::new(0.0, 0.0, 800.0, 600.0);
    let mut engine = Engine::new(PhysicsTuning::default(), viewport);

    engine.add_entity(Entity::platform(
        Vec2::new(0.0, 560.0),
        Vec2::new(800.0, 40.0),
    ));
    let mut ledge = Entity::platform(Vec2::new(250.0, 440.0), Vec2::new(120.0, 16.0));
    ledge.one_way = true;
    engine.add_entity(ledge);
    engine.add_entity(Entity::moving_platform(
        Vec2::new(450.0, 380.0),
        Vec2::new(96.0, 16.0),
        Vec2::new(0.0, 1.0),
        60.0,
        1.2,
    ));

    let mut crate_box = Entity::new(
        EntityKind::Prop,
        Vec2::new(380.0, 80.0),
        Vec2::new(32.0, 32.0),
    );
    crate_box.friction = Some(0.6);
    let crate_id = engine.add_entity(crate_box);

    let mut enemy = Entity::new(
        EntityKind::Enemy,
        Vec2::new(120.0, 520.0),
        Vec2::new(32.0, 40.0),
    );
    enemy.use_friction = false;
    engine.add_entity_with(
        enemy,
        Box::new(Patrol {
            speed: 80.0,
            heading: 1.0,
        }),
    );

    engine.start();

    let clock = Instant::now();
    while clock.elapsed().as_secs_f64() < 5.0 {
        engine.tick(clock.elapsed().as_secs_f64());
        thread::sleep(Duration::from_millis(16));
    }
    engine.stop();

    let stats = engine.stats();
    log::info!(
        "simulated 5 s: {} entities, avg step {:.3} ms, last update {:.3} ms, ~{} fps",
        stats.entity_count,
        stats.average_step_ms,
        stats.update_time_ms,
        stats.fps
    );
    if let Some(c) = engine.entity(crate_id) {
        log::info!(
            "crate settled at ({:.1}, {:.1}), grounded: {}",
            c.position.x,
            c.position.y,
            c.is_grounded
        );
    }
}
