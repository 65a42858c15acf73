//! Moving, collidable simulation entities
//!
//! One flat entity type carries the physical state for every moving object
//! in a level; what a thing *does* on contact lives in its [`Behavior`],
//! dispatched per variant through the kind tag rather than an inheritance
//! chain.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::physics::{ContactKind, Direction};
use super::rect::Rect;

/// Flat variant tag. Player/enemy pairs get the velocity-aware contact
/// classification; platforms get the dedicated resolution pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EntityKind {
    Player,
    Enemy,
    Collectible,
    Platform,
    #[default]
    Prop,
}

/// Closed-form oscillation for moving platforms: the position swings around
/// `start_position` along `direction`, never accumulating drift.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlatformMotion {
    pub direction: Vec2,
    pub amplitude: f32,
    pub angular_speed: f32,
    pub start_position: Vec2,
    pub elapsed: f32,
}

impl PlatformMotion {
    pub fn new(start_position: Vec2, direction: Vec2, amplitude: f32, angular_speed: f32) -> Self {
        Self {
            direction,
            amplitude,
            angular_speed,
            start_position,
            elapsed: 0.0,
        }
    }

    pub fn position_at(&self, elapsed: f32) -> Vec2 {
        self.start_position + self.direction * (elapsed * self.angular_speed).sin() * self.amplitude
    }
}

/// Base moving, collidable unit.
///
/// `previous_position` is snapshotted once per integration step and read
/// only by render interpolation; physics never writes it directly.
/// Collision math reads `collision_offset`/`collision_size` (expressed
/// relative to `position`), never `size`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    pub kind: EntityKind,
    pub position: Vec2,
    pub previous_position: Vec2,
    pub velocity: Vec2,
    pub acceleration: Vec2,
    /// Render rectangle extent.
    pub size: Vec2,
    pub collision_offset: Vec2,
    pub collision_size: Vec2,

    pub use_gravity: bool,
    pub use_friction: bool,
    pub gravity_scale: f32,
    /// `None` uses the engine's tuned default.
    pub friction: Option<f32>,
    pub collision_enabled: bool,
    /// Confirmed top-contact with a platform during the current step.
    /// Reset at the start of every physics pass.
    pub is_grounded: bool,
    pub is_platform: bool,
    /// One-way platforms resolve top contacts only; anything else passes
    /// through.
    pub one_way: bool,

    pub active: bool,
    destroyed: bool,
    /// Seconds until self-destruction; ticked inside the step loop so
    /// deferred removal stays deterministic.
    pub despawn_timer: Option<f32>,

    pub motion: Option<PlatformMotion>,
}

impl Entity {
    pub fn new(kind: EntityKind, position: Vec2, size: Vec2) -> Self {
        Self {
            kind,
            position,
            previous_position: position,
            velocity: Vec2::ZERO,
            acceleration: Vec2::ZERO,
            size,
            collision_offset: Vec2::ZERO,
            collision_size: size,
            use_gravity: true,
            use_friction: true,
            gravity_scale: 1.0,
            friction: None,
            collision_enabled: true,
            is_grounded: false,
            is_platform: false,
            one_way: false,
            active: true,
            destroyed: false,
            despawn_timer: None,
            motion: None,
        }
    }

    /// A static platform: no gravity, no friction, flagged for the platform
    /// resolution pass.
    pub fn platform(position: Vec2, size: Vec2) -> Self {
        let mut e = Self::new(EntityKind::Platform, position, size);
        e.use_gravity = false;
        e.use_friction = false;
        e.is_platform = true;
        e
    }

    /// A platform oscillating around its spawn position.
    pub fn moving_platform(
        position: Vec2,
        size: Vec2,
        direction: Vec2,
        amplitude: f32,
        angular_speed: f32,
    ) -> Self {
        let mut e = Self::platform(position, size);
        e.motion = Some(PlatformMotion::new(position, direction, amplitude, angular_speed));
        e
    }

    /// Absolute collision rectangle for the current position.
    pub fn collision_bounds(&self) -> Rect {
        Rect::from_pos_size(self.position + self.collision_offset, self.collision_size)
    }

    /// Render rectangle for the current position.
    pub fn bounds(&self) -> Rect {
        Rect::from_pos_size(self.position, self.size)
    }

    /// Accumulate a force for the upcoming step. Acceleration is consumed
    /// and cleared by [`Entity::integrate`], so forces are per-step inputs
    /// and repeated application never silently compounds.
    pub fn apply_force(&mut self, force: Vec2) {
        self.acceleration += force;
    }

    /// One fixed integration step of length `h` seconds.
    ///
    /// Order matters: snapshot the previous position first, fold
    /// acceleration into velocity, then velocity into position. Entities
    /// with a [`PlatformMotion`] take their position from the closed form
    /// instead of the integral.
    pub fn integrate(&mut self, h: f32) {
        if !self.active || self.destroyed {
            return;
        }

        self.previous_position = self.position;

        if let Some(motion) = &mut self.motion {
            motion.elapsed += h;
            self.position = motion.position_at(motion.elapsed);
        } else {
            self.velocity += self.acceleration * h;
            self.position += self.velocity * h;
        }
        self.acceleration = Vec2::ZERO;

        if let Some(timer) = &mut self.despawn_timer {
            *timer -= h;
            if *timer <= 0.0 {
                self.despawn_timer = None;
                self.destroy();
            }
        }
    }

    /// Blend `previous_position` toward `position` for rendering between
    /// fixed steps. `alpha` is the loop's interpolation factor.
    pub fn interpolated_position(&self, alpha: f32) -> Vec2 {
        if alpha <= 0.0 {
            return self.position;
        }
        self.previous_position + (self.position - self.previous_position) * alpha
    }

    /// Reset position without leaving an interpolation artifact.
    pub fn teleport(&mut self, position: Vec2) {
        self.position = position;
        self.previous_position = position;
    }

    /// Latch destruction. Monotonic: a destroyed entity never comes back,
    /// it is excluded from every pass until the registry purges it.
    pub fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        self.destroyed = true;
        self.active = false;
    }

    #[inline]
    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }
}

/// Per-variant capability set: update logic plus contact reactions.
///
/// This is the only channel through which game rules run. Implementations
/// may mutate their own body (velocity, flags, timers) but never the
/// engine's registry; spawning and removal go through the deferred queues.
pub trait Behavior {
    /// Called once per fixed step, after the body integrated.
    fn update(&mut self, body: &mut Entity, h: f32) {
        let _ = (body, h);
    }

    /// Contact notification. `other` is `None` for world-boundary contacts.
    /// `direction` is expressed from the body's perspective and already
    /// mirrored for the second participant of a pair.
    fn on_collision(
        &mut self,
        body: &mut Entity,
        other: Option<&Entity>,
        direction: Direction,
        kind: ContactKind,
    ) {
        let _ = (body, other, direction, kind);
    }

    /// The body crossed the bottom world edge. Default: despawn.
    fn on_out_of_bounds(&mut self, body: &mut Entity) {
        body.destroy();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integrate_folds_acceleration_then_velocity() {
        let mut e = Entity::new(EntityKind::Prop, Vec2::ZERO, Vec2::splat(32.0));
        e.apply_force(Vec2::new(60.0, 0.0));
        e.integrate(1.0);
        assert_eq!(e.velocity, Vec2::new(60.0, 0.0));
        assert_eq!(e.position, Vec2::new(60.0, 0.0));
        assert_eq!(e.previous_position, Vec2::ZERO);
        // Acceleration is consumed by the step.
        assert_eq!(e.acceleration, Vec2::ZERO);
    }

    #[test]
    fn test_integrate_skips_inactive_and_destroyed() {
        let mut e = Entity::new(EntityKind::Prop, Vec2::ZERO, Vec2::splat(32.0));
        e.velocity = Vec2::new(10.0, 0.0);
        e.active = false;
        e.integrate(1.0);
        assert_eq!(e.position, Vec2::ZERO);

        e.active = true;
        e.destroy();
        e.integrate(1.0);
        assert_eq!(e.position, Vec2::ZERO);
    }

    #[test]
    fn test_interpolated_position_blends() {
        let mut e = Entity::new(EntityKind::Prop, Vec2::ZERO, Vec2::splat(32.0));
        e.velocity = Vec2::new(10.0, 0.0);
        e.integrate(1.0);
        assert_eq!(e.interpolated_position(0.0), Vec2::new(10.0, 0.0));
        assert_eq!(e.interpolated_position(0.5), Vec2::new(5.0, 0.0));
        assert_eq!(e.interpolated_position(1.0), Vec2::new(10.0, 0.0));
    }

    #[test]
    fn test_collision_bounds_follow_position_and_offset() {
        let mut e = Entity::new(EntityKind::Prop, Vec2::new(100.0, 50.0), Vec2::new(32.0, 48.0));
        e.collision_offset = Vec2::new(4.0, 8.0);
        e.collision_size = Vec2::new(24.0, 40.0);
        let b = e.collision_bounds();
        assert_eq!(b, Rect::new(104.0, 58.0, 24.0, 40.0));
    }

    #[test]
    fn test_despawn_timer_destroys() {
        let mut e = Entity::new(EntityKind::Enemy, Vec2::ZERO, Vec2::splat(32.0));
        e.despawn_timer = Some(0.05);
        e.integrate(0.02);
        assert!(!e.is_destroyed());
        e.integrate(0.02);
        assert!(!e.is_destroyed());
        e.integrate(0.02);
        assert!(e.is_destroyed());
        assert!(!e.active);
    }

    #[test]
    fn test_destroy_is_monotonic() {
        let mut e = Entity::new(EntityKind::Enemy, Vec2::ZERO, Vec2::splat(32.0));
        e.destroy();
        assert!(e.is_destroyed());
        e.active = true;
        e.destroy();
        assert!(e.is_destroyed());
    }

    #[test]
    fn test_platform_motion_oscillates_around_start() {
        use std::f32::consts::FRAC_PI_2;

        let start = Vec2::new(200.0, 300.0);
        let mut p = Entity::moving_platform(
            start,
            Vec2::new(96.0, 16.0),
            Vec2::new(1.0, 0.0),
            50.0,
            1.0,
        );

        // Quarter period: sin(pi/2) = 1, full amplitude to the right.
        p.integrate(FRAC_PI_2);
        assert!((p.position.x - (start.x + 50.0)).abs() < 1e-3);
        assert!((p.position.y - start.y).abs() < 1e-3);

        // Half period later the swing is at the opposite extreme.
        p.integrate(FRAC_PI_2);
        p.integrate(FRAC_PI_2);
        assert!((p.position.x - (start.x - 50.0)).abs() < 1e-3);
    }

    #[test]
    fn test_platform_ctor_flags() {
        let p = Entity::platform(Vec2::ZERO, Vec2::new(64.0, 16.0));
        assert!(p.is_platform);
        assert!(!p.use_gravity);
        assert!(!p.use_friction);
        assert_eq!(p.kind, EntityKind::Platform);
    }
}
