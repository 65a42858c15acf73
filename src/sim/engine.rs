//! The fixed-step simulation loop
//!
//! The host calls [`Engine::tick`] once per frame with a wall-clock time;
//! the engine converts the variable callback rate into a whole number of
//! fixed steps, bounded per callback so a stalled host can never trigger a
//! catch-up spiral. Entity add/remove is deferred to the end of the
//! callback: the live array is never mutated while a pass iterates it.

use std::time::Instant;

use log::{debug, info, warn};

use super::entity::{Behavior, Entity, EntityKind};
use super::physics::{self, ContactKind, Direction};
use super::rect::Rect;
use crate::consts;
use crate::tuning::PhysicsTuning;

/// Handle returned by entity registration; stable for the entity's
/// lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(u32);

/// Loop lifecycle. Paused preserves the accumulated elapsed-time state for
/// a later resume; Stopped clears it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Stopped,
    Running,
    Paused,
}

/// Level collaborator queried once per step for the current world
/// rectangle. `None` falls back to the engine's viewport.
pub trait LevelContext {
    fn world_bounds(&self) -> Option<Rect>;
}

const STEP_HISTORY: usize = 60;

/// Read-only performance counters for an external diagnostics overlay.
#[derive(Debug, Clone)]
pub struct FrameStats {
    /// Duration of the last full update callback, milliseconds.
    pub update_time_ms: f32,
    /// Duration of the last physics+collision pass, milliseconds.
    pub collision_time_ms: f32,
    /// Active, non-destroyed entities after the last callback.
    pub entity_count: usize,
    /// Rolling average fixed-step duration, milliseconds.
    pub average_step_ms: f32,
    /// Host callback rate estimate, updated once per second.
    pub fps: u32,

    step_history: [f32; STEP_HISTORY],
    step_len: usize,
    step_cursor: usize,
    frame_count: u32,
    fps_timer: f32,
}

impl Default for FrameStats {
    fn default() -> Self {
        Self {
            update_time_ms: 0.0,
            collision_time_ms: 0.0,
            entity_count: 0,
            average_step_ms: 0.0,
            fps: 0,
            step_history: [0.0; STEP_HISTORY],
            step_len: 0,
            step_cursor: 0,
            frame_count: 0,
            fps_timer: 0.0,
        }
    }
}

impl FrameStats {
    fn note_step(&mut self, ms: f32) {
        self.step_history[self.step_cursor] = ms;
        self.step_cursor = (self.step_cursor + 1) % STEP_HISTORY;
        self.step_len = (self.step_len + 1).min(STEP_HISTORY);
        let sum: f32 = self.step_history[..self.step_len].iter().sum();
        self.average_step_ms = sum / self.step_len as f32;
    }

    fn note_frame(&mut self, delta: f32) {
        self.frame_count += 1;
        self.fps_timer += delta;
        if self.fps_timer >= 1.0 {
            self.fps = (self.frame_count as f32 / self.fps_timer).round() as u32;
            self.frame_count = 0;
            self.fps_timer = 0.0;
        }
    }
}

struct EntitySlot {
    id: EntityId,
    entity: Entity,
    behavior: Option<Box<dyn Behavior>>,
}

struct ContactEvent {
    target: usize,
    other: Option<usize>,
    direction: Direction,
    kind: ContactKind,
    out_of_bounds: bool,
}

/// Orchestrates integration, the physics pass and contact dispatch for one
/// level's worth of entities. All collaborators are explicit: tuning and
/// the viewport fallback arrive at construction, the level context through
/// [`Engine::set_level`].
pub struct Engine {
    tuning: PhysicsTuning,
    viewport: Rect,
    level: Option<Box<dyn LevelContext>>,

    state: LoopState,
    slots: Vec<EntitySlot>,
    pending_add: Vec<EntitySlot>,
    pending_remove: Vec<EntityId>,
    next_id: u32,

    last_time: Option<f64>,
    accumulator: f32,
    interpolation: f32,
    stats: FrameStats,
}

impl Engine {
    pub fn new(tuning: PhysicsTuning, viewport: Rect) -> Self {
        Self {
            tuning,
            viewport,
            level: None,
            state: LoopState::Stopped,
            slots: Vec::new(),
            pending_add: Vec::new(),
            pending_remove: Vec::new(),
            next_id: 1,
            last_time: None,
            accumulator: 0.0,
            interpolation: 0.0,
            stats: FrameStats::default(),
        }
    }

    pub fn set_level(&mut self, level: Box<dyn LevelContext>) {
        self.level = Some(level);
    }

    pub fn set_viewport(&mut self, viewport: Rect) {
        self.viewport = viewport;
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn tuning(&self) -> &PhysicsTuning {
        &self.tuning
    }

    /// Fraction (0-1) of the pending fixed step, for blending
    /// `previous_position` toward `position` at render time.
    pub fn interpolation(&self) -> f32 {
        self.interpolation
    }

    pub fn stats(&self) -> &FrameStats {
        &self.stats
    }

    pub fn start(&mut self) {
        if self.state == LoopState::Running {
            warn!("engine is already running");
            return;
        }
        self.accumulator = 0.0;
        self.last_time = None;
        self.interpolation = 0.0;
        self.state = LoopState::Running;
        info!("engine started");
    }

    pub fn pause(&mut self) {
        if self.state != LoopState::Running {
            return;
        }
        self.state = LoopState::Paused;
        info!("engine paused");
    }

    /// Re-bases the clock so the pause gap does not land in the
    /// accumulator; accumulated step fraction is preserved.
    pub fn resume(&mut self) {
        if self.state != LoopState::Paused {
            return;
        }
        self.last_time = None;
        self.state = LoopState::Running;
        info!("engine resumed");
    }

    pub fn stop(&mut self) {
        if self.state == LoopState::Stopped {
            warn!("engine is not running");
            return;
        }
        self.state = LoopState::Stopped;
        self.accumulator = 0.0;
        self.last_time = None;
        self.interpolation = 0.0;
        info!("engine stopped");
    }

    /// Enqueue an entity without a behavior; registered between callbacks,
    /// visible starting the following step.
    pub fn add_entity(&mut self, entity: Entity) -> EntityId {
        self.enqueue(entity, None)
    }

    /// Enqueue an entity together with its behavior.
    pub fn add_entity_with(&mut self, entity: Entity, behavior: Box<dyn Behavior>) -> EntityId {
        self.enqueue(entity, Some(behavior))
    }

    fn enqueue(&mut self, entity: Entity, behavior: Option<Box<dyn Behavior>>) -> EntityId {
        let id = EntityId(self.next_id);
        self.next_id += 1;
        self.pending_add.push(EntitySlot {
            id,
            entity,
            behavior,
        });
        id
    }

    /// Enqueue removal; applied between callbacks.
    pub fn remove_entity(&mut self, id: EntityId) {
        self.pending_remove.push(id);
    }

    /// Look up an entity, registered or still pending; destroyed entities
    /// stay addressable until the deferred queues purge them.
    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.slots
            .iter()
            .chain(self.pending_add.iter())
            .find(|slot| slot.id == id)
            .map(|slot| &slot.entity)
    }

    pub fn entity_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.slots
            .iter_mut()
            .chain(self.pending_add.iter_mut())
            .find(|slot| slot.id == id)
            .map(|slot| &mut slot.entity)
    }

    /// Renderable view: every registered, non-destroyed entity.
    pub fn entities(&self) -> impl Iterator<Item = (EntityId, &Entity)> {
        self.slots
            .iter()
            .filter(|slot| !slot.entity.is_destroyed())
            .map(|slot| (slot.id, &slot.entity))
    }

    /// One host callback. No-op unless Running; a callback in flight is
    /// never re-entered because the host only sees control again when this
    /// returns.
    pub fn tick(&mut self, now: f64) {
        if self.state != LoopState::Running {
            return;
        }

        let update_start = Instant::now();
        let delta = match self.last_time {
            Some(last) => (now - last).max(0.0) as f32,
            None => 0.0,
        };
        self.last_time = Some(now);
        self.accumulator += delta;

        let h = self.tuning.fixed_dt;
        let mut steps = 0;
        while self.accumulator >= h && steps < self.tuning.max_steps_per_tick {
            let step_start = Instant::now();
            self.step(h);
            self.stats
                .note_step(step_start.elapsed().as_secs_f32() * 1000.0);
            self.accumulator -= h;
            steps += 1;
        }

        // The host fell too far behind (tab stall, debugger). Catching up
        // would take longer than the time it covers; sacrifice fidelity and
        // drop the backlog instead.
        if self.accumulator > h * consts::ACCUMULATOR_DISCARD_STEPS {
            warn!(
                "simulation fell {:.0} ms behind; discarding backlog",
                self.accumulator * 1000.0
            );
            self.accumulator = 0.0;
        }

        self.interpolation = self.accumulator / h;

        self.stats.update_time_ms = update_start.elapsed().as_secs_f32() * 1000.0;
        self.stats.entity_count = self
            .slots
            .iter()
            .filter(|s| s.entity.active && !s.entity.is_destroyed())
            .count();
        self.stats.note_frame(delta);

        self.apply_pending();
    }

    /// One fixed step: integrate everything, run each behavior's update,
    /// then the physics+collision pass.
    fn step(&mut self, h: f32) {
        for slot in &mut self.slots {
            slot.entity.integrate(h);
            if slot.entity.active
                && !slot.entity.is_destroyed()
                && let Some(mut behavior) = slot.behavior.take()
            {
                behavior.update(&mut slot.entity, h);
                slot.behavior = Some(behavior);
            }
        }

        let collision_start = Instant::now();
        self.physics_pass(h);
        self.stats.collision_time_ms = collision_start.elapsed().as_secs_f32() * 1000.0;
    }

    fn physics_pass(&mut self, h: f32) {
        let world = self
            .level
            .as_ref()
            .and_then(|level| level.world_bounds())
            .unwrap_or(self.viewport);

        // Ground state is re-proven every step; gravity and friction apply
        // to everything flagged for them.
        for slot in &mut self.slots {
            let e = &mut slot.entity;
            if !e.active || e.is_destroyed() {
                continue;
            }
            e.is_grounded = false;
            if e.use_gravity {
                physics::apply_gravity(e, &self.tuning, h);
            }
            if e.use_friction {
                physics::apply_friction(e, &self.tuning, h);
            }
        }

        let len = self.slots.len();
        let mut collidable = vec![false; len];
        for (i, slot) in self.slots.iter().enumerate() {
            let e = &slot.entity;
            if !e.active || e.is_destroyed() || !e.collision_enabled {
                continue;
            }
            if e.collision_bounds().is_degenerate() {
                warn!(
                    "entity {:?} has degenerate collision bounds, skipping physics",
                    slot.id
                );
                continue;
            }
            collidable[i] = true;
        }

        let platforms: Vec<usize> = (0..len)
            .filter(|&i| collidable[i] && self.slots[i].entity.is_platform)
            .collect();

        let mut events: Vec<ContactEvent> = Vec::new();

        // Platform contacts: resolve immediately so one entity can seat
        // against several platforms in the same step. Only the moving side
        // is notified.
        for i in 0..len {
            if !collidable[i] || self.slots[i].entity.is_platform {
                continue;
            }
            for &p in &platforms {
                let (slot, platform) = pair_mut(&mut self.slots, i, p);
                if !physics::aabb_overlap(&slot.entity, &platform.entity) {
                    continue;
                }
                let direction = physics::collision_direction(&slot.entity, &platform.entity);
                if direction == Direction::None {
                    continue;
                }
                if platform.entity.one_way && direction != Direction::Top {
                    continue;
                }
                physics::resolve_collision(
                    &mut slot.entity,
                    &platform.entity.collision_bounds(),
                    direction,
                );
                if direction == Direction::Top {
                    slot.entity.is_grounded = true;
                }
                events.push(ContactEvent {
                    target: i,
                    other: Some(p),
                    direction,
                    kind: ContactKind::Platform,
                    out_of_bounds: false,
                });
            }
        }

        // World boundary: left/right/top clamp, bottom crossing is only
        // reported.
        for i in 0..len {
            if !collidable[i] {
                continue;
            }
            for contact in physics::boundary_contacts(&mut self.slots[i].entity, &world) {
                events.push(ContactEvent {
                    target: i,
                    other: None,
                    direction: contact.direction,
                    kind: ContactKind::Boundary,
                    out_of_bounds: contact.out_of_bounds,
                });
            }
        }

        // Entity pairs, i < j so each pair is tested once. Platforms were
        // handled by their dedicated pass above.
        for i in 0..len {
            if !collidable[i] || self.slots[i].entity.is_platform {
                continue;
            }
            for j in (i + 1)..len {
                if !collidable[j] || self.slots[j].entity.is_platform {
                    continue;
                }
                let a = &self.slots[i].entity;
                let b = &self.slots[j].entity;
                if !physics::aabb_overlap(a, b) {
                    continue;
                }
                let direction = if stomp_pair(a.kind, b.kind) {
                    physics::collision_direction_with_velocity(a, b)
                } else {
                    physics::collision_direction(a, b)
                };
                events.push(ContactEvent {
                    target: i,
                    other: Some(j),
                    direction,
                    kind: ContactKind::Object,
                    out_of_bounds: false,
                });
                events.push(ContactEvent {
                    target: j,
                    other: Some(i),
                    direction: direction.opposite(),
                    kind: ContactKind::Object,
                    out_of_bounds: false,
                });
            }
        }

        self.dispatch(events);
    }

    /// Deliver queued notifications after the pass. The behavior is lifted
    /// out of its slot so it can mutate its own body while reading the
    /// other side.
    fn dispatch(&mut self, events: Vec<ContactEvent>) {
        for ev in events {
            let slot = &mut self.slots[ev.target];
            let Some(mut behavior) = slot.behavior.take() else {
                if ev.out_of_bounds {
                    slot.entity.destroy();
                }
                continue;
            };

            match ev.other {
                Some(j) => {
                    let (slot, other) = pair_mut(&mut self.slots, ev.target, j);
                    behavior.on_collision(
                        &mut slot.entity,
                        Some(&other.entity),
                        ev.direction,
                        ev.kind,
                    );
                }
                None => {
                    let slot = &mut self.slots[ev.target];
                    if ev.out_of_bounds {
                        behavior.on_out_of_bounds(&mut slot.entity);
                    }
                    behavior.on_collision(&mut slot.entity, None, ev.direction, ev.kind);
                }
            }

            self.slots[ev.target].behavior = Some(behavior);
        }
    }

    /// Apply the deferred queues: purge destroyed and removed entities,
    /// then register the additions.
    fn apply_pending(&mut self) {
        if !self.pending_remove.is_empty() || self.slots.iter().any(|s| s.entity.is_destroyed()) {
            let removals = std::mem::take(&mut self.pending_remove);
            self.slots
                .retain(|slot| !slot.entity.is_destroyed() && !removals.contains(&slot.id));
        }
        if !self.pending_add.is_empty() {
            debug!("registering {} entities", self.pending_add.len());
            self.slots.append(&mut self.pending_add);
        }
    }
}

fn stomp_pair(a: EntityKind, b: EntityKind) -> bool {
    matches!(
        (a, b),
        (EntityKind::Player, EntityKind::Enemy) | (EntityKind::Enemy, EntityKind::Player)
    )
}

fn pair_mut(slots: &mut [EntitySlot], a: usize, b: usize) -> (&mut EntitySlot, &mut EntitySlot) {
    debug_assert_ne!(a, b);
    if a < b {
        let (lo, hi) = slots.split_at_mut(b);
        (&mut lo[a], &mut hi[0])
    } else {
        let (lo, hi) = slots.split_at_mut(a);
        (&mut hi[0], &mut lo[b])
    }
}
