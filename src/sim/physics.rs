//! Stateless physics over entities and rectangles
//!
//! The tricky part of a platformer core: classifying an ambiguous AABB
//! overlap into a single contact side (floor? wall? stomp?) and correcting
//! position without feeding energy back into the system. Everything here is
//! a pure function; the loop in [`super::engine`] owns ordering and state.

use glam::Vec2;
use log::warn;

use super::entity::Entity;
use super::rect::Rect;
use crate::tuning::PhysicsTuning;

/// Nominal contact side, expressed from the moving entity's perspective:
/// `Top` means "I hit the other thing from above".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    None,
    Top,
    Bottom,
    Left,
    Right,
}

impl Direction {
    /// Mirror for the second participant of a pair (TOP↔BOTTOM, LEFT↔RIGHT).
    pub fn opposite(self) -> Self {
        match self {
            Direction::Top => Direction::Bottom,
            Direction::Bottom => Direction::Top,
            Direction::Left => Direction::Right,
            Direction::Right => Direction::Left,
            Direction::None => Direction::None,
        }
    }
}

/// What the entity touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContactKind {
    Platform,
    Boundary,
    Object,
}

/// One world-edge contact produced by [`boundary_contacts`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundaryContact {
    pub direction: Direction,
    /// Bottom-edge crossing: reported, never corrected. The caller decides
    /// what falling out of the world means.
    pub out_of_bounds: bool,
}

/// Nearest ray intersection from [`raycast`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayHit {
    pub point: Vec2,
    pub distance: f32,
    /// Unit normal of the crossed face; zero when the ray starts inside.
    pub normal: Vec2,
}

/// `velocity.y += G * scale * h`, clamped to terminal fall speed. Upward
/// motion is never clamped.
pub fn apply_gravity(entity: &mut Entity, tuning: &PhysicsTuning, h: f32) {
    entity.velocity.y += tuning.gravity * entity.gravity_scale * h;
    if entity.velocity.y > tuning.terminal_velocity {
        entity.velocity.y = tuning.terminal_velocity;
    }
}

/// Exponential horizontal decay: `velocity.x *= coeff^h`. Residual speeds
/// under the threshold snap to exactly zero on both axes so idle entities
/// do not jitter.
pub fn apply_friction(entity: &mut Entity, tuning: &PhysicsTuning, h: f32) {
    let coeff = entity.friction.unwrap_or(tuning.friction);
    entity.velocity.x *= coeff.powf(h);

    if entity.velocity.x.abs() < tuning.min_velocity_threshold {
        entity.velocity.x = 0.0;
    }
    if entity.velocity.y.abs() < tuning.min_velocity_threshold {
        entity.velocity.y = 0.0;
    }
}

/// AABB overlap: both collidable, neither destroyed, rectangles intersect.
/// Symmetric in its arguments.
pub fn aabb_overlap(a: &Entity, b: &Entity) -> bool {
    if !a.collision_enabled || !b.collision_enabled {
        return false;
    }
    if a.is_destroyed() || b.is_destroyed() {
        return false;
    }
    a.collision_bounds().intersects(&b.collision_bounds())
}

/// Minimum-penetration contact classification.
///
/// The four penetration depths are compared and the smallest wins; ties
/// resolve in the fixed order TOP, BOTTOM, LEFT, RIGHT so identical
/// overlaps always reproduce the same answer. Zero or negative computed
/// overlap yields `None`.
pub fn collision_direction(a: &Entity, b: &Entity) -> Direction {
    if !aabb_overlap(a, b) {
        return Direction::None;
    }

    let ba = a.collision_bounds();
    let bb = b.collision_bounds();

    let from_top = ba.bottom() - bb.top();
    let from_bottom = bb.bottom() - ba.top();
    let from_left = ba.right() - bb.left();
    let from_right = bb.right() - ba.left();

    let min = from_top.min(from_bottom).min(from_left).min(from_right);
    if min <= 0.0 {
        return Direction::None;
    }

    if min == from_top {
        Direction::Top
    } else if min == from_bottom {
        Direction::Bottom
    } else if min == from_left {
        Direction::Left
    } else {
        Direction::Right
    }
}

/// Velocity-aware contact classification for entity-vs-entity pairs.
///
/// On the vertical axis the mover's velocity overrides raw penetration: a
/// falling `a` whose center sits above `b`'s reads TOP even when the
/// penetration test would disagree, so stomps land predictably under fast
/// relative motion. This is a tuned gameplay heuristic, not a physical
/// result.
pub fn collision_direction_with_velocity(a: &Entity, b: &Entity) -> Direction {
    if !aabb_overlap(a, b) {
        return Direction::None;
    }

    let ba = a.collision_bounds();
    let bb = b.collision_bounds();
    let delta = ba.center() - bb.center();

    let overlap_x = (ba.w + bb.w) / 2.0 - delta.x.abs();
    let overlap_y = (ba.h + bb.h) / 2.0 - delta.y.abs();
    if overlap_x <= 0.0 || overlap_y <= 0.0 {
        return Direction::None;
    }

    if overlap_x < overlap_y {
        if delta.x > 0.0 {
            Direction::Right
        } else {
            Direction::Left
        }
    } else if a.velocity.y > 0.0 && delta.y < 0.0 {
        // Falling and above: the stomp case.
        Direction::Top
    } else if a.velocity.y < 0.0 && delta.y > 0.0 {
        // Rising and below.
        Direction::Bottom
    } else if delta.y < 0.0 {
        Direction::Top
    } else {
        Direction::Bottom
    }
}

/// Positional correction: move `a` exactly to the contact boundary along
/// the resolved axis and zero the velocity component driving into the
/// surface. The other axis and the other entity are untouched.
pub fn resolve_collision(a: &mut Entity, b_bounds: &Rect, direction: Direction) {
    match direction {
        Direction::Top => {
            a.position.y = b_bounds.top() - a.collision_size.y - a.collision_offset.y;
            if a.velocity.y > 0.0 {
                a.velocity.y = 0.0;
            }
        }
        Direction::Bottom => {
            a.position.y = b_bounds.bottom() - a.collision_offset.y;
            if a.velocity.y < 0.0 {
                a.velocity.y = 0.0;
            }
        }
        Direction::Left => {
            a.position.x = b_bounds.left() - a.collision_size.x - a.collision_offset.x;
            if a.velocity.x > 0.0 {
                a.velocity.x = 0.0;
            }
        }
        Direction::Right => {
            a.position.x = b_bounds.right() - a.collision_offset.x;
            if a.velocity.x < 0.0 {
                a.velocity.x = 0.0;
            }
        }
        Direction::None => {}
    }
}

/// Positional correction plus a bounce: the pre-correction velocity along
/// the contact axis is reflected and scaled by `restitution`.
pub fn resolve_collision_elastic(
    a: &mut Entity,
    b_bounds: &Rect,
    direction: Direction,
    restitution: f32,
) {
    let incoming = a.velocity;
    resolve_collision(a, b_bounds, direction);
    match direction {
        Direction::Top | Direction::Bottom => a.velocity.y = -incoming.y * restitution,
        Direction::Left | Direction::Right => a.velocity.x = -incoming.x * restitution,
        Direction::None => {}
    }
}

/// Minimal push-out of `a` from `b` along the smaller-overlap axis, or
/// `None` when the two do not overlap.
pub fn separation_vector(a: &Entity, b: &Entity) -> Option<Vec2> {
    if !aabb_overlap(a, b) {
        return None;
    }

    let ba = a.collision_bounds();
    let bb = b.collision_bounds();

    let overlap_x = (ba.right() - bb.left()).min(bb.right() - ba.left());
    let overlap_y = (ba.bottom() - bb.top()).min(bb.bottom() - ba.top());

    if overlap_x < overlap_y {
        let sign = if ba.x < bb.x { -1.0 } else { 1.0 };
        Some(Vec2::new(overlap_x * sign, 0.0))
    } else {
        let sign = if ba.y < bb.y { -1.0 } else { 1.0 };
        Some(Vec2::new(0.0, overlap_y * sign))
    }
}

/// Standalone ground probe: a copy of the entity's bounds shifted one pixel
/// down must touch a platform top within a two-pixel tolerance. Useful for
/// behaviors that need ground state outside the collision pass.
pub fn probe_grounded<'a, I>(entity: &Entity, platforms: I) -> bool
where
    I: IntoIterator<Item = &'a Entity>,
{
    let bounds = entity.collision_bounds();
    let probe = Rect::new(bounds.x, bounds.y + 1.0, bounds.w, bounds.h);

    for platform in platforms {
        if platform.is_destroyed() {
            continue;
        }
        let pb = platform.collision_bounds();
        if probe.intersects(&pb) && (bounds.bottom() - pb.top()).abs() <= 2.0 {
            return true;
        }
    }
    false
}

/// Clamp the entity against the world rectangle.
///
/// Left, right and top edges are corrected (inbound velocity zeroed) and
/// reported. Crossing the bottom edge is only reported, flagged
/// `out_of_bounds`, so the caller can interpret it (fall death, despawn).
pub fn boundary_contacts(entity: &mut Entity, world: &Rect) -> Vec<BoundaryContact> {
    let mut contacts = Vec::new();
    let bounds = entity.collision_bounds();

    if bounds.left() < world.left() {
        entity.position.x = world.left() - entity.collision_offset.x;
        if entity.velocity.x < 0.0 {
            entity.velocity.x = 0.0;
        }
        contacts.push(BoundaryContact {
            direction: Direction::Left,
            out_of_bounds: false,
        });
    }

    if bounds.right() > world.right() {
        entity.position.x = world.right() - entity.collision_size.x - entity.collision_offset.x;
        if entity.velocity.x > 0.0 {
            entity.velocity.x = 0.0;
        }
        contacts.push(BoundaryContact {
            direction: Direction::Right,
            out_of_bounds: false,
        });
    }

    if bounds.top() < world.top() {
        entity.position.y = world.top() - entity.collision_offset.y;
        if entity.velocity.y < 0.0 {
            entity.velocity.y = 0.0;
        }
        contacts.push(BoundaryContact {
            direction: Direction::Top,
            out_of_bounds: false,
        });
    }

    // Entirely below the world: report, never clamp.
    if bounds.top() > world.bottom() {
        contacts.push(BoundaryContact {
            direction: Direction::Bottom,
            out_of_bounds: true,
        });
    }

    contacts
}

/// Slab intersection of a ray against one AABB.
///
/// `direction` should be a unit vector; distances come back in its units.
pub fn raycast_aabb(origin: Vec2, direction: Vec2, bounds: &Rect) -> Option<RayHit> {
    let inv_x = 1.0 / direction.x;
    let inv_y = 1.0 / direction.y;

    let t1 = (bounds.left() - origin.x) * inv_x;
    let t2 = (bounds.right() - origin.x) * inv_x;
    let t3 = (bounds.top() - origin.y) * inv_y;
    let t4 = (bounds.bottom() - origin.y) * inv_y;

    let tmin = t1.min(t2).max(t3.min(t4));
    let tmax = t1.max(t2).min(t3.max(t4));

    if tmax < 0.0 || tmin > tmax {
        return None;
    }

    let distance = if tmin > 0.0 { tmin } else { tmax };
    let point = origin + direction * distance;

    let eps = 0.001;
    let normal = if (point.x - bounds.left()).abs() < eps {
        Vec2::new(-1.0, 0.0)
    } else if (point.x - bounds.right()).abs() < eps {
        Vec2::new(1.0, 0.0)
    } else if (point.y - bounds.top()).abs() < eps {
        Vec2::new(0.0, -1.0)
    } else if (point.y - bounds.bottom()).abs() < eps {
        Vec2::new(0.0, 1.0)
    } else {
        Vec2::ZERO
    };

    Some(RayHit {
        point,
        distance,
        normal,
    })
}

/// Nearest ray hit over a set of entities, skipping destroyed and
/// collision-disabled ones. Degenerate (zero-length) directions return no
/// hit rather than an error.
pub fn raycast<'a, I>(origin: Vec2, direction: Vec2, max_distance: f32, targets: I) -> Option<RayHit>
where
    I: IntoIterator<Item = &'a Entity>,
{
    if direction.length_squared() == 0.0 {
        warn!("raycast with zero-length direction");
        return None;
    }

    let mut closest: Option<RayHit> = None;
    let mut closest_distance = max_distance;

    for target in targets {
        if target.is_destroyed() || !target.collision_enabled {
            continue;
        }
        let bounds = target.collision_bounds();
        if bounds.is_degenerate() {
            continue;
        }
        if let Some(hit) = raycast_aabb(origin, direction, &bounds)
            && hit.distance < closest_distance
        {
            closest_distance = hit.distance;
            closest = Some(hit);
        }
    }

    closest
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts;
    use crate::sim::entity::EntityKind;
    use proptest::prelude::*;

    fn prop_entity(x: f32, y: f32, w: f32, h: f32) -> Entity {
        Entity::new(EntityKind::Prop, Vec2::new(x, y), Vec2::new(w, h))
    }

    #[test]
    fn test_gravity_single_step_scenario() {
        // One 1/60 s step from rest: velocity ≈ 980/60, position ≈ 0.27.
        let tuning = PhysicsTuning::default();
        let h = consts::SIM_DT;
        let mut e = prop_entity(0.0, 0.0, 32.0, 32.0);

        apply_gravity(&mut e, &tuning, h);
        e.integrate(h);

        assert!((e.velocity.y - 980.0 / 60.0).abs() < 0.01);
        assert!((e.position.y - 0.272).abs() < 0.01);
    }

    #[test]
    fn test_friction_decays_and_snaps() {
        let tuning = PhysicsTuning::default();
        let mut e = prop_entity(0.0, 0.0, 32.0, 32.0);
        e.velocity = Vec2::new(100.0, 0.0);

        apply_friction(&mut e, &tuning, 1.0);
        assert!((e.velocity.x - 80.0).abs() < 0.001);

        e.velocity = Vec2::new(0.05, 0.05);
        apply_friction(&mut e, &tuning, 1.0 / 60.0);
        assert_eq!(e.velocity, Vec2::ZERO);
    }

    #[test]
    fn test_overlap_requires_flags() {
        let mut a = prop_entity(0.0, 0.0, 32.0, 32.0);
        let mut b = prop_entity(10.0, 10.0, 32.0, 32.0);
        assert!(aabb_overlap(&a, &b));

        a.collision_enabled = false;
        assert!(!aabb_overlap(&a, &b));
        a.collision_enabled = true;

        b.destroy();
        assert!(!aabb_overlap(&a, &b));
    }

    #[test]
    fn test_platform_top_contact_scenario() {
        // Entity 20×20 at (10,10), platform 20×4 at (10,28): two pixels of
        // vertical overlap resolve TOP and seat the entity on the platform.
        let mut e = prop_entity(10.0, 10.0, 20.0, 20.0);
        e.velocity = Vec2::new(0.0, 50.0);
        let p = Entity::platform(Vec2::new(10.0, 28.0), Vec2::new(20.0, 4.0));

        let dir = collision_direction(&e, &p);
        assert_eq!(dir, Direction::Top);

        resolve_collision(&mut e, &p.collision_bounds(), dir);
        assert_eq!(e.collision_bounds().bottom(), 28.0);
        assert!(e.velocity.y <= 0.0);
    }

    #[test]
    fn test_direction_tie_breaks_top() {
        // Identical rectangles at the same spot: all four penetrations are
        // equal, the fixed comparison order answers TOP.
        let a = prop_entity(0.0, 0.0, 10.0, 10.0);
        let b = prop_entity(0.0, 0.0, 10.0, 10.0);
        assert_eq!(collision_direction(&a, &b), Direction::Top);
        assert_eq!(collision_direction(&b, &a), Direction::Top);
    }

    #[test]
    fn test_side_contact_resolves_horizontally() {
        let mut e = prop_entity(0.0, 0.0, 20.0, 20.0);
        e.velocity = Vec2::new(80.0, 0.0);
        let wall = Entity::platform(Vec2::new(18.0, -20.0), Vec2::new(10.0, 60.0));

        let dir = collision_direction(&e, &wall);
        assert_eq!(dir, Direction::Left);

        resolve_collision(&mut e, &wall.collision_bounds(), dir);
        assert_eq!(e.collision_bounds().right(), 18.0);
        assert_eq!(e.velocity.x, 0.0);
    }

    #[test]
    fn test_stomp_classifies_top_when_falling_from_above() {
        // Player center above the enemy's and falling: TOP, even though the
        // vertical penetration is no smaller than the horizontal.
        let mut player = Entity::new(
            EntityKind::Player,
            Vec2::new(0.0, 0.0),
            Vec2::new(32.0, 32.0),
        );
        player.velocity = Vec2::new(0.0, 300.0);
        let enemy = Entity::new(
            EntityKind::Enemy,
            Vec2::new(2.0, 20.0),
            Vec2::new(32.0, 32.0),
        );

        assert_eq!(
            collision_direction_with_velocity(&player, &enemy),
            Direction::Top
        );
        // Mirrored for the enemy side.
        assert_eq!(Direction::Top.opposite(), Direction::Bottom);
    }

    #[test]
    fn test_rising_from_below_classifies_bottom() {
        let mut player = Entity::new(
            EntityKind::Player,
            Vec2::new(0.0, 20.0),
            Vec2::new(32.0, 32.0),
        );
        player.velocity = Vec2::new(0.0, -200.0);
        let enemy = Entity::new(EntityKind::Enemy, Vec2::new(2.0, 0.0), Vec2::new(32.0, 32.0));

        assert_eq!(
            collision_direction_with_velocity(&player, &enemy),
            Direction::Bottom
        );
    }

    #[test]
    fn test_elastic_response_reflects_pre_contact_velocity() {
        let mut ball = prop_entity(0.0, 10.0, 10.0, 10.0);
        ball.velocity = Vec2::new(0.0, 100.0);
        let floor = Entity::platform(Vec2::new(-10.0, 18.0), Vec2::new(40.0, 10.0));

        resolve_collision_elastic(
            &mut ball,
            &floor.collision_bounds(),
            Direction::Top,
            consts::BOUNCE_DAMPING,
        );
        assert_eq!(ball.collision_bounds().bottom(), 18.0);
        assert!((ball.velocity.y - (-30.0)).abs() < 0.001);
    }

    #[test]
    fn test_separation_vector_pushes_out_smaller_axis() {
        let a = prop_entity(0.0, 0.0, 20.0, 20.0);
        let b = prop_entity(18.0, -5.0, 20.0, 30.0);
        let sep = separation_vector(&a, &b).unwrap();
        assert_eq!(sep, Vec2::new(-2.0, 0.0));

        let c = prop_entity(100.0, 100.0, 10.0, 10.0);
        assert!(separation_vector(&a, &c).is_none());
    }

    #[test]
    fn test_probe_grounded() {
        let e = prop_entity(10.0, 8.0, 20.0, 20.0);
        let ground = Entity::platform(Vec2::new(0.0, 28.0), Vec2::new(100.0, 8.0));
        assert!(probe_grounded(&e, [&ground]));

        let hovering = prop_entity(10.0, 0.0, 20.0, 20.0);
        assert!(!probe_grounded(&hovering, [&ground]));
    }

    #[test]
    fn test_left_boundary_clamp_scenario() {
        let world = Rect::new(0.0, 0.0, 800.0, 600.0);
        let mut e = prop_entity(-50.0, 100.0, 32.0, 32.0);
        e.velocity = Vec2::new(-120.0, 0.0);

        let contacts = boundary_contacts(&mut e, &world);
        assert_eq!(contacts.len(), 1);
        assert_eq!(contacts[0].direction, Direction::Left);
        assert!(!contacts[0].out_of_bounds);
        assert_eq!(e.collision_bounds().left(), 0.0);
        assert_eq!(e.velocity.x, 0.0);
    }

    #[test]
    fn test_bottom_crossing_reported_not_clamped() {
        let world = Rect::new(0.0, 0.0, 800.0, 600.0);
        let mut e = prop_entity(100.0, 650.0, 32.0, 32.0);
        e.velocity = Vec2::new(0.0, 200.0);

        let contacts = boundary_contacts(&mut e, &world);
        assert_eq!(contacts.len(), 1);
        assert_eq!(contacts[0].direction, Direction::Bottom);
        assert!(contacts[0].out_of_bounds);
        // Still falling, still below the world.
        assert_eq!(e.position.y, 650.0);
        assert_eq!(e.velocity.y, 200.0);
    }

    #[test]
    fn test_raycast_nearest_hit_and_normal() {
        let near = prop_entity(50.0, -10.0, 20.0, 20.0);
        let far = prop_entity(120.0, -10.0, 20.0, 20.0);

        let hit = raycast(
            Vec2::ZERO,
            Vec2::new(1.0, 0.0),
            1000.0,
            [&near, &far],
        )
        .unwrap();
        assert!((hit.distance - 50.0).abs() < 0.001);
        assert_eq!(hit.normal, Vec2::new(-1.0, 0.0));
        assert!((hit.point.x - 50.0).abs() < 0.001);
    }

    #[test]
    fn test_raycast_degenerate_direction() {
        let target = prop_entity(10.0, -10.0, 20.0, 20.0);
        assert!(raycast(Vec2::ZERO, Vec2::ZERO, 100.0, [&target]).is_none());
    }

    #[test]
    fn test_raycast_no_targets() {
        let none: [&Entity; 0] = [];
        assert!(raycast(Vec2::ZERO, Vec2::new(0.0, 1.0), 100.0, none).is_none());
    }

    proptest! {
        #[test]
        fn prop_gravity_never_exceeds_terminal(
            vy in -2000.0f32..2000.0,
            scale in 0.1f32..3.0,
            steps in 1usize..120,
        ) {
            let tuning = PhysicsTuning::default();
            let mut e = prop_entity(0.0, 0.0, 32.0, 32.0);
            e.velocity.y = vy;
            e.gravity_scale = scale;
            for _ in 0..steps {
                apply_gravity(&mut e, &tuning, consts::SIM_DT);
            }
            prop_assert!(e.velocity.y <= tuning.terminal_velocity);
        }

        #[test]
        fn prop_overlap_is_symmetric(
            ax in -500.0f32..500.0, ay in -500.0f32..500.0,
            aw in 1.0f32..100.0, ah in 1.0f32..100.0,
            bx in -500.0f32..500.0, by in -500.0f32..500.0,
            bw in 1.0f32..100.0, bh in 1.0f32..100.0,
        ) {
            let a = prop_entity(ax, ay, aw, ah);
            let b = prop_entity(bx, by, bw, bh);
            prop_assert_eq!(aabb_overlap(&a, &b), aabb_overlap(&b, &a));
        }

        #[test]
        fn prop_direction_is_reproducible(
            ax in -50.0f32..50.0, ay in -50.0f32..50.0,
            bx in -50.0f32..50.0, by in -50.0f32..50.0,
        ) {
            let a = prop_entity(ax, ay, 32.0, 32.0);
            let b = prop_entity(bx, by, 32.0, 32.0);
            prop_assert_eq!(collision_direction(&a, &b), collision_direction(&a, &b));
        }
    }
}
