//! Deterministic simulation module
//!
//! All motion and contact resolution lives here. This module must stay pure
//! and deterministic:
//! - Fixed timestep only
//! - Stable iteration order (registration order)
//! - Entity add/remove deferred to the end of the host callback
//! - No rendering or platform dependencies

pub mod engine;
pub mod entity;
pub mod physics;
pub mod rect;

pub use engine::{Engine, EntityId, FrameStats, LevelContext, LoopState};
pub use entity::{Behavior, Entity, EntityKind, PlatformMotion};
pub use physics::{BoundaryContact, ContactKind, Direction, RayHit, raycast};
pub use rect::Rect;
