//! Interfaces to the collaborators hosting the game: physics, input, rendering

use crate::net::Position;

/// Velocities share the 2D vector type with positions
pub type Velocity = Position;

/// Opaque handle to a body owned by a [`PhysicsWorld`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BodyHandle(pub u32);

/// User data attached to a body, reported back in contacts
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BodyTag {
    LocalPlayer,
    RemotePlayer(String),
    /// Platform at this slot index
    Platform(usize),
    Ground,
}

/// How the world moves a body
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyKind {
    /// Affected by gravity and collisions
    Dynamic,
    /// Moved only through `set_position`
    Kinematic,
    /// Never moves on its own
    Static,
}

/// Collision geometry.
///
/// Positions are the bottom-left corner of a ball, the left edge of a
/// platform's gap, and the origin of the ground.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BodyShape {
    Ball { size: f32 },
    /// Full-width bar with a gap of `gap_width` starting at the body's x
    Platform { gap_width: f32, height: f32 },
    Ground { height: f32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContactPhase {
    Begin,
    End,
}

/// Two bodies started or stopped touching
#[derive(Debug, Clone, PartialEq)]
pub struct Contact {
    pub phase: ContactPhase,
    pub a: BodyTag,
    pub b: BodyTag,
}

impl Contact {
    /// The tag of the other body if `tag` takes part in this contact
    pub fn other(&self, tag: &BodyTag) -> Option<&BodyTag> {
        if &self.a == tag {
            Some(&self.b)
        } else if &self.b == tag {
            Some(&self.a)
        } else {
            None
        }
    }
}

/// Rigid-body simulation the client steps once per tick
pub trait PhysicsWorld {
    fn create_body(
        &mut self,
        tag: BodyTag,
        kind: BodyKind,
        shape: BodyShape,
        position: Position,
    ) -> BodyHandle;

    fn destroy_body(&mut self, handle: BodyHandle);

    fn position(&self, handle: BodyHandle) -> Option<Position>;

    fn set_position(&mut self, handle: BodyHandle, position: Position);

    fn velocity(&self, handle: BodyHandle) -> Option<Velocity>;

    fn set_velocity(&mut self, handle: BodyHandle, velocity: Velocity);

    fn set_shape(&mut self, handle: BodyHandle, shape: BodyShape);

    /// Advance the simulation, returning contacts that began or ended
    fn step(&mut self, dt: f32) -> Vec<Contact>;
}

/// Device input polled once per tick
pub trait InputSource {
    /// A touch began since the last poll
    fn just_touched(&mut self) -> bool;

    /// Device tilt along the X axis
    fn accelerometer_x(&mut self) -> f32;
}

/// Sprites the client knows how to draw
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Sprite {
    LocalPlayer,
    RemotePlayer,
    Platform { gap_width: i32 },
}

/// Draws textured quads
pub trait Renderer {
    fn draw(&mut self, sprite: Sprite, position: Position);
}
