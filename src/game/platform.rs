//! Platform layout shared by every client and its in-simulation instances

use crate::net::protocol::PlatformSpec;
use crate::net::Position;

use super::reconciler::ReconcileError;
use super::world::{BodyHandle, BodyKind, BodyShape, BodyTag, PhysicsWorld, Renderer, Sprite};

/// Last known placement of the platform at one index
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlatformSlot {
    pub position: Position,
    /// Gap width
    pub width: i32,
}

impl From<PlatformSpec> for PlatformSlot {
    fn from(spec: PlatformSpec) -> Self {
        Self {
            position: Position::new(spec.x, spec.y),
            width: spec.width,
        }
    }
}

/// Fixed-length sequence of platform slots.
///
/// Populated once from the first non-empty roster; afterwards slots are only
/// overwritten in place and the length never changes.
#[derive(Debug, Default)]
pub struct PlatformLayout {
    slots: Vec<PlatformSlot>,
}

impl PlatformLayout {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fill the layout from a roster. Returns false if it was already filled
    /// or the roster is empty.
    pub fn populate(&mut self, specs: &[PlatformSpec]) -> bool {
        if !self.slots.is_empty() || specs.is_empty() {
            return false;
        }
        self.slots = specs.iter().copied().map(PlatformSlot::from).collect();
        true
    }

    /// Overwrite the slot at `index`
    pub fn overwrite(&mut self, index: usize, slot: PlatformSlot) -> Result<(), ReconcileError> {
        let len = self.slots.len();
        let target = self
            .slots
            .get_mut(index)
            .ok_or(ReconcileError::PlatformIndexOutOfRange { index, len })?;
        *target = slot;
        Ok(())
    }

    pub fn get(&self, index: usize) -> Option<&PlatformSlot> {
        self.slots.get(index)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PlatformSlot> {
        self.slots.iter()
    }
}

/// A platform materialized in the physics world
#[derive(Debug, Clone)]
pub struct PlatformInstance {
    pub index: usize,
    pub handle: BodyHandle,
    pub position: Position,
    pub width: i32,
    pub height: f32,
    /// The local player has stood on it since it was last placed
    pub cleared: bool,
}

impl PlatformInstance {
    pub fn spawn<W: PhysicsWorld + ?Sized>(
        world: &mut W,
        index: usize,
        slot: &PlatformSlot,
        height: f32,
    ) -> Self {
        let handle = world.create_body(
            BodyTag::Platform(index),
            BodyKind::Static,
            BodyShape::Platform {
                gap_width: slot.width as f32,
                height,
            },
            slot.position,
        );

        Self {
            index,
            handle,
            position: slot.position,
            width: slot.width,
            height,
            cleared: false,
        }
    }

    /// Upper edge of the platform
    pub fn top(&self) -> f32 {
        self.position.y + self.height
    }

    /// Move to a new place with a new gap
    pub fn reposition<W: PhysicsWorld + ?Sized>(
        &mut self,
        world: &mut W,
        position: Position,
        width: i32,
    ) {
        self.position = position;
        self.width = width;
        self.cleared = false;
        world.set_position(self.handle, position);
        world.set_shape(
            self.handle,
            BodyShape::Platform {
                gap_width: width as f32,
                height: self.height,
            },
        );
    }

    /// Move up by `rise`, keeping x and gap width
    pub fn recycle<W: PhysicsWorld + ?Sized>(&mut self, world: &mut W, rise: f32) {
        let position = Position::new(self.position.x, self.position.y + rise);
        self.reposition(world, position, self.width);
    }

    /// Sync the cached position with the world
    pub fn update<W: PhysicsWorld + ?Sized>(&mut self, world: &W) {
        if let Some(position) = world.position(self.handle) {
            self.position = position;
        }
    }

    pub fn slot(&self) -> PlatformSlot {
        PlatformSlot {
            position: self.position,
            width: self.width,
        }
    }

    pub fn render(&self, renderer: &mut dyn Renderer) {
        renderer.draw(
            Sprite::Platform {
                gap_width: self.width,
            },
            self.position,
        );
    }
}
