//! Headless kinematic physics used when no engine hosts the client

use std::collections::{BTreeMap, BTreeSet};

use crate::config::GameConstants;
use crate::net::Position;

use super::world::{
    BodyHandle, BodyKind, BodyShape, BodyTag, Contact, ContactPhase, PhysicsWorld, Velocity,
};

/// Distance under which a ball counts as resting on a surface
const CONTACT_EPSILON: f32 = 0.5;

#[derive(Debug, Clone)]
struct Body {
    tag: BodyTag,
    kind: BodyKind,
    shape: BodyShape,
    position: Position,
    velocity: Velocity,
}

/// Axis-aligned world with gravity, a ground strip, two side walls and
/// platforms that can be passed only through their gap.
pub struct KinematicWorld {
    bodies: BTreeMap<BodyHandle, Body>,
    next_handle: u32,
    gravity: f32,
    left_bound: f32,
    right_bound: f32,
    /// (ball, surface) pairs touching after the last step
    touching: BTreeSet<(BodyHandle, BodyHandle)>,
}

impl KinematicWorld {
    /// Create a world sized to the viewport, with the ground already in it
    pub fn new(constants: &GameConstants) -> Self {
        let mut world = Self {
            bodies: BTreeMap::new(),
            next_handle: 0,
            gravity: constants.gravity,
            left_bound: constants.wall_width,
            right_bound: constants.viewport_width - constants.wall_width,
            touching: BTreeSet::new(),
        };
        world.create_body(
            BodyTag::Ground,
            BodyKind::Static,
            BodyShape::Ground {
                height: constants.ground_height,
            },
            Position::new(0.0, 0.0),
        );
        world
    }

    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    /// Integrate one dynamic ball and resolve it against every surface
    fn integrate(&mut self, handle: BodyHandle, dt: f32) {
        let surfaces: Vec<(BodyShape, Position)> = self
            .bodies
            .values()
            .filter(|b| b.kind == BodyKind::Static)
            .map(|b| (b.shape, b.position))
            .collect();

        let Some(body) = self.bodies.get_mut(&handle) else {
            return;
        };
        let BodyShape::Ball { size } = body.shape else {
            return;
        };

        let prev_y = body.position.y;
        body.velocity.y += self.gravity * dt;
        body.position.x += body.velocity.x * dt;
        body.position.y += body.velocity.y * dt;

        // Side walls
        if body.position.x < self.left_bound {
            body.position.x = self.left_bound;
        }
        if body.position.x + size > self.right_bound {
            body.position.x = self.right_bound - size;
        }

        for (shape, origin) in surfaces {
            if !blocks(shape, origin, body.position.x, size) {
                continue;
            }
            let (bottom, top) = surface_span(shape, origin);

            if body.velocity.y <= 0.0 && prev_y >= top - CONTACT_EPSILON && body.position.y < top
            {
                // Landed on top
                body.position.y = top;
                body.velocity.y = 0.0;
            } else if body.velocity.y > 0.0
                && prev_y + size <= bottom
                && body.position.y + size > bottom
            {
                // Bumped from below
                body.position.y = bottom - size;
                body.velocity.y = 0.0;
            }
        }
    }

    /// Ball/surface pairs currently in resting contact
    fn resting_pairs(&self) -> BTreeSet<(BodyHandle, BodyHandle)> {
        let mut pairs = BTreeSet::new();
        for (&ball_handle, ball) in self.bodies.iter().filter(|(_, b)| b.kind == BodyKind::Dynamic)
        {
            let BodyShape::Ball { size } = ball.shape else {
                continue;
            };
            for (&surface_handle, surface) in
                self.bodies.iter().filter(|(_, b)| b.kind == BodyKind::Static)
            {
                if !blocks(surface.shape, surface.position, ball.position.x, size) {
                    continue;
                }
                let (_, top) = surface_span(surface.shape, surface.position);
                if (ball.position.y - top).abs() <= CONTACT_EPSILON {
                    pairs.insert((ball_handle, surface_handle));
                }
            }
        }
        pairs
    }

    fn tag_of(&self, handle: BodyHandle) -> Option<BodyTag> {
        self.bodies.get(&handle).map(|b| b.tag.clone())
    }
}

/// Bottom and top edge of a static surface
fn surface_span(shape: BodyShape, origin: Position) -> (f32, f32) {
    match shape {
        BodyShape::Platform { height, .. } | BodyShape::Ground { height } => {
            (origin.y, origin.y + height)
        }
        BodyShape::Ball { size } => (origin.y, origin.y + size),
    }
}

/// Whether a ball spanning `[x, x + size]` overlaps the solid part of a surface
fn blocks(shape: BodyShape, origin: Position, x: f32, size: f32) -> bool {
    match shape {
        BodyShape::Ground { .. } => true,
        BodyShape::Platform { gap_width, .. } => {
            let gap_start = origin.x;
            let gap_end = origin.x + gap_width;
            x < gap_start || x + size > gap_end
        }
        BodyShape::Ball { .. } => false,
    }
}

impl PhysicsWorld for KinematicWorld {
    fn create_body(
        &mut self,
        tag: BodyTag,
        kind: BodyKind,
        shape: BodyShape,
        position: Position,
    ) -> BodyHandle {
        let handle = BodyHandle(self.next_handle);
        self.next_handle += 1;
        self.bodies.insert(
            handle,
            Body {
                tag,
                kind,
                shape,
                position,
                velocity: Velocity::default(),
            },
        );
        handle
    }

    fn destroy_body(&mut self, handle: BodyHandle) {
        self.bodies.remove(&handle);
        self.touching
            .retain(|(ball, surface)| *ball != handle && *surface != handle);
    }

    fn position(&self, handle: BodyHandle) -> Option<Position> {
        self.bodies.get(&handle).map(|b| b.position)
    }

    fn set_position(&mut self, handle: BodyHandle, position: Position) {
        if let Some(body) = self.bodies.get_mut(&handle) {
            body.position = position;
        }
    }

    fn velocity(&self, handle: BodyHandle) -> Option<Velocity> {
        self.bodies.get(&handle).map(|b| b.velocity)
    }

    fn set_velocity(&mut self, handle: BodyHandle, velocity: Velocity) {
        if let Some(body) = self.bodies.get_mut(&handle) {
            body.velocity = velocity;
        }
    }

    fn set_shape(&mut self, handle: BodyHandle, shape: BodyShape) {
        if let Some(body) = self.bodies.get_mut(&handle) {
            body.shape = shape;
        }
    }

    fn step(&mut self, dt: f32) -> Vec<Contact> {
        let dynamic: Vec<BodyHandle> = self
            .bodies
            .iter()
            .filter(|(_, b)| b.kind == BodyKind::Dynamic)
            .map(|(h, _)| *h)
            .collect();
        for handle in dynamic {
            self.integrate(handle, dt);
        }

        let now = self.resting_pairs();
        let mut contacts = Vec::new();

        for &(ball, surface) in now.difference(&self.touching) {
            if let (Some(a), Some(b)) = (self.tag_of(ball), self.tag_of(surface)) {
                contacts.push(Contact {
                    phase: ContactPhase::Begin,
                    a,
                    b,
                });
            }
        }
        for &(ball, surface) in self.touching.difference(&now) {
            if let (Some(a), Some(b)) = (self.tag_of(ball), self.tag_of(surface)) {
                contacts.push(Contact {
                    phase: ContactPhase::End,
                    a,
                    b,
                });
            }
        }

        self.touching = now;
        contacts
    }
}
