//! Remote players: last known positions and their bodies in the world

use std::collections::HashMap;

use tracing::debug;

use crate::net::Position;

use super::world::{BodyHandle, BodyKind, BodyShape, BodyTag, PhysicsWorld, Renderer, Sprite};

/// Every other client in the session, keyed by relay id
#[derive(Debug, Default)]
pub struct RemotePlayers {
    positions: HashMap<String, Position>,
    bodies: HashMap<String, BodyHandle>,
}

impl RemotePlayers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite the position of `id`
    pub fn upsert(&mut self, id: String, position: Position) {
        self.positions.insert(id, position);
    }

    /// Overwrite the position of a known peer. Unknown ids are dropped.
    pub fn update_known(&mut self, id: &str, position: Position) -> bool {
        match self.positions.get_mut(id) {
            Some(known) => {
                *known = position;
                true
            }
            None => false,
        }
    }

    /// Forget a peer. Its body goes away on the next reconcile.
    pub fn remove(&mut self, id: &str) -> bool {
        self.positions.remove(id).is_some()
    }

    pub fn position(&self, id: &str) -> Option<Position> {
        self.positions.get(id).copied()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.positions.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn body(&self, id: &str) -> Option<BodyHandle> {
        self.bodies.get(id).copied()
    }

    /// Bring bodies in line with known positions: spawn missing ones, move
    /// existing ones, destroy those whose peer left.
    pub fn reconcile<W: PhysicsWorld + ?Sized>(&mut self, world: &mut W, ball_size: f32) {
        let positions = &self.positions;
        self.bodies.retain(|id, handle| {
            let keep = positions.contains_key(id);
            if !keep {
                debug!(peer_id = %id, "Destroying remote player body");
                world.destroy_body(*handle);
            }
            keep
        });

        for (id, position) in &self.positions {
            match self.bodies.get(id) {
                Some(handle) => world.set_position(*handle, *position),
                None => {
                    let handle = world.create_body(
                        BodyTag::RemotePlayer(id.clone()),
                        BodyKind::Kinematic,
                        BodyShape::Ball { size: ball_size },
                        *position,
                    );
                    debug!(peer_id = %id, "Spawned remote player body");
                    self.bodies.insert(id.clone(), handle);
                }
            }
        }
    }

    pub fn render<W: PhysicsWorld + ?Sized>(&self, world: &W, renderer: &mut dyn Renderer) {
        for handle in self.bodies.values() {
            if let Some(position) = world.position(*handle) {
                renderer.draw(Sprite::RemotePlayer, position);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GameConstants;
    use crate::game::physics::KinematicWorld;

    #[test]
    fn unknown_ids_are_not_created_by_updates() {
        let mut remote = RemotePlayers::new();
        assert!(!remote.update_known("ghost", Position::new(1.0, 1.0)));
        assert!(remote.is_empty());
    }

    #[test]
    fn reconcile_spawns_moves_and_destroys_bodies() {
        let constants = GameConstants::default();
        let mut world = KinematicWorld::new(&constants);
        let mut remote = RemotePlayers::new();

        remote.upsert("B".to_string(), Position::new(10.0, 20.0));
        remote.reconcile(&mut world, constants.ball_size);
        let handle = remote.body("B").unwrap();
        assert_eq!(world.position(handle), Some(Position::new(10.0, 20.0)));

        remote.update_known("B", Position::new(30.0, 40.0));
        remote.reconcile(&mut world, constants.ball_size);
        assert_eq!(remote.body("B"), Some(handle));
        assert_eq!(world.position(handle), Some(Position::new(30.0, 40.0)));

        assert!(remote.remove("B"));
        remote.reconcile(&mut world, constants.ball_size);
        assert_eq!(remote.body("B"), None);
        assert_eq!(world.position(handle), None);
    }
}
