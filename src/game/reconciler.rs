//! Client-side multiplayer state reconciliation
//!
//! The reconciler owns the local view of the session: remote players, the
//! shared platform layout, leadership and camera flags. Inbound events are
//! queued by the transport's reader task and drained at the start of every
//! tick, so all state is mutated from the tick loop only.
//!
//! Leadership is claimed by the first client that sees its own player stand
//! on an uncleared platform before anyone started the camera. Two clients
//! doing so at the same moment both become leader and both emit repositions;
//! there is no tie-break.

use std::collections::BTreeSet;

use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

use crate::config::GameConstants;
use crate::net::protocol::PlatformReposition;
use crate::net::{InboundEvent, OutboundEvent, Position};

use super::camera::Camera;
use super::platform::{PlatformInstance, PlatformLayout, PlatformSlot};
use super::remote::RemotePlayers;
use super::world::{
    BodyHandle, BodyKind, BodyShape, BodyTag, Contact, ContactPhase, InputSource, PhysicsWorld,
    Renderer, Sprite, Velocity,
};

/// Sender half used by the transport to queue decoded events
pub type InboundSender = mpsc::UnboundedSender<InboundEvent>;

/// The local player's body and how many surfaces it stands on
#[derive(Debug, Clone, Copy)]
pub struct LocalPlayer {
    pub handle: BodyHandle,
    pub foot_contacts: u32,
}

pub struct Reconciler {
    constants: GameConstants,
    inbound_rx: mpsc::UnboundedReceiver<InboundEvent>,

    remote: RemotePlayers,
    layout: PlatformLayout,
    platforms: Vec<PlatformInstance>,
    platforms_materialized: bool,
    /// Slots overwritten by the network, waiting to be applied to their bodies
    pending_repositions: BTreeSet<usize>,

    leader: bool,
    connected: bool,
    local_id: Option<String>,
    player: Option<LocalPlayer>,
    camera: Camera,
    report_timer: f32,
}

impl Reconciler {
    /// Create a reconciler and the sender the transport feeds it through
    pub fn new(constants: GameConstants) -> (Self, InboundSender) {
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let camera = Camera::new(&constants);

        let reconciler = Self {
            constants,
            inbound_rx,
            remote: RemotePlayers::new(),
            layout: PlatformLayout::new(),
            platforms: Vec::new(),
            platforms_materialized: false,
            pending_repositions: BTreeSet::new(),
            leader: false,
            connected: false,
            local_id: None,
            player: None,
            camera,
            report_timer: 0.0,
        };

        (reconciler, inbound_tx)
    }

    /// Apply every queued inbound event
    pub fn process_inbound(&mut self) {
        while let Ok(event) = self.inbound_rx.try_recv() {
            let name = event.name();
            if let Err(e) = self.apply(event) {
                warn!(event = name, error = %e, "Dropping inbound event");
            }
        }
    }

    /// Apply one inbound event to the local view
    pub fn apply(&mut self, event: InboundEvent) -> Result<(), ReconcileError> {
        match event {
            InboundEvent::Connected => {
                info!("Connected, local player may spawn");
                self.connected = true;
            }
            InboundEvent::PeerId(id) => {
                info!(peer_id = %id, "Assigned peer id");
                self.local_id = Some(id);
            }
            InboundEvent::PeerJoined(id) => {
                info!(peer_id = %id, "Peer joined");
                self.remote
                    .upsert(id, Position::from(self.constants.placeholder_position));
            }
            InboundEvent::PeerLeft(id) => {
                if self.remote.remove(&id) {
                    info!(peer_id = %id, "Peer left");
                }
            }
            InboundEvent::RosterSnapshot(entries) => {
                debug!(count = entries.len(), "Received roster snapshot");
                for entry in entries {
                    self.remote.upsert(entry.id, Position::new(entry.x, entry.y));
                }
            }
            InboundEvent::PeerPosition(report) => {
                if !self
                    .remote
                    .update_known(&report.id, Position::new(report.x, report.y))
                {
                    trace!(peer_id = %report.id, "Position for unknown peer dropped");
                }
            }
            InboundEvent::PlatformRoster(specs) => {
                if self.layout.populate(&specs) {
                    debug!(count = specs.len(), "Received platform layout");
                } else {
                    debug!(count = specs.len(), "Ignoring repeated platform roster");
                }
            }
            InboundEvent::CameraStart(start) => {
                debug!(start, "Camera start toggled");
                self.camera.set_scrolling(start);
            }
            InboundEvent::PlatformReposition(reposition) => {
                let slot = PlatformSlot {
                    position: Position::new(reposition.x, reposition.y),
                    width: reposition.width,
                };
                self.layout.overwrite(reposition.index, slot)?;
                self.pending_repositions.insert(reposition.index);
            }
        }
        Ok(())
    }

    /// Run one simulation step and return the events to send to the relay
    pub fn tick<W, I>(&mut self, dt: f32, world: &mut W, input: &mut I) -> Vec<OutboundEvent>
    where
        W: PhysicsWorld + ?Sized,
        I: InputSource + ?Sized,
    {
        self.process_inbound();
        let mut outbound = Vec::new();

        // Position report and first materialization of the layout
        self.report_timer += dt;
        if let Some(player) = self.player {
            if self.report_timer >= self.constants.report_interval {
                self.report_timer = 0.0;
                if let Some(position) = world.position(player.handle) {
                    outbound.push(OutboundEvent::PeerPosition(position));
                }
            }
        }
        if !self.platforms_materialized && !self.layout.is_empty() {
            self.materialize_platforms(world);
        }

        self.apply_pending_repositions(world);

        self.handle_input(world, input);
        self.spawn_local_player(world);
        for platform in &mut self.platforms {
            platform.update(&*world);
        }

        if self.leader {
            self.recycle_platforms(world, &mut outbound);
        }

        self.remote.reconcile(world, self.constants.ball_size);

        self.camera.update(dt);
        let contacts = world.step(dt);
        self.handle_contacts(&*world, &contacts, &mut outbound);

        outbound
    }

    fn materialize_platforms<W: PhysicsWorld + ?Sized>(&mut self, world: &mut W) {
        let height = self.constants.platform_height;
        self.platforms = self
            .layout
            .iter()
            .enumerate()
            .map(|(index, slot)| PlatformInstance::spawn(world, index, slot, height))
            .collect();
        self.platforms_materialized = true;
        info!(count = self.platforms.len(), "Platforms materialized");
    }

    fn apply_pending_repositions<W: PhysicsWorld + ?Sized>(&mut self, world: &mut W) {
        for index in std::mem::take(&mut self.pending_repositions) {
            let Some(slot) = self.layout.get(index).copied() else {
                continue;
            };

            match self.platforms.get_mut(index) {
                Some(platform) => {
                    platform.reposition(world, slot.position, slot.width);
                    debug!(index, y = slot.position.y, "Applied platform reposition");
                }
                // Materialization will read the slot directly
                None => debug!(index, "Reposition before platforms exist"),
            }
        }
    }

    fn handle_input<W, I>(&mut self, world: &mut W, input: &mut I)
    where
        W: PhysicsWorld + ?Sized,
        I: InputSource + ?Sized,
    {
        let touched = input.just_touched();
        let tilt = input.accelerometer_x();

        let Some(player) = self.player else {
            return;
        };
        let Some(velocity) = world.velocity(player.handle) else {
            return;
        };

        let mut velocity = velocity;
        if touched && player.foot_contacts > 0 {
            velocity.y = self.constants.jump_velocity;
        }
        if tilt != 0.0 {
            velocity.x = self.constants.tilt_factor * tilt;
        }
        world.set_velocity(player.handle, velocity);
    }

    fn spawn_local_player<W: PhysicsWorld + ?Sized>(&mut self, world: &mut W) {
        if !self.connected || self.player.is_some() {
            return;
        }

        let position = Position::new(
            self.camera.position().x - self.constants.ball_size / 2.0,
            self.constants.ground_height,
        );
        let handle = world.create_body(
            BodyTag::LocalPlayer,
            BodyKind::Dynamic,
            BodyShape::Ball {
                size: self.constants.ball_size,
            },
            position,
        );
        world.set_velocity(handle, Velocity::default());
        self.player = Some(LocalPlayer {
            handle,
            foot_contacts: 0,
        });
        info!(x = position.x, y = position.y, "Local player spawned");
    }

    /// Leader only: move platforms that scrolled out of view to the top
    fn recycle_platforms<W: PhysicsWorld + ?Sized>(
        &mut self,
        world: &mut W,
        outbound: &mut Vec<OutboundEvent>,
    ) {
        let rise = self.constants.platform_spacing * self.constants.platform_count as f32;
        let bottom = self.camera.bottom();

        for platform in &mut self.platforms {
            if platform.top() >= bottom {
                continue;
            }

            platform.recycle(world, rise);
            let slot = platform.slot();
            if let Err(e) = self.layout.overwrite(platform.index, slot) {
                warn!(index = platform.index, error = %e, "Failed to record recycled platform");
            }

            debug!(index = platform.index, y = slot.position.y, "Recycled platform");
            outbound.push(OutboundEvent::PlatformReposition(PlatformReposition {
                index: platform.index,
                x: slot.position.x,
                y: slot.position.y,
                width: slot.width,
            }));
        }
    }

    fn handle_contacts<W: PhysicsWorld + ?Sized>(
        &mut self,
        world: &W,
        contacts: &[Contact],
        outbound: &mut Vec<OutboundEvent>,
    ) {
        let Some(player) = self.player.as_mut() else {
            return;
        };

        for contact in contacts {
            let Some(other) = contact.other(&BodyTag::LocalPlayer) else {
                continue;
            };

            match contact.phase {
                ContactPhase::End => {
                    player.foot_contacts = player.foot_contacts.saturating_sub(1);
                }
                ContactPhase::Begin => {
                    player.foot_contacts += 1;

                    let BodyTag::Platform(index) = *other else {
                        continue;
                    };
                    let Some(platform) = self.platforms.get_mut(index) else {
                        continue;
                    };
                    let Some(position) = world.position(player.handle) else {
                        continue;
                    };

                    if position.y >= platform.top() && !platform.cleared {
                        platform.cleared = true;
                        if !self.leader && !self.camera.is_scrolling() {
                            self.leader = true;
                            self.camera.set_scrolling(true);
                            outbound.push(OutboundEvent::CameraStart);
                            info!(index, "Claimed leadership, starting camera");
                        }
                    }
                }
            }
        }
    }

    /// Draw the scene
    pub fn render<W: PhysicsWorld + ?Sized>(&self, world: &W, renderer: &mut dyn Renderer) {
        if let Some(position) = self.player.and_then(|p| world.position(p.handle)) {
            renderer.draw(Sprite::LocalPlayer, position);
        }
        self.remote.render(world, renderer);
        for platform in &self.platforms {
            platform.render(renderer);
        }
    }

    pub fn is_leader(&self) -> bool {
        self.leader
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn local_id(&self) -> Option<&str> {
        self.local_id.as_deref()
    }

    pub fn local_player(&self) -> Option<LocalPlayer> {
        self.player
    }

    pub fn remote_players(&self) -> &RemotePlayers {
        &self.remote
    }

    pub fn platform_layout(&self) -> &PlatformLayout {
        &self.layout
    }

    pub fn platforms(&self) -> &[PlatformInstance] {
        &self.platforms
    }

    /// Platform indices whose bodies move on the next tick
    pub fn pending_repositions(&self) -> impl Iterator<Item = usize> + '_ {
        self.pending_repositions.iter().copied()
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }
}

/// Reconciliation errors
#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    #[error("Platform index {index} out of range (layout has {len} slots)")]
    PlatformIndexOutOfRange { index: usize, len: usize },
}
