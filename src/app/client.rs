//! Game client: wires the relay session to the reconciler and drives ticks

use std::future::Future;
use std::time::Duration;

use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, trace, warn};

use crate::config::Config;
use crate::game::world::Sprite;
use crate::game::{InboundSender, InputSource, PhysicsWorld, Reconciler, Renderer};
use crate::net::protocol::event;
use crate::net::{InboundEvent, Position, TransportSession};
use crate::util::time::{tick_duration, uptime_secs, Timer};

/// Seconds between two status lines
const STATUS_INTERVAL_SECS: u64 = 10;

/// A connected client: relay session, reconciler, world and input
pub struct GameClient<W, I> {
    config: Config,
    session: TransportSession,
    reconciler: Reconciler,
    world: W,
    input: I,
}

impl<W, I> GameClient<W, I>
where
    W: PhysicsWorld,
    I: InputSource,
{
    /// Build the client and subscribe to every inbound event
    pub fn new(config: Config, world: W, input: I) -> Self {
        let session = TransportSession::new();
        let (reconciler, inbound_tx) = Reconciler::new(config.constants.clone());
        subscribe_inbound(&session, inbound_tx);

        Self {
            config,
            session,
            reconciler,
            world,
            input,
        }
    }

    /// Connect to the configured relay. Failure leaves the client offline.
    pub async fn connect(&self) {
        self.session.connect(self.config.relay_addr).await;
    }

    /// Run one tick and send whatever it produced
    pub fn tick(&mut self, dt: f32) {
        let outbound = self.reconciler.tick(dt, &mut self.world, &mut self.input);
        for event in &outbound {
            self.session.emit_event(event);
        }
    }

    /// Draw the current scene
    pub fn render(&self, renderer: &mut dyn Renderer) {
        self.reconciler.render(&self.world, renderer);
    }

    /// Tick at the configured rate until `shutdown` resolves
    pub async fn run(mut self, shutdown: impl Future<Output = ()>) {
        let dt = self.config.tick_delta();
        let budget = tick_duration(self.config.tick_rate);
        let mut tick_interval = interval(budget);
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut status_interval = interval(Duration::from_secs(STATUS_INTERVAL_SECS));
        let mut renderer = TraceRenderer::default();
        tokio::pin!(shutdown);

        info!(tick_rate = self.config.tick_rate, "Tick loop started");

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = tick_interval.tick() => {
                    let timer = Timer::new();
                    self.tick(dt);
                    self.render(&mut renderer);
                    if timer.elapsed() > budget {
                        warn!(elapsed_us = timer.elapsed_micros(), "Tick over budget");
                    }
                }
                _ = status_interval.tick() => self.log_status(),
            }
        }

        info!(uptime_secs = uptime_secs(), "Tick loop stopped");
    }

    fn log_status(&self) {
        info!(
            connection = ?self.session.state(),
            remote_players = self.reconciler.remote_players().len(),
            platforms = self.reconciler.platform_layout().len(),
            leader = self.reconciler.is_leader(),
            camera_bottom = self.reconciler.camera().bottom(),
            camera_top = self.reconciler.camera().top(),
            "Client status"
        );
    }

    pub fn reconciler(&self) -> &Reconciler {
        &self.reconciler
    }

    pub fn session(&self) -> &TransportSession {
        &self.session
    }
}

/// Route every inbound event into the reconciler's queue.
///
/// Runs on the transport's reader task: decode, forward, never block.
fn subscribe_inbound(session: &TransportSession, inbound_tx: InboundSender) {
    for name in event::INBOUND {
        let tx = inbound_tx.clone();
        session.subscribe(name, move |payload| {
            match InboundEvent::decode(name, payload) {
                Ok(decoded) => {
                    if tx.send(decoded).is_err() {
                        debug!(event = name, "Reconciler gone, dropping event");
                    }
                }
                Err(e) => warn!(event = name, error = %e, "Dropping malformed event"),
            }
        });
    }
}

/// Renderer for headless runs: logs draw calls at trace level
#[derive(Default)]
struct TraceRenderer {
    frames: u64,
}

impl Renderer for TraceRenderer {
    fn draw(&mut self, sprite: Sprite, position: Position) {
        if matches!(sprite, Sprite::LocalPlayer) {
            self.frames += 1;
        }
        trace!(frame = self.frames, ?sprite, x = position.x, y = position.y, "draw");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GameConstants;
    use crate::game::KinematicWorld;
    use crate::net::protocol::{decode_frame, encode_frame};
    use serde_json::json;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
    use tokio::net::TcpListener;
    use tokio::time::{sleep, timeout};

    struct IdleInput;

    impl InputSource for IdleInput {
        fn just_touched(&mut self) -> bool {
            false
        }

        fn accelerometer_x(&mut self) -> f32 {
            0.0
        }
    }

    fn config(relay_addr: std::net::SocketAddr) -> Config {
        Config {
            relay_addr,
            log_level: "debug".to_string(),
            tick_rate: 60,
            bot_seed: Some(1),
            constants: GameConstants::default(),
        }
    }

    fn client(config: Config) -> GameClient<KinematicWorld, IdleInput> {
        let world = KinematicWorld::new(&config.constants);
        GameClient::new(config, world, IdleInput)
    }

    /// Tick until `done` holds or five seconds pass
    async fn tick_until<F>(client: &mut GameClient<KinematicWorld, IdleInput>, done: F)
    where
        F: Fn(&Reconciler) -> bool,
    {
        let result = timeout(Duration::from_secs(5), async {
            while !done(client.reconciler()) {
                client.tick(1.0 / 60.0);
                sleep(Duration::from_millis(5)).await;
            }
        })
        .await;
        assert!(result.is_ok(), "condition not reached in time");
    }

    #[tokio::test]
    async fn relay_events_reach_the_reconciler_and_reports_flow_back() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let relay = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let (reader, mut writer) = socket.into_split();

            let frames = [
                encode_frame("peer-id", json!({ "id": "me" })).unwrap(),
                encode_frame("peer-joined", json!({ "id": "B" })).unwrap(),
                encode_frame(
                    "platform-roster",
                    json!([
                        { "x": 200.0, "y": 300.0, "width": 100 },
                        { "x": 150.0, "y": 550.0, "width": 120 }
                    ]),
                )
                .unwrap(),
                encode_frame("peer-position", json!({ "id": "B", "x": 50, "y": "bad" })).unwrap(),
                encode_frame("peer-position", json!({ "id": "B", "x": 50, "y": 75 })).unwrap(),
            ];
            for frame in frames {
                writer.write_all(frame.as_bytes()).await.unwrap();
            }

            let mut lines = BufReader::new(reader).lines();
            loop {
                let line = lines.next_line().await.unwrap().unwrap();
                let (name, data) = decode_frame(&line).unwrap();
                if name == "peer-position" {
                    return (writer, data);
                }
            }
        });

        let mut client = client(config(addr));
        client.connect().await;

        tick_until(&mut client, |r| {
            r.remote_players().position("B") == Some(Position::new(50.0, 75.0))
                && r.platform_layout().len() == 2
                && r.local_player().is_some()
        })
        .await;

        assert_eq!(client.reconciler().local_id(), Some("me"));
        assert_eq!(client.reconciler().platforms().len(), 2);

        // Keep ticking so a position report goes out
        let report = timeout(Duration::from_secs(5), async {
            let mut relay = relay;
            loop {
                client.tick(1.0 / 60.0);
                tokio::select! {
                    result = &mut relay => return result.unwrap(),
                    _ = sleep(Duration::from_millis(5)) => {}
                }
            }
        })
        .await
        .unwrap();

        let (_writer, data) = report;
        assert!(data["x"].is_number());
        assert!(data["y"].as_f64().unwrap() >= 64.0);
    }

    #[tokio::test]
    async fn offline_client_still_ticks() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let mut client = client(config(addr));
        client.connect().await;

        for _ in 0..10 {
            client.tick(1.0 / 60.0);
        }

        assert!(!client.session().is_connected());
        assert!(!client.reconciler().is_connected());
        assert!(client.reconciler().local_player().is_none());
    }

    #[tokio::test]
    async fn run_stops_on_shutdown() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = client(config(addr));
        let result = timeout(
            Duration::from_secs(5),
            client.run(sleep(Duration::from_millis(50))),
        )
        .await;

        tokio_test::assert_ok!(result);
    }
}
