//! Relay protocol message definitions
//! These are the wire types for client-relay communication.
//!
//! Every frame is one JSON envelope per line:
//! `{"v":1,"event":"peer-position","data":{"x":1.0,"y":2.0}}`

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Version carried in every envelope
pub const PROTOCOL_VERSION: u32 = 1;

/// Event names as they appear on the wire
pub mod event {
    pub const CONNECTED: &str = "connected";
    pub const PEER_ID: &str = "peer-id";
    pub const PEER_JOINED: &str = "peer-joined";
    pub const PEER_LEFT: &str = "peer-left";
    pub const ROSTER_SNAPSHOT: &str = "roster-snapshot";
    pub const PLATFORM_ROSTER: &str = "platform-roster";
    pub const CAMERA_START: &str = "camera-start";
    pub const PEER_POSITION: &str = "peer-position";
    pub const PLATFORM_REPOSITION: &str = "platform-reposition";

    /// Every event the client subscribes to
    pub const INBOUND: [&str; 9] = [
        CONNECTED,
        PEER_ID,
        PEER_JOINED,
        PEER_LEFT,
        ROSTER_SNAPSHOT,
        PLATFORM_ROSTER,
        CAMERA_START,
        PEER_POSITION,
        PLATFORM_REPOSITION,
    ];
}

/// Envelope wrapping every frame
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub v: u32,
    pub event: String,
    #[serde(default)]
    pub data: Value,
}

/// 2D world position
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

impl Position {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

impl From<(f32, f32)> for Position {
    fn from((x, y): (f32, f32)) -> Self {
        Self { x, y }
    }
}

/// Payload carrying a single peer id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerRef {
    pub id: String,
}

/// A peer position report, also used for roster entries
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeerPosition {
    pub id: String,
    pub x: f32,
    pub y: f32,
}

/// One platform of the initial layout
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlatformSpec {
    pub x: f32,
    pub y: f32,
    /// Width of the gap the player passes through
    pub width: i32,
}

/// A platform moved to a new place in the scrolling sequence
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlatformReposition {
    pub index: usize,
    pub x: f32,
    pub y: f32,
    pub width: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CameraStart {
    pub start: bool,
}

/// Events received from the relay
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    /// Connection to the relay established
    Connected,
    /// The id the relay assigned to this client
    PeerId(String),
    /// Another client joined the session
    PeerJoined(String),
    /// Another client left the session
    PeerLeft(String),
    /// Positions of every client already in the session
    RosterSnapshot(Vec<PeerPosition>),
    /// Initial platform layout
    PlatformRoster(Vec<PlatformSpec>),
    /// Camera scrolling toggled by some peer
    CameraStart(bool),
    /// Position report of another client
    PeerPosition(PeerPosition),
    /// Leader moved a platform
    PlatformReposition(PlatformReposition),
}

impl InboundEvent {
    /// Decode a named event from its raw payload
    pub fn decode(name: &str, payload: Value) -> Result<Self, ProtocolError> {
        let payload_err = |source| ProtocolError::Payload {
            event: name.to_string(),
            source,
        };

        let decoded = match name {
            event::CONNECTED => Self::Connected,
            event::PEER_ID => {
                let peer: PeerRef = serde_json::from_value(payload).map_err(payload_err)?;
                Self::PeerId(peer.id)
            }
            event::PEER_JOINED => {
                let peer: PeerRef = serde_json::from_value(payload).map_err(payload_err)?;
                Self::PeerJoined(peer.id)
            }
            event::PEER_LEFT => {
                let peer: PeerRef = serde_json::from_value(payload).map_err(payload_err)?;
                Self::PeerLeft(peer.id)
            }
            event::ROSTER_SNAPSHOT => {
                Self::RosterSnapshot(serde_json::from_value(payload).map_err(payload_err)?)
            }
            event::PLATFORM_ROSTER => {
                Self::PlatformRoster(serde_json::from_value(payload).map_err(payload_err)?)
            }
            event::CAMERA_START => {
                let camera: CameraStart =
                    serde_json::from_value(payload).map_err(payload_err)?;
                Self::CameraStart(camera.start)
            }
            event::PEER_POSITION => {
                Self::PeerPosition(serde_json::from_value(payload).map_err(payload_err)?)
            }
            event::PLATFORM_REPOSITION => {
                Self::PlatformReposition(serde_json::from_value(payload).map_err(payload_err)?)
            }
            other => return Err(ProtocolError::UnknownEvent(other.to_string())),
        };

        Ok(decoded)
    }

    /// Wire name of this event
    pub fn name(&self) -> &'static str {
        match self {
            Self::Connected => event::CONNECTED,
            Self::PeerId(_) => event::PEER_ID,
            Self::PeerJoined(_) => event::PEER_JOINED,
            Self::PeerLeft(_) => event::PEER_LEFT,
            Self::RosterSnapshot(_) => event::ROSTER_SNAPSHOT,
            Self::PlatformRoster(_) => event::PLATFORM_ROSTER,
            Self::CameraStart(_) => event::CAMERA_START,
            Self::PeerPosition(_) => event::PEER_POSITION,
            Self::PlatformReposition(_) => event::PLATFORM_REPOSITION,
        }
    }
}

/// Events sent to the relay
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundEvent {
    /// Local player position; the relay attaches our id
    PeerPosition(Position),
    /// Leader recycled a platform
    PlatformReposition(PlatformReposition),
    /// First platform cleared, start scrolling for everyone
    CameraStart,
}

impl OutboundEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::PeerPosition(_) => event::PEER_POSITION,
            Self::PlatformReposition(_) => event::PLATFORM_REPOSITION,
            Self::CameraStart => event::CAMERA_START,
        }
    }

    pub fn payload(&self) -> Value {
        match self {
            Self::PeerPosition(position) => json!({ "x": position.x, "y": position.y }),
            Self::PlatformReposition(reposition) => json!({
                "index": reposition.index,
                "x": reposition.x,
                "y": reposition.y,
                "width": reposition.width,
            }),
            Self::CameraStart => json!({}),
        }
    }
}

/// Serialize one frame, newline terminated
pub fn encode_frame(event: &str, data: Value) -> Result<String, ProtocolError> {
    let envelope = Envelope {
        v: PROTOCOL_VERSION,
        event: event.to_string(),
        data,
    };
    let mut line = serde_json::to_string(&envelope)?;
    line.push('\n');
    Ok(line)
}

/// Parse one frame into its event name and raw payload
pub fn decode_frame(line: &str) -> Result<(String, Value), ProtocolError> {
    let envelope: Envelope = serde_json::from_str(line)?;
    if envelope.v != PROTOCOL_VERSION {
        return Err(ProtocolError::UnsupportedVersion(envelope.v));
    }
    Ok((envelope.event, envelope.data))
}

/// Protocol errors
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("Malformed frame: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unsupported protocol version {0}")]
    UnsupportedVersion(u32),

    #[error("Unknown event: {0}")]
    UnknownEvent(String),

    #[error("Malformed payload for {event}: {source}")]
    Payload {
        event: String,
        #[source]
        source: serde_json::Error,
    },
}
