//! Client-side game simulation modules

pub mod camera;
pub mod input;
pub mod physics;
pub mod platform;
pub mod reconciler;
pub mod remote;
pub mod world;

pub use input::BotInput;
pub use physics::KinematicWorld;
pub use reconciler::{InboundSender, Reconciler};
pub use world::{InputSource, PhysicsWorld, Renderer};
