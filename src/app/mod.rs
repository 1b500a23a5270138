//! Application wiring

pub mod client;

pub use client::GameClient;
