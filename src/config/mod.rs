//! Configuration module - environment variable parsing and game constants

use std::env;
use std::net::SocketAddr;

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Relay server address
    pub relay_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Simulation ticks per second
    pub tick_rate: u32,
    /// Seed for the scripted bot input (random when unset)
    pub bot_seed: Option<u64>,
    /// Immutable gameplay constants shared by every component
    pub constants: GameConstants,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let relay_addr =
            env::var("RELAY_ADDR").unwrap_or_else(|_| "127.0.0.1:8080".to_string());

        let tick_rate = match env::var("TICK_RATE") {
            Ok(raw) => raw
                .parse::<u32>()
                .ok()
                .filter(|rate| *rate > 0)
                .ok_or(ConfigError::Invalid("TICK_RATE"))?,
            Err(_) => 60,
        };

        let bot_seed = match env::var("BOT_SEED") {
            Ok(raw) => Some(
                raw.parse::<u64>()
                    .map_err(|_| ConfigError::Invalid("BOT_SEED"))?,
            ),
            Err(_) => None,
        };

        Ok(Self {
            relay_addr: relay_addr
                .parse()
                .map_err(|_| ConfigError::InvalidAddress)?,
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            tick_rate,
            bot_seed,
            constants: GameConstants::default(),
        })
    }

    /// Fixed simulation step in seconds
    pub fn tick_delta(&self) -> f32 {
        1.0 / self.tick_rate as f32
    }
}

/// Gameplay constants.
///
/// World coordinates are y-up with the ground at `y = 0`; the camera scrolls
/// upward once the game starts. Values are in world units (pixels).
#[derive(Clone, Debug, PartialEq)]
pub struct GameConstants {
    /// Visible width of the camera
    pub viewport_width: f32,
    /// Visible height of the camera
    pub viewport_height: f32,
    /// Seconds between two local position reports
    pub report_interval: f32,
    /// Number of platform slots in the scrolling sequence
    pub platform_count: usize,
    /// Vertical distance between consecutive platforms
    pub platform_spacing: f32,
    /// Platform thickness
    pub platform_height: f32,
    /// Ball sprite edge length
    pub ball_size: f32,
    /// Height of the ground strip
    pub ground_height: f32,
    /// Width of each side wall
    pub wall_width: f32,
    /// Downward acceleration applied to dynamic bodies
    pub gravity: f32,
    /// Vertical velocity set by a jump
    pub jump_velocity: f32,
    /// Horizontal velocity per unit of accelerometer tilt
    pub tilt_factor: f32,
    /// Where a freshly announced peer is placed until its first report
    pub placeholder_position: (f32, f32),
    /// Base camera rise per tick before scaling
    pub camera_rise: f32,
    /// Sprite scaling factor applied to the camera rise
    pub scaling_factor: f32,
    /// Exponential growth base of the camera speed
    pub camera_growth: f32,
    /// Seconds after which the camera stops accelerating
    pub camera_ramp_secs: f32,
}

impl Default for GameConstants {
    fn default() -> Self {
        Self {
            viewport_width: 480.0,
            viewport_height: 800.0,
            report_interval: 1.0 / 60.0,
            platform_count: 5,
            platform_spacing: 250.0,
            platform_height: 32.0,
            ball_size: 32.0,
            ground_height: 64.0,
            wall_width: 32.0,
            gravity: -1200.0,
            jump_velocity: 600.0,
            tilt_factor: -200.0,
            placeholder_position: (200.0, 200.0),
            camera_rise: 4.0,
            scaling_factor: 0.17,
            camera_growth: 1.02,
            camera_ramp_secs: 60.0,
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),

    #[error("Invalid relay address format")]
    InvalidAddress,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_constants_match_reporting_rate() {
        let constants = GameConstants::default();
        assert!((constants.report_interval - 1.0 / 60.0).abs() < f32::EPSILON);
        assert_eq!(constants.platform_count, 5);
        assert_eq!(constants.placeholder_position, (200.0, 200.0));
    }

    #[test]
    fn tick_delta_follows_tick_rate() {
        let config = Config {
            relay_addr: "127.0.0.1:8080".parse().unwrap(),
            log_level: "info".to_string(),
            tick_rate: 30,
            bot_seed: None,
            constants: GameConstants::default(),
        };
        assert!((config.tick_delta() - 1.0 / 30.0).abs() < f32::EPSILON);
    }
}
