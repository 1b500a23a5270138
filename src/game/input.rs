//! Scripted input for running the client without a device

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use super::world::InputSource;

/// Chance per poll that the bot taps the screen
const TAP_PROBABILITY: f64 = 1.0 / 45.0;

/// Largest tilt the bot applies
const MAX_TILT: f32 = 3.0;

/// Deterministic random player: taps now and then and wanders left and right
/// with a bounded random walk on the accelerometer.
pub struct BotInput {
    rng: ChaCha8Rng,
    tilt: f32,
}

impl BotInput {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            tilt: 0.0,
        }
    }
}

impl InputSource for BotInput {
    fn just_touched(&mut self) -> bool {
        self.rng.gen_bool(TAP_PROBABILITY)
    }

    fn accelerometer_x(&mut self) -> f32 {
        self.tilt = (self.tilt + self.rng.gen_range(-0.25..0.25)).clamp(-MAX_TILT, MAX_TILT);
        self.tilt
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_inputs() {
        let mut a = BotInput::new(7);
        let mut b = BotInput::new(7);
        for _ in 0..100 {
            assert_eq!(a.just_touched(), b.just_touched());
            assert_eq!(a.accelerometer_x(), b.accelerometer_x());
        }
    }

    #[test]
    fn tilt_stays_bounded() {
        let mut bot = BotInput::new(42);
        for _ in 0..10_000 {
            let tilt = bot.accelerometer_x();
            assert!((-MAX_TILT..=MAX_TILT).contains(&tilt));
        }
    }
}
