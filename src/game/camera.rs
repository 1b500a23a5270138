//! Vertically scrolling camera

use crate::config::GameConstants;
use crate::net::Position;

/// Orthographic camera that rises ever faster once scrolling starts
#[derive(Debug, Clone)]
pub struct Camera {
    /// Center of the view
    position: Position,
    viewport_height: f32,
    scrolling: bool,
    /// Seconds spent scrolling, capped at the ramp duration
    elapsed: f32,
    rise: f32,
    growth: f32,
    ramp_secs: f32,
}

impl Camera {
    pub fn new(constants: &GameConstants) -> Self {
        Self {
            position: Position::new(
                constants.viewport_width / 2.0,
                constants.viewport_height / 2.0,
            ),
            viewport_height: constants.viewport_height,
            scrolling: false,
            elapsed: 0.0,
            rise: constants.camera_rise * constants.scaling_factor,
            growth: constants.camera_growth,
            ramp_secs: constants.camera_ramp_secs,
        }
    }

    pub fn set_scrolling(&mut self, scrolling: bool) {
        self.scrolling = scrolling;
    }

    pub fn is_scrolling(&self) -> bool {
        self.scrolling
    }

    /// Advance one tick. The rise is per tick, not per second.
    pub fn update(&mut self, dt: f32) {
        if !self.scrolling {
            return;
        }
        if self.elapsed < self.ramp_secs {
            self.elapsed += dt;
        }
        self.position.y += self.rise * (self.growth.powf(self.elapsed) + 2.0);
    }

    pub fn position(&self) -> Position {
        self.position
    }

    /// Lower edge of the visible area
    pub fn bottom(&self) -> f32 {
        self.position.y - self.viewport_height / 2.0
    }

    /// Upper edge of the visible area
    pub fn top(&self) -> f32 {
        self.position.y + self.viewport_height / 2.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idle_camera_stays_put() {
        let mut camera = Camera::new(&GameConstants::default());
        camera.update(1.0);
        assert_eq!(camera.bottom(), 0.0);
        assert_eq!(camera.top(), 800.0);
    }

    #[test]
    fn scrolling_camera_rises_and_accelerates() {
        let mut camera = Camera::new(&GameConstants::default());
        camera.set_scrolling(true);

        camera.update(1.0 / 60.0);
        let first = camera.bottom();
        camera.update(1.0 / 60.0);
        let second = camera.bottom() - first;

        assert!(first > 0.0);
        assert!(second > first);
    }

    #[test]
    fn acceleration_stops_after_ramp() {
        let mut camera = Camera::new(&GameConstants::default());
        camera.set_scrolling(true);
        for _ in 0..4 {
            camera.update(30.0);
        }

        let before = camera.position().y;
        camera.update(30.0);
        let step_a = camera.position().y - before;
        let before = camera.position().y;
        camera.update(30.0);
        let step_b = camera.position().y - before;

        assert!((step_a - step_b).abs() < 1e-3);
    }
}
