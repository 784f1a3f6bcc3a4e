use super::super::types::Vec2;

#[derive(Debug, Clone)]
struct PanState {
    start: Vec2,
    target: Vec2,
    duration: f32,
    elapsed: f32,
}

/// Camera with an optional timed pan; `is_moving` backs the camera break
/// condition.
#[derive(Debug)]
pub(super) struct CameraState {
    at: Vec2,
    pan: Option<PanState>,
}

impl CameraState {
    pub(super) fn new() -> Self {
        CameraState {
            at: Vec2::default(),
            pan: None,
        }
    }

    pub(super) fn at(&self) -> Vec2 {
        self.at
    }

    pub(super) fn jump_to(&mut self, position: Vec2) {
        self.at = position;
        self.pan = None;
    }

    pub(super) fn pan_to(&mut self, target: Vec2, duration: f32) {
        if duration <= 0.0 {
            self.jump_to(target);
            return;
        }
        self.pan = Some(PanState {
            start: self.at,
            target,
            duration,
            elapsed: 0.0,
        });
    }

    pub(super) fn is_moving(&self) -> bool {
        self.pan.is_some()
    }

    pub(super) fn advance(&mut self, dt: f32) -> Vec<String> {
        let mut events = Vec::new();
        if let Some(pan) = self.pan.as_mut() {
            pan.elapsed += dt;
            if pan.elapsed >= pan.duration {
                self.at = pan.target;
                self.pan = None;
                events.push(format!("camera.pan.done ({}, {})", self.at.x, self.at.y));
            } else {
                let t = pan.elapsed / pan.duration;
                self.at = Vec2::new(
                    pan.start.x + (pan.target.x - pan.start.x) * t,
                    pan.start.y + (pan.target.y - pan.start.y) * t,
                );
            }
        }
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pan_interpolates_then_settles() {
        let mut camera = CameraState::new();
        camera.pan_to(Vec2::new(10.0, 0.0), 1.0);
        assert!(camera.is_moving());
        camera.advance(0.5);
        assert!((camera.at().x - 5.0).abs() < 1e-4);
        let events = camera.advance(0.5);
        assert!(!camera.is_moving());
        assert!((camera.at().x - 10.0).abs() < 1e-4);
        assert!(events.iter().any(|e| e.starts_with("camera.pan.done")));
    }

    #[test]
    fn zero_duration_pan_jumps() {
        let mut camera = CameraState::new();
        camera.pan_to(Vec2::new(3.0, 4.0), 0.0);
        assert!(!camera.is_moving());
        assert!((camera.at().y - 4.0).abs() < 1e-4);
    }
}
