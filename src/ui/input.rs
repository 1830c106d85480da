use crate::scene::camera::{CameraSettings, CameraState};
use nalgebra::Point2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
}

impl MouseButton {
    fn index(self) -> usize {
        match self {
            MouseButton::Left => 0,
            MouseButton::Right => 1,
            MouseButton::Middle => 2,
        }
    }

    fn mode(self) -> CameraMode {
        match self {
            MouseButton::Left => CameraMode::Track,
            MouseButton::Right => CameraMode::Orbit,
            MouseButton::Middle => CameraMode::Dolly,
        }
    }
}

/// What a pointer drag currently does to the camera.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CameraMode {
    #[default]
    Idle,
    /// Left button: slide camera and target in the view plane.
    Track,
    /// Right button: turn the scene about the target.
    Orbit,
    /// Middle button: move toward or away from the target.
    Dolly,
}

/// Mouse-driven camera state machine.
///
/// Left drag tracks, right drag orbits, middle drag dollies. While any
/// button is held the pointer is captured; releasing one of several held
/// buttons falls back to the remaining one with Track > Orbit > Dolly.
#[derive(Debug, Clone)]
pub struct CameraController {
    settings: CameraSettings,
    mode: CameraMode,
    held: [bool; 3],
    last_pos: Point2<f32>,
}

impl CameraController {
    pub fn new(settings: CameraSettings) -> Self {
        Self {
            settings,
            mode: CameraMode::Idle,
            held: [false; 3],
            last_pos: Point2::origin(),
        }
    }

    pub fn mode(&self) -> CameraMode {
        self.mode
    }

    pub fn settings(&self) -> &CameraSettings {
        &self.settings
    }

    /// Number of buttons currently held.
    pub fn buttons_down(&self) -> usize {
        self.held.iter().filter(|&&h| h).count()
    }

    /// True while the host should keep routing pointer events here.
    pub fn is_capturing(&self) -> bool {
        self.buttons_down() > 0
    }

    pub fn press(&mut self, button: MouseButton, pos: Point2<f32>) {
        self.held[button.index()] = true;
        self.mode = button.mode();
        self.last_pos = pos;
    }

    pub fn release(&mut self, button: MouseButton) {
        self.held[button.index()] = false;

        self.mode = [MouseButton::Left, MouseButton::Right, MouseButton::Middle]
            .into_iter()
            .find(|b| self.held[b.index()])
            .map_or(CameraMode::Idle, MouseButton::mode);
    }

    /// Drops any drag in progress, e.g. when the window loses focus mid-drag.
    pub fn cancel(&mut self) {
        self.held = [false; 3];
        self.mode = CameraMode::Idle;
    }

    /// Applies the pointer movement since the last event to `camera`.
    ///
    /// `model_radius` bounds how close and far the camera may dolly; pass 0
    /// when no model is loaded.
    pub fn motion(&mut self, pos: Point2<f32>, camera: &mut CameraState, model_radius: f32) {
        if self.mode == CameraMode::Idle {
            return;
        }

        let delta = pos - self.last_pos;
        let s = &self.settings;

        match self.mode {
            CameraMode::Track => {
                let dx = delta.x * s.track_speed;
                let dy = delta.y * s.track_speed;
                camera.position.x -= dx;
                camera.position.y += dy;
                camera.target.x -= dx;
                camera.target.y += dy;
            }
            CameraMode::Orbit => {
                camera.heading += delta.x * s.orbit_speed;
                camera.pitch = (camera.pitch + delta.y * s.orbit_speed).max(-90.0).min(90.0);
            }
            CameraMode::Dolly => {
                let distance = camera.distance() - delta.y * s.dolly_speed;
                let nearest = model_radius + s.z_near;
                let farthest = s.z_far - model_radius;
                camera.set_distance(distance.max(nearest).min(farthest));
            }
            CameraMode::Idle => {}
        }

        self.last_pos = pos;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Point3;

    fn setup() -> (CameraController, CameraState) {
        let mut camera = CameraState::default();
        camera.reset(Point3::origin(), 1.0, 0.1);
        (CameraController::new(CameraSettings::default()), camera)
    }

    #[test]
    fn left_drag_tracks_camera_and_target() {
        let (mut controller, mut camera) = setup();
        let before = camera;

        controller.press(MouseButton::Left, Point2::new(100.0, 100.0));
        controller.motion(Point2::new(110.0, 105.0), &mut camera, 1.0);

        let shift = camera.position - before.position;
        assert!((shift.x + 0.05).abs() < 1e-6);
        assert!((shift.y - 0.025).abs() < 1e-6);
        assert_eq!(shift.z, 0.0);
        assert_eq!(camera.target - before.target, shift);
    }

    #[test]
    fn orbit_keeps_pitch_within_ninety_degrees() {
        let (mut controller, mut camera) = setup();
        controller.press(MouseButton::Right, Point2::origin());

        let mut y = 0.0;
        for step in [400.0, 250.0, -900.0, -1200.0, 3000.0, -17.0] {
            y += step;
            controller.motion(Point2::new(3.0, y), &mut camera, 1.0);
            assert!((-90.0..=90.0).contains(&camera.pitch), "pitch {}", camera.pitch);
        }
        assert!((camera.heading - 0.9).abs() < 1e-5);
    }

    #[test]
    fn dolly_stays_between_near_and_far_limits() {
        let (mut controller, mut camera) = setup();
        let radius = 1.0;
        controller.press(MouseButton::Middle, Point2::origin());

        let mut y = 0.0;
        for step in [50.0, 500.0, -40.0, -2000.0, 10.0] {
            y += step;
            controller.motion(Point2::new(0.0, y), &mut camera, radius);
            let d = camera.distance();
            assert!(d >= radius + 0.1 - 1e-5 && d <= 10.0 - radius + 1e-5, "distance {d}");
        }
    }

    #[test]
    fn dolly_without_model_never_panics() {
        let mut camera = CameraState::default();
        let mut controller = CameraController::new(CameraSettings::default());
        controller.press(MouseButton::Middle, Point2::origin());
        controller.motion(Point2::new(0.0, 1.0e6), &mut camera, 0.0);
        assert!((camera.distance() - 0.1).abs() < 1e-5);
    }

    #[test]
    fn release_falls_back_by_precedence() {
        let (mut controller, _) = setup();
        controller.press(MouseButton::Middle, Point2::origin());
        controller.press(MouseButton::Right, Point2::origin());
        controller.press(MouseButton::Left, Point2::origin());
        assert_eq!(controller.mode(), CameraMode::Track);
        assert_eq!(controller.buttons_down(), 3);

        controller.release(MouseButton::Left);
        assert_eq!(controller.mode(), CameraMode::Orbit);
        controller.release(MouseButton::Right);
        assert_eq!(controller.mode(), CameraMode::Dolly);
        controller.release(MouseButton::Middle);
        assert_eq!(controller.mode(), CameraMode::Idle);
        assert!(!controller.is_capturing());
    }

    #[test]
    fn idle_motion_and_cancel_leave_camera_alone() {
        let (mut controller, mut camera) = setup();
        let before = camera;
        controller.motion(Point2::new(50.0, 50.0), &mut camera, 1.0);
        assert_eq!(camera, before);

        controller.press(MouseButton::Right, Point2::origin());
        controller.cancel();
        controller.motion(Point2::new(50.0, 50.0), &mut camera, 1.0);
        assert_eq!(camera, before);
        assert_eq!(controller.mode(), CameraMode::Idle);
    }
}
