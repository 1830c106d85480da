use crate::core::math::transform::TransformFactory;
use nalgebra::{Matrix4, Point3, Vector3};

/// Gap added in front of the bounding sphere when the view is reset.
pub const RESET_MARGIN: f32 = 0.4;

/// Projection and mouse-sensitivity parameters shared by the camera and its controller.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraSettings {
    /// Vertical field of view in degrees.
    pub fov_y: f32,
    pub z_near: f32,
    pub z_far: f32,
    /// Degrees per pixel.
    pub orbit_speed: f32,
    /// World units per pixel.
    pub dolly_speed: f32,
    /// World units per pixel.
    pub track_speed: f32,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            fov_y: 60.0,
            z_near: 0.1,
            z_far: 10.0,
            orbit_speed: 0.30,
            dolly_speed: 0.02,
            track_speed: 0.005,
        }
    }
}

impl CameraSettings {
    pub fn projection(&self, aspect_ratio: f32) -> Matrix4<f32> {
        TransformFactory::perspective(aspect_ratio, self.fov_y.to_radians(), self.z_near, self.z_far)
    }
}

/// Where the camera is and how the scene is turned in front of it.
///
/// The camera always looks down -Z at `target`; `heading` and `pitch` spin
/// the scene about the target instead of moving the eye.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraState {
    pub position: Point3<f32>,
    pub target: Point3<f32>,
    /// Degrees about +Y.
    pub heading: f32,
    /// Degrees about +X, within [-90, 90].
    pub pitch: f32,
}

impl Default for CameraState {
    fn default() -> Self {
        Self {
            position: Point3::new(0.0, 0.0, 1.0 + 0.1 + RESET_MARGIN),
            target: Point3::origin(),
            heading: 0.0,
            pitch: 0.0,
        }
    }
}

impl CameraState {
    /// Frames a sphere of `radius` around `center` from straight ahead.
    pub fn reset(&mut self, center: Point3<f32>, radius: f32, z_near: f32) {
        self.target = center;
        self.position = center + Vector3::new(0.0, 0.0, radius + z_near + RESET_MARGIN);
        self.heading = 0.0;
        self.pitch = 0.0;
    }

    /// Distance from the camera to the target along the view axis.
    pub fn distance(&self) -> f32 {
        self.position.z - self.target.z
    }

    pub fn set_distance(&mut self, distance: f32) {
        self.position.z = self.target.z + distance;
    }

    pub fn view_matrix(&self) -> Matrix4<f32> {
        let look = TransformFactory::look_at(&self.position, &self.target, &Vector3::y());
        look * TransformFactory::translation(&self.target.coords)
            * TransformFactory::rotation_x(self.pitch.to_radians())
            * TransformFactory::rotation_y(self.heading.to_radians())
            * TransformFactory::translation(&-self.target.coords)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Vector4;

    #[test]
    fn reset_places_camera_in_front_of_the_sphere() {
        let mut camera = CameraState {
            heading: 30.0,
            pitch: -12.0,
            ..CameraState::default()
        };
        camera.reset(Point3::new(1.0, 2.0, 3.0), 2.0, 0.1);

        assert_eq!(camera.target, Point3::new(1.0, 2.0, 3.0));
        assert!((camera.position - Point3::new(1.0, 2.0, 5.5)).norm() < 1e-6);
        assert_eq!(camera.heading, 0.0);
        assert_eq!(camera.pitch, 0.0);
    }

    #[test]
    fn target_maps_onto_the_view_axis() {
        let mut camera = CameraState::default();
        camera.reset(Point3::new(0.5, -1.0, 0.0), 1.0, 0.1);
        camera.heading = 45.0;
        camera.pitch = 20.0;

        let eye = camera.view_matrix() * Vector4::new(0.5, -1.0, 0.0, 1.0);
        assert!(eye.x.abs() < 1e-5);
        assert!(eye.y.abs() < 1e-5);
        assert!((eye.z + camera.distance()).abs() < 1e-5);
    }

    #[test]
    fn heading_turns_the_scene_about_the_target() {
        let mut camera = CameraState::default();
        camera.reset(Point3::origin(), 1.0, 0.1);
        camera.heading = 90.0;

        // A point on +X swings onto the view axis behind the target.
        let eye = camera.view_matrix() * Vector4::new(1.0, 0.0, 0.0, 1.0);
        assert!(eye.x.abs() < 1e-5);
        assert!((eye.z - (-camera.distance() - 1.0)).abs() < 1e-5);
    }
}
