use anyhow::{ensure, Result};
use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Tunables for the fly camera. Angles are in degrees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub position: Vec3,
    pub world_up: Vec3,
    pub yaw: f32,
    pub pitch: f32,
    pub fov: f32,
    pub fov_min: f32,
    pub fov_max: f32,
    pub mouse_sensitivity: f32,
    /// World units per second.
    pub movement_speed: f32,
    /// Cursor position assumed before the first pointer sample arrives.
    pub initial_cursor: [f32; 2],
    /// When set, pitch is clamped to `[-limit, limit]` after every pointer sample.
    pub pitch_limit: Option<f32>,
    /// When set, the camera's height is pinned to this value after every frame tick.
    pub ground_level: Option<f32>,
    pub near: f32,
    pub far: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            position: Vec3::new(0.0, 0.0, 3.0),
            world_up: Vec3::Y,
            yaw: -90.0,
            pitch: 0.0,
            fov: 45.0,
            fov_min: 1.0,
            fov_max: 45.0,
            mouse_sensitivity: 0.1,
            movement_speed: 2.5,
            initial_cursor: [400.0, 300.0],
            pitch_limit: None,
            ground_level: None,
            near: 0.1,
            far: 100.0,
        }
    }
}

impl CameraConfig {
    /// Rejects non-finite values; TOML accepts `nan` and `inf` as floats.
    pub fn validate(&self) -> Result<()> {
        let scalars = [
            ("yaw", self.yaw),
            ("pitch", self.pitch),
            ("fov", self.fov),
            ("fov_min", self.fov_min),
            ("fov_max", self.fov_max),
            ("mouse_sensitivity", self.mouse_sensitivity),
            ("movement_speed", self.movement_speed),
            ("near", self.near),
            ("far", self.far),
        ];
        for (name, value) in scalars {
            ensure!(value.is_finite(), "camera.{} must be finite, got {}", name, value);
        }

        ensure!(self.position.is_finite(), "camera.position must be finite");
        ensure!(self.world_up.is_finite(), "camera.world_up must be finite");
        ensure!(
            self.initial_cursor.iter().all(|v| v.is_finite()),
            "camera.initial_cursor must be finite"
        );

        if let Some(limit) = self.pitch_limit {
            ensure!(limit.is_finite(), "camera.pitch_limit must be finite, got {}", limit);
        }
        if let Some(ground) = self.ground_level {
            ensure!(ground.is_finite(), "camera.ground_level must be finite, got {}", ground);
        }

        Ok(())
    }
}
