use crate::config::CameraConfig;
use crate::input::MovementKeys;
use glam::{Mat4, Vec2, Vec3};

/// Input delivered to the camera by the host loop, in arrival order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CameraEvent {
    /// Absolute pointer coordinates, screen space (y grows downwards).
    PointerMoved { x: f32, y: f32 },
    /// Vertical scroll in lines.
    Scroll { delta_y: f32 },
    /// Once per rendered frame; `time` is in seconds.
    FrameTick { keys: MovementKeys, time: f64 },
}

/// First-person fly camera driven by pointer, scroll and key input.
#[derive(Debug, Clone)]
pub struct Camera {
    position: Vec3,
    forward: Vec3,
    up: Vec3,
    yaw: f32,
    pitch: f32,
    fov: f32,
    fov_min: f32,
    fov_max: f32,
    last_cursor: Vec2,
    has_first_sample: bool,
    mouse_sensitivity: f32,
    movement_speed: f32,
    last_frame_time: f64,
    pitch_limit: Option<f32>,
    ground_level: Option<f32>,
    near: f32,
    far: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self::new(&CameraConfig::default())
    }
}

impl Camera {
    /// Builds a camera from `config`.
    ///
    /// Non-finite angles and fov bounds fall back to their defaults and a non-finite
    /// `pitch_limit` disables the limit, so the fov and pitch clamps always have ordered bounds.
    pub fn new(config: &CameraConfig) -> Self {
        let defaults = CameraConfig::default();
        let fov_min = finite_or(config.fov_min, defaults.fov_min);
        let fov_max = finite_or(config.fov_max, defaults.fov_max);
        let (fov_min, fov_max) = (fov_min.min(fov_max), fov_max.max(fov_min));

        let pitch_limit = config.pitch_limit.filter(|limit| limit.is_finite()).map(f32::abs);
        let yaw = finite_or(config.yaw, defaults.yaw);
        let pitch = finite_or(config.pitch, defaults.pitch);
        let pitch = match pitch_limit {
            Some(limit) => pitch.clamp(-limit, limit),
            None => pitch,
        };

        Self {
            position: config.position,
            forward: direction_from_angles(yaw, pitch),
            up: config.world_up.normalize_or_zero(),
            yaw,
            pitch,
            fov: finite_or(config.fov, defaults.fov).clamp(fov_min, fov_max),
            fov_min,
            fov_max,
            last_cursor: Vec2::from(config.initial_cursor),
            has_first_sample: false,
            mouse_sensitivity: config.mouse_sensitivity,
            movement_speed: config.movement_speed,
            last_frame_time: 0.0,
            pitch_limit,
            ground_level: config.ground_level,
            near: config.near,
            far: config.far,
        }
    }

    pub fn handle(&mut self, event: CameraEvent) {
        match event {
            CameraEvent::PointerMoved { x, y } => self.on_pointer_moved(x, y),
            CameraEvent::Scroll { delta_y } => self.on_scroll(delta_y),
            CameraEvent::FrameTick { keys, time } => self.on_frame_tick(keys, time),
        }
    }

    /// Turns the camera from an absolute pointer position.
    ///
    /// The first sample only records the baseline, so the camera never jumps from an
    /// undefined previous position.
    pub fn on_pointer_moved(&mut self, x: f32, y: f32) {
        if !self.has_first_sample {
            self.last_cursor = Vec2::new(x, y);
            self.has_first_sample = true;
            return;
        }

        // Screen y grows downwards, pitch grows upwards.
        let offset = Vec2::new(x - self.last_cursor.x, self.last_cursor.y - y);
        self.last_cursor = Vec2::new(x, y);

        let offset = offset * self.mouse_sensitivity;
        self.yaw += offset.x;
        self.pitch += offset.y;

        if let Some(limit) = self.pitch_limit {
            self.pitch = self.pitch.clamp(-limit, limit);
        }

        self.forward = direction_from_angles(self.yaw, self.pitch);
    }

    /// Zooms by narrowing or widening the field of view.
    pub fn on_scroll(&mut self, delta_y: f32) {
        self.fov = (self.fov - delta_y).clamp(self.fov_min, self.fov_max);
    }

    /// Moves the camera along its own axes for the time elapsed since the last tick.
    pub fn on_frame_tick(&mut self, keys: MovementKeys, time: f64) {
        let elapsed = (time - self.last_frame_time) as f32;
        self.last_frame_time = time;

        let speed = elapsed * self.movement_speed;
        // Zero while looking straight along `up`.
        let right = self.forward.cross(self.up).normalize_or_zero();

        if keys.contains(MovementKeys::FORWARD) {
            self.position += self.forward * speed;
        }
        if keys.contains(MovementKeys::BACKWARD) {
            self.position -= self.forward * speed;
        }
        if keys.contains(MovementKeys::LEFT) {
            self.position -= right * speed;
        }
        if keys.contains(MovementKeys::RIGHT) {
            self.position += right * speed;
        }
        if keys.contains(MovementKeys::UP) {
            self.position += self.up * speed;
        }
        if keys.contains(MovementKeys::DOWN) {
            self.position -= self.up * speed;
        }

        if let Some(ground) = self.ground_level {
            self.position.y = ground;
        }
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.position + self.forward, self.up)
    }

    /// OpenGL-style perspective for the current field of view.
    pub fn projection_matrix(&self, aspect_ratio: f32) -> Mat4 {
        Mat4::perspective_rh_gl(self.fov.to_radians(), aspect_ratio, self.near, self.far)
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn set_position(&mut self, position: Vec3) {
        self.position = position;
    }

    pub fn forward(&self) -> Vec3 {
        self.forward
    }

    pub fn up(&self) -> Vec3 {
        self.up
    }

    pub fn yaw(&self) -> f32 {
        self.yaw
    }

    pub fn pitch(&self) -> f32 {
        self.pitch
    }

    pub fn fov(&self) -> f32 {
        self.fov
    }

    pub fn has_first_sample(&self) -> bool {
        self.has_first_sample
    }
}

fn finite_or(value: f32, fallback: f32) -> f32 {
    if value.is_finite() {
        value
    } else {
        fallback
    }
}

/// Unit look direction for yaw/pitch given in degrees.
fn direction_from_angles(yaw: f32, pitch: f32) -> Vec3 {
    let (yaw, pitch) = (yaw.to_radians(), pitch.to_radians());
    Vec3::new(yaw.cos() * pitch.cos(), pitch.sin(), yaw.sin() * pitch.cos()).normalize()
}
