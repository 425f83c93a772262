pub mod config;
pub mod input;
pub mod render;

// Re-export commonly used types
pub use config::{AppConfig, CameraConfig, ShaderConfig, WindowConfig};
pub use input::{InputState, MovementKeys};
pub use render::camera::{Camera, CameraEvent};
pub use render::shaders::{ShaderError, ShaderProgram};
