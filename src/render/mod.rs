pub mod backend;
pub mod camera;
pub mod mesh;
pub mod shaders;

pub use backend::{GlBackend, ShaderBackend, ShaderStage, UniformValue};
pub use camera::{Camera, CameraEvent};
pub use mesh::Mesh;
pub use shaders::{ShaderError, ShaderProgram};
