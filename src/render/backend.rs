use gl::types::*;
use glam::{Mat4, Vec3};
use std::ffi::CStr;
use std::fmt;
use std::ptr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl ShaderStage {
    pub fn gl_enum(self) -> GLenum {
        match self {
            ShaderStage::Vertex => gl::VERTEX_SHADER,
            ShaderStage::Fragment => gl::FRAGMENT_SHADER,
        }
    }
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShaderStage::Vertex => f.write_str("vertex"),
            ShaderStage::Fragment => f.write_str("fragment"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    Int(i32),
    Float(f32),
    Vec3(Vec3),
    Mat4(Mat4),
}

/// The driver entry points a shader program needs over its lifetime.
///
/// Failed compiles and links return the driver's info log.
pub trait ShaderBackend {
    fn create_shader(&self, stage: ShaderStage) -> GLuint;
    fn compile_shader(&self, shader: GLuint, source: &CStr) -> Result<(), String>;
    fn delete_shader(&self, shader: GLuint);
    fn create_program(&self) -> GLuint;
    fn link_program(&self, program: GLuint, shaders: &[GLuint]) -> Result<(), String>;
    fn delete_program(&self, program: GLuint);
    fn use_program(&self, program: GLuint);
    /// Returns -1 when the program has no active uniform by that name.
    fn uniform_location(&self, program: GLuint, name: &CStr) -> GLint;
    fn set_uniform(&self, location: GLint, value: UniformValue);
}

/// Backend over the global `gl` function pointers.
///
/// `gl::load_with` must have been called on a current context before any method is used.
#[derive(Debug, Default, Clone, Copy)]
pub struct GlBackend;

impl ShaderBackend for GlBackend {
    fn create_shader(&self, stage: ShaderStage) -> GLuint {
        unsafe { gl::CreateShader(stage.gl_enum()) }
    }

    fn compile_shader(&self, shader: GLuint, source: &CStr) -> Result<(), String> {
        unsafe {
            gl::ShaderSource(shader, 1, &source.as_ptr(), ptr::null());
            gl::CompileShader(shader);
        }

        let mut success = 1;
        unsafe {
            gl::GetShaderiv(shader, gl::COMPILE_STATUS, &mut success);
        }

        if success == 0 {
            let mut len = 0;
            unsafe {
                gl::GetShaderiv(shader, gl::INFO_LOG_LENGTH, &mut len);
            }

            return Err(read_info_log(len, |written, buffer| unsafe {
                gl::GetShaderInfoLog(shader, len, written, buffer)
            }));
        }

        Ok(())
    }

    fn delete_shader(&self, shader: GLuint) {
        unsafe { gl::DeleteShader(shader) };
    }

    fn create_program(&self) -> GLuint {
        unsafe { gl::CreateProgram() }
    }

    fn link_program(&self, program: GLuint, shaders: &[GLuint]) -> Result<(), String> {
        unsafe {
            for &shader in shaders {
                gl::AttachShader(program, shader);
            }
            gl::LinkProgram(program);
        }

        let mut success = 1;
        unsafe {
            gl::GetProgramiv(program, gl::LINK_STATUS, &mut success);
        }

        if success == 0 {
            let mut len = 0;
            unsafe {
                gl::GetProgramiv(program, gl::INFO_LOG_LENGTH, &mut len);
            }

            return Err(read_info_log(len, |written, buffer| unsafe {
                gl::GetProgramInfoLog(program, len, written, buffer)
            }));
        }

        unsafe {
            for &shader in shaders {
                gl::DetachShader(program, shader);
            }
        }

        Ok(())
    }

    fn delete_program(&self, program: GLuint) {
        unsafe { gl::DeleteProgram(program) };
    }

    fn use_program(&self, program: GLuint) {
        unsafe { gl::UseProgram(program) };
    }

    fn uniform_location(&self, program: GLuint, name: &CStr) -> GLint {
        unsafe { gl::GetUniformLocation(program, name.as_ptr()) }
    }

    fn set_uniform(&self, location: GLint, value: UniformValue) {
        unsafe {
            match value {
                UniformValue::Int(v) => gl::Uniform1i(location, v),
                UniformValue::Float(v) => gl::Uniform1f(location, v),
                UniformValue::Vec3(v) => gl::Uniform3f(location, v.x, v.y, v.z),
                UniformValue::Mat4(m) => {
                    gl::UniformMatrix4fv(location, 1, gl::FALSE, m.to_cols_array().as_ptr())
                }
            }
        }
    }
}

/// Reads a driver info log of `len` bytes (including the NUL) into a `String`.
fn read_info_log(len: GLint, fetch: impl FnOnce(*mut GLsizei, *mut GLchar)) -> String {
    let mut buffer = vec![0u8; len.max(1) as usize];
    let mut written: GLsizei = 0;
    fetch(&mut written, buffer.as_mut_ptr() as *mut GLchar);
    buffer.truncate(written.max(0) as usize);
    String::from_utf8_lossy(&buffer).trim_end().to_owned()
}
