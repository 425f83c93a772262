use crate::render::backend::{GlBackend, ShaderBackend, ShaderStage, UniformValue};
use gl::types::*;
use glam::{Mat4, Vec3};
use std::collections::HashMap;
use std::ffi::{CString, NulError};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ShaderError {
    #[error("Failed to read shader source {}: {source}", path.display())]
    SourceRead {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("{stage} shader compilation failed: {log}")]
    Compile { stage: ShaderStage, log: String },
    #[error("Program linking failed: {log}")]
    Link { log: String },
    #[error("Null byte error: {0}")]
    Nul(#[from] NulError),
}

/// A linked vertex + fragment program.
///
/// A value only exists once linking succeeded; the GL program is deleted on drop.
pub struct ShaderProgram<B: ShaderBackend = GlBackend> {
    id: GLuint,
    uniforms: HashMap<String, GLint>,
    backend: B,
}

impl ShaderProgram<GlBackend> {
    pub fn new(
        vertex_path: impl AsRef<Path>,
        fragment_path: impl AsRef<Path>,
    ) -> Result<Self, ShaderError> {
        Self::build(GlBackend, vertex_path, fragment_path)
    }

    pub fn from_sources(vertex_source: &str, fragment_source: &str) -> Result<Self, ShaderError> {
        Self::build_from_sources(GlBackend, vertex_source, fragment_source)
    }
}

impl<B: ShaderBackend> ShaderProgram<B> {
    /// Reads, compiles and links the two stages.
    ///
    /// Both files are read before any GPU object is created.
    pub fn build(
        backend: B,
        vertex_path: impl AsRef<Path>,
        fragment_path: impl AsRef<Path>,
    ) -> Result<Self, ShaderError> {
        let vertex_source = read_source(vertex_path.as_ref()).inspect_err(log_failure)?;
        let fragment_source = read_source(fragment_path.as_ref()).inspect_err(log_failure)?;
        Self::build_from_sources(backend, &vertex_source, &fragment_source)
    }

    pub fn build_from_sources(
        backend: B,
        vertex_source: &str,
        fragment_source: &str,
    ) -> Result<Self, ShaderError> {
        Self::compile_and_link(backend, vertex_source, fragment_source).inspect_err(log_failure)
    }

    fn compile_and_link(
        backend: B,
        vertex_source: &str,
        fragment_source: &str,
    ) -> Result<Self, ShaderError> {
        let vertex_shader = compile_stage(&backend, ShaderStage::Vertex, vertex_source)?;
        let fragment_shader =
            match compile_stage(&backend, ShaderStage::Fragment, fragment_source) {
                Ok(shader) => shader,
                Err(err) => {
                    backend.delete_shader(vertex_shader);
                    return Err(err);
                }
            };

        let program = backend.create_program();
        let linked = backend.link_program(program, &[vertex_shader, fragment_shader]);
        backend.delete_shader(vertex_shader);
        backend.delete_shader(fragment_shader);

        if let Err(log) = linked {
            backend.delete_program(program);
            return Err(ShaderError::Link { log });
        }

        log::info!("Linked shader program {}", program);
        Ok(ShaderProgram {
            id: program,
            uniforms: HashMap::new(),
            backend,
        })
    }

    pub fn id(&self) -> GLuint {
        self.id
    }

    pub fn set_used(&self) {
        self.backend.use_program(self.id);
    }

    /// Resolves and caches a uniform location.
    ///
    /// Unknown names resolve to -1, which the driver silently ignores on write; a warning is
    /// logged the first time each one is looked up.
    pub fn get_uniform_location(&mut self, name: &str) -> GLint {
        if let Some(location) = self.uniforms.get(name) {
            return *location;
        }

        let location = match CString::new(name) {
            Ok(cname) => self.backend.uniform_location(self.id, &cname),
            Err(_) => -1,
        };

        if location == -1 {
            log::warn!("Uniform '{}' not found in shader program {}", name, self.id);
        }

        self.uniforms.insert(name.to_string(), location);
        location
    }

    pub fn set_uniform_1i(&mut self, name: &str, value: i32) {
        self.set_uniform(name, UniformValue::Int(value));
    }

    pub fn set_uniform_1f(&mut self, name: &str, value: f32) {
        self.set_uniform(name, UniformValue::Float(value));
    }

    pub fn set_uniform_3f(&mut self, name: &str, x: f32, y: f32, z: f32) {
        self.set_uniform(name, UniformValue::Vec3(Vec3::new(x, y, z)));
    }

    pub fn set_uniform_vec3(&mut self, name: &str, vec: Vec3) {
        self.set_uniform(name, UniformValue::Vec3(vec));
    }

    pub fn set_uniform_mat4(&mut self, name: &str, mat: &Mat4) {
        self.set_uniform(name, UniformValue::Mat4(*mat));
    }

    fn set_uniform(&mut self, name: &str, value: UniformValue) {
        self.set_used();
        let location = self.get_uniform_location(name);
        self.backend.set_uniform(location, value);
    }
}

impl<B: ShaderBackend> Drop for ShaderProgram<B> {
    fn drop(&mut self) {
        self.backend.delete_program(self.id);
    }
}

fn read_source(path: &Path) -> Result<String, ShaderError> {
    fs::read_to_string(path).map_err(|source| ShaderError::SourceRead {
        path: path.to_path_buf(),
        source,
    })
}

fn compile_stage<B: ShaderBackend>(
    backend: &B,
    stage: ShaderStage,
    source: &str,
) -> Result<GLuint, ShaderError> {
    let source = CString::new(source)?;
    let shader = backend.create_shader(stage);

    if let Err(log) = backend.compile_shader(shader, &source) {
        backend.delete_shader(shader);
        return Err(ShaderError::Compile { stage, log });
    }

    log::debug!("Compiled {} shader {}", stage, shader);
    Ok(shader)
}

fn log_failure(err: &ShaderError) {
    log::error!("{}", err);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::HashSet;
    use std::ffi::CStr;
    use std::rc::Rc;

    const VERTEX_SRC: &str = "#version 330 core\n\
        layout (location = 0) in vec3 aPos;\n\
        void main() { gl_Position = vec4(aPos, 1.0); }\n";

    const FRAGMENT_SRC: &str = "#version 330 core\n\
        out vec4 FragColor;\n\
        uniform float brightness;\n\
        uniform int mode;\n\
        void main() { FragColor = vec4(brightness); }\n";

    #[derive(Default)]
    struct Driver {
        next_name: GLuint,
        sources: HashMap<GLuint, String>,
        live_shaders: HashSet<GLuint>,
        live_programs: HashSet<GLuint>,
        linked: HashMap<GLuint, Vec<GLuint>>,
        active_program: Option<GLuint>,
        use_calls: usize,
        lookups: usize,
        writes: Vec<(GLint, UniformValue)>,
    }

    /// Fake driver: `#error` fails a compile, a stage without `main` fails the link, and
    /// uniforms are the `uniform` declarations of the linked sources.
    #[derive(Clone, Default)]
    struct RecordingBackend(Rc<RefCell<Driver>>);

    impl RecordingBackend {
        fn driver(&self) -> std::cell::Ref<'_, Driver> {
            self.0.borrow()
        }

        fn declared_uniforms(&self, program: GLuint) -> Vec<String> {
            let driver = self.0.borrow();
            let mut names = Vec::new();
            for shader in &driver.linked[&program] {
                for line in driver.sources[shader].lines() {
                    if let Some(rest) = line.trim().strip_prefix("uniform ") {
                        if let Some(name) = rest.split_whitespace().nth(1) {
                            names.push(name.trim_end_matches(';').to_string());
                        }
                    }
                }
            }
            names
        }
    }

    impl ShaderBackend for RecordingBackend {
        fn create_shader(&self, _stage: ShaderStage) -> GLuint {
            let mut driver = self.0.borrow_mut();
            driver.next_name += 1;
            let name = driver.next_name;
            driver.live_shaders.insert(name);
            name
        }

        fn compile_shader(&self, shader: GLuint, source: &CStr) -> Result<(), String> {
            let source = source.to_string_lossy().into_owned();
            let failed = source.contains("#error");
            self.0.borrow_mut().sources.insert(shader, source);
            if failed {
                Err("0:1(1): error: #error directive".to_string())
            } else {
                Ok(())
            }
        }

        fn delete_shader(&self, shader: GLuint) {
            self.0.borrow_mut().live_shaders.remove(&shader);
        }

        fn create_program(&self) -> GLuint {
            let mut driver = self.0.borrow_mut();
            driver.next_name += 1;
            let name = driver.next_name;
            driver.live_programs.insert(name);
            name
        }

        fn link_program(&self, program: GLuint, shaders: &[GLuint]) -> Result<(), String> {
            let mut driver = self.0.borrow_mut();
            let missing_main = shaders
                .iter()
                .any(|shader| !driver.sources[shader].contains("void main"));
            driver.linked.insert(program, shaders.to_vec());
            if missing_main {
                Err("error: main function not defined".to_string())
            } else {
                Ok(())
            }
        }

        fn delete_program(&self, program: GLuint) {
            let mut driver = self.0.borrow_mut();
            driver.live_programs.remove(&program);
            if driver.active_program == Some(program) {
                driver.active_program = None;
            }
        }

        fn use_program(&self, program: GLuint) {
            let mut driver = self.0.borrow_mut();
            driver.active_program = Some(program);
            driver.use_calls += 1;
        }

        fn uniform_location(&self, program: GLuint, name: &CStr) -> GLint {
            let declared = self.declared_uniforms(program);
            self.0.borrow_mut().lookups += 1;
            let name = name.to_string_lossy();
            declared
                .iter()
                .position(|uniform| *uniform == name)
                .map_or(-1, |index| index as GLint)
        }

        fn set_uniform(&self, location: GLint, value: UniformValue) {
            self.0.borrow_mut().writes.push((location, value));
        }
    }

    thread_local! {
        static CAPTURED: RefCell<Vec<(log::Level, String)>> = RefCell::new(Vec::new());
    }

    /// Records every log line on the emitting thread, so parallel tests stay isolated.
    struct CaptureLogger;

    impl log::Log for CaptureLogger {
        fn enabled(&self, _metadata: &log::Metadata) -> bool {
            true
        }

        fn log(&self, record: &log::Record) {
            CAPTURED.with(|lines| {
                lines
                    .borrow_mut()
                    .push((record.level(), record.args().to_string()))
            });
        }

        fn flush(&self) {}
    }

    static LOGGER: CaptureLogger = CaptureLogger;

    fn capture_logs() {
        // The logger is global to the test binary; only the first call installs it.
        let _ = log::set_logger(&LOGGER);
        log::set_max_level(log::LevelFilter::Trace);
        CAPTURED.with(|lines| lines.borrow_mut().clear());
    }

    fn captured(level: log::Level) -> Vec<String> {
        CAPTURED.with(|lines| {
            lines
                .borrow()
                .iter()
                .filter(|(l, _)| *l == level)
                .map(|(_, message)| message.clone())
                .collect()
        })
    }

    fn write_sources(vertex: &str, fragment: &str) -> (tempfile::TempDir, PathBuf, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let vertex_path = dir.path().join("shader.vert");
        let fragment_path = dir.path().join("shader.frag");
        fs::write(&vertex_path, vertex).unwrap();
        fs::write(&fragment_path, fragment).unwrap();
        (dir, vertex_path, fragment_path)
    }

    #[test]
    fn test_build_from_files() {
        let backend = RecordingBackend::default();
        let (_dir, vertex, fragment) = write_sources(VERTEX_SRC, FRAGMENT_SRC);

        let program = ShaderProgram::build(backend.clone(), &vertex, &fragment).unwrap();
        {
            let driver = backend.driver();
            assert!(driver.live_programs.contains(&program.id()));
            assert!(driver.live_shaders.is_empty(), "stage objects must be released");
        }

        drop(program);
        assert!(backend.driver().live_programs.is_empty());
    }

    #[test]
    fn test_missing_source_file() {
        let backend = RecordingBackend::default();
        let (dir, vertex, _) = write_sources(VERTEX_SRC, FRAGMENT_SRC);
        let missing = dir.path().join("missing.frag");

        let err = ShaderProgram::build(backend.clone(), &vertex, &missing)
            .err()
            .expect("build should fail");
        match err {
            ShaderError::SourceRead { path, .. } => assert_eq!(path, missing),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(backend.driver().next_name, 0, "no GPU objects for unreadable sources");
    }

    #[test]
    fn test_vertex_compile_error() {
        let backend = RecordingBackend::default();
        let broken = "#version 330 core\n#error broken\nvoid main() {}\n";
        let (_dir, vertex, fragment) = write_sources(broken, FRAGMENT_SRC);

        let err = ShaderProgram::build(backend.clone(), &vertex, &fragment)
            .err()
            .expect("build should fail");
        match &err {
            ShaderError::Compile { stage, log } => {
                assert_eq!(*stage, ShaderStage::Vertex);
                assert!(log.contains("#error"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(err.to_string().starts_with("vertex shader compilation failed"));

        let driver = backend.driver();
        assert!(driver.live_shaders.is_empty());
        assert!(driver.live_programs.is_empty());
    }

    #[test]
    fn test_fragment_compile_error_releases_vertex_stage() {
        let backend = RecordingBackend::default();
        let broken = "#version 330 core\n#error broken\nvoid main() {}\n";

        let err = ShaderProgram::build_from_sources(backend.clone(), VERTEX_SRC, broken)
            .err()
            .expect("build should fail");
        assert!(matches!(
            err,
            ShaderError::Compile {
                stage: ShaderStage::Fragment,
                ..
            }
        ));

        let driver = backend.driver();
        assert_eq!(driver.next_name, 2, "both stages were created");
        assert!(driver.live_shaders.is_empty());
        assert!(driver.live_programs.is_empty());
    }

    #[test]
    fn test_link_error_releases_everything() {
        let backend = RecordingBackend::default();
        let no_main = "#version 330 core\nout vec4 FragColor;\n";

        let err = ShaderProgram::build_from_sources(backend.clone(), VERTEX_SRC, no_main)
            .err()
            .expect("link should fail");
        match err {
            ShaderError::Link { log } => assert!(log.contains("main")),
            other => panic!("unexpected error: {other}"),
        }

        let driver = backend.driver();
        assert!(driver.live_shaders.is_empty());
        assert!(driver.live_programs.is_empty());
    }

    #[test]
    fn test_nul_in_source() {
        let backend = RecordingBackend::default();
        let err = ShaderProgram::build_from_sources(backend.clone(), "void main()\0", FRAGMENT_SRC)
            .err()
            .expect("build should fail");
        assert!(matches!(err, ShaderError::Nul(_)));
        assert_eq!(backend.driver().next_name, 0);
    }

    #[test]
    fn test_set_used_is_idempotent() {
        let backend = RecordingBackend::default();
        let program =
            ShaderProgram::build_from_sources(backend.clone(), VERTEX_SRC, FRAGMENT_SRC).unwrap();

        program.set_used();
        let once = backend.driver().active_program;
        program.set_used();
        assert_eq!(backend.driver().active_program, once);
        assert_eq!(once, Some(program.id()));
    }

    #[test]
    fn test_uniform_writes_and_cache() {
        let backend = RecordingBackend::default();
        let mut program =
            ShaderProgram::build_from_sources(backend.clone(), VERTEX_SRC, FRAGMENT_SRC).unwrap();

        program.set_uniform_1f("brightness", 0.5);
        program.set_uniform_1i("mode", 2);
        program.set_uniform_1f("brightness", 0.75);

        let driver = backend.driver();
        assert_eq!(driver.active_program, Some(program.id()));
        assert_eq!(driver.lookups, 2, "locations are cached per name");
        assert_eq!(
            driver.writes,
            vec![
                (0, UniformValue::Float(0.5)),
                (1, UniformValue::Int(2)),
                (0, UniformValue::Float(0.75)),
            ]
        );
    }

    #[test]
    fn test_unknown_uniform_is_forwarded_as_minus_one() {
        let backend = RecordingBackend::default();
        let mut program =
            ShaderProgram::build_from_sources(backend.clone(), VERTEX_SRC, FRAGMENT_SRC).unwrap();

        assert_eq!(program.get_uniform_location("brightnes"), -1);
        program.set_uniform_mat4("brightnes", &Mat4::IDENTITY);
        program.set_uniform_vec3("bad\0name", Vec3::ONE);

        let driver = backend.driver();
        assert_eq!(driver.lookups, 1);
        assert_eq!(
            driver.writes,
            vec![
                (-1, UniformValue::Mat4(Mat4::IDENTITY)),
                (-1, UniformValue::Vec3(Vec3::ONE)),
            ]
        );
    }

    #[test]
    fn test_build_failures_are_logged_as_errors() {
        let broken = "#version 330 core\n#error broken\nvoid main() {}\n";
        let no_main = "#version 330 core\nout vec4 FragColor;\n";
        let (dir, vertex, _) = write_sources(VERTEX_SRC, FRAGMENT_SRC);
        let missing = dir.path().join("missing.frag");

        capture_logs();
        assert!(ShaderProgram::build(RecordingBackend::default(), &vertex, &missing).is_err());
        let errors = captured(log::Level::Error);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].starts_with("Failed to read shader source"));

        capture_logs();
        assert!(
            ShaderProgram::build_from_sources(RecordingBackend::default(), broken, FRAGMENT_SRC)
                .is_err()
        );
        let errors = captured(log::Level::Error);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].starts_with("vertex shader compilation failed"));

        capture_logs();
        assert!(
            ShaderProgram::build_from_sources(RecordingBackend::default(), VERTEX_SRC, no_main)
                .is_err()
        );
        let errors = captured(log::Level::Error);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].starts_with("Program linking failed"));

        capture_logs();
        let program =
            ShaderProgram::build_from_sources(RecordingBackend::default(), VERTEX_SRC, FRAGMENT_SRC)
                .unwrap();
        assert!(captured(log::Level::Error).is_empty());
        assert_eq!(
            captured(log::Level::Info),
            vec![format!("Linked shader program {}", program.id())]
        );
    }

    #[test]
    fn test_missing_uniform_warns_once() {
        let mut program =
            ShaderProgram::build_from_sources(RecordingBackend::default(), VERTEX_SRC, FRAGMENT_SRC)
                .unwrap();

        capture_logs();
        program.set_uniform_1f("brightness", 1.0);
        assert!(captured(log::Level::Warn).is_empty());

        for _ in 0..3 {
            program.set_uniform_1f("brightnes", 1.0);
        }
        let warnings = captured(log::Level::Warn);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("'brightnes'"));
    }
}
