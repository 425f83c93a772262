use anyhow::{anyhow, Context, Result};
use glam::{Mat4, Vec2, Vec3};
use glutin::{
    config::ConfigTemplateBuilder,
    context::{ContextApi, ContextAttributesBuilder, GlProfile, PossiblyCurrentContext, Version},
    display::GetGlDisplay,
    prelude::*,
    surface::{Surface, SwapInterval, WindowSurface},
};
use glutin_winit::{DisplayBuilder, GlWindow};
use log::{info, warn};
use raw_window_handle::HasRawWindowHandle;
use simple_logger::SimpleLogger;
use std::{ffi::CString, num::NonZeroU32, time::Instant};
use winit::{
    dpi::LogicalSize,
    event::{DeviceEvent, Event, KeyEvent, WindowEvent},
    event_loop::{ControlFlow, EventLoop},
    keyboard::PhysicalKey,
    window::{CursorGrabMode, Window, WindowBuilder},
};

use flycam::{
    config::AppConfig,
    input::InputState,
    render::{Camera, CameraEvent, Mesh, ShaderProgram},
};

const CUBE_POSITIONS: [Vec3; 10] = [
    Vec3::new(0.0, 0.0, 0.0),
    Vec3::new(2.0, 5.0, -15.0),
    Vec3::new(-1.5, -2.2, -2.5),
    Vec3::new(-3.8, -2.0, -12.3),
    Vec3::new(2.4, -0.4, -3.5),
    Vec3::new(-1.7, 3.0, -7.5),
    Vec3::new(1.3, -2.0, -2.5),
    Vec3::new(1.5, 2.0, -2.5),
    Vec3::new(1.5, 0.2, -1.5),
    Vec3::new(-1.3, 1.0, -1.5),
];

// GL objects are declared before the context so they are released while it is still current.
struct App {
    mesh: Mesh,
    program: ShaderProgram,
    camera: Camera,
    input: InputState,
    aspect_ratio: f32,
    clear_color: [f32; 4],
    started: Instant,
    gl_surface: Surface<WindowSurface>,
    gl_context: PossiblyCurrentContext,
    window: Window,
}

impl App {
    fn new(config: &AppConfig, event_loop: &EventLoop<()>) -> Result<Self> {
        let window_builder = WindowBuilder::new()
            .with_title(config.window.title.as_str())
            .with_inner_size(LogicalSize::new(config.window.width, config.window.height));

        let template = ConfigTemplateBuilder::new().with_depth_size(24);
        let display_builder = DisplayBuilder::new().with_window_builder(Some(window_builder));

        let (window, gl_config) = display_builder
            .build(event_loop, template, |configs| {
                // glutin only calls the picker with at least one matching config.
                configs
                    .reduce(|accum, config| {
                        if config.num_samples() > accum.num_samples() {
                            config
                        } else {
                            accum
                        }
                    })
                    .expect("no matching GL config")
            })
            .map_err(|e| anyhow!("Failed to create window: {e}"))?;

        let window = window.context("Display builder returned no window")?;
        let raw_window_handle = window.raw_window_handle();

        let context_attributes = ContextAttributesBuilder::new()
            .with_context_api(ContextApi::OpenGl(Some(Version::new(3, 3))))
            .with_profile(GlProfile::Core)
            .build(Some(raw_window_handle));

        let gl_display = gl_config.display();

        let not_current = unsafe {
            gl_display
                .create_context(&gl_config, &context_attributes)
                .context("Failed to create OpenGL context")?
        };

        let attrs = window.build_surface_attributes(Default::default());
        let gl_surface = unsafe {
            gl_display
                .create_window_surface(&gl_config, &attrs)
                .context("Failed to create GL surface")?
        };

        let gl_context = not_current
            .make_current(&gl_surface)
            .context("Failed to make context current")?;

        if config.window.vsync {
            if let Err(e) =
                gl_surface.set_swap_interval(&gl_context, SwapInterval::Wait(NonZeroU32::MIN))
            {
                warn!("Failed to enable vsync: {}", e);
            }
        }

        // Load OpenGL functions
        gl::load_with(|symbol| match CString::new(symbol) {
            Ok(symbol) => gl_display.get_proc_address(symbol.as_c_str()) as *const _,
            Err(_) => std::ptr::null(),
        });

        unsafe {
            gl::Enable(gl::DEPTH_TEST);
        }

        let program = ShaderProgram::new(&config.shaders.vertex, &config.shaders.fragment)
            .context("Failed to build shader program")?;
        let mesh = Mesh::cube();

        if let Err(e) = window
            .set_cursor_grab(CursorGrabMode::Locked)
            .or_else(|_| window.set_cursor_grab(CursorGrabMode::Confined))
        {
            warn!("Failed to grab cursor: {}", e);
        }
        window.set_cursor_visible(false);

        let size = window.inner_size();
        info!("Window ready ({}x{})", size.width, size.height);

        Ok(Self {
            mesh,
            program,
            camera: Camera::new(&config.camera),
            input: InputState::new(Vec2::from(config.camera.initial_cursor)),
            aspect_ratio: size.width as f32 / size.height.max(1) as f32,
            clear_color: config.window.clear_color,
            started: Instant::now(),
            gl_surface,
            gl_context,
            window,
        })
    }

    fn resize(&mut self, width: u32, height: u32) {
        let (Some(w), Some(h)) = (NonZeroU32::new(width), NonZeroU32::new(height)) else {
            return;
        };
        self.gl_surface.resize(&self.gl_context, w, h);
        unsafe {
            gl::Viewport(0, 0, width as i32, height as i32);
        }
        self.aspect_ratio = width as f32 / height as f32;
    }

    fn render(&mut self) -> Result<()> {
        self.camera.handle(CameraEvent::FrameTick {
            keys: self.input.held(),
            time: self.started.elapsed().as_secs_f64(),
        });

        let [r, g, b, a] = self.clear_color;
        unsafe {
            gl::ClearColor(r, g, b, a);
            gl::Clear(gl::COLOR_BUFFER_BIT | gl::DEPTH_BUFFER_BIT);
        }

        self.program.set_uniform_mat4("view", &self.camera.view_matrix());
        self.program
            .set_uniform_mat4("projection", &self.camera.projection_matrix(self.aspect_ratio));
        self.program.set_uniform_1f("checkerScale", 4.0);

        let axis = Vec3::new(1.0, 0.3, 0.5).normalize();
        for (i, position) in CUBE_POSITIONS.iter().enumerate() {
            let angle = (20.0 * i as f32).to_radians();
            let model = Mat4::from_translation(*position) * Mat4::from_axis_angle(axis, angle);
            let shade = i as f32 / CUBE_POSITIONS.len() as f32;

            self.program.set_uniform_mat4("model", &model);
            self.program.set_uniform_3f("tint", 1.0 - shade * 0.5, 0.6, 0.4 + shade * 0.6);
            self.mesh.draw();
        }

        self.gl_surface
            .swap_buffers(&self.gl_context)
            .context("Failed to swap buffers")
    }

    fn handle_window_event(&mut self, event: WindowEvent) -> bool {
        match event {
            WindowEvent::CloseRequested => return true,
            WindowEvent::Resized(size) => self.resize(size.width, size.height),
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(code),
                        state,
                        ..
                    },
                ..
            } => {
                self.input.handle_key(code, state);
                return self.input.quit_requested();
            }
            WindowEvent::MouseWheel { delta, .. } => {
                self.camera.handle(CameraEvent::Scroll {
                    delta_y: InputState::scroll_lines(delta),
                });
            }
            WindowEvent::Focused(false) => self.input.release_all(),
            WindowEvent::RedrawRequested => {
                if let Err(e) = self.render() {
                    log::error!("Render failed: {:#}", e);
                    return true;
                }
            }
            _ => {}
        }
        false
    }
}

fn main() -> Result<()> {
    let loaded = AppConfig::load_or_create();
    let config = loaded.as_ref().cloned().unwrap_or_default();

    SimpleLogger::new().with_level(config.log_level()).init()?;
    if let Err(e) = &loaded {
        warn!("Using default configuration: {:#}", e);
    }
    info!("Initializing application...");

    let event_loop = EventLoop::new()?;
    let mut app = App::new(&config, &event_loop)?;

    event_loop.run(move |event, elwt| {
        elwt.set_control_flow(ControlFlow::Poll);
        match event {
            Event::WindowEvent { event, .. } => {
                if app.handle_window_event(event) {
                    elwt.exit();
                }
            }
            Event::DeviceEvent {
                event: DeviceEvent::MouseMotion { delta },
                ..
            } => {
                let cursor = app.input.handle_mouse_motion(delta);
                app.camera.handle(CameraEvent::PointerMoved {
                    x: cursor.x,
                    y: cursor.y,
                });
            }
            Event::AboutToWait => app.window.request_redraw(),
            _ => (),
        }
    })?;

    Ok(())
}
