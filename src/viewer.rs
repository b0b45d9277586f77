//! Interactive window: Space toggles the mode, left-drag orbits, scroll zooms.

use std::sync::Arc;
use std::time::Instant;

use anyhow::{anyhow, Result};
use winit::dpi::{LogicalSize, PhysicalPosition};
use winit::event::{ElementState, Event, MouseButton, MouseScrollDelta, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop};
use winit::keyboard::{Key, NamedKey};
use winit::window::WindowBuilder;

use crate::config::SceneConfig;
use crate::gpu::renderer::Renderer;
use crate::visualiser::VisualiserState;

/// Radians of orbit per pixel of drag.
const ORBIT_SPEED: f32 = 0.005;
/// Fractional zoom per scroll line.
const ZOOM_STEP: f32 = 0.1;
/// Longest frame step fed to the simulation.
const MAX_FRAME_DELTA: f32 = 0.1;

pub fn run(config: SceneConfig) -> Result<()> {
    let event_loop = EventLoop::new()?;
    let window = Arc::new(
        WindowBuilder::new()
            .with_title("Evergreen")
            .with_inner_size(LogicalSize::new(1280, 800))
            .build(&event_loop)?,
    );

    let instance = wgpu::Instance::new(wgpu::InstanceDescriptor::default());
    let surface = instance.create_surface(window.clone())?;
    let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
        power_preference: wgpu::PowerPreference::HighPerformance,
        compatible_surface: Some(&surface),
        force_fallback_adapter: false,
    }))
    .ok_or_else(|| anyhow!("No adapter found"))?;
    let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor::default(), None))?;

    let capabilities = surface.get_capabilities(&adapter);
    let format = capabilities
        .formats
        .iter()
        .copied()
        .find(|f| f.is_srgb())
        .or_else(|| capabilities.formats.first().copied())
        .ok_or_else(|| anyhow!("Surface has no supported formats"))?;

    let size = window.inner_size();
    let mut surface_config = wgpu::SurfaceConfiguration {
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        format,
        width: size.width.max(1),
        height: size.height.max(1),
        present_mode: wgpu::PresentMode::Fifo,
        alpha_mode: wgpu::CompositeAlphaMode::Auto,
        view_formats: vec![],
        desired_maximum_frame_latency: 2,
    };
    surface.configure(&device, &surface_config);

    let mut scene = VisualiserState::new(&config)?;
    let mut renderer = Renderer::new(device, queue, format, surface_config.width, surface_config.height, &scene);

    let mut last_frame = Instant::now();
    let mut dragging = false;
    let mut last_cursor: Option<PhysicalPosition<f64>> = None;

    log::info!("Viewer started: Space toggles, drag orbits, scroll zooms");

    event_loop.run(move |event, elwt| {
        elwt.set_control_flow(ControlFlow::Poll);

        match event {
            Event::WindowEvent { event, .. } => match event {
                WindowEvent::CloseRequested => elwt.exit(),
                WindowEvent::Resized(new_size) => {
                    if new_size.width > 0 && new_size.height > 0 {
                        surface_config.width = new_size.width;
                        surface_config.height = new_size.height;
                        surface.configure(renderer.device(), &surface_config);
                        renderer.resize(new_size.width, new_size.height);
                    }
                }
                WindowEvent::KeyboardInput { event, .. } => {
                    if event.state == ElementState::Pressed && !event.repeat {
                        match event.logical_key {
                            Key::Named(NamedKey::Space) => {
                                scene.toggle_mode();
                            }
                            Key::Named(NamedKey::Escape) => elwt.exit(),
                            _ => {}
                        }
                    }
                }
                WindowEvent::MouseInput { state, button: MouseButton::Left, .. } => {
                    dragging = state == ElementState::Pressed;
                }
                WindowEvent::CursorMoved { position, .. } => {
                    if let (true, Some(last)) = (dragging, last_cursor) {
                        let dx = (position.x - last.x) as f32;
                        let dy = (position.y - last.y) as f32;
                        scene.camera_mut().orbit(-dx * ORBIT_SPEED, -dy * ORBIT_SPEED);
                    }
                    last_cursor = Some(position);
                }
                WindowEvent::MouseWheel { delta, .. } => {
                    let scroll = match delta {
                        MouseScrollDelta::LineDelta(_, y) => y,
                        MouseScrollDelta::PixelDelta(pos) => pos.y as f32 / 100.0,
                    };
                    scene.camera_mut().zoom(1.0 - scroll * ZOOM_STEP);
                }
                WindowEvent::RedrawRequested => {
                    let now = Instant::now();
                    let dt = (now - last_frame).as_secs_f32().min(MAX_FRAME_DELTA);
                    last_frame = now;
                    scene.update(dt);

                    match surface.get_current_texture() {
                        Ok(frame) => {
                            let view = frame.texture.create_view(&wgpu::TextureViewDescriptor::default());
                            renderer.render(&view, &mut scene);
                            frame.present();
                        }
                        Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                            surface.configure(renderer.device(), &surface_config);
                        }
                        Err(e) => log::warn!("Dropped frame: {}", e),
                    }
                }
                _ => {}
            },
            Event::AboutToWait => window.request_redraw(),
            _ => {}
        }
    })?;

    Ok(())
}
