use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;

use crate::config::SceneConfig;
use crate::foliage::FoliageSample;
use crate::gpu::renderer::Renderer;
use crate::profiling;
use crate::sampler::{LayoutSampler, RandomSampler};
use crate::transition::Mode;
use crate::visualiser::VisualiserState;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render frames to disk
    Render {
        /// Output directory for frames
        #[arg(long)]
        out: PathBuf,

        /// Frames per second
        #[arg(long, default_value_t = 60.0)]
        fps: f32,

        /// Duration in seconds
        #[arg(long, default_value_t = 6.0)]
        duration: f32,

        /// Output width
        #[arg(long, default_value_t = 800)]
        width: u32,

        /// Output height
        #[arg(long, default_value_t = 600)]
        height: u32,

        /// Toggle the mode at this time in seconds (repeatable)
        #[arg(long = "toggle-at")]
        toggle_at: Vec<f32>,

        /// Scene config JSON
        #[arg(long)]
        config: Option<PathBuf>,

        /// Log per-frame timings
        #[arg(long)]
        profile: bool,
    },
    /// Run the simulation without a GPU and write a JSON trace
    Simulate {
        #[arg(long, default_value_t = 360)]
        frames: u64,

        #[arg(long, default_value_t = 60.0)]
        fps: f32,

        /// Toggle the mode at this time in seconds (repeatable)
        #[arg(long = "toggle-at")]
        toggle_at: Vec<f32>,

        /// Scene config JSON
        #[arg(long)]
        config: Option<PathBuf>,

        /// Trace file; stdout when absent
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Open an interactive window
    View {
        /// Scene config JSON
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Render { out, fps, duration, width, height, toggle_at, config, profile } => {
            if profile {
                profiling::set_profiling_enabled(true);
            }
            let config = SceneConfig::load_or_default(config.as_deref())?;
            let options = RenderOptions { fps, duration, width, height, toggle_at };
            pollster::block_on(render_offline(&config, &out, options))?;
        }
        Commands::Simulate { frames, fps, toggle_at, config, output } => {
            let config = SceneConfig::load_or_default(config.as_deref())?;
            let trace = simulate(&config, frames, fps, &toggle_at, &mut RandomSampler::from_thread_rng())?;
            let json = serde_json::to_string_pretty(&trace)?;
            match output {
                Some(path) => {
                    std::fs::write(&path, json).with_context(|| format!("writing {}", path.display()))?;
                    log::info!("Wrote {} frames to {}", trace.len(), path.display());
                }
                None => println!("{}", json),
            }
        }
        Commands::View { config } => {
            let config = SceneConfig::load_or_default(config.as_deref())?;
            crate::viewer::run(config)?;
        }
    }
    Ok(())
}

/// Sorted toggle times, consumed as the clock passes them.
struct ToggleSchedule {
    times: Vec<f32>,
    next: usize,
}

impl ToggleSchedule {
    fn new(times: &[f32]) -> Self {
        let mut times: Vec<f32> = times.iter().copied().filter(|t| t.is_finite()).collect();
        times.sort_by(|a, b| a.total_cmp(b));
        Self { times, next: 0 }
    }

    /// Number of toggles that fall due at or before `elapsed`.
    fn due(&mut self, elapsed: f32) -> usize {
        let start = self.next;
        while self.next < self.times.len() && self.times[self.next] <= elapsed {
            self.next += 1;
        }
        self.next - start
    }
}

#[derive(Debug, Serialize)]
pub struct GroupTrace {
    pub label: String,
    pub progress: f32,
    /// Mean distance of the group's elements from their tree positions.
    pub mean_distance: f32,
}

#[derive(Debug, Serialize)]
pub struct TraceFrame {
    pub frame: u64,
    pub time: f32,
    pub mode: Mode,
    pub groups: Vec<GroupTrace>,
    pub star_scale: Option<f32>,
    pub failures: usize,
}

/// Step the scene `frames` times at `fps`, recording each frame.
pub fn simulate<S: LayoutSampler + ?Sized>(
    config: &SceneConfig,
    frames: u64,
    fps: f32,
    toggle_at: &[f32],
    sampler: &mut S,
) -> Result<Vec<TraceFrame>> {
    anyhow::ensure!(fps.is_finite() && fps > 0.0, "fps must be positive, got {}", fps);
    let dt = 1.0 / fps;
    let mut state = VisualiserState::with_sampler(config, sampler)?;
    let mut schedule = ToggleSchedule::new(toggle_at);
    let mut samples: Vec<FoliageSample> = Vec::new();
    let mut trace = Vec::with_capacity(frames as usize);

    for _ in 0..frames {
        for _ in 0..schedule.due(state.time + dt) {
            state.toggle_mode();
        }
        let report = state.update(dt);

        let model_view = state.camera().view_matrix() * state.scene_matrix();
        let foliage = state.foliage();
        foliage.evaluate_batch(model_view, &mut samples);
        let foliage_distance = mean(
            samples
                .iter()
                .enumerate()
                .map(|(i, s)| s.position.distance(foliage.layout().tree_position(i))),
        );

        let mut groups = vec![GroupTrace {
            label: "foliage".to_string(),
            progress: foliage.transition().progress(),
            mean_distance: foliage_distance,
        }];
        groups.extend(state.ornaments().iter().map(|group| GroupTrace {
            label: group.label().to_string(),
            progress: group.transition().progress(),
            mean_distance: mean(
                (0..group.len())
                    .map(|i| group.instance_transform(i).position.distance(group.layout().tree_position(i))),
            ),
        }));

        trace.push(TraceFrame {
            frame: report.frame,
            time: state.time,
            mode: state.mode(),
            groups,
            star_scale: state.star().map(|s| s.scale()),
            failures: report.failures.len(),
        });
    }

    Ok(trace)
}

fn mean(values: impl Iterator<Item = f32>) -> f32 {
    let (sum, n) = values.fold((0.0f32, 0usize), |(sum, n), v| (sum + v, n + 1));
    if n == 0 {
        0.0
    } else {
        sum / n as f32
    }
}

struct RenderOptions {
    fps: f32,
    duration: f32,
    width: u32,
    height: u32,
    toggle_at: Vec<f32>,
}

async fn render_offline(config: &SceneConfig, out_dir: &Path, options: RenderOptions) -> Result<()> {
    let RenderOptions { fps, duration, width, height, toggle_at } = options;
    anyhow::ensure!(fps.is_finite() && fps > 0.0, "fps must be positive, got {}", fps);
    anyhow::ensure!(width > 0 && height > 0, "output size must be non-zero");

    let total_frames = (duration.max(0.0) * fps).ceil() as usize;
    let dt = 1.0 / fps;

    std::fs::create_dir_all(out_dir)?;

    // WGPU Init
    let instance = wgpu::Instance::new(wgpu::InstanceDescriptor::default());
    let adapter = instance
        .request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: None, // Headless
            force_fallback_adapter: false,
        })
        .await
        .ok_or_else(|| anyhow::anyhow!("No adapter found"))?;

    let (device, queue) = adapter
        .request_device(&wgpu::DeviceDescriptor::default(), None)
        .await?;

    let texture_desc = wgpu::TextureDescriptor {
        label: Some("Target Texture"),
        size: wgpu::Extent3d { width, height, depth_or_array_layers: 1 },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Rgba8UnormSrgb,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
        view_formats: &[],
    };

    let texture = device.create_texture(&texture_desc);
    let texture_view = texture.create_view(&wgpu::TextureViewDescriptor::default());

    // Buffer for reading back data
    let u32_size = std::mem::size_of::<u32>() as u32;
    let unpadded_bytes_per_row = u32_size * width;
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    let padded_bytes_per_row_padding = (align - unpadded_bytes_per_row % align) % align;
    let padded_bytes_per_row = unpadded_bytes_per_row + padded_bytes_per_row_padding;

    let output_buffer = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("Output Buffer"),
        size: (padded_bytes_per_row * height) as wgpu::BufferAddress,
        usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
        mapped_at_creation: false,
    });

    let mut state = VisualiserState::new(config)?;
    let mut schedule = ToggleSchedule::new(&toggle_at);
    let mut renderer = Renderer::new(device, queue, texture_desc.format, width, height, &state);

    println!("Rendering {} frames to {:?}...", total_frames, out_dir);

    for i in 0..total_frames {
        for _ in 0..schedule.due(state.time + dt) {
            state.toggle_mode();
        }
        state.update(dt);

        profiling::timed("render", || renderer.render(&texture_view, &mut state));

        let mut encoder = renderer
            .device()
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: None });

        encoder.copy_texture_to_buffer(
            wgpu::ImageCopyTexture {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::ImageCopyBuffer {
                buffer: &output_buffer,
                layout: wgpu::ImageDataLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_bytes_per_row),
                    rows_per_image: Some(height),
                },
            },
            texture_desc.size,
        );
        renderer.queue().submit(Some(encoder.finish()));

        // Map buffer and save
        let buffer_slice = output_buffer.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        buffer_slice.map_async(wgpu::MapMode::Read, move |v| {
            let _ = tx.send(v);
        });
        renderer.device().poll(wgpu::Maintain::Wait);
        rx.recv()??;

        let data = buffer_slice.get_mapped_range();

        let mut unpadded_data = Vec::with_capacity((width * height * 4) as usize);
        for row in 0..height {
            let start = (row * padded_bytes_per_row) as usize;
            let end = start + unpadded_bytes_per_row as usize;
            unpadded_data.extend_from_slice(&data[start..end]);
        }

        let frame_path = out_dir.join(format!("frame_{:05}.png", i));
        image::save_buffer(&frame_path, &unpadded_data, width, height, image::ColorType::Rgba8)?;

        drop(data);
        output_buffer.unmap();

        if i % 60 == 0 {
            print!(".");
            use std::io::Write;
            std::io::stdout().flush()?;
        }
    }
    println!("\nDone.");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foliage::FoliageConfig;

    fn small_config(initial_mode: Mode) -> SceneConfig {
        SceneConfig {
            initial_mode,
            foliage: FoliageConfig {
                count: 200,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_toggle_schedule() {
        let mut schedule = ToggleSchedule::new(&[2.0, 1.0, f32::NAN, 1.0]);
        assert_eq!(schedule.due(0.5), 0);
        assert_eq!(schedule.due(1.0), 2);
        assert_eq!(schedule.due(1.5), 0);
        assert_eq!(schedule.due(10.0), 1);
        assert_eq!(schedule.due(20.0), 0);
    }

    #[test]
    fn test_simulate_assembles() {
        let trace = simulate(&small_config(Mode::Scattered), 10, 60.0, &[0.0], &mut RandomSampler::seeded(11)).unwrap();
        assert_eq!(trace.len(), 10);
        for frame in &trace {
            assert_eq!(frame.mode, Mode::Assembled);
            assert_eq!(frame.groups.len(), 4);
            assert_eq!(frame.failures, 0);
        }
        let first = &trace[0].groups[0];
        let last = &trace[9].groups[0];
        assert!(last.progress > first.progress);
        assert!(last.mean_distance < first.mean_distance);
    }

    #[test]
    fn test_simulate_stays_assembled_without_toggles() {
        let trace = simulate(&small_config(Mode::Assembled), 5, 30.0, &[], &mut RandomSampler::seeded(12)).unwrap();
        for frame in &trace {
            for group in &frame.groups[1..] {
                assert_eq!(group.progress, 1.0);
                assert!(group.mean_distance < 1e-4);
            }
            assert_eq!(frame.star_scale, Some(1.0));
        }
    }

    #[test]
    fn test_simulate_rejects_bad_fps() {
        assert!(simulate(&small_config(Mode::Assembled), 1, 0.0, &[], &mut RandomSampler::seeded(13)).is_err());
    }

    #[test]
    fn test_trace_serializes() {
        let trace = simulate(&small_config(Mode::Assembled), 1, 60.0, &[], &mut RandomSampler::seeded(14)).unwrap();
        let json = serde_json::to_value(&trace).unwrap();
        assert_eq!(json[0]["mode"], "assembled");
        assert_eq!(json[0]["groups"][1]["label"], "gold");
    }
}
