//! wgpu compute backend.
//!
//! Both stages run as generated compute kernels (see [`crate::shader`]).
//! State lives in two storage buffers that alternate roles exactly like
//! [`crate::state::StateBuffer`]; a `front_is_b` flag picks the one to read.
//! After each stage the result is copied back so [`Backend::cells`] and
//! [`Backend::frame`] can hand out plain slices. Submissions are serialized
//! on one queue, so a composite never observes a half-written state buffer.

mod kernels;

use glam::Vec4;
use wgpu::util::DeviceExt;

use crate::backend::{Backend, Session};
use crate::error::{GpuError, InitError};
use crate::frame::Frame;
use crate::projection::ViewportCover;
use crate::state::CellState;
use crate::time::FrameTiming;

pub use kernels::{FrameParamsGpu, ViewportGpu};
use kernels::{workgroups, Kernels};

const CELL_BYTES: u64 = std::mem::size_of::<CellState>() as u64;
const PIXEL_BYTES: u64 = 16;

/// Double-buffered state on the device.
struct GridBuffers {
    dimension: u32,
    state_a: wgpu::Buffer,
    state_b: wgpu::Buffer,
    staging: wgpu::Buffer,
    front_is_b: bool,
}

impl GridBuffers {
    fn new(device: &wgpu::Device, dimension: u32) -> Self {
        let size = dimension as u64 * dimension as u64 * CELL_BYTES;
        let state = |label| {
            device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(label),
                size,
                usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            })
        };
        Self {
            dimension,
            state_a: state("Glyph State A"),
            state_b: state("Glyph State B"),
            staging: device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("Glyph State Staging"),
                size,
                usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
                mapped_at_creation: false,
            }),
            front_is_b: false,
        }
    }

    fn size(&self) -> u64 {
        self.dimension as u64 * self.dimension as u64 * CELL_BYTES
    }

    fn front(&self) -> &wgpu::Buffer {
        if self.front_is_b {
            &self.state_b
        } else {
            &self.state_a
        }
    }

    fn back(&self) -> &wgpu::Buffer {
        if self.front_is_b {
            &self.state_a
        } else {
            &self.state_b
        }
    }

    fn swap(&mut self) {
        self.front_is_b = !self.front_is_b;
    }
}

/// Output pixels on the device.
struct FrameBuffers {
    width: u32,
    height: u32,
    output: wgpu::Buffer,
    staging: wgpu::Buffer,
}

impl FrameBuffers {
    fn new(device: &wgpu::Device, width: u32, height: u32) -> Self {
        // Zero-sized bindings are invalid, keep at least one pixel.
        let size = (width as u64 * height as u64).max(1) * PIXEL_BYTES;
        Self {
            width,
            height,
            output: device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("Glyph Output"),
                size,
                usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC,
                mapped_at_creation: false,
            }),
            staging: device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("Glyph Output Staging"),
                size,
                usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
                mapped_at_creation: false,
            }),
        }
    }

    fn size(&self) -> u64 {
        self.width as u64 * self.height as u64 * PIXEL_BYTES
    }
}

/// Runs simulate and composite as wgpu compute kernels.
pub struct GpuBackend {
    device: wgpu::Device,
    queue: wgpu::Queue,
    kernels: Kernels,
    grid: GridBuffers,
    output: FrameBuffers,
    frame_params: wgpu::Buffer,
    viewport: wgpu::Buffer,
    atlas: wgpu::Buffer,
    cells: Vec<CellState>,
    frame: Frame,
}

impl GpuBackend {
    /// Create a headless device and upload the atlas. Blocks until ready.
    pub fn new(session: &Session, width: u32, height: u32) -> Result<Self, InitError> {
        pollster::block_on(Self::new_async(session, width, height))
    }

    async fn new_async(session: &Session, width: u32, height: u32) -> Result<Self, InitError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .ok_or(GpuError::NoAdapter)?;

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("Glyph Rain Device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default(),
                    memory_hints: Default::default(),
                },
                None,
            )
            .await
            .map_err(GpuError::from)?;

        tracing::info!(adapter = ?adapter.get_info().name, "gpu backend ready");

        let kernels = Kernels::new(&device, session);
        let grid = GridBuffers::new(&device, session.dimension());
        let output = FrameBuffers::new(&device, width, height);

        let frame_params = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Glyph Frame Params"),
            size: std::mem::size_of::<FrameParamsGpu>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let viewport = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Glyph Viewport"),
            size: std::mem::size_of::<ViewportGpu>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let atlas = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Glyph Atlas"),
            contents: bytemuck::cast_slice(&session.atlas().to_packed_rgba()),
            usage: wgpu::BufferUsages::STORAGE,
        });

        let cells = vec![CellState::UNINITIALIZED; session.config().total_cells()];
        let frame = Frame::new(width, height)?;

        Ok(Self {
            device,
            queue,
            kernels,
            grid,
            output,
            frame_params,
            viewport,
            atlas,
            cells,
            frame,
        })
    }

    /// Copy `size` bytes of `source` through `staging` and return them.
    fn read_back(&self, source: &wgpu::Buffer, staging: &wgpu::Buffer, size: u64) -> Result<Vec<u8>, GpuError> {
        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Glyph Readback Encoder"),
        });
        encoder.copy_buffer_to_buffer(source, 0, staging, 0, size);
        self.queue.submit(std::iter::once(encoder.finish()));

        let slice = staging.slice(..size);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        self.device.poll(wgpu::Maintain::Wait);

        rx.recv()
            .map_err(|e| GpuError::BufferMapping(e.to_string()))?
            .map_err(|e| GpuError::BufferMapping(e.to_string()))?;

        let bytes = slice.get_mapped_range().to_vec();
        staging.unmap();
        Ok(bytes)
    }

    fn refresh_cells(&mut self) -> Result<(), GpuError> {
        let bytes = self.read_back(self.grid.front(), &self.grid.staging, self.grid.size())?;
        // The copied bytes carry no alignment guarantee.
        self.cells = bytes
            .chunks_exact(CELL_BYTES as usize)
            .map(bytemuck::pod_read_unaligned::<CellState>)
            .collect();
        Ok(())
    }

    fn refresh_frame(&mut self) -> Result<(), GpuError> {
        let bytes = self.read_back(&self.output.output, &self.output.staging, self.output.size())?;
        for (pixel, chunk) in self
            .frame
            .pixels_mut()
            .iter_mut()
            .zip(bytes.chunks_exact(PIXEL_BYTES as usize))
        {
            *pixel = Vec4::from_array(bytemuck::pod_read_unaligned::<[f32; 4]>(chunk));
        }
        Ok(())
    }
}

impl Backend for GpuBackend {
    fn name(&self) -> &'static str {
        "gpu"
    }

    fn simulate(&mut self, session: &Session, timing: &FrameTiming) {
        let params = FrameParamsGpu {
            sim_time: timing.time_secs * session.config().animation_speed,
            delta_frames: timing.delta_frames,
            _pad: [0.0; 2],
        };
        self.queue.write_buffer(&self.frame_params, 0, bytemuck::bytes_of(&params));

        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Glyph Simulate Bind Group"),
            layout: &self.kernels.simulate_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: self.frame_params.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: self.grid.front().as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: self.grid.back().as_entire_binding(),
                },
            ],
        });

        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Glyph Simulate Encoder"),
        });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("Glyph Simulate Pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.kernels.simulate);
            pass.set_bind_group(0, &bind_group, &[]);
            let groups = workgroups(self.grid.dimension);
            pass.dispatch_workgroups(groups, groups, 1);
        }
        self.queue.submit(std::iter::once(encoder.finish()));
        self.grid.swap();

        if let Err(e) = self.refresh_cells() {
            tracing::error!(error = %e, "state readback failed");
        }
    }

    fn composite(&mut self, session: &Session, cover: &ViewportCover) {
        if self.output.width == 0 || self.output.height == 0 {
            return;
        }
        let uniforms = ViewportGpu::new(session, cover);
        self.queue.write_buffer(&self.viewport, 0, bytemuck::bytes_of(&uniforms));

        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Glyph Composite Bind Group"),
            layout: &self.kernels.composite_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: self.viewport.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: self.grid.front().as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: self.atlas.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: self.output.output.as_entire_binding(),
                },
            ],
        });

        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Glyph Composite Encoder"),
        });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("Glyph Composite Pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.kernels.composite);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.dispatch_workgroups(workgroups(self.output.width), workgroups(self.output.height), 1);
        }
        self.queue.submit(std::iter::once(encoder.finish()));

        if let Err(e) = self.refresh_frame() {
            tracing::error!(error = %e, "frame readback failed");
        }
    }

    fn resize(&mut self, width: u32, height: u32) -> Result<(), InitError> {
        if self.output.width == width && self.output.height == height {
            return Ok(());
        }
        let frame = Frame::new(width, height)?;
        self.output = FrameBuffers::new(&self.device, width, height);
        self.frame = frame;
        Ok(())
    }

    fn rebuild(&mut self, session: &Session) -> Result<(), InitError> {
        let kernels = Kernels::new(&self.device, session);
        if session.dimension() != self.grid.dimension {
            let cells = vec![CellState::UNINITIALIZED; session.config().total_cells()];
            self.grid = GridBuffers::new(&self.device, session.dimension());
            self.cells = cells;
        }
        self.kernels = kernels;
        Ok(())
    }

    fn reset(&mut self) {
        let zeros = vec![0u8; self.grid.size() as usize];
        self.queue.write_buffer(&self.grid.state_a, 0, &zeros);
        self.queue.write_buffer(&self.grid.state_b, 0, &zeros);
        self.queue.submit(std::iter::empty());
        self.grid.front_is_b = false;
        self.cells.fill(CellState::UNINITIALIZED);
    }

    fn cells(&self) -> &[CellState] {
        &self.cells
    }

    fn frame(&self) -> &Frame {
        &self.frame
    }
}
