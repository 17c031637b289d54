//! Compute pipelines and uniform layouts for the GPU backend.

use bytemuck::{Pod, Zeroable};

use crate::backend::Session;
use crate::projection::{GridProjection, ViewportCover};
use crate::shader::{composite_wgsl, simulate_wgsl, WORKGROUP_SIZE};

/// Per-frame uniforms for the simulate kernel.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct FrameParamsGpu {
    pub sim_time: f32,
    pub delta_frames: f32,
    pub _pad: [f32; 2],
}

/// Per-viewport uniforms for the composite kernel.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct ViewportGpu {
    pub width: u32,
    pub height: u32,
    pub atlas_width: u32,
    pub atlas_height: u32,
    pub quad_scale: [f32; 2],
    pub slant_vec: [f32; 2],
    pub slant_scale: f32,
    pub _pad: [f32; 3],
}

impl ViewportGpu {
    pub fn new(session: &Session, cover: &ViewportCover) -> Self {
        let (slant_vec, slant_scale) = match GridProjection::from_config(&session.config().projection) {
            GridProjection::Slant { direction, scale } => (direction.to_array(), scale),
            GridProjection::Polar => ([1.0, 0.0], 1.0),
        };
        Self {
            width: cover.width(),
            height: cover.height(),
            atlas_width: session.atlas().width(),
            atlas_height: session.atlas().height(),
            quad_scale: cover.quad_scale().to_array(),
            slant_vec,
            slant_scale,
            _pad: [0.0; 3],
        }
    }
}

/// Number of workgroups covering `extent` invocations along one axis.
pub fn workgroups(extent: u32) -> u32 {
    extent.div_ceil(WORKGROUP_SIZE)
}

/// The two compute pipelines with their bind group layouts.
pub struct Kernels {
    pub simulate: wgpu::ComputePipeline,
    pub simulate_layout: wgpu::BindGroupLayout,
    pub composite: wgpu::ComputePipeline,
    pub composite_layout: wgpu::BindGroupLayout,
}

impl Kernels {
    /// Generate and compile both kernels for `session`.
    pub fn new(device: &wgpu::Device, session: &Session) -> Self {
        let (simulate, simulate_layout) = create_pipeline(
            device,
            "Glyph Rain Simulate",
            &simulate_wgsl(session.config(), session.effects()),
            &[
                uniform_entry(0),
                storage_entry(1, true),
                storage_entry(2, false),
            ],
        );
        let (composite, composite_layout) = create_pipeline(
            device,
            "Glyph Rain Composite",
            &composite_wgsl(session.config()),
            &[
                uniform_entry(0),
                storage_entry(1, true),
                storage_entry(2, true),
                storage_entry(3, false),
            ],
        );
        Self {
            simulate,
            simulate_layout,
            composite,
            composite_layout,
        }
    }
}

fn uniform_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

fn storage_entry(binding: u32, read_only: bool) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only },
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

fn create_pipeline(
    device: &wgpu::Device,
    label: &str,
    source: &str,
    entries: &[wgpu::BindGroupLayoutEntry],
) -> (wgpu::ComputePipeline, wgpu::BindGroupLayout) {
    let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(label),
        source: wgpu::ShaderSource::Wgsl(source.into()),
    });

    let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some(label),
        entries,
    });

    let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some(label),
        bind_group_layouts: &[&bind_group_layout],
        push_constant_ranges: &[],
    });

    let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
        label: Some(label),
        layout: Some(&pipeline_layout),
        module: &shader,
        entry_point: Some("main"),
        compilation_options: Default::default(),
        cache: None,
    });

    (pipeline, bind_group_layout)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniform_sizes() {
        assert_eq!(std::mem::size_of::<FrameParamsGpu>(), 16);
        assert_eq!(std::mem::size_of::<ViewportGpu>(), 48);
    }

    #[test]
    fn test_workgroups_round_up() {
        assert_eq!(workgroups(1), 1);
        assert_eq!(workgroups(8), 1);
        assert_eq!(workgroups(9), 2);
        assert_eq!(workgroups(80), 10);
    }
}
