//! WGSL generation for the compute backend.
//!
//! Both kernels are generated per session. Configuration values are baked in
//! as constants and the effect stack is expanded into straight-line
//! statement blocks, so the kernels never branch on a disabled feature.
//! Only per-frame values (time, delta) and per-viewport values (size,
//! coverage, slant) arrive through uniforms.
//!
//! The formulas mirror the CPU path in [`crate::simulate`] and
//! [`crate::compositor`] statement for statement.

use crate::config::{CycleStyle, Projection, RainConfig};
use crate::effects::{EffectStack, EffectStage};
use crate::compositor::{ALPHA_TEST_RATE, FWIDTH_FLOOR, SHARPNESS_SCALE, SMALL_GLYPH_FOOTPRINT};
use crate::hash::HASH_WGSL;
use crate::simulate::{CYCLE_RATE, DEBUG_SEED_PHASE, NUMERIC_FLOOR};

/// Workgroup edge length for both kernels.
pub const WORKGROUP_SIZE: u32 = 8;

/// Format an `f32` as a WGSL float literal.
pub fn wgsl_f32(value: f32) -> String {
    let text = format!("{:?}", value);
    if text.contains('.') || text.contains('e') || text.contains("inf") || text.contains("NaN") {
        text
    } else {
        format!("{}.0", text)
    }
}

const COMMON_WGSL: &str = r#"
const SQRT_2: f32 = 1.4142135623730951;
const SQRT_5: f32 = 2.23606797749979;

fn sanitize(x: f32) -> f32 {
    if (x != x || abs(x) > 3.0e38) {
        return NUMERIC_FLOOR;
    }
    return x;
}

fn wrap_phase(x: f32) -> f32 {
    if (x != x || abs(x) > 3.0e38) {
        return 0.0;
    }
    let wrapped = fract(x);
    if (wrapped >= 1.0) {
        return 0.0;
    }
    return wrapped;
}

fn harmonic_pulse(t: f32, a: f32, b: f32) -> f32 {
    return fract(t + a * sin(SQRT_2 * t) + b * sin(SQRT_5 * t));
}
"#;

/// Simulation kernel: one invocation per cell.
///
/// Bindings (group 0):
/// - 0: `FrameParams { sim_time, delta_frames }` uniform
/// - 1: prior state, `array<vec4<f32>>`, read
/// - 2: next state, `array<vec4<f32>>`, read-write
pub fn simulate_wgsl(config: &RainConfig, effects: &EffectStack) -> String {
    let cycle_speed_body = match config.cycle_style {
        CycleStyle::UniformDrift => "    return harmonic_pulse(t, 0.7, 1.1) * 0.75;\n",
        CycleStyle::DecayCoupled => {
            "    if (brightness > 0.0) {\n        let inverse = 1.0 - brightness;\n        return inverse * inverse * inverse * inverse;\n    }\n    return 0.0;\n"
        }
    };

    let seed = if config.show_computation_texture {
        wgsl_f32(DEBUG_SEED_PHASE)
    } else {
        "wrap_phase(rand(screen_pos))".to_string()
    };

    let output = if config.show_computation_texture {
        "vec4<f32>(brightness, cycle, min(1.0, speed), 1.0)"
    } else {
        "vec4<f32>(brightness, cycle, atlas_index(cycle), effect)"
    };

    format!(
        r#"// Glyph rain simulation kernel
const NUMERIC_FLOOR: f32 = {numeric_floor};
const NUM_COLUMNS: u32 = {num_columns}u;
const NUM_COLUMNS_F: f32 = {num_columns_f};
const SEQUENCE_LENGTH: f32 = {sequence_length};
const TEXTURE_COLUMNS: f32 = {texture_columns};
const ANIMATION_SPEED: f32 = {animation_speed};
const FALL_SPEED: f32 = {fall_speed};
const CYCLE_SPEED: f32 = {cycle_speed};
const CYCLE_RATE: f32 = {cycle_rate};
const RAINDROP_LENGTH: f32 = {raindrop_length};
const BRIGHTNESS_MINIMUM: f32 = {brightness_minimum};
const BRIGHTNESS_MULTIPLIER: f32 = {brightness_multiplier};
const BRIGHTNESS_OFFSET: f32 = {brightness_offset};
const BRIGHTNESS_MIX: f32 = {brightness_mix};

struct FrameParams {{
    sim_time: f32,
    delta_frames: f32,
    _pad0: f32,
    _pad1: f32,
}}

@group(0) @binding(0) var<uniform> params: FrameParams;
@group(0) @binding(1) var<storage, read> state_in: array<vec4<f32>>;
@group(0) @binding(2) var<storage, read_write> state_out: array<vec4<f32>>;
{hash}{common}
fn rain_time(sim_time: f32, glyph_pos: vec2<f32>) -> f32 {{
    let time_offset = rand(vec2<f32>(glyph_pos.x, 0.0));
    let speed_offset = rand(vec2<f32>(glyph_pos.x + 0.1, 0.0));
    let column_time = (time_offset * 1000.0 + sim_time * 0.5 * FALL_SPEED) * (0.5 + speed_offset * 0.5)
        + sin(sim_time * FALL_SPEED * speed_offset) * 0.2;
    return (glyph_pos.y * 0.01 + column_time) / RAINDROP_LENGTH;
}}

fn rain_brightness(t: f32) -> f32 {{
    let value = 1.0 - harmonic_pulse(t, 0.3, 0.2);
    return log(value * 1.25) * 3.0;
}}

fn cycle_speed(t: f32, brightness: f32) -> f32 {{
{cycle_speed_body}}}

fn atlas_index(cycle: f32) -> f32 {{
    let symbol = clamp(floor(SEQUENCE_LENGTH * cycle), 0.0, SEQUENCE_LENGTH - 1.0);
    let x = glsl_mod(symbol, TEXTURE_COLUMNS);
    let y = (TEXTURE_COLUMNS - 1.0) - (symbol - x) / TEXTURE_COLUMNS;
    return y * TEXTURE_COLUMNS + x;
}}

fn blend_weight(delta_frames: f32) -> f32 {{
    if (delta_frames <= 0.0) {{
        return 0.0;
    }}
    if (BRIGHTNESS_MIX >= 1.0) {{
        return 1.0;
    }}
    return 1.0 - pow(1.0 - max(BRIGHTNESS_MIX, 0.0), delta_frames);
}}

@compute @workgroup_size({wg}, {wg})
fn main(@builtin(global_invocation_id) id: vec3<u32>) {{
    if (id.x >= NUM_COLUMNS || id.y >= NUM_COLUMNS) {{
        return;
    }}
    let index = id.y * NUM_COLUMNS + id.x;
    let prior = state_in[index];
    let glyph_pos = vec2<f32>(f32(id.x) + 0.5, f32(id.y) + 0.5);
    let screen_pos = glyph_pos / NUM_COLUMNS_F;
    let sim_time = params.sim_time;

    let initializing = all(prior == vec4<f32>(0.0));
    var old_cycle = wrap_phase(prior.y);
    if (initializing) {{
        old_cycle = {seed};
    }}

    let rt = rain_time(sim_time, glyph_pos);
    var brightness = sanitize(rain_brightness(rt));
{brightness_effects}    brightness = sanitize(brightness);

    let speed = cycle_speed(rt, brightness);
    let cycle = wrap_phase(old_cycle + CYCLE_RATE * ANIMATION_SPEED * CYCLE_SPEED * speed * params.delta_frames);

    var effect = 0.0;
{channel_effects}
    if (brightness > BRIGHTNESS_MINIMUM) {{
        brightness = sanitize(brightness * BRIGHTNESS_MULTIPLIER + BRIGHTNESS_OFFSET);
    }}
    if (!initializing) {{
        let weight = blend_weight(params.delta_frames);
        brightness = sanitize(prior.x) * (1.0 - weight) + brightness * weight;
    }}
    brightness = sanitize(brightness);

    state_out[index] = {output};
}}
"#,
        numeric_floor = wgsl_f32(NUMERIC_FLOOR),
        num_columns = config.num_columns,
        num_columns_f = wgsl_f32(config.num_columns as f32),
        sequence_length = wgsl_f32(config.glyph_sequence_length as f32),
        texture_columns = wgsl_f32(config.glyph_texture_columns as f32),
        animation_speed = wgsl_f32(config.animation_speed),
        fall_speed = wgsl_f32(config.fall_speed),
        cycle_speed = wgsl_f32(config.cycle_speed),
        cycle_rate = wgsl_f32(CYCLE_RATE),
        raindrop_length = wgsl_f32(config.raindrop_length),
        brightness_minimum = wgsl_f32(config.brightness_minimum),
        brightness_multiplier = wgsl_f32(config.brightness_multiplier),
        brightness_offset = wgsl_f32(config.brightness_offset),
        brightness_mix = wgsl_f32(config.brightness_mix),
        hash = HASH_WGSL,
        common = COMMON_WGSL,
        cycle_speed_body = cycle_speed_body,
        wg = WORKGROUP_SIZE,
        seed = seed,
        brightness_effects = effects.stage_wgsl(EffectStage::Brightness),
        channel_effects = effects.stage_wgsl(EffectStage::Channel),
        output = output,
    )
}

/// Composite kernel: one invocation per output pixel.
///
/// Bindings (group 0):
/// - 0: `Viewport` uniform
/// - 1: current state, `array<vec4<f32>>`, read
/// - 2: atlas texels packed as `array<u32>`, read
/// - 3: output pixels, `array<vec4<f32>>`, read-write, top row first
pub fn composite_wgsl(config: &RainConfig) -> String {
    let projection = match config.projection {
        Projection::Polar => {
            r#"    uv = (uv - vec2<f32>(0.5)) * 0.5;
    uv.y = uv.y - 0.5;
    let radius = length(uv);
    let angle = atan2(uv.y, uv.x) / (2.0 * PI) + 0.5;
    uv = vec2<f32>(angle * 4.0 - 0.5, 1.5 - sqrt(radius) * 1.5);
"#
        }
        Projection::Slant { .. } => {
            r#"    let centered = uv - vec2<f32>(0.5);
    uv = vec2<f32>(
        centered.x * viewport.slant_vec.x + centered.y * viewport.slant_vec.y,
        centered.y * viewport.slant_vec.x - centered.x * viewport.slant_vec.y
    ) * viewport.slant_scale + vec2<f32>(0.5);
"#
        }
    };

    let shade = if config.show_computation_texture {
        "    output[out_index] = cell;\n"
    } else {
        r#"    let brightness = max(cell.w, cell.x);
    let msdf_uv = cell_uv(cell.z, glyph_uv(uv));
    let sd = signed_distance(msdf_uv);
    let to_atlas = NUM_COLUMNS_F * CROP_SCALE / TEXTURE_COLUMNS;
    let dx = grid_uv(pixel + vec2<f32>(1.0, 0.0)) - uv;
    let dy = grid_uv(pixel + vec2<f32>(0.0, 1.0)) - uv;
    let sd_dx = signed_distance(msdf_uv + dx * to_atlas);
    let sd_dy = signed_distance(msdf_uv + dy * to_atlas);
    let fw = max(abs(sd_dx - sd) + abs(sd_dy - sd), FWIDTH_FLOOR);
    let value = brightness * glyph_alpha(sd, fw, dx, dy);
    output[out_index] = vec4<f32>(value, value, value, 1.0);
"#
    };

    format!(
        r#"// Glyph rain composite kernel
const NUM_COLUMNS: u32 = {num_columns}u;
const NUM_COLUMNS_F: f32 = {num_columns_f};
const TEXTURE_COLUMNS: f32 = {texture_columns};
const GLYPH_HEIGHT_TO_WIDTH: f32 = {height_to_width};
const CROP_SCALE: f32 = {crop_scale};
const FWIDTH_FLOOR: f32 = {fwidth_floor};
const SMALL_GLYPH_FOOTPRINT: f32 = {small_glyph};
const FOOTPRINT_SCALE: f32 = {footprint_scale};
const ALPHA_TEST_RATE: f32 = {alpha_test_rate};

struct Viewport {{
    width: u32,
    height: u32,
    atlas_width: u32,
    atlas_height: u32,
    quad_scale: vec2<f32>,
    slant_vec: vec2<f32>,
    slant_scale: f32,
    _pad0: f32,
    _pad1: f32,
    _pad2: f32,
}}

@group(0) @binding(0) var<uniform> viewport: Viewport;
@group(0) @binding(1) var<storage, read> state: array<vec4<f32>>;
@group(0) @binding(2) var<storage, read> atlas: array<u32>;
@group(0) @binding(3) var<storage, read_write> output: array<vec4<f32>>;
{hash}
fn grid_uv(pixel: vec2<f32>) -> vec2<f32> {{
    let size = vec2<f32>(f32(max(viewport.width, 1u)), f32(max(viewport.height, 1u)));
    let ndc = pixel / size * 2.0 - vec2<f32>(1.0);
    var uv = ndc / viewport.quad_scale * 0.5 + vec2<f32>(0.5);
{projection}    uv.y = uv.y / GLYPH_HEIGHT_TO_WIDTH;
    return uv;
}}

fn sample_cell(uv: vec2<f32>) -> vec4<f32> {{
    let column = u32(clamp(floor(uv.x * NUM_COLUMNS_F), 0.0, NUM_COLUMNS_F - 1.0));
    let row = u32(clamp(floor(uv.y * NUM_COLUMNS_F), 0.0, NUM_COLUMNS_F - 1.0));
    return state[row * NUM_COLUMNS + column];
}}

fn glyph_uv(uv: vec2<f32>) -> vec2<f32> {{
    let g = fract(uv * NUM_COLUMNS_F);
    return (g - vec2<f32>(0.5)) * CROP_SCALE + vec2<f32>(0.5);
}}

fn cell_uv(index: f32, glyph: vec2<f32>) -> vec2<f32> {{
    let symbol_uv = vec2<f32>(glsl_mod(index, TEXTURE_COLUMNS), floor(index / TEXTURE_COLUMNS));
    return (glyph + symbol_uv) / TEXTURE_COLUMNS;
}}

fn atlas_texel(x: f32, y: f32) -> vec3<f32> {{
    let ix = u32(clamp(x, 0.0, f32(viewport.atlas_width - 1u)));
    let iy = u32(clamp(y, 0.0, f32(viewport.atlas_height - 1u)));
    return unpack4x8unorm(atlas[iy * viewport.atlas_width + ix]).rgb;
}}

fn sample_atlas(uv: vec2<f32>) -> vec3<f32> {{
    let x = uv.x * f32(viewport.atlas_width) - 0.5;
    let y = (1.0 - uv.y) * f32(viewport.atlas_height) - 0.5;
    let x0 = floor(x);
    let y0 = floor(y);
    let top = mix(atlas_texel(x0, y0), atlas_texel(x0 + 1.0, y0), x - x0);
    let bottom = mix(atlas_texel(x0, y0 + 1.0), atlas_texel(x0 + 1.0, y0 + 1.0), x - x0);
    return mix(top, bottom, y - y0);
}}

fn median3(v: vec3<f32>) -> f32 {{
    return max(min(v.x, v.y), min(max(v.x, v.y), v.z));
}}

fn signed_distance(uv: vec2<f32>) -> f32 {{
    return median3(sample_atlas(uv)) - 0.5;
}}

fn glyph_alpha(sd: f32, fw: f32, dx: vec2<f32>, dy: vec2<f32>) -> f32 {{
    let duv = abs((dx + dy) * FOOTPRINT_SCALE);
    let footprint = max(duv.x, duv.y);
    var alpha = clamp(sd / fw + 0.5, 0.0, 1.0);
    if (footprint > SMALL_GLYPH_FOOTPRINT) {{
        let ratio = SMALL_GLYPH_FOOTPRINT / footprint;
        alpha = ratio * alpha + (1.0 - ratio) * (sd + 0.5);
    }} else if (alpha < 0.5) {{
        return 0.0;
    }}
    if (alpha < 0.5 * ALPHA_TEST_RATE * footprint / SMALL_GLYPH_FOOTPRINT) {{
        return 0.0;
    }}
    return alpha;
}}

@compute @workgroup_size({wg}, {wg})
fn main(@builtin(global_invocation_id) id: vec3<u32>) {{
    if (id.x >= viewport.width || id.y >= viewport.height) {{
        return;
    }}
    let pixel = vec2<f32>(f32(id.x) + 0.5, f32(viewport.height - 1u - id.y) + 0.5);
    let uv = grid_uv(pixel);
    let cell = sample_cell(uv);
    let out_index = id.y * viewport.width + id.x;
{shade}}}
"#,
        num_columns = config.num_columns,
        num_columns_f = wgsl_f32(config.num_columns as f32),
        texture_columns = wgsl_f32(config.glyph_texture_columns as f32),
        height_to_width = wgsl_f32(config.glyph_height_to_width),
        crop_scale = wgsl_f32((1.0 - config.glyph_edge_crop).clamp(0.0, 1.0)),
        fwidth_floor = wgsl_f32(FWIDTH_FLOOR),
        small_glyph = wgsl_f32(SMALL_GLYPH_FOOTPRINT),
        footprint_scale = wgsl_f32(SHARPNESS_SCALE / config.glyph_sharpness.max(f32::EPSILON)),
        alpha_test_rate = wgsl_f32(ALPHA_TEST_RATE),
        hash = HASH_WGSL,
        projection = projection,
        shade = shade,
        wg = WORKGROUP_SIZE,
    )
}
