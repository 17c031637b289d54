//! End-to-end scenarios driving the pipeline the way a host would.

use glyphrain::effects::{ripple_time, RIPPLE_BOOST};
use glyphrain::hash::rand2;
use glyphrain::simulate::{simulate_grid, StepContext};
use glyphrain::time::REFERENCE_FRAME_MS;
use glyphrain::{
    CellState, EffectStack, FrameDecision, GlyphAtlas, Pipeline, RainConfig, RippleType, StateBuffer, Vec2,
};

fn pipeline(config: RainConfig, viewport: (u32, u32)) -> Pipeline {
    let atlas = GlyphAtlas::procedural(config.glyph_texture_columns, 16).unwrap();
    Pipeline::initialize_with_atlas(config, atlas, viewport).unwrap()
}

#[test]
fn test_small_grid_hundred_frames() {
    let config = RainConfig::default()
        .with_columns(4)
        .with_animation_speed(1.0)
        .with_fall_speed(1.0)
        .with_cycle_speed(1.0)
        .with_raindrop_length(1.0);
    assert!(EffectStack::from_config(&config).is_identity());

    let mut pipeline = pipeline(config, (64, 64));
    assert!(pipeline.step(0.0).timing().is_some());
    let mut previous: Vec<f32> = pipeline.cells().iter().map(|c| c.cycle_phase).collect();
    let mut advanced = vec![0.0f32; previous.len()];

    for frame in 1..=100 {
        let decision = pipeline.step(frame as f64 * 16.0);
        assert!(matches!(decision, FrameDecision::Step(_)), "frame {frame} dropped");

        for (i, cell) in pipeline.cells().iter().enumerate() {
            assert!(!cell.brightness.is_nan(), "NaN brightness at cell {i}, frame {frame}");
            assert!((0.0..1.0).contains(&cell.cycle_phase));

            // Forward distance around the circle; a backwards step would wrap to nearly 1.
            let step = (cell.cycle_phase - previous[i]).rem_euclid(1.0);
            assert!(step < 0.01, "cell {i} moved {step} at frame {frame}");
            advanced[i] += step;
            previous[i] = cell.cycle_phase;
        }
    }

    assert_eq!(pipeline.frame_count(), 101);
    assert!(advanced.iter().any(|&a| a > 0.0), "no cell ever cycled");
}

#[test]
fn test_circle_ripple_annulus() {
    const COLUMNS: u32 = 32;
    const SIM_TIME: f32 = 5.0;
    const SCALE: f32 = 1.5;
    const SPEED: f32 = 0.2;
    const THICKNESS: f32 = 0.2;

    let config = RainConfig::default()
        .with_columns(COLUMNS)
        .with_ripple(RippleType::Circle)
        .with_ripple_params(SCALE, SPEED, THICKNESS);
    let effects = EffectStack::from_config(&config);

    let rt = ripple_time(SIM_TIME, SPEED);
    let radius = rt.fract() * SCALE;
    let center = rand2(Vec2::new(rt.floor(), 0.0)) - Vec2::splat(0.5);

    let mut state = StateBuffer::new(COLUMNS).unwrap();
    let (front, back) = state.split_mut();
    simulate_grid(front, back, COLUMNS, &StepContext::new(&config, &effects, SIM_TIME, 1.0));
    state.swap();

    let (mut inside, mut outside) = (0, 0);
    for row in 0..COLUMNS {
        for column in 0..COLUMNS {
            let screen = Vec2::new(column as f32 + 0.5, row as f32 + 0.5) / COLUMNS as f32;
            let distance = (screen * 2.0 - Vec2::ONE + center).length();
            let ring = radius - distance;
            let cell = state.cell(column, row).unwrap();

            // Stay clear of the ring edges where rounding could go either way.
            if ring > 1e-3 && ring < THICKNESS - 1e-3 {
                inside += 1;
                assert!(cell.effect >= RIPPLE_BOOST, "cell ({column}, {row}) inside ring has effect {}", cell.effect);
            } else if ring < -1e-3 || ring > THICKNESS + 1e-3 {
                outside += 1;
                assert!(cell.effect < RIPPLE_BOOST, "cell ({column}, {row}) outside ring has effect {}", cell.effect);
            }
        }
    }
    assert!(inside > 0, "ring covers no cells at radius {radius}");
    assert!(outside > 0);
}

#[test]
fn test_ripple_not_persisted_between_steps() {
    let config = RainConfig::default()
        .with_columns(16)
        .with_ripple(RippleType::Box)
        .with_ripple_params(1.5, 0.2, 0.2);
    let mut pipeline = pipeline(config, (32, 32));
    pipeline.step(5_000.0);
    assert!(pipeline.cells().iter().any(|c| c.effect > 0.0));

    // Turning the effect off clears the channel on the very next step.
    pipeline.reconfigure(RainConfig::default().with_columns(16)).unwrap();
    pipeline.step(5_016.0);
    assert!(pipeline.cells().iter().all(|c| c.effect < RIPPLE_BOOST));
}

#[test]
fn test_stall_clamps_delta() {
    let mut pipeline = pipeline(RainConfig::default().with_columns(4), (16, 16));
    pipeline.step(0.0);
    pipeline.step(16.0);
    let phases: Vec<f32> = pipeline.cells().iter().map(|c| c.cycle_phase).collect();

    // A five second gap steps with zero delta, so no cell cycles.
    let decision = pipeline.step(5_016.0);
    assert_eq!(decision.timing().map(|t| t.delta_frames), Some(0.0));
    let after: Vec<f32> = pipeline.cells().iter().map(|c| c.cycle_phase).collect();
    assert_eq!(phases, after);
    assert_eq!(pipeline.clock().stalls(), 1);
}

#[test]
fn test_composited_frame_shows_rain() {
    let mut pipeline = pipeline(RainConfig::default().with_columns(20), (160, 120));
    for frame in 0..30 {
        pipeline.step(frame as f64 * REFERENCE_FRAME_MS);
    }
    let frame = pipeline.frame();
    assert_eq!((frame.width(), frame.height()), (160, 120));
    assert!(frame.pixels().iter().all(|p| p.is_finite()));
    assert!(frame.pixels().iter().all(|p| p.w == 1.0));
    assert!(frame.mean_luminance() > 0.0, "frame is black");
}

#[test]
fn test_debug_view_emits_raw_state() {
    let config = RainConfig::default().with_columns(4).with_computation_texture(true);
    let mut pipeline = pipeline(config, (4, 4));
    pipeline.step(0.0);

    // Each output pixel covers exactly one cell, with rows flipped.
    for y in 0..4u32 {
        for x in 0..4u32 {
            let cell: CellState = pipeline.cells()[(y * 4 + x) as usize];
            let pixel = pipeline.frame().get(x, 3 - y).unwrap();
            assert_eq!(pixel.x, cell.brightness);
            assert_eq!(pixel.y, 0.5);
            assert_eq!(pixel.w, 1.0);
        }
    }
}

#[test]
fn test_polar_projection_runs() {
    let mut pipeline = pipeline(RainConfig::default().with_columns(24).with_polar(), (96, 64));
    for frame in 0..10 {
        pipeline.step(frame as f64 * 16.0);
    }
    assert!(pipeline.frame().pixels().iter().all(|p| p.is_finite()));
}
