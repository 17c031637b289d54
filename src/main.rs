//! Headless glyph rain renderer.
//!
//! ```text
//! glyphrain [FRAMES] [OUT_DIR] [CONFIG_JSON] [ATLAS_PNG]
//! ```
//!
//! Renders `FRAMES` frames (default 120) at 60 Hz and writes every tenth
//! one, plus the last, to `OUT_DIR` (default `rain_frames`). Without an
//! atlas image a procedural one is generated. Set `GLYPHRAIN_GPU=1` to use
//! the wgpu backend when built with the `gpu` feature.

use std::error::Error;
use std::path::{Path, PathBuf};

use glyphrain::prelude::*;
use glyphrain::time::REFERENCE_FRAME_MS;
use tracing_subscriber::EnvFilter;

const VIEWPORT: (u32, u32) = (640, 480);
const PROCEDURAL_CELL_SIZE: u32 = 32;
const SAVE_EVERY: u32 = 10;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    if let Err(err) = run() {
        tracing::error!(%err, "glyph rain failed");
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn Error>> {
    let mut args = std::env::args().skip(1);
    let frames: u32 = match args.next() {
        Some(arg) => arg.parse()?,
        None => 120,
    };
    let out_dir = PathBuf::from(args.next().unwrap_or_else(|| "rain_frames".to_string()));
    let config = match args.next() {
        Some(path) => RainConfig::from_json(&std::fs::read_to_string(path)?)?,
        None => RainConfig::default(),
    };
    let atlas = match args.next() {
        Some(path) => GlyphAtlas::from_file(path, config.glyph_texture_columns)?,
        None => GlyphAtlas::procedural(config.glyph_texture_columns, PROCEDURAL_CELL_SIZE)?,
    };

    std::fs::create_dir_all(&out_dir)?;

    if std::env::var_os("GLYPHRAIN_GPU").is_some() {
        #[cfg(feature = "gpu")]
        {
            let factory = |session: &glyphrain::Session, width, height| GpuBackend::new(session, width, height);
            match Pipeline::initialize_with(config.clone(), atlas.clone(), VIEWPORT, factory) {
                Ok(pipeline) => return render(pipeline, frames, &out_dir),
                Err(err) => tracing::warn!(%err, "gpu backend unavailable, falling back to cpu"),
            }
        }
        #[cfg(not(feature = "gpu"))]
        tracing::warn!("built without the gpu feature, using cpu");
    }

    let pipeline = Pipeline::initialize_with_atlas(config, atlas, VIEWPORT)?;
    render(pipeline, frames, &out_dir)
}

fn render<B: Backend>(mut pipeline: Pipeline<B>, frames: u32, out_dir: &Path) -> Result<(), Box<dyn Error>> {
    let started = std::time::Instant::now();
    for i in 0..frames {
        if pipeline.step(i as f64 * REFERENCE_FRAME_MS).is_dropped() {
            continue;
        }
        if i % SAVE_EVERY == 0 || i + 1 == frames {
            let path = out_dir.join(format!("frame_{i:05}.png"));
            pipeline.frame().save_png(&path)?;
            tracing::debug!(path = %path.display(), luminance = pipeline.frame().mean_luminance(), "saved frame");
        }
    }
    tracing::info!(
        frames,
        backend = pipeline.backend().name(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        out_dir = %out_dir.display(),
        "render complete"
    );
    Ok(())
}
