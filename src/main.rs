mod cli;
mod config;

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::sync::Arc;

use cli::Cli;
use rave::audio::analyzer::Analyzer;
use rave::audio::decode::decode_audio;
use rave::encode::ffmpeg::{EncoderSettings, FfmpegEncoder};
use rave::render::gpu::GpuContext;
use rave::render::host::OffscreenHost;
use rave::Rave;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let mut cli = Cli::parse();

    if let Some(path) = config::discover(cli.config.as_deref()) {
        match config::load_config(&path) {
            Some(cfg) => {
                log::info!("Loaded config from {}", path.display());
                config::merge(&mut cli, cfg);
            }
            None => log::warn!("Failed to load config from {}", path.display()),
        }
    }

    if !cli.input.exists() {
        anyhow::bail!("Input file not found: {}", cli.input.display());
    }

    log::info!("rave - audio-reactive visualizer");
    log::info!("Input: {}", cli.input.display());
    log::info!("Output: {}", cli.output.display());
    log::info!("Resolution: {}x{} @ {}fps, speed {}", cli.width, cli.height, cli.fps, cli.speed);

    // 1. Decode audio
    log::info!("Decoding audio...");
    let audio = decode_audio(&cli.input)?;

    let mut total_frames = audio.frame_count(cli.fps);
    if let Some(limit) = cli.frames {
        total_frames = total_frames.min(limit);
    }
    log::info!("Total frames: {}, Duration: {:.1}s", total_frames, audio.duration());

    // 2. GPU, analyzer and renderer
    log::info!("Initializing GPU...");
    let gpu = Arc::new(GpuContext::new().context("Failed to initialize GPU")?);
    let analyzer = Analyzer::new(audio.sample_rate, cli.fft_size)
        .with_context(|| format!("Invalid analyzer settings (fft size {})", cli.fft_size))?;
    let host = OffscreenHost::new(gpu, cli.width, cli.height, !cli.no_hdr);
    let mut rave = Rave::new(host, analyzer, cli.speed).context("Failed to create renderer")?;

    let mut dump = match &cli.dump_features {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            log::info!("Writing features to {}", path.display());
            Some(BufWriter::new(file))
        }
        None => None,
    };

    // 3. Start FFmpeg encoder
    log::info!("Starting FFmpeg encoder...");
    let mut encoder = FfmpegEncoder::new(&EncoderSettings {
        output: cli.output.clone(),
        audio: Some(cli.input.clone()),
        width: cli.width,
        height: cli.height,
        fps: cli.fps,
        codec: cli.codec.clone(),
        pix_fmt: cli.pix_fmt.clone(),
        crf: cli.crf,
    })?;

    // 4. Render loop
    let pb = ProgressBar::new(total_frames as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} frames ({eta} remaining)")?
            .progress_chars("=>-"),
    );

    for frame_idx in 0..total_frames {
        rave.analyzer_mut().push_samples(audio.frame_slice(frame_idx, cli.fps));
        if !rave.render()? {
            continue;
        }

        if let Some(out) = dump.as_mut() {
            serde_json::to_writer(&mut *out, &rave.features().snapshot())?;
            out.write_all(b"\n")?;
        }

        let canvas = rave.canvas().context("Renderer has no canvas")?;
        let pixels = canvas.to_rgba8().context("Failed to read back frame")?;
        encoder.write_frame(&pixels)?;
        pb.set_position(frame_idx as u64 + 1);
    }

    pb.finish_with_message("Rendering complete");
    rave.destroy()?;

    if let Some(mut out) = dump {
        out.flush()?;
    }

    // 5. Finish encoding
    log::info!("Finishing encoding...");
    encoder.finish()?;

    log::info!("Done! Output: {}", cli.output.display());
    Ok(())
}
