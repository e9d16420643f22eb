use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "rave", about = "Audio-reactive polar visualizer rendered to video")]
pub struct Cli {
    /// Input audio file (WAV, MP3, FLAC, OGG)
    pub input: PathBuf,

    /// Output video file
    #[arg(short, long, default_value = "output.mp4")]
    pub output: PathBuf,

    /// Config file (defaults to ./rave.toml or the user config dir)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Video width in pixels
    #[arg(long, default_value_t = 1920)]
    pub width: u32,

    /// Video height in pixels
    #[arg(long, default_value_t = 1080)]
    pub height: u32,

    /// Frames per second
    #[arg(long, default_value_t = 60)]
    pub fps: u32,

    /// H.264 CRF quality (0-51, lower = better)
    #[arg(long, default_value_t = 18)]
    pub crf: u32,

    /// FFmpeg video codec
    #[arg(long, default_value = "libx264")]
    pub codec: String,

    /// FFmpeg pixel format
    #[arg(long, default_value = "yuv420p")]
    pub pix_fmt: String,

    /// Playback-rate multiplier; lower values give longer trails
    #[arg(long, default_value_t = 1.0)]
    pub speed: f64,

    /// Analyzer FFT size (power of two)
    #[arg(long, default_value_t = 2048)]
    pub fft_size: usize,

    /// Render in sRGB instead of the wide-gamut Display-P3 context
    #[arg(long)]
    pub no_hdr: bool,

    /// Stop after this many frames
    #[arg(long)]
    pub frames: Option<usize>,

    /// Write per-frame audio features as JSON lines
    #[arg(long)]
    pub dump_features: Option<PathBuf>,
}
