use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::cli::Cli;

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub render: RenderConfig,
    #[serde(default)]
    pub analyzer: AnalyzerConfig,
}

#[derive(Debug, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    #[serde(default = "default_fps")]
    pub fps: u32,
    #[serde(default = "default_crf")]
    pub crf: u32,
    #[serde(default = "default_codec")]
    pub codec: String,
}

#[derive(Debug, Deserialize)]
pub struct RenderConfig {
    #[serde(default = "default_speed")]
    pub speed: f64,
    #[serde(default = "default_hdr")]
    pub hdr: bool,
}

#[derive(Debug, Deserialize)]
pub struct AnalyzerConfig {
    #[serde(default = "default_fft_size")]
    pub fft_size: usize,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
            fps: default_fps(),
            crf: default_crf(),
            codec: default_codec(),
        }
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            speed: default_speed(),
            hdr: default_hdr(),
        }
    }
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            fft_size: default_fft_size(),
        }
    }
}

fn default_width() -> u32 { 1920 }
fn default_height() -> u32 { 1080 }
fn default_fps() -> u32 { 60 }
fn default_crf() -> u32 { 18 }
fn default_codec() -> String { "libx264".into() }
fn default_speed() -> f64 { 1.0 }
fn default_hdr() -> bool { true }
fn default_fft_size() -> usize { 2048 }

pub fn parse_config(content: &str) -> Result<Config, toml::de::Error> {
    toml::from_str(content)
}

pub fn load_config(path: &Path) -> Option<Config> {
    let content = std::fs::read_to_string(path).ok()?;
    match parse_config(&content) {
        Ok(cfg) => Some(cfg),
        Err(e) => {
            log::warn!("Invalid config {}: {}", path.display(), e);
            None
        }
    }
}

/// Explicit path, else ./rave.toml, else the per-user config file.
pub fn discover(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    let local = PathBuf::from("rave.toml");
    if local.exists() {
        return Some(local);
    }
    if let Some(home) = dirs::home_dir() {
        let xdg = home.join(".config").join("rave").join("config.toml");
        if xdg.exists() {
            return Some(xdg);
        }
    }
    if let Some(config_dir) = dirs::config_dir() {
        let platform = config_dir.join("rave").join("config.toml");
        if platform.exists() {
            return Some(platform);
        }
    }
    None
}

/// Config values apply only where the CLI is still at its default.
pub fn merge(cli: &mut Cli, cfg: Config) {
    if cli.width == default_width() { cli.width = cfg.output.width; }
    if cli.height == default_height() { cli.height = cfg.output.height; }
    if cli.fps == default_fps() { cli.fps = cfg.output.fps; }
    if cli.crf == default_crf() { cli.crf = cfg.output.crf; }
    if cli.codec == default_codec() { cli.codec = cfg.output.codec; }
    if cli.speed == default_speed() { cli.speed = cfg.render.speed; }
    if !cli.no_hdr { cli.no_hdr = !cfg.render.hdr; }
    if cli.fft_size == default_fft_size() { cli.fft_size = cfg.analyzer.fft_size; }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn empty_config_uses_defaults() {
        let cfg = parse_config("").unwrap();
        assert_eq!(cfg.output.width, 1920);
        assert_eq!(cfg.render.speed, 1.0);
        assert!(cfg.render.hdr);
        assert_eq!(cfg.analyzer.fft_size, 2048);
    }

    #[test]
    fn partial_tables_fill_in() {
        let cfg = parse_config("[render]\nspeed = 0.5\n\n[output]\nfps = 30\n").unwrap();
        assert_eq!(cfg.render.speed, 0.5);
        assert!(cfg.render.hdr);
        assert_eq!(cfg.output.fps, 30);
        assert_eq!(cfg.output.height, 1080);
    }

    #[test]
    fn cli_overrides_win() {
        let mut cli = Cli::parse_from(["rave", "in.wav", "--fps", "24"]);
        let cfg = parse_config("[output]\nfps = 30\nwidth = 800\n[render]\nhdr = false\n").unwrap();
        merge(&mut cli, cfg);
        assert_eq!(cli.fps, 24);
        assert_eq!(cli.width, 800);
        assert!(cli.no_hdr);
    }

    #[test]
    fn rejects_wrong_types() {
        assert!(parse_config("[render]\nspeed = \"fast\"\n").is_err());
    }
}
