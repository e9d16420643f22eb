//! Per-band audio analysis shaped like a browser analyser node: a filter
//! chain feeding a rolling window, exposed as time-domain samples and a
//! smoothed, decibel-mapped magnitude spectrum.

use std::collections::VecDeque;
use std::sync::Arc;

use rustfft::{num_complex::Complex, Fft, FftPlanner};
use super::filter::Biquad;
use crate::error::AnalyzerError;

pub const DEFAULT_FFT_SIZE: usize = 2048;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DataType {
    Byte,
    Float,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DataSet {
    Time,
    Freq,
    Both,
}

impl DataSet {
    fn wants_time(self) -> bool {
        matches!(self, Self::Time | Self::Both)
    }

    fn wants_freq(self) -> bool {
        matches!(self, Self::Freq | Self::Both)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FilterKind {
    Lowpass,
}

#[derive(Clone, Debug, PartialEq)]
pub struct FilterConfig {
    pub kind: FilterKind,
    pub frequency: f32,
    pub q: f32,
}

impl FilterConfig {
    pub fn lowpass(frequency: f32) -> Self {
        Self {
            kind: FilterKind::Lowpass,
            frequency,
            q: std::f32::consts::FRAC_1_SQRT_2,
        }
    }

    fn build(&self, sample_rate: u32) -> Biquad {
        match self.kind {
            FilterKind::Lowpass => Biquad::lowpass(sample_rate, self.frequency, self.q),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct BandConfig {
    pub filters: Vec<FilterConfig>,
    pub smoothing_time_constant: f32,
    pub min_decibels: f32,
    pub max_decibels: f32,
    pub data_type: DataType,
    pub data_set: DataSet,
}

impl Default for BandConfig {
    fn default() -> Self {
        Self {
            filters: Vec::new(),
            smoothing_time_constant: 0.8,
            min_decibels: -100.0,
            max_decibels: -30.0,
            data_type: DataType::Byte,
            data_set: DataSet::Both,
        }
    }
}

/// One sample sequence in the band's chosen encoding.
#[derive(Clone, Debug, PartialEq)]
pub enum Samples {
    Byte(Vec<u8>),
    Float(Vec<f32>),
}

pub static NO_SAMPLES: Samples = Samples::Float(Vec::new());

impl Samples {
    pub fn len(&self) -> usize {
        match self {
            Self::Byte(v) => v.len(),
            Self::Float(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Time-domain value in signal units (bytes are centred on 128).
    pub fn signal(&self, i: usize) -> Option<f64> {
        match self {
            Self::Byte(v) => v.get(i).map(|&b| b as f64 / 128.0 - 1.0),
            Self::Float(v) => v.get(i).map(|&x| x as f64),
        }
    }

    /// Spectrum magnitude on the 0..=255 scale.
    pub fn level(&self, i: usize) -> Option<f64> {
        match self {
            Self::Byte(v) => v.get(i).map(|&b| b as f64),
            Self::Float(v) => v.get(i).map(|&x| x as f64),
        }
    }

    pub fn signals(&self) -> Vec<f64> {
        (0..self.len()).filter_map(|i| self.signal(i)).collect()
    }

    pub fn levels(&self) -> Vec<f64> {
        (0..self.len()).filter_map(|i| self.level(i)).collect()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct BandData {
    pub time: Samples,
    pub freq: Samples,
}

/// Immutable per-tick snapshot of every configured band.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AnalysisFrame {
    pub bands: Vec<BandData>,
}

impl AnalysisFrame {
    pub fn time(&self, band: usize) -> &Samples {
        self.bands.get(band).map_or(&NO_SAMPLES, |b| &b.time)
    }

    pub fn freq(&self, band: usize) -> &Samples {
        self.bands.get(band).map_or(&NO_SAMPLES, |b| &b.freq)
    }
}

/// Where the compositor pulls its per-frame analysis from.
pub trait AnalysisSource {
    fn set_options(&mut self, bands: &[BandConfig]);
    fn get_data(&mut self) -> AnalysisFrame;
}

struct BandState {
    config: BandConfig,
    filters: Vec<Biquad>,
    window: VecDeque<f32>,
    smoothed: Vec<f32>,
}

pub struct Analyzer {
    sample_rate: u32,
    fft_size: usize,
    fft: Arc<dyn Fft<f32>>,
    blackman: Vec<f32>,
    bands: Vec<BandState>,
}

impl Analyzer {
    pub fn new(sample_rate: u32, fft_size: usize) -> Result<Self, AnalyzerError> {
        if sample_rate == 0 {
            return Err(AnalyzerError::InvalidSampleRate);
        }
        if !fft_size.is_power_of_two() || !(32..=32768).contains(&fft_size) {
            return Err(AnalyzerError::InvalidFftSize(fft_size));
        }
        let mut planner = FftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(fft_size);
        Ok(Self {
            sample_rate,
            fft_size,
            fft,
            blackman: blackman_window(fft_size),
            bands: Vec::new(),
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    pub fn band_count(&self) -> usize {
        self.bands.len()
    }

    /// Feed new input through every band's filter chain.
    pub fn push_samples(&mut self, samples: &[f32]) {
        let n = self.fft_size;
        for band in &mut self.bands {
            for &s in samples {
                let y = band.filters.iter_mut().fold(s, |acc, f| f.process(acc));
                if band.window.len() == n {
                    band.window.pop_front();
                }
                band.window.push_back(y);
            }
        }
    }

    fn analyze_band(&self, band: &mut BandState) -> BandData {
        let cfg = &band.config;
        let time = if cfg.data_set.wants_time() {
            match cfg.data_type {
                DataType::Byte => Samples::Byte(
                    band.window
                        .iter()
                        .map(|&x| (128.0 * (1.0 + x)).floor().clamp(0.0, 255.0) as u8)
                        .collect(),
                ),
                DataType::Float => Samples::Float(band.window.iter().copied().collect()),
            }
        } else {
            empty_like(cfg.data_type)
        };

        let freq = if cfg.data_set.wants_freq() {
            let mut buffer: Vec<Complex<f32>> = band
                .window
                .iter()
                .zip(self.blackman.iter())
                .map(|(&x, &w)| Complex::new(x * w, 0.0))
                .collect();
            self.fft.process(&mut buffer);

            let tau = cfg.smoothing_time_constant.clamp(0.0, 1.0);
            let scale = 1.0 / self.fft_size as f32;
            let range = (cfg.max_decibels - cfg.min_decibels).max(f32::EPSILON);
            let mut levels = Vec::with_capacity(self.fft_size / 2);
            for (prev, c) in band.smoothed.iter_mut().zip(buffer.iter()) {
                *prev = tau * *prev + (1.0 - tau) * c.norm() * scale;
                let db = if *prev > 0.0 {
                    20.0 * prev.log10()
                } else {
                    f32::NEG_INFINITY
                };
                levels.push((255.0 / range * (db - cfg.min_decibels)).clamp(0.0, 255.0));
            }
            match cfg.data_type {
                DataType::Byte => Samples::Byte(levels.iter().map(|&v| v as u8).collect()),
                DataType::Float => Samples::Float(levels),
            }
        } else {
            empty_like(cfg.data_type)
        };

        BandData { time, freq }
    }
}

impl AnalysisSource for Analyzer {
    fn set_options(&mut self, bands: &[BandConfig]) {
        let n = self.fft_size;
        self.bands = bands
            .iter()
            .map(|cfg| BandState {
                config: cfg.clone(),
                filters: cfg.filters.iter().map(|f| f.build(self.sample_rate)).collect(),
                window: std::iter::repeat(0.0).take(n).collect(),
                smoothed: vec![0.0; n / 2],
            })
            .collect();
        log::info!(
            "Analyzer configured: {} band(s), fft_size={}, sample_rate={}Hz",
            self.bands.len(),
            n,
            self.sample_rate
        );
    }

    fn get_data(&mut self) -> AnalysisFrame {
        let mut bands = std::mem::take(&mut self.bands);
        let data = bands.iter_mut().map(|b| self.analyze_band(b)).collect();
        self.bands = bands;
        AnalysisFrame { bands: data }
    }
}

fn empty_like(data_type: DataType) -> Samples {
    match data_type {
        DataType::Byte => Samples::Byte(Vec::new()),
        DataType::Float => Samples::Float(Vec::new()),
    }
}

fn blackman_window(size: usize) -> Vec<f32> {
    let alpha = 0.16f32;
    let a0 = 0.5 * (1.0 - alpha);
    let a1 = 0.5;
    let a2 = 0.5 * alpha;
    (0..size)
        .map(|i| {
            let x = 2.0 * std::f32::consts::PI * i as f32 / size as f32;
            a0 - a1 * x.cos() + a2 * (2.0 * x).cos()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(freq: f32, sr: u32, n: usize, amp: f32) -> Vec<f32> {
        (0..n)
            .map(|i| amp * (2.0 * std::f32::consts::PI * freq * i as f32 / sr as f32).sin())
            .collect()
    }

    fn plain(data_type: DataType, data_set: DataSet) -> BandConfig {
        BandConfig {
            smoothing_time_constant: 0.0,
            data_type,
            data_set,
            ..BandConfig::default()
        }
    }

    #[test]
    fn rejects_bad_sizes() {
        assert_eq!(Analyzer::new(44_100, 1000).err(), Some(AnalyzerError::InvalidFftSize(1000)));
        assert_eq!(Analyzer::new(44_100, 16).err(), Some(AnalyzerError::InvalidFftSize(16)));
        assert_eq!(Analyzer::new(0, 1024).err(), Some(AnalyzerError::InvalidSampleRate));
        assert!(Analyzer::new(44_100, 1024).is_ok());
    }

    #[test]
    fn silence_is_midpoint_bytes_and_empty_spectrum() {
        let mut a = Analyzer::new(44_100, 256).unwrap();
        a.set_options(&[plain(DataType::Byte, DataSet::Both)]);
        a.push_samples(&[0.0; 512]);
        let frame = a.get_data();
        let band = &frame.bands[0];
        assert_eq!(band.time, Samples::Byte(vec![128; 256]));
        assert_eq!(band.freq, Samples::Byte(vec![0; 128]));
    }

    #[test]
    fn data_set_controls_populated_sequences() {
        let mut a = Analyzer::new(44_100, 256).unwrap();
        a.set_options(&[plain(DataType::Float, DataSet::Time), plain(DataType::Byte, DataSet::Freq)]);
        let frame = a.get_data();
        assert_eq!(frame.time(0).len(), 256);
        assert!(frame.freq(0).is_empty());
        assert!(frame.time(1).is_empty());
        assert_eq!(frame.freq(1).len(), 128);
        assert!(frame.time(7).is_empty());
    }

    #[test]
    fn spectrum_peaks_at_tone_bin() {
        let sr = 48_000;
        let n = 1024;
        let mut a = Analyzer::new(sr, n).unwrap();
        a.set_options(&[BandConfig {
            max_decibels: 0.0,
            ..plain(DataType::Float, DataSet::Freq)
        }]);
        // 3000 Hz lands exactly on bin 64.
        a.push_samples(&sine(3_000.0, sr, n, 0.5));
        let levels = a.get_data().freq(0).levels();
        let peak = levels
            .iter()
            .enumerate()
            .max_by(|x, y| x.1.total_cmp(y.1))
            .map(|(i, _)| i)
            .unwrap();
        assert_eq!(peak, 64);
        assert!(levels[64] > 200.0);
    }

    #[test]
    fn lowpass_band_keeps_bass_only() {
        let sr = 48_000;
        let n = 2048;
        let mut a = Analyzer::new(sr, n).unwrap();
        a.set_options(&[BandConfig {
            filters: vec![FilterConfig::lowpass(100.0)],
            ..plain(DataType::Float, DataSet::Time)
        }]);
        a.push_samples(&sine(3_000.0, sr, sr as usize, 1.0));
        let treble = a.get_data().time(0).signals().iter().fold(0.0f64, |m, x| m.max(x.abs()));
        a.push_samples(&sine(30.0, sr, sr as usize, 1.0));
        let bass = a.get_data().time(0).signals().iter().fold(0.0f64, |m, x| m.max(x.abs()));
        assert!(treble < 0.02, "treble={treble}");
        assert!(bass > 0.5, "bass={bass}");
    }

    #[test]
    fn smoothing_blends_successive_frames() {
        let sr = 48_000;
        let n = 1024;
        let mut a = Analyzer::new(sr, n).unwrap();
        a.set_options(&[BandConfig {
            smoothing_time_constant: 0.9,
            ..plain(DataType::Float, DataSet::Freq)
        }]);
        a.push_samples(&sine(3_000.0, sr, n, 0.5));
        let first = a.get_data().freq(0).level(64).unwrap();
        let second = a.get_data().freq(0).level(64).unwrap();
        assert!(second > first);
    }

    #[test]
    fn byte_signal_decodes_around_zero() {
        let s = Samples::Byte(vec![0, 128, 255]);
        assert_eq!(s.signal(0), Some(-1.0));
        assert_eq!(s.signal(1), Some(0.0));
        assert!((s.signal(2).unwrap() - 127.0 / 128.0).abs() < 1e-12);
        assert_eq!(s.signal(3), None);
        assert_eq!(s.level(2), Some(255.0));
    }
}
