use std::collections::VecDeque;

use serde::Serialize;

use crate::audio::analyzer::AnalysisFrame;
use crate::util::{average, max_by};

pub const BASS_HISTORY_LEN: usize = 15;
/// Absolute bass level a spike must exceed.
pub const SPIKE_FLOOR: f64 = 0.3;
/// Multiple of the rolling average a spike must exceed.
pub const SPIKE_RATIO: f64 = 1.3;

/// Wideband band index (byte time + spectrum).
pub const WIDE_BAND: usize = 0;
/// Bass-only band index (float time-domain).
pub const BASS_BAND: usize = 1;

/// Audio-derived state carried between frames.
#[derive(Clone, Debug)]
pub struct FeatureState {
    /// Bass level handed to the shape builders (includes the spectral correction).
    pub bass: f64,
    /// Peak absolute bass-band sample, before correction.
    pub raw_bass: f64,
    pub bass_average: f64,
    pub bass_spike: bool,
    pub bass_multiplier: f64,
    /// Mean of the wideband spectrum over the lowest third, skipping bin 0.
    pub spectrum_average: f64,
    history: VecDeque<f64>,
    tick: u64,
    speed: f64,
}

#[derive(Clone, Debug, Serialize)]
pub struct FeatureSnapshot {
    pub tick: u64,
    pub bass: f64,
    pub raw_bass: f64,
    pub bass_average: f64,
    pub bass_spike: bool,
    pub bass_multiplier: f64,
    pub spectrum_average: f64,
}

impl FeatureState {
    pub fn new(speed: f64) -> Self {
        Self {
            bass: 0.0,
            raw_bass: 0.0,
            bass_average: 0.0,
            bass_spike: false,
            bass_multiplier: 1.0,
            spectrum_average: 0.0,
            history: std::iter::repeat(0.0).take(BASS_HISTORY_LEN).collect(),
            tick: 0,
            speed,
        }
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    pub(crate) fn set_speed(&mut self, speed: f64) {
        self.speed = speed;
    }

    pub fn history(&self) -> impl Iterator<Item = f64> + '_ {
        self.history.iter().copied()
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    pub(crate) fn release_history(&mut self) {
        self.history = VecDeque::new();
    }

    /// Push into the fixed-size history, evicting the oldest entry.
    pub fn push_bass(&mut self, bass: f64) {
        if self.history.len() >= BASS_HISTORY_LEN {
            self.history.pop_front();
        }
        self.history.push_back(bass);
        let (a, b) = self.history.as_slices();
        let sum: f64 = a.iter().chain(b.iter()).sum();
        self.bass_average = sum / self.history.len() as f64;
    }

    /// Advance one frame from a fresh analysis snapshot.
    pub fn update(&mut self, frame: &AnalysisFrame) {
        self.tick += 1;

        let bass = max_by(&frame.time(BASS_BAND).signals(), f64::abs);
        self.raw_bass = bass;
        self.bass_multiplier = 1.0 + bass / 3.0;

        self.push_bass(bass);
        self.bass_spike = bass > SPIKE_FLOOR && bass > SPIKE_RATIO * self.bass_average;

        // Spikes see the bass band alone; the low-spectrum lift comes after.
        let low = frame.freq(WIDE_BAND).levels();
        self.bass = bass + 0.1 * (average(&low, 0, 2) / 255.0);

        let third = low.len() / 3;
        self.spectrum_average = average(&low, 1, third);

        if self.bass_spike {
            log::debug!(
                "bass spike at tick {}: {:.3} vs avg {:.3}",
                self.tick,
                bass,
                self.bass_average
            );
        }
    }

    pub fn snapshot(&self) -> FeatureSnapshot {
        FeatureSnapshot {
            tick: self.tick,
            bass: self.bass,
            raw_bass: self.raw_bass,
            bass_average: self.bass_average,
            bass_spike: self.bass_spike,
            bass_multiplier: self.bass_multiplier,
            spectrum_average: self.spectrum_average,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::analyzer::{BandData, Samples};

    fn frame(bass_time: Vec<f32>, freq: Vec<u8>) -> AnalysisFrame {
        AnalysisFrame {
            bands: vec![
                BandData {
                    time: Samples::Byte(vec![128; 8]),
                    freq: Samples::Byte(freq),
                },
                BandData {
                    time: Samples::Float(bass_time),
                    freq: Samples::Float(Vec::new()),
                },
            ],
        }
    }

    #[test]
    fn history_is_bounded_fifo() {
        let mut s = FeatureState::new(1.0);
        for k in 0..16 {
            s.push_bass(100.0 + k as f64);
        }
        assert_eq!(s.history_len(), BASS_HISTORY_LEN);
        assert!(s.history().all(|v| v != 100.0));
        assert_eq!(s.history().next(), Some(101.0));
    }

    #[test]
    fn alternating_signal_gives_unit_bass() {
        let mut s = FeatureState::new(1.0);
        let time: Vec<f32> = (0..20).map(|i| if i % 2 == 0 { 1.0 } else { -1.0 }).collect();
        s.update(&frame(time, vec![0; 12]));
        assert_eq!(s.raw_bass, 1.0);
        assert!((s.bass_multiplier - 4.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn correction_applies_after_spike_detection() {
        let mut s = FeatureState::new(1.0);
        // Raw bass under the floor: no spike, even though the corrected value exceeds it.
        s.update(&frame(vec![0.25, -0.2], vec![255, 255, 0, 0, 0, 0]));
        assert!(!s.bass_spike);
        assert!((s.bass - 0.35).abs() < 1e-9);
        assert_eq!(s.raw_bass, 0.25);
    }

    #[test]
    fn spectrum_average_uses_lowest_third_without_dc() {
        let mut s = FeatureState::new(1.0);
        let freq = vec![250, 10, 20, 30, 200, 200, 200, 200, 200];
        s.update(&frame(vec![0.0], freq));
        assert!((s.spectrum_average - 15.0).abs() < 1e-12);
    }

    #[test]
    fn no_spike_below_floor() {
        let mut s = FeatureState::new(1.0);
        for _ in 0..30 {
            s.update(&frame(vec![0.296875], vec![]));
            assert!(!s.bass_spike);
        }
        let mut s = FeatureState::new(1.0);
        s.update(&frame(vec![0.25], vec![]));
        assert!(!s.bass_spike, "average is tiny but level is under the floor");
    }

    #[test]
    fn tick_counts_frames() {
        let mut s = FeatureState::new(1.0);
        for _ in 0..5 {
            s.update(&AnalysisFrame::default());
        }
        assert_eq!(s.tick(), 5);
        assert_eq!(s.raw_bass, 0.0);
        assert_eq!(s.spectrum_average, 0.0);
    }
}
