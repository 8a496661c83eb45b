//! Rolling audio window fed to the speech-to-text backend.

/// Number of trailing samples inspected by [`AudioWindow::has_activity`].
const ACTIVITY_PROBE_SAMPLES: usize = 1000;

/// Mono f32 PCM buffer holding the most recent `window_secs` of audio.
///
/// Tracks the audio clock: `audio_time()` is the total duration received so
/// far and `base_time()` is the absolute time of the first sample still in
/// the window.
#[derive(Debug, Clone)]
pub struct AudioWindow {
    samples: Vec<f32>,
    max_samples: usize,
    sample_rate: u32,
    total_samples: u64,
}

impl AudioWindow {
    pub fn new(sample_rate: u32, window_secs: f64) -> Self {
        let max_samples = ((sample_rate as f64) * window_secs).max(1.0) as usize;
        Self {
            samples: Vec::with_capacity(max_samples),
            max_samples,
            sample_rate,
            total_samples: 0,
        }
    }

    /// Append a frame, dropping the oldest samples past the window length.
    pub fn push(&mut self, frame: &[f32]) {
        self.total_samples += frame.len() as u64;
        self.samples.extend_from_slice(frame);
        if self.samples.len() > self.max_samples {
            let excess = self.samples.len() - self.max_samples;
            self.samples.drain(..excess);
        }
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Seconds of audio currently held.
    pub fn duration(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }

    /// Seconds of audio received since the window was created.
    pub fn audio_time(&self) -> f64 {
        self.total_samples as f64 / self.sample_rate as f64
    }

    /// Absolute time of the first sample in the window.
    pub fn base_time(&self) -> f64 {
        self.audio_time() - self.duration()
    }

    /// Whether the tail of the window looks like speech.
    ///
    /// True when the RMS of the last 1000 samples exceeds `threshold`, or
    /// when they show a speech-like pattern (std above 0.01 and a peak
    /// above 0.1). Fewer than 1000 samples is never activity.
    pub fn has_activity(&self, threshold: f32) -> bool {
        if self.samples.len() < ACTIVITY_PROBE_SAMPLES {
            return false;
        }
        let tail = &self.samples[self.samples.len() - ACTIVITY_PROBE_SAMPLES..];
        let n = tail.len() as f32;

        let rms = (tail.iter().map(|s| s * s).sum::<f32>() / n).sqrt();
        if rms > threshold {
            return true;
        }

        let mean = tail.iter().sum::<f32>() / n;
        let variance = tail.iter().map(|s| (s - mean).powi(2)).sum::<f32>() / n;
        let peak = tail.iter().fold(0.0f32, |acc, s| acc.max(s.abs()));
        variance.sqrt() > 0.01 && peak > 0.1
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_caps_length_and_tracks_clock() {
        let mut window = AudioWindow::new(10, 1.0);
        window.push(&[0.0; 6]);
        window.push(&[0.5; 8]);
        assert_eq!(window.samples().len(), 10);
        assert!((window.audio_time() - 1.4).abs() < 1e-9);
        assert!((window.duration() - 1.0).abs() < 1e-9);
        assert!((window.base_time() - 0.4).abs() < 1e-9);
        // Oldest samples dropped first.
        assert_eq!(window.samples()[0], 0.0);
        assert_eq!(window.samples()[9], 0.5);
    }

    #[test]
    fn silence_has_no_activity() {
        let mut window = AudioWindow::new(16_000, 8.0);
        window.push(&vec![0.0; 2000]);
        assert!(!window.has_activity(0.01));
    }

    #[test]
    fn loud_tail_has_activity() {
        let mut window = AudioWindow::new(16_000, 8.0);
        let tone: Vec<f32> = (0..2000).map(|i| (i as f32 * 0.1).sin() * 0.3).collect();
        window.push(&tone);
        assert!(window.has_activity(0.01));
    }

    #[test]
    fn short_buffer_has_no_activity() {
        let mut window = AudioWindow::new(16_000, 8.0);
        window.push(&[0.9; 500]);
        assert!(!window.has_activity(0.01));
    }
}
