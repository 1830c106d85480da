use std::collections::VecDeque;
use std::time::Instant;

/// Most recent frame times kept for smoothing.
pub const MAX_SAMPLES: usize = 50;

/// Smoothed per-frame elapsed time.
///
/// Raw frame times that jump by a second or more relative to the current
/// average (a stall, a debugger break, a suspended window) are dropped
/// instead of being averaged in.
#[derive(Debug, Clone, Default)]
pub struct FrameClock {
    last: Option<Instant>,
    samples: VecDeque<f32>,
    smoothed: f32,
}

impl FrameClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seconds since the previous call, smoothed. The first call returns 0.
    pub fn tick(&mut self) -> f32 {
        let now = Instant::now();
        match self.last.replace(now) {
            Some(previous) => self.advance(now.duration_since(previous).as_secs_f32()),
            None => self.smoothed,
        }
    }

    /// Feeds one raw frame time and returns the new smoothed value.
    pub fn advance(&mut self, raw: f32) -> f32 {
        if (raw - self.smoothed).abs() < 1.0 {
            self.samples.push_front(raw);
            self.samples.truncate(MAX_SAMPLES);
        }

        self.smoothed = if self.samples.is_empty() {
            0.0
        } else {
            self.samples.iter().sum::<f32>() / self.samples.len() as f32
        };
        self.smoothed
    }

    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }
}

/// Counts frames over roughly one-second windows.
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameRateCounter {
    frames: u32,
    accumulated: f32,
    fps: Option<u32>,
}

impl FrameRateCounter {
    /// Records one frame; returns the new rate whenever a window closes.
    pub fn update(&mut self, elapsed: f32) -> Option<u32> {
        self.frames += 1;
        self.accumulated += elapsed;

        if self.accumulated > 1.0 {
            let fps = self.frames;
            self.frames = 0;
            self.accumulated = 0.0;
            self.fps = Some(fps);
            return Some(fps);
        }
        None
    }

    /// Last measured rate, `None` until the first window has closed.
    pub fn fps(&self) -> Option<u32> {
        self.fps
    }
}
