//! Animation ticks and frame timing, both driven by a monotonic clock.

use std::time::{Duration, Instant};

/// Interval between animation ticks.
pub const TICK: Duration = Duration::from_millis(250);

/// Waiting-indicator frames, one per tick.
pub const SPINNER: [&str; 4] = ["⠋", "⠙", "⠹", "⠸"];

/// Longer spinner for the input bar while generating.
pub const LOADING: [&str; 8] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧"];

/// The cursor block is visible for the first half of this many ticks.
const BLINK_PERIOD: u64 = 30;

/// Tick counter advanced from wall-clock time.
#[derive(Debug)]
pub struct Animation {
    started: Instant,
    ticks: u64,
}

impl Animation {
    pub fn new(now: Instant) -> Self {
        Self {
            started: now,
            ticks: 0,
        }
    }

    /// Catches the counter up to `now`. Returns true if it moved, which is
    /// when streaming messages need their decoration refreshed.
    pub fn advance(&mut self, now: Instant) -> bool {
        let ticks = (now.saturating_duration_since(self.started).as_millis() / TICK.as_millis())
            as u64;
        if ticks == self.ticks {
            return false;
        }
        self.ticks = ticks;
        true
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn spinner(&self) -> &'static str {
        SPINNER[(self.ticks % SPINNER.len() as u64) as usize]
    }

    pub fn loading(&self) -> &'static str {
        LOADING[(self.ticks % LOADING.len() as u64) as usize]
    }

    pub fn cursor_visible(&self) -> bool {
        self.ticks % BLINK_PERIOD < BLINK_PERIOD / 2
    }
}

/// Weight of the newest frame in the smoothed rate.
const FPS_SMOOTHING: f32 = 0.1;

/// Paces the render loop at a target rate and reports the achieved rate.
#[derive(Debug)]
pub struct FrameClock {
    target: Duration,
    frame_start: Instant,
    last_delta: Duration,
    fps: f32,
}

impl FrameClock {
    pub fn new(target_fps: u32, now: Instant) -> Self {
        let fps = target_fps.max(1);
        Self {
            target: Duration::from_secs(1) / fps,
            frame_start: now,
            last_delta: Duration::ZERO,
            fps: fps as f32,
        }
    }

    /// Starts a new frame, recording the time since the previous one.
    pub fn begin_frame(&mut self, now: Instant) {
        let delta = now.saturating_duration_since(self.frame_start);
        self.frame_start = now;
        self.last_delta = delta;
        if delta > Duration::ZERO {
            let instant_fps = 1.0 / delta.as_secs_f32();
            self.fps += (instant_fps - self.fps) * FPS_SMOOTHING;
        }
    }

    /// Time left in the current frame; the input poll timeout.
    pub fn remaining(&self, now: Instant) -> Duration {
        self.target
            .saturating_sub(now.saturating_duration_since(self.frame_start))
    }

    pub fn delta(&self) -> Duration {
        self.last_delta
    }

    pub fn fps(&self) -> f32 {
        self.fps
    }

    pub fn target(&self) -> Duration {
        self.target
    }
}
