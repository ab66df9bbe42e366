//! Fixed-cadence frame driver.
//!
//! Each frame runs an advance pass to completion, then a draw pass over the
//! finished state. The clock owns no game data: it measures elapsed time,
//! clamps it after stalls, and hands both passes a [`FrameTiming`].

use std::ops::ControlFlow;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use tracing::trace;

/// Where the clock is inside the current frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockPhase {
    Scheduled,
    Advancing,
    Drawing,
    Stopped,
}

/// Timing handed to both passes of one frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameTiming {
    /// Monotonic frame counter, starting at 1
    pub frame: u64,
    pub now: Instant,

    /// Elapsed time since the previous frame, after clamping
    pub delta: Duration,

    /// `delta / nominal frame interval`; 1.0 on a frame that ran on time
    pub multiplier: f32,

    /// Wall clock in milliseconds since the epoch, for server timestamps
    pub wall_ms: u64,
}

pub struct SimulationClock {
    nominal: Duration,
    max_delta: Duration,
    last: Option<Instant>,
    frame: u64,
    phase: ClockPhase,
}

impl SimulationClock {
    pub fn new(target_fps: u64, max_delta_factor: f32) -> Self {
        let nominal = Duration::from_secs_f64(1.0 / target_fps.max(1) as f64);
        Self {
            nominal,
            max_delta: nominal.mul_f32(max_delta_factor.max(1.0)),
            last: None,
            frame: 0,
            phase: ClockPhase::Scheduled,
        }
    }

    pub fn nominal_interval(&self) -> Duration {
        self.nominal
    }

    pub fn phase(&self) -> ClockPhase {
        self.phase
    }

    /// Measure the frame starting at `now`. The first frame counts as exactly nominal.
    pub fn begin_frame(&mut self, now: Instant) -> FrameTiming {
        let raw = match self.last {
            Some(last) => now.saturating_duration_since(last),
            None => self.nominal,
        };
        let delta = raw.min(self.max_delta);
        if raw > self.max_delta {
            trace!(raw_ms = raw.as_millis() as u64, "frame delta clamped after stall");
        }

        self.last = Some(now);
        self.frame += 1;

        FrameTiming {
            frame: self.frame,
            now,
            delta,
            multiplier: delta.as_secs_f32() / self.nominal.as_secs_f32(),
            wall_ms: wall_clock_ms(),
        }
    }

    /// Run one frame: `advance` gets exclusive access and must finish before `draw` reads.
    ///
    /// An advance that breaks stops the clock and skips the draw. Once stopped,
    /// returns `Ok(None)` without calling either pass.
    pub fn run_frame<S, E>(
        &mut self,
        now: Instant,
        state: &mut S,
        advance: impl FnOnce(&mut S, &FrameTiming) -> Result<ControlFlow<()>, E>,
        draw: impl FnOnce(&S, &FrameTiming) -> Result<(), E>,
    ) -> Result<Option<FrameTiming>, E> {
        if self.phase == ClockPhase::Stopped {
            return Ok(None);
        }

        let timing = self.begin_frame(now);

        self.phase = ClockPhase::Advancing;
        let flow = advance(state, &timing).inspect_err(|_| self.phase = ClockPhase::Scheduled)?;
        if flow.is_break() {
            self.stop();
            return Ok(None);
        }

        self.phase = ClockPhase::Drawing;
        draw(state, &timing).inspect_err(|_| self.phase = ClockPhase::Scheduled)?;

        self.phase = ClockPhase::Scheduled;
        Ok(Some(timing))
    }

    /// Time left until the next frame is due, given when this one began
    pub fn remaining(&self, frame_start: Instant, now: Instant) -> Duration {
        self.nominal
            .saturating_sub(now.saturating_duration_since(frame_start))
    }

    /// Terminal: no further frames run
    pub fn stop(&mut self) {
        self.phase = ClockPhase::Stopped;
    }
}

pub fn wall_clock_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::from_secs(0))
        .as_millis() as u64
}
