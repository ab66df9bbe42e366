// Prediction between snapshots
// Extrapolates the ball and remote paddles forward from their last receipt time and
// eases remote paddles toward their predicted position with a fixed blend factor

use std::time::{Duration, Instant};

use crate::config::SyncConfig;
use crate::game::clock::FrameTiming;
use crate::game::state::{Ball, GamePhase};
use crate::game::Side;

use super::snapshot::NetworkSnapshot;

#[derive(Debug, Clone, Copy)]
struct Smoothed {
    /// Visible position before this entry's frame was applied
    previous: f32,
    visible: f32,
    frame: u64,
}

pub struct PredictionEngine {
    bonus: Duration,
    max_extrapolation: Duration,
    smoothing: f32,
    nominal: Duration,
    paddles: [Option<Smoothed>; 4],
}

impl PredictionEngine {
    pub fn new(sync: &SyncConfig, nominal: Duration) -> Self {
        Self {
            bonus: Duration::from_millis(sync.extrapolation_bonus_ms),
            max_extrapolation: Duration::from_millis(sync.max_extrapolation_ms),
            smoothing: sync.smoothing_factor.clamp(0.0, 1.0),
            nominal,
            paddles: [None; 4],
        }
    }

    /// Nominal frames to project forward from a receipt time, capped by the extrapolation limit
    pub fn frames_since(&self, received_at: Instant, now: Instant) -> f32 {
        let elapsed = (now.saturating_duration_since(received_at) + self.bonus)
            .min(self.max_extrapolation);
        elapsed.as_secs_f32() / self.nominal.as_secs_f32().max(f32::EPSILON)
    }

    /// Ball drawn at its authoritative position projected along its velocity.
    /// Outside of live play the ball is shown exactly where the server put it.
    pub fn ball(&self, snapshot: &NetworkSnapshot, now: Instant, now_ms: u64) -> Ball {
        let state = &snapshot.state;
        let mut ball = state.ball.clone();
        if state.effective_phase(now_ms) != GamePhase::Playing {
            return ball;
        }

        let frames = self.frames_since(snapshot.received_at, now);
        let half = ball.size / 2.0;
        ball.x = (ball.x + ball.vx * frames).clamp(half, (state.field.width - half).max(half));
        ball.y = (ball.y + ball.vy * frames).clamp(half, (state.field.height - half).max(half));
        ball
    }

    /// Where a remote paddle should be drawn this frame.
    /// Calling again within the same frame returns the same answer.
    pub fn paddle(
        &mut self,
        side: Side,
        snapshot: &NetworkSnapshot,
        now: Instant,
        now_ms: u64,
        timing: &FrameTiming,
    ) -> f32 {
        let target = self.paddle_target(side, snapshot, now, now_ms);
        let alpha = self.blend_factor(timing.multiplier);

        let entry = match self.paddles[side.index()] {
            // First sample snaps so a fresh join does not slide in from the home position
            None => Smoothed {
                previous: target,
                visible: target,
                frame: timing.frame,
            },
            Some(entry) if entry.frame == timing.frame => Smoothed {
                visible: entry.previous + (target - entry.previous) * alpha,
                ..entry
            },
            Some(entry) => Smoothed {
                previous: entry.visible,
                visible: entry.visible + (target - entry.visible) * alpha,
                frame: timing.frame,
            },
        };

        self.paddles[side.index()] = Some(entry);
        entry.visible
    }

    /// Extrapolated position before smoothing
    fn paddle_target(
        &self,
        side: Side,
        snapshot: &NetworkSnapshot,
        now: Instant,
        now_ms: u64,
    ) -> f32 {
        let state = &snapshot.state;
        let paddle = &state.paddles[side];
        let base = paddle.position(side);
        let max = paddle.max_position(side, &state.field);

        if state.is_frozen(side, now_ms) {
            return base.clamp(0.0, max);
        }
        let frames = self.frames_since(snapshot.paddle_received_at[side.index()], now);
        (base + paddle.velocity * frames).clamp(0.0, max)
    }

    // Blend factor scaled so a long frame covers the same ground as several nominal ones
    fn blend_factor(&self, multiplier: f32) -> f32 {
        1.0 - (1.0 - self.smoothing).powf(multiplier.max(0.0))
    }

    /// Drop smoothing history for one side, so its next sample snaps
    pub fn forget(&mut self, side: Side) {
        self.paddles[side.index()] = None;
    }

    pub fn reset(&mut self) {
        self.paddles = [None; 4];
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PhysicsConfig;
    use crate::game::state::{ActiveEffect, SimulationState};

    const NOMINAL: Duration = Duration::from_micros(16_667);

    fn engine() -> PredictionEngine {
        PredictionEngine::new(&SyncConfig::default(), NOMINAL)
    }

    fn snapshot(now: Instant) -> NetworkSnapshot {
        let mut state = SimulationState::new(&PhysicsConfig::default(), &SyncConfig::default());
        state.phase = GamePhase::Playing;
        NetworkSnapshot::new(state, now)
    }

    fn timing(frame: u64, now: Instant) -> FrameTiming {
        FrameTiming {
            frame,
            now,
            delta: NOMINAL,
            multiplier: 1.0,
            wall_ms: 0,
        }
    }

    #[test]
    fn test_ball_projects_along_velocity() {
        let start = Instant::now();
        let mut snap = snapshot(start);
        snap.state.ball.vx = 6.0;

        let ball = engine().ball(&snap, start + Duration::from_millis(70), 0);

        // 70ms elapsed + 30ms bonus = 100ms = 6 nominal frames
        assert!((ball.x - (400.0 + 6.0 * 6.0)).abs() < 0.5);
        assert_eq!(ball.y, 400.0);
    }

    #[test]
    fn test_ball_extrapolation_is_capped() {
        let start = Instant::now();
        let mut snap = snapshot(start);
        snap.state.ball.vy = 2.0;

        let ball = engine().ball(&snap, start + Duration::from_secs(10), 0);

        // Never more than max_extrapolation_ms (250ms = 15 frames) of travel
        assert!(ball.y - 400.0 <= 2.0 * 15.0 + 0.5);
    }

    #[test]
    fn test_ball_not_extrapolated_while_paused() {
        let start = Instant::now();
        let mut snap = snapshot(start);
        snap.state.phase = GamePhase::Paused { until_ms: 5_000 };
        snap.state.ball.vx = 6.0;

        let ball = engine().ball(&snap, start + Duration::from_millis(100), 1_000);
        assert_eq!(ball.x, 400.0);
    }

    #[test]
    fn test_paddle_blends_toward_new_target() {
        let start = Instant::now();
        let mut engine = engine();
        let mut snap = snapshot(start);

        let first = engine.paddle(Side::Right, &snap, start, 0, &timing(1, start));
        assert_eq!(first, 330.0);

        snap.state.paddles[Side::Right].y = 430.0;
        let second = engine.paddle(Side::Right, &snap, start, 0, &timing(2, start));

        // 30% of the remaining 100 units
        assert!((second - 360.0).abs() < 0.01);
    }

    #[test]
    fn test_same_frame_is_idempotent() {
        let start = Instant::now();
        let mut engine = engine();
        let mut snap = snapshot(start);
        engine.paddle(Side::Top, &snap, start, 0, &timing(1, start));

        snap.state.paddles[Side::Top].x = 500.0;
        let a = engine.paddle(Side::Top, &snap, start, 0, &timing(2, start));
        let b = engine.paddle(Side::Top, &snap, start, 0, &timing(2, start));

        assert_eq!(a, b);
    }

    #[test]
    fn test_long_frame_blends_further() {
        let start = Instant::now();
        let mut snap = snapshot(start);
        let mut slow = engine();
        let mut fast = engine();
        slow.paddle(Side::Left, &snap, start, 0, &timing(1, start));
        fast.paddle(Side::Left, &snap, start, 0, &timing(1, start));

        snap.state.paddles[Side::Left].y = 630.0;
        let mut long = timing(2, start);
        long.multiplier = 2.0;
        let a = slow.paddle(Side::Left, &snap, start, 0, &long);
        let b = fast.paddle(Side::Left, &snap, start, 0, &timing(2, start));

        assert!(a > b);
        // 1 - 0.7^2 = 0.51 of 300
        assert!((a - (330.0 + 153.0)).abs() < 0.01);
    }

    #[test]
    fn test_paddle_prediction_stays_in_bounds() {
        let start = Instant::now();
        let mut engine = engine();
        let mut snap = snapshot(start);
        snap.state.paddles[Side::Bottom].x = 650.0;
        snap.state.paddles[Side::Bottom].velocity = 14.0;

        let x = engine.paddle(
            Side::Bottom,
            &snap,
            start + Duration::from_millis(200),
            0,
            &timing(1, start),
        );
        assert_eq!(x, 660.0);
    }

    #[test]
    fn test_frozen_paddle_not_extrapolated() {
        let start = Instant::now();
        let mut engine = engine();
        let mut snap = snapshot(start);
        snap.state.paddles[Side::Left].velocity = 10.0;
        snap.state.effects.push(ActiveEffect {
            kind: "freeze".to_string(),
            start_ms: 0,
            duration_ms: 1_000,
            side: Some(Side::Top),
        });

        let y = engine.paddle(Side::Left, &snap, start, 500, &timing(1, start));
        assert_eq!(y, 330.0);
    }

    #[test]
    fn test_forget_snaps_next_sample() {
        let start = Instant::now();
        let mut engine = engine();
        let mut snap = snapshot(start);
        engine.paddle(Side::Right, &snap, start, 0, &timing(1, start));

        snap.state.paddles[Side::Right].y = 100.0;
        engine.forget(Side::Right);
        let y = engine.paddle(Side::Right, &snap, start, 0, &timing(2, start));

        assert_eq!(y, 100.0);
    }
}
