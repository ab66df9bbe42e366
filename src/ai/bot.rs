// Bots that steer the unowned paddles in offline play

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};

use super::prediction::{paddle_plane, predict_intercept};
use crate::game::state::{Ball, Field, Paddle};
use crate::game::Side;

/// A bot picks where its paddle should go; [`steer`] does the moving
pub trait Bot {
    /// Target position along `side`'s axis, or None to hold still
    fn target(&mut self, ball: &Ball, side: Side, paddle: &Paddle, field: &Field, now_ms: u64)
        -> Option<f32>;

    /// Forget cached decisions (called when a new serve starts)
    fn reset(&mut self);

    fn name(&self) -> &str;
}

/// Configuration for a tracking bot's behavior
#[derive(Debug, Clone)]
pub struct TrackingBotConfig {
    pub name: String,
    pub error_stddev: f32,              // Standard deviation of aim error in field units
    pub miss_rate: f32,                 // Probability of giving up on a shot
    pub prediction_interval_ms: u64,    // How often the bot re-reads the ball
    pub dead_zone: f32,                 // Distance from the target that counts as "there"
}

/// Predicts the intercept with human-like error and heads for it
pub struct TrackingBot {
    config: TrackingBotConfig,
    last_prediction_ms: Option<u64>,
    cached_target: Option<f32>,
    rng: StdRng,
}

impl TrackingBot {
    pub fn new(config: TrackingBotConfig) -> Self {
        Self::with_rng(config, StdRng::from_entropy())
    }

    pub fn with_rng(config: TrackingBotConfig, rng: StdRng) -> Self {
        Self {
            config,
            last_prediction_ms: None,
            cached_target: None,
            rng,
        }
    }

    /// Beatable opponent for the three seats nobody owns
    pub fn casual() -> Self {
        Self::new(TrackingBotConfig {
            name: "Casual".to_string(),
            error_stddev: 30.0,
            miss_rate: 0.08,
            prediction_interval_ms: 180,
            dead_zone: 6.0,
        })
    }

    fn predict(&mut self, ball: &Ball, side: Side, paddle: &Paddle, field: &Field) -> Option<f32> {
        let plane = paddle_plane(side, paddle);
        let intercept = predict_intercept(ball, side, plane, field)?;

        if self.rng.gen::<f32>() < self.config.miss_rate {
            return None;
        }
        let error = Normal::new(0.0, self.config.error_stddev)
            .map(|normal| normal.sample(&mut self.rng))
            .unwrap_or(0.0);
        Some(intercept + error)
    }
}

impl Bot for TrackingBot {
    fn target(
        &mut self,
        ball: &Ball,
        side: Side,
        paddle: &Paddle,
        field: &Field,
        now_ms: u64,
    ) -> Option<f32> {
        let due = self
            .last_prediction_ms
            .map_or(true, |last| now_ms.saturating_sub(last) >= self.config.prediction_interval_ms);
        if due {
            self.cached_target = self.predict(ball, side, paddle, field);
            self.last_prediction_ms = Some(now_ms);
        }

        let extent = paddle.extent(side);
        let max = paddle.max_position(side, field);

        // Ball heading elsewhere: drift back to the middle of the wall
        let center = self.cached_target.unwrap_or(max / 2.0 + extent / 2.0);
        let target = (center - extent / 2.0).clamp(0.0, max);

        if (target - paddle.position(side)).abs() < self.config.dead_zone {
            return None;
        }
        Some(target)
    }

    fn reset(&mut self) {
        self.last_prediction_ms = None;
        self.cached_target = None;
    }

    fn name(&self) -> &str {
        &self.config.name
    }
}

/// Move `paddle` toward its `target` at up to `max_speed` units per nominal frame
pub fn steer(paddle: &mut Paddle, side: Side, max_speed: f32, field: &Field, multiplier: f32) {
    let Some(target) = paddle.target else {
        paddle.velocity = 0.0;
        return;
    };

    let position = paddle.position(side);
    let step = max_speed * multiplier;
    let delta = (target - position).clamp(-step, step);
    let max = paddle.max_position(side, field);

    paddle.set_position(side, (position + delta).clamp(0.0, max));
    paddle.velocity = if multiplier > 0.0 { delta / multiplier } else { 0.0 };
}
