// Input sampling for the locally owned paddle
// Turns held directions and pointer position into paddle motion, and decides
// when the motion is worth telling the server about

use super::state::{Field, Paddle, Side};
use crate::config::PhysicsConfig;
use crate::network::PaddleUpdateData;

/// Raw control signals for one frame, independent of which side is owned.
/// "Negative" is up for left/right paddles and left for top/bottom paddles.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ControlIntent {
    pub negative: bool,
    pub positive: bool,

    /// Pointer position in field coordinates, when the pointer is over the field
    pub pointer: Option<(f32, f32)>,
}

impl ControlIntent {
    /// -1, 0 or 1; both directions held cancel out
    pub fn direction(&self) -> f32 {
        match (self.negative, self.positive) {
            (true, false) => -1.0,
            (false, true) => 1.0,
            _ => 0.0,
        }
    }
}

pub struct InputSampler {
    acceleration: f32,
    friction: f32,
    max_speed: f32,
    epsilon: f32,
    next_sequence: u64,

    /// Position carried by the last outbound update
    last_sent: Option<f32>,
}

impl InputSampler {
    pub fn new(physics: &PhysicsConfig) -> Self {
        Self {
            acceleration: physics.paddle_acceleration,
            friction: physics.paddle_friction,
            max_speed: physics.paddle_max_speed,
            epsilon: physics.send_epsilon,
            next_sequence: 1,
            last_sent: None,
        }
    }

    /// Advance `paddle` for one frame.
    /// Returns the outbound update when the paddle moved by more than the send epsilon.
    #[allow(clippy::too_many_arguments)]
    pub fn sample(
        &mut self,
        paddle: &mut Paddle,
        side: Side,
        intent: &ControlIntent,
        frozen: bool,
        field: &Field,
        multiplier: f32,
        wall_ms: u64,
    ) -> Option<PaddleUpdateData> {
        let before = paddle.position(side);
        let max = paddle.max_position(side, field);

        if frozen {
            paddle.velocity = 0.0;
            return None;
        }

        let mut position = before;

        // Pointer is an absolute base; held keys still accelerate on top of it
        if let Some((px, py)) = intent.pointer {
            let axis = if side.is_vertical() { py } else { px };
            position = axis - paddle.extent(side) / 2.0;
        }

        let direction = intent.direction();
        let mut velocity = paddle.velocity;
        if direction != 0.0 {
            velocity += direction * self.acceleration * multiplier;
        } else {
            velocity *= self.friction.powf(multiplier);
            if velocity.abs() < 0.01 {
                velocity = 0.0;
            }
        }
        velocity = velocity.clamp(-self.max_speed, self.max_speed);
        position += velocity * multiplier;

        if position <= 0.0 || position >= max {
            position = position.clamp(0.0, max);
            velocity = 0.0;
        }

        paddle.set_position(side, position);
        paddle.velocity = velocity;

        let reference = *self.last_sent.get_or_insert(before);
        if (position - reference).abs() <= self.epsilon {
            return None;
        }

        self.last_sent = Some(position);
        let seq = self.next_sequence;
        self.next_sequence += 1;

        let (x, y) = if side.is_vertical() {
            (None, Some(position))
        } else {
            (Some(position), None)
        };
        Some(PaddleUpdateData {
            y,
            x,
            velocity,
            target: paddle.target,
            ts: wall_ms,
            seq,
        })
    }

    /// Forget the last sent position, for example after the owned side changes.
    /// Sequence numbers keep counting up.
    pub fn reset_reference(&mut self) {
        self.last_sent = None;
    }
}
