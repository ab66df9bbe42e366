// Last authoritative state received from the server, kept apart from the live state

use std::time::Instant;

use crate::config::PhysicsConfig;
use crate::game::state::{
    ActiveEffect, BallModifier, Coin, GamePhase, Paddle, Pickup, SimulationState,
};
use crate::game::Side;
use crate::network::protocol::{BallPayload, PaddlePayload, StatePayload};

/// Authoritative state plus when each part of it was received
#[derive(Debug, Clone)]
pub struct NetworkSnapshot {
    pub state: SimulationState,

    /// Receipt time of the last ball data, the base for ball extrapolation
    pub received_at: Instant,

    /// Receipt time of the last data for each paddle
    pub paddle_received_at: [Instant; 4],

    /// Bumped on every staged change; the merge uses it to tell new data from a repeat
    pub revision: u64,
}

impl NetworkSnapshot {
    pub fn new(state: SimulationState, now: Instant) -> Self {
        Self {
            state,
            received_at: now,
            paddle_received_at: [now; 4],
            revision: 0,
        }
    }

    /// Overwrite every field present in `payload`; absent fields stay as they were
    pub fn patch(
        &mut self,
        payload: &StatePayload,
        physics: &PhysicsConfig,
        now: Instant,
        now_ms: u64,
        serve_pause_ms: u64,
    ) {
        let state = &mut self.state;

        if let Some(ball) = &payload.ball {
            patch_ball(state, ball);
            self.received_at = now;
        }

        if let Some(paddles) = &payload.paddles {
            for side in Side::ALL {
                if let Some(paddle) = paddles.get(side) {
                    patch_paddle(&mut state.paddles[side], paddle);
                    self.paddle_received_at[side.index()] = now;
                }
            }
            let field = state.field;
            state.paddles.sanitize(&field, physics);
        }

        if let Some(score) = &payload.score {
            for side in Side::ALL {
                if let Some(points) = score.get(side) {
                    state.score[side] = points;
                }
            }
        }

        if let Some(effects) = &payload.effects {
            state.effects = effects
                .iter()
                .map(|e| ActiveEffect {
                    kind: e.kind.clone(),
                    start_ms: e.start_time,
                    duration_ms: e.duration,
                    side: e.side,
                })
                .collect();
        }

        if let Some(pickups) = &payload.pickups {
            state.pickups = pickups
                .iter()
                .map(|p| Pickup {
                    kind: p.kind.clone(),
                    x: p.x,
                    y: p.y,
                })
                .collect();
        }

        if let Some(coins) = &payload.coins {
            state.coins = coins.iter().map(|c| Coin { x: c.x, y: c.y }).collect();
        }

        state.phase = patched_phase(state.phase, payload, now_ms, serve_pause_ms);
        self.revision += 1;
    }
}

fn patch_ball(state: &mut SimulationState, ball: &BallPayload) {
    let target = &mut state.ball;
    if let Some(x) = ball.x {
        target.x = x;
    }
    if let Some(y) = ball.y {
        target.y = y;
    }
    if let Some(vx) = ball.vx {
        target.vx = vx;
    }
    if let Some(vy) = ball.vy {
        target.vy = vy;
    }
    if let Some(size) = ball.size.filter(|s| s.is_finite() && *s > 0.0) {
        target.size = size;
    }
    if let Some(modifiers) = &ball.modifiers {
        target.modifiers = modifiers
            .iter()
            .map(|m| BallModifier {
                kind: m.kind.clone(),
                activated_at_ms: m.activated_at,
                duration_ms: m.duration,
            })
            .collect();
    }
    if ball.last_touched_by.is_some() {
        target.last_touched_by = ball.last_touched_by;
    }

    // A non-finite coordinate from a broken payload recenters the ball
    if ![target.x, target.y, target.vx, target.vy].iter().all(|v| v.is_finite()) {
        target.x = state.field.width / 2.0;
        target.y = state.field.height / 2.0;
        target.vx = 0.0;
        target.vy = 0.0;
    }
}

fn patch_paddle(paddle: &mut Paddle, payload: &PaddlePayload) {
    if let Some(x) = payload.x {
        paddle.x = x;
    }
    if let Some(y) = payload.y {
        paddle.y = y;
    }
    if let Some(velocity) = payload.velocity {
        paddle.velocity = velocity;
    }
    if let Some(width) = payload.width {
        paddle.width = width;
    }
    if let Some(height) = payload.height {
        paddle.height = height;
    }
    if payload.target.is_some() {
        paddle.target = payload.target;
    }
}

// Phase flags are independent booleans on the wire; fold them into the single phase
fn patched_phase(
    current: GamePhase,
    payload: &StatePayload,
    now_ms: u64,
    serve_pause_ms: u64,
) -> GamePhase {
    if payload.game_ended == Some(true) {
        let winner = match current {
            GamePhase::Ended { winner } if payload.winner.is_none() => winner,
            _ => payload.winner,
        };
        return GamePhase::Ended { winner };
    }

    if payload.is_paused == Some(true) {
        let until_ms = payload
            .pause_end_time
            .or(match current {
                GamePhase::Paused { until_ms } => Some(until_ms),
                _ => None,
            })
            .unwrap_or(now_ms + serve_pause_ms);
        return GamePhase::Paused { until_ms };
    }

    match (current, payload.pause_end_time) {
        (GamePhase::Paused { .. }, Some(until_ms)) if payload.is_paused.is_none() => {
            return GamePhase::Paused { until_ms };
        }
        _ => {}
    }

    match payload.is_playing {
        Some(true) => GamePhase::Playing,
        Some(false) if !matches!(current, GamePhase::Ended { .. }) => GamePhase::PreStart,
        _ => {
            let leaving_end =
                payload.game_ended == Some(false) && matches!(current, GamePhase::Ended { .. });
            let leaving_pause =
                payload.is_paused == Some(false) && matches!(current, GamePhase::Paused { .. });
            if leaving_end {
                GamePhase::PreStart
            } else if leaving_pause {
                GamePhase::Playing
            } else {
                current
            }
        }
    }
}
