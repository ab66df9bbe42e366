// Local ball physics for offline play
// Four walls, four paddles: a ball leaving the field through a wall scores for whoever touched it last

use std::f32::consts::PI;

use rand::Rng;

use super::state::{Ball, Field, GamePhase, Paddle, Side, SimulationState};
use crate::config::PhysicsConfig;

/// Steepest rebound, for a hit on the very end of a paddle
const MAX_BOUNCE_ANGLE: f32 = PI / 3.0;

/// Serves leave within this angle of straight at a wall
const MAX_SERVE_ANGLE: f32 = PI / 6.0;

/// What happened during one physics step
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct PhysicsEvents {
    pub served: bool,
    pub paddle_hit: Option<Side>,

    /// Wall the ball left through
    pub goal: Option<Side>,
    pub scorer: Option<Side>,
}

/// Advance the ball by `multiplier` nominal frames
pub fn step<R: Rng>(
    state: &mut SimulationState,
    physics: &PhysicsConfig,
    serve_pause_ms: u64,
    multiplier: f32,
    now_ms: u64,
    rng: &mut R,
) -> PhysicsEvents {
    let mut events = PhysicsEvents::default();

    match state.phase {
        GamePhase::PreStart | GamePhase::Ended { .. } => return events,
        GamePhase::Paused { until_ms } if now_ms < until_ms => return events,
        GamePhase::Paused { .. } => {
            serve(&mut state.ball, physics, rng);
            state.phase = GamePhase::Playing;
            events.served = true;
        }
        GamePhase::Playing => {}
    }

    let ball = &mut state.ball;
    ball.x += ball.vx * multiplier;
    ball.y += ball.vy * multiplier;

    for (side, paddle) in state.paddles.iter() {
        if bounce(&mut state.ball, side, paddle, physics) {
            events.paddle_hit = Some(side);
            break;
        }
    }

    let Some(wall) = exited_wall(&state.ball, &state.field) else {
        return events;
    };
    events.goal = Some(wall);

    // Own goals and untouched balls score nobody
    events.scorer = state.ball.last_touched_by.filter(|s| *s != wall);
    if let Some(scorer) = events.scorer {
        state.score[scorer] += 1;
        if state.score[scorer] >= physics.winning_score {
            state.ball = Ball::centered(&state.field, state.ball.size);
            state.phase = GamePhase::Ended {
                winner: Some(scorer),
            };
            return events;
        }
    }

    state.pause_for_serve(now_ms + serve_pause_ms);
    events
}

/// Launch a resting ball from the center toward a random wall
pub fn serve<R: Rng>(ball: &mut Ball, physics: &PhysicsConfig, rng: &mut R) {
    let toward = Side::ALL[rng.gen_range(0..Side::ALL.len())];
    let angle = rng.gen_range(-MAX_SERVE_ANGLE..=MAX_SERVE_ANGLE);
    let speed = physics.ball_initial_speed;
    let (along, across) = (angle.cos() * speed, angle.sin() * speed);

    (ball.vx, ball.vy) = match toward {
        Side::Left => (-along, across),
        Side::Right => (along, across),
        Side::Top => (across, -along),
        Side::Bottom => (across, along),
    };
    ball.last_touched_by = None;
}

// Rebound off `paddle` if the ball overlaps it while heading for its wall
fn bounce(ball: &mut Ball, side: Side, paddle: &Paddle, physics: &PhysicsConfig) -> bool {
    let half = ball.size / 2.0;
    let overlaps = ball.x + half >= paddle.x
        && ball.x - half <= paddle.x + paddle.width
        && ball.y + half >= paddle.y
        && ball.y - half <= paddle.y + paddle.height;
    let approaching = match side {
        Side::Left => ball.vx < 0.0,
        Side::Right => ball.vx > 0.0,
        Side::Top => ball.vy < 0.0,
        Side::Bottom => ball.vy > 0.0,
    };
    if !overlaps || !approaching {
        return false;
    }

    // Where on the paddle the ball hit (0.0 = low end, 1.0 = high end)
    let (along_ball, start) = if side.is_vertical() {
        (ball.y, paddle.y)
    } else {
        (ball.x, paddle.x)
    };
    let hit = ((along_ball - start) / paddle.extent(side)).clamp(0.0, 1.0);
    let angle = (hit - 0.5) * 2.0 * MAX_BOUNCE_ANGLE;

    let speed = (ball.speed() * physics.ball_speed_multiplier)
        .clamp(physics.ball_initial_speed, physics.ball_max_speed);
    let (out, across) = (angle.cos() * speed, angle.sin() * speed);

    match side {
        Side::Left => {
            (ball.vx, ball.vy) = (out, across);
            ball.x = paddle.x + paddle.width + half;
        }
        Side::Right => {
            (ball.vx, ball.vy) = (-out, across);
            ball.x = paddle.x - half;
        }
        Side::Top => {
            (ball.vx, ball.vy) = (across, out);
            ball.y = paddle.y + paddle.height + half;
        }
        Side::Bottom => {
            (ball.vx, ball.vy) = (across, -out);
            ball.y = paddle.y - half;
        }
    }
    ball.last_touched_by = Some(side);
    true
}

/// The wall the ball's center has crossed, if any
fn exited_wall(ball: &Ball, field: &Field) -> Option<Side> {
    if ball.x < 0.0 {
        Some(Side::Left)
    } else if ball.x > field.width {
        Some(Side::Right)
    } else if ball.y < 0.0 {
        Some(Side::Top)
    } else if ball.y > field.height {
        Some(Side::Bottom)
    } else {
        None
    }
}
