// Trajectory prediction for bots

use crate::game::state::{Ball, Field, Paddle};
use crate::game::Side;

/// Predict where along `side`'s axis the ball will be when it reaches the paddle plane.
///
/// `plane` is the coordinate of the paddle face on the other axis (an x for left/right
/// paddles, a y for top/bottom). Returns None when the ball is moving away, is not moving
/// toward the plane at all, or will leave through another wall before getting there.
/// Every wall is a goal, so there are no wall bounces to account for.
pub fn predict_intercept(ball: &Ball, side: Side, plane: f32, field: &Field) -> Option<f32> {
    let (pos, vel, across_pos, across_vel, span) = if side.is_vertical() {
        (ball.x, ball.vx, ball.y, ball.vy, field.height)
    } else {
        (ball.y, ball.vy, ball.x, ball.vx, field.width)
    };

    if vel.abs() < 0.01 {
        return None;
    }

    let frames = (plane - pos) / vel;
    if frames < 0.0 {
        return None;
    }

    let predicted = across_pos + across_vel * frames;
    if !(0.0..=span).contains(&predicted) {
        return None;
    }
    Some(predicted)
}

/// Coordinate of the face of `side`'s paddle that the ball hits
pub fn paddle_plane(side: Side, paddle: &Paddle) -> f32 {
    match side {
        Side::Left => paddle.x + paddle.width,
        Side::Right => paddle.x,
        Side::Top => paddle.y + paddle.height,
        Side::Bottom => paddle.y,
    }
}
