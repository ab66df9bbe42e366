use std::time::Duration;

use ratatui::{
    layout::{Alignment, Constraint, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Paragraph},
    Frame,
};

use super::braille::BrailleCanvas;
use super::overlay::{render_overlay, OverlayMessage};
use crate::config::DisplayConfig;
use crate::game::input::FieldViewport;
use crate::game::state::{Field, GamePhase, Side, SimulationState, Trail};

// Layout: score bar, status bar, then the square playfield centered below
// Row 0: Scores for all four sides
// Row 1: Connection/room status, controls, round trip
// Rows 2 to N: Playfield
const UI_HEADER_ROWS: u16 = 2;

/// Everything besides the game state that ends up on screen
pub struct Hud<'a> {
    pub local_side: Option<Side>,
    pub status: &'a str,
    pub controls: &'a str,
    pub rtt: Option<Duration>,
    pub overlay: Option<&'a OverlayMessage>,
    pub now_ms: u64,
}

/// Largest square of braille dots that fits below the header, centered
pub fn field_layout(area: Rect, field: Field) -> FieldViewport {
    let rows = area.height.saturating_sub(UI_HEADER_ROWS);
    let side_dots = (area.width as u32 * 2).min(rows as u32 * 4);
    // Whole cells on both axes
    let side_dots = side_dots - side_dots % 4;

    let width = (side_dots / 2) as u16;
    let height = (side_dots / 4) as u16;
    FieldViewport {
        area: Rect {
            x: area.x + (area.width - width) / 2,
            y: area.y + UI_HEADER_ROWS,
            width,
            height,
        },
        field,
    }
}

/// Centered text shown over the field for every phase except live play
pub fn phase_banner(phase: GamePhase, now_ms: u64) -> Option<String> {
    match phase {
        GamePhase::Playing => None,
        GamePhase::PreStart => Some("Waiting for players".to_string()),
        GamePhase::Paused { until_ms } if until_ms <= now_ms => None,
        GamePhase::Paused { until_ms } => {
            let secs = (until_ms - now_ms).div_ceil(1000);
            Some(format!("Serve in {}", secs))
        }
        GamePhase::Ended { winner: Some(side) } => {
            Some(format!("{} WINS", side.name().to_uppercase()))
        }
        GamePhase::Ended { winner: None } => Some("GAME OVER".to_string()),
    }
}

fn rgb(color: [u8; 3]) -> Color {
    Color::Rgb(color[0], color[1], color[2])
}

/// Draw one frame of `state`. Returns where the field landed, for mouse mapping.
pub fn render(
    frame: &mut Frame,
    state: &SimulationState,
    hud: &Hud,
    display: &DisplayConfig,
) -> FieldViewport {
    let area = frame.area();

    // Draw background (true black RGB, not terminal default)
    let bg = Block::default().style(Style::default().bg(Color::Rgb(0, 0, 0)));
    frame.render_widget(bg, area);

    draw_scores(frame, state, hud, display, area);
    draw_status(frame, hud, area);

    let viewport = field_layout(area, state.field);
    let field_area = viewport.area;
    if field_area.width == 0 || field_area.height == 0 {
        return viewport;
    }

    let mut canvas = BrailleCanvas::new(field_area.width as usize, field_area.height as usize);
    let scale_x = canvas.pixel_width() as f32 / state.field.width;
    let scale_y = canvas.pixel_height() as f32 / state.field.height;
    let dot = |x: f32, y: f32| ((x * scale_x) as i32, (y * scale_y) as i32);

    draw_border(&mut canvas);

    let trail_color = rgb(display.trail_color);
    draw_trail(&mut canvas, &state.trails.ball, trail_color, dot);
    for side in Side::ALL {
        draw_trail(&mut canvas, state.trails.paddle(side), trail_color, dot);
    }

    for coin in &state.coins {
        let (x, y) = dot(coin.x, coin.y);
        canvas.set_pixel(x, y, Color::Yellow);
    }
    for pickup in &state.pickups {
        let (x, y) = dot(pickup.x, pickup.y);
        canvas.fill_rect(x - 1, y - 1, 3, 3, Color::Magenta);
    }

    for (side, paddle) in state.paddles.iter() {
        let color = if Some(side) == hud.local_side {
            rgb(display.local_paddle_color)
        } else {
            rgb(display.paddle_color)
        };
        let (x, y) = dot(paddle.x, paddle.y);
        let width = (paddle.width * scale_x).round() as i32;
        let height = (paddle.height * scale_y).round() as i32;
        canvas.fill_rect(x, y, width, height, color);
    }

    // Ghosted ball is drawn faint
    let ball = &state.ball;
    let ghosted = ball
        .modifiers
        .iter()
        .any(|m| m.kind == "ghost" && m.is_active(hud.now_ms));
    let ball_color = if ghosted { trail_color } else { rgb(display.ball_color) };
    let size_x = ((ball.size * scale_x).round() as i32).max(1);
    let size_y = ((ball.size * scale_y).round() as i32).max(1);
    let (bx, by) = dot(ball.x, ball.y);
    canvas.fill_rect(bx - size_x / 2, by - size_y / 2, size_x, size_y, ball_color);

    frame.render_widget(Paragraph::new(canvas.lines()), field_area);

    if let Some(text) = phase_banner(state.effective_phase(hud.now_ms), hud.now_ms) {
        let banner = Paragraph::new(text)
            .style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD))
            .alignment(Alignment::Center);
        let banner_area = Rect {
            x: field_area.x,
            y: field_area.y + field_area.height / 3,
            width: field_area.width,
            height: 1,
        };
        frame.render_widget(banner, banner_area);
    }

    if let Some(overlay) = hud.overlay {
        render_overlay(frame, overlay, area);
    }

    viewport
}

fn draw_border(canvas: &mut BrailleCanvas) {
    let (w, h) = (canvas.pixel_width() as i32, canvas.pixel_height() as i32);
    let color = Color::DarkGray;

    // Dotted outline: every wall is a goal
    for x in (0..w).step_by(2) {
        canvas.set_pixel(x, 0, color);
        canvas.set_pixel(x, h - 1, color);
    }
    for y in (0..h).step_by(2) {
        canvas.set_pixel(0, y, color);
        canvas.set_pixel(w - 1, y, color);
    }
}

fn draw_trail(
    canvas: &mut BrailleCanvas,
    trail: &Trail,
    color: Color,
    dot: impl Fn(f32, f32) -> (i32, i32),
) {
    for point in trail.points() {
        let (x, y) = dot(point.x, point.y);
        canvas.set_pixel(x, y, color);
    }
}

fn draw_scores(
    frame: &mut Frame,
    state: &SimulationState,
    hud: &Hud,
    display: &DisplayConfig,
    area: Rect,
) {
    let mut spans = Vec::new();
    for side in Side::ALL {
        let style = if Some(side) == hud.local_side {
            Style::default()
                .fg(rgb(display.local_paddle_color))
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::White)
        };
        spans.push(Span::styled(
            format!("{} {}", side.name().to_uppercase(), state.score[side]),
            style,
        ));
        spans.push(Span::raw("   "));
    }
    spans.pop();

    let scores = Paragraph::new(Line::from(spans)).alignment(Alignment::Center);
    frame.render_widget(scores, Rect { height: 1, ..area });
}

fn draw_status(frame: &mut Frame, hud: &Hud, area: Rect) {
    if area.height < 2 {
        return;
    }
    let row = Rect {
        y: area.y + 1,
        height: 1,
        ..area
    };

    let [left, center, right] = Layout::horizontal([Constraint::Ratio(1, 3); 3]).areas(row);
    let dim = Style::default().fg(Color::DarkGray);

    frame.render_widget(Paragraph::new(hud.status).style(dim), left);
    frame.render_widget(
        Paragraph::new(hud.controls)
            .style(dim)
            .alignment(Alignment::Center),
        center,
    );

    if let Some(rtt) = hud.rtt {
        let rtt = Paragraph::new(format!("RTT {}ms", rtt.as_millis()))
            .style(dim)
            .alignment(Alignment::Right);
        frame.render_widget(rtt, right);
    }
}
