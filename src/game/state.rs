use std::collections::VecDeque;
use std::ops::{Index, IndexMut};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::config::{PhysicsConfig, SyncConfig};

/// One of the four walls, each guarded by a paddle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    #[serde(alias = "l")]
    Left,
    #[serde(alias = "r")]
    Right,
    #[serde(alias = "t")]
    Top,
    #[serde(alias = "b")]
    Bottom,
}

impl Side {
    pub const ALL: [Side; 4] = [Side::Left, Side::Right, Side::Top, Side::Bottom];

    pub fn index(self) -> usize {
        match self {
            Side::Left => 0,
            Side::Right => 1,
            Side::Top => 2,
            Side::Bottom => 3,
        }
    }

    /// Left and right paddles travel along y, top and bottom along x
    pub fn is_vertical(self) -> bool {
        matches!(self, Side::Left | Side::Right)
    }

    pub fn name(self) -> &'static str {
        match self {
            Side::Left => "left",
            Side::Right => "right",
            Side::Top => "top",
            Side::Bottom => "bottom",
        }
    }
}

/// Seat assigned to this client by the server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[serde(alias = "l")]
    Left,
    #[serde(alias = "r")]
    Right,
    #[serde(alias = "t")]
    Top,
    #[serde(alias = "b")]
    Bottom,
    #[serde(alias = "spec", alias = "s")]
    Spectator,
}

impl Role {
    /// The paddle this role may write, if any
    pub fn side(self) -> Option<Side> {
        match self {
            Role::Left => Some(Side::Left),
            Role::Right => Some(Side::Right),
            Role::Top => Some(Side::Top),
            Role::Bottom => Some(Side::Bottom),
            Role::Spectator => None,
        }
    }

    pub fn is_player(self) -> bool {
        self.side().is_some()
    }
}

impl From<Side> for Role {
    fn from(side: Side) -> Self {
        match side {
            Side::Left => Role::Left,
            Side::Right => Role::Right,
            Side::Top => Role::Top,
            Side::Bottom => Role::Bottom,
        }
    }
}

/// Timed ball modifier (ghost, drunk, magnet...). Several may be active at once.
#[derive(Debug, Clone, PartialEq)]
pub struct BallModifier {
    pub kind: String,
    pub activated_at_ms: u64,
    pub duration_ms: u64,
}

impl BallModifier {
    pub fn is_active(&self, now_ms: u64) -> bool {
        now_ms >= self.activated_at_ms
            && now_ms < self.activated_at_ms.saturating_add(self.duration_ms)
    }
}

/// Ball position is its center; velocity is in units per nominal frame
#[derive(Debug, Clone, PartialEq)]
pub struct Ball {
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
    pub size: f32,
    pub modifiers: Vec<BallModifier>,
    pub last_touched_by: Option<Side>,
}

impl Ball {
    pub fn centered(field: &Field, size: f32) -> Self {
        Self {
            x: field.width / 2.0,
            y: field.height / 2.0,
            vx: 0.0,
            vy: 0.0,
            size,
            modifiers: Vec::new(),
            last_touched_by: None,
        }
    }

    pub fn speed(&self) -> f32 {
        (self.vx * self.vx + self.vy * self.vy).sqrt()
    }
}

/// Paddle rectangle (x, y is the top-left corner) plus its velocity along its axis
#[derive(Debug, Clone, PartialEq)]
pub struct Paddle {
    pub x: f32,
    pub y: f32,
    pub velocity: f32,
    pub width: f32,
    pub height: f32,
    pub target: Option<f32>,
}

impl Paddle {
    /// Centered paddle resting against `side`'s wall
    pub fn home(side: Side, field: &Field, physics: &PhysicsConfig) -> Self {
        let length = physics.paddle_length;
        let thickness = physics.paddle_thickness;
        let margin = physics.paddle_margin;

        let (x, y, width, height) = match side {
            Side::Left => (margin, (field.height - length) / 2.0, thickness, length),
            Side::Right => (
                field.width - margin - thickness,
                (field.height - length) / 2.0,
                thickness,
                length,
            ),
            Side::Top => ((field.width - length) / 2.0, margin, length, thickness),
            Side::Bottom => (
                (field.width - length) / 2.0,
                field.height - margin - thickness,
                length,
                thickness,
            ),
        };

        Self {
            x,
            y,
            velocity: 0.0,
            width,
            height,
            target: None,
        }
    }

    /// Coordinate along the axis this paddle travels on
    pub fn position(&self, side: Side) -> f32 {
        if side.is_vertical() {
            self.y
        } else {
            self.x
        }
    }

    pub fn set_position(&mut self, side: Side, value: f32) {
        if side.is_vertical() {
            self.y = value;
        } else {
            self.x = value;
        }
    }

    /// Length of the paddle along its axis of travel
    pub fn extent(&self, side: Side) -> f32 {
        if side.is_vertical() {
            self.height
        } else {
            self.width
        }
    }

    pub fn center(&self) -> (f32, f32) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// Largest position the paddle can take on its axis without leaving the field
    pub fn max_position(&self, side: Side, field: &Field) -> f32 {
        let span = if side.is_vertical() {
            field.height
        } else {
            field.width
        };
        (span - self.extent(side)).max(0.0)
    }

    fn is_sane(&self) -> bool {
        [self.x, self.y, self.velocity, self.width, self.height]
            .iter()
            .all(|v| v.is_finite())
            && self.width > 0.0
            && self.height > 0.0
    }
}

/// One paddle per side, indexable by [`Side`]
#[derive(Debug, Clone, PartialEq)]
pub struct Paddles(pub [Paddle; 4]);

impl Paddles {
    pub fn home(field: &Field, physics: &PhysicsConfig) -> Self {
        Self(Side::ALL.map(|side| Paddle::home(side, field, physics)))
    }

    pub fn iter(&self) -> impl Iterator<Item = (Side, &Paddle)> {
        Side::ALL.into_iter().zip(self.0.iter())
    }

    /// Replace any paddle left non-finite or zero-sized by a malformed snapshot
    pub fn sanitize(&mut self, field: &Field, physics: &PhysicsConfig) {
        for side in Side::ALL {
            if !self[side].is_sane() {
                self[side] = Paddle::home(side, field, physics);
            }
        }
    }
}

impl Index<Side> for Paddles {
    type Output = Paddle;

    fn index(&self, side: Side) -> &Paddle {
        &self.0[side.index()]
    }
}

impl IndexMut<Side> for Paddles {
    fn index_mut(&mut self, side: Side) -> &mut Paddle {
        &mut self.0[side.index()]
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Score(pub [u32; 4]);

impl Score {
    pub fn reset(&mut self) {
        self.0 = [0; 4];
    }
}

impl Index<Side> for Score {
    type Output = u32;

    fn index(&self, side: Side) -> &u32 {
        &self.0[side.index()]
    }
}

impl IndexMut<Side> for Score {
    fn index_mut(&mut self, side: Side) -> &mut u32 {
        &mut self.0[side.index()]
    }
}

/// Transient gameplay effect with an expiry
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveEffect {
    pub kind: String,
    pub start_ms: u64,
    pub duration_ms: u64,
    pub side: Option<Side>,
}

impl ActiveEffect {
    pub fn is_active(&self, now_ms: u64) -> bool {
        now_ms >= self.start_ms && now_ms < self.start_ms.saturating_add(self.duration_ms)
    }

    /// Freeze stops every paddle except the one that triggered it
    pub fn freezes(&self, side: Side, now_ms: u64) -> bool {
        self.kind == "freeze" && self.is_active(now_ms) && self.side != Some(side)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Pickup {
    pub kind: String,
    pub x: f32,
    pub y: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Coin {
    pub x: f32,
    pub y: f32,
}

/// Exactly one phase holds at a time; a pause always knows when it ends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GamePhase {
    PreStart,
    Paused { until_ms: u64 },
    Playing,
    Ended { winner: Option<Side> },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Field {
    pub width: f32,
    pub height: f32,
}

impl Field {
    pub fn square(size: f32) -> Self {
        Self {
            width: size,
            height: size,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrailPoint {
    pub x: f32,
    pub y: f32,
    pub at: Instant,
}

/// Recent positions of one entity, kept for `retention` only
#[derive(Debug, Clone, PartialEq)]
pub struct Trail {
    points: VecDeque<TrailPoint>,
    retention: Duration,
}

impl Trail {
    pub fn new(retention: Duration) -> Self {
        Self {
            points: VecDeque::new(),
            retention,
        }
    }

    pub fn record(&mut self, x: f32, y: f32, now: Instant) {
        let duplicate = self
            .points
            .back()
            .is_some_and(|last| last.at == now && last.x == x && last.y == y);
        if !duplicate {
            self.points.push_back(TrailPoint { x, y, at: now });
        }

        while let Some(front) = self.points.front() {
            if now.saturating_duration_since(front.at) > self.retention {
                self.points.pop_front();
            } else {
                break;
            }
        }
    }

    pub fn points(&self) -> impl Iterator<Item = &TrailPoint> {
        self.points.iter()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn clear(&mut self) {
        self.points.clear();
    }
}

/// Trails for the ball and the four paddles; local only, never sent or received
#[derive(Debug, Clone, PartialEq)]
pub struct Trails {
    pub ball: Trail,
    pub paddles: [Trail; 4],
}

impl Trails {
    pub fn new(sync: &SyncConfig) -> Self {
        let paddle_retention = Duration::from_millis(sync.paddle_trail_ms);
        Self {
            ball: Trail::new(Duration::from_millis(sync.ball_trail_ms)),
            paddles: std::array::from_fn(|_| Trail::new(paddle_retention)),
        }
    }

    /// Append the current position of every tracked entity and drop stale points
    pub fn record(&mut self, ball: &Ball, paddles: &Paddles, now: Instant) {
        self.ball.record(ball.x, ball.y, now);
        for (side, paddle) in paddles.iter() {
            let (cx, cy) = paddle.center();
            self.paddles[side.index()].record(cx, cy, now);
        }
    }

    pub fn paddle(&self, side: Side) -> &Trail {
        &self.paddles[side.index()]
    }
}

/// Full game snapshot. Which fields a client may write depends on its role.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationState {
    pub ball: Ball,
    pub paddles: Paddles,
    pub score: Score,
    pub effects: Vec<ActiveEffect>,
    pub pickups: Vec<Pickup>,
    pub coins: Vec<Coin>,
    pub phase: GamePhase,
    pub field: Field,
    pub trails: Trails,
}

impl SimulationState {
    pub fn new(physics: &PhysicsConfig, sync: &SyncConfig) -> Self {
        let field = Field::square(physics.field_size);
        Self {
            ball: Ball::centered(&field, physics.ball_size),
            paddles: Paddles::home(&field, physics),
            score: Score::default(),
            effects: Vec::new(),
            pickups: Vec::new(),
            coins: Vec::new(),
            phase: GamePhase::PreStart,
            field,
            trails: Trails::new(sync),
        }
    }

    /// Phase as seen at `now_ms`: an elapsed pause reads as playing
    pub fn effective_phase(&self, now_ms: u64) -> GamePhase {
        match self.phase {
            GamePhase::Paused { until_ms } if now_ms >= until_ms => GamePhase::Playing,
            phase => phase,
        }
    }

    pub fn is_frozen(&self, side: Side, now_ms: u64) -> bool {
        self.effects.iter().any(|e| e.freezes(side, now_ms))
    }

    /// Drop pickups, coins, effects and ball modifiers
    pub fn clear_transient(&mut self) {
        self.pickups.clear();
        self.coins.clear();
        self.effects.clear();
        self.ball.modifiers.clear();
    }

    /// Recenter the ball at rest and hold play until `until_ms`
    pub fn pause_for_serve(&mut self, until_ms: u64) {
        let size = self.ball.size;
        self.ball = Ball::centered(&self.field, size);
        self.phase = GamePhase::Paused { until_ms };
    }
}
