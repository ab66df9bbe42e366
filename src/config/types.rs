// Pong404 configuration types
// Every tuning constant lives here so the timing/smoothing values stay configuration, not contract

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub keybindings: KeyBindings,
    #[serde(default)]
    pub physics: PhysicsConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub display: DisplayConfig,
    #[serde(default)]
    pub network: NetworkConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct KeyBindings {
    // Move the owned paddle toward the low end of its axis (up for left/right, left for top/bottom)
    pub paddle_negative: String,
    pub paddle_negative_alt: String,

    // Move toward the high end of its axis
    pub paddle_positive: String,
    pub paddle_positive_alt: String,

    pub quit: String,
    pub reconnect: String,
}

impl Default for KeyBindings {
    fn default() -> Self {
        Self {
            paddle_negative: "W".to_string(),
            paddle_negative_alt: "Up".to_string(),
            paddle_positive: "S".to_string(),
            paddle_positive_alt: "Down".to_string(),
            quit: "Q".to_string(),
            reconnect: "R".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PhysicsConfig {
    // Square playfield in virtual units
    pub field_size: f32,

    // Paddle extent along its axis of travel, and its thickness
    pub paddle_length: f32,
    pub paddle_thickness: f32,

    // Distance between a paddle and its wall
    pub paddle_margin: f32,

    // Velocity gained per nominal frame while a direction is held
    pub paddle_acceleration: f32,

    // Velocity retained per nominal frame when no direction is held
    pub paddle_friction: f32,

    pub paddle_max_speed: f32,

    // Position change below this is not worth a paddle-update message
    pub send_epsilon: f32,

    pub ball_size: f32,

    // Ball speed in virtual units per nominal frame
    pub ball_initial_speed: f32,

    // Ball speed multiplier on paddle hit, and the speed it never exceeds
    pub ball_speed_multiplier: f32,
    pub ball_max_speed: f32,

    pub winning_score: u32,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            field_size: 800.0,
            paddle_length: 140.0,
            paddle_thickness: 12.0,
            paddle_margin: 16.0,
            paddle_acceleration: 1.6,
            paddle_friction: 0.82,
            paddle_max_speed: 14.0,
            send_epsilon: 0.5,
            ball_size: 12.0,
            ball_initial_speed: 5.0,
            ball_speed_multiplier: 1.05,
            ball_max_speed: 14.0,
            winning_score: 11,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SyncConfig {
    // Added to elapsed-since-snapshot to cover one-way network delay
    pub extrapolation_bonus_ms: u64,

    // Extrapolation never projects further than this past the last snapshot
    pub max_extrapolation_ms: u64,

    // Fraction of the remaining distance a remote paddle closes each tick
    pub smoothing_factor: f32,

    pub paddle_trail_ms: u64,
    pub ball_trail_ms: u64,

    // Pause before re-serving after an active player joins or leaves
    pub serve_pause_ms: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            extrapolation_bonus_ms: 30,
            max_extrapolation_ms: 250,
            smoothing_factor: 0.3,
            paddle_trail_ms: 200,
            ball_trail_ms: 750,
            serve_pause_ms: 3000,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DisplayConfig {
    pub target_fps: u64,

    // Largest frame delta accepted, in nominal frames (2.0 = two frames)
    pub max_delta_factor: f32,

    pub paddle_color: [u8; 3],
    pub local_paddle_color: [u8; 3],
    pub ball_color: [u8; 3],
    pub trail_color: [u8; 3],
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            target_fps: 60,
            max_delta_factor: 2.0,
            paddle_color: [255, 255, 255],
            local_paddle_color: [80, 220, 120],
            ball_color: [255, 255, 255],
            trail_color: [90, 90, 90],
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub local_endpoint: String,
    pub deployed_endpoint: String,
    pub room: String,

    // Path probed before connecting to a remote endpoint
    pub health_path: String,
    pub health_timeout_ms: u64,

    // Wake-up wait before the first attempt against a cold remote endpoint
    pub cold_start_delay_ms: u64,

    // Offsets (from attempt start) at which the boot indicator advances
    pub staged_feedback_secs: Vec<u64>,

    pub connect_timeout_local_secs: u64,
    pub connect_timeout_remote_secs: u64,

    pub retry_base_ms: u64,
    pub retry_jitter_ms: u64,
    pub retry_max_ms: u64,

    // Expected server heartbeat cadence; the channel is dead after interval * factor of silence
    pub heartbeat_interval_ms: u64,
    pub heartbeat_timeout_factor: u32,
    pub heartbeat_check_interval_ms: u64,

    pub ping_interval_ms: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            local_endpoint: "ws://127.0.0.1:8080/ws".to_string(),
            deployed_endpoint: "wss://pong404.fly.dev/ws".to_string(),
            room: "main".to_string(),
            health_path: "/health".to_string(),
            health_timeout_ms: 3000,
            cold_start_delay_ms: 3000,
            staged_feedback_secs: vec![8, 20, 35, 50],
            connect_timeout_local_secs: 10,
            connect_timeout_remote_secs: 60,
            retry_base_ms: 5000,
            retry_jitter_ms: 5000,
            retry_max_ms: 15000,
            heartbeat_interval_ms: 5000,
            heartbeat_timeout_factor: 3,
            heartbeat_check_interval_ms: 1000,
            ping_interval_ms: 2000,
        }
    }
}

impl NetworkConfig {
    /// Endpoint picked by the build environment: the deployed one for
    /// `PONG404_ENV=production` builds, the local one otherwise
    pub fn default_endpoint(&self) -> &str {
        match option_env!("PONG404_ENV") {
            Some("production") => &self.deployed_endpoint,
            _ => &self.local_endpoint,
        }
    }
}
