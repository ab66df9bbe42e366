// Configuration module for Pong404
// Handles loading and managing client configuration from a TOML file

pub mod loader;
pub mod types;

pub use loader::{create_default_config, get_config_path, load_config};
pub use types::{Config, DisplayConfig, KeyBindings, NetworkConfig, PhysicsConfig, SyncConfig};
