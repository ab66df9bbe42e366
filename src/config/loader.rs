// Configuration file loading and creation

use super::types::Config;
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Get the path to the configuration file
pub fn get_config_path() -> PathBuf {
    let mut path = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
    path.push("pong404");
    path.push("config.toml");
    path
}

/// Load configuration from `path` (or the default location), creating a default file if missing
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let config_path = path.map(Path::to_path_buf).unwrap_or_else(get_config_path);

    if config_path.exists() {
        let contents = fs::read_to_string(&config_path)
            .with_context(|| format!("reading {}", config_path.display()))?;
        Ok(parse_or_default(&contents, &config_path))
    } else {
        create_default_config(&config_path)?;
        Ok(Config::default())
    }
}

fn parse_or_default(contents: &str, path: &Path) -> Config {
    match toml::from_str(contents) {
        Ok(config) => config,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "failed to parse config file, using defaults");
            Config::default()
        }
    }
}

/// Create a default configuration file with a short comment header
pub fn create_default_config(path: &Path) -> Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    }

    let toml_string =
        toml::to_string_pretty(&Config::default()).context("serializing default config")?;

    let commented_toml = format!(
        "# Pong404 Configuration File\n\
         # Restart the client after editing\n\
         #\n\
         # Velocities are virtual units per nominal 60 Hz frame\n\
         # Key names: \"Up\", \"Down\", \"Left\", \"Right\", \"Esc\" or single characters\n\n\
         {}",
        toml_string
    );

    fs::write(path, commented_toml).with_context(|| format!("writing {}", path.display()))?;
    info!(path = %path.display(), "created default config file");
    Ok(())
}
