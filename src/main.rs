use std::io;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use crossterm::{
    event::{DisableMouseCapture, EnableMouseCapture},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use tracing::{error, info};

use pong404::config::{load_config, Config};
use pong404::game::session::generate_player_id;
use pong404::game::Side;
use pong404::{debug, game_modes, network};

/// Four-paddle Pong in the terminal
#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Websocket endpoint of the room server (defaults to the configured endpoint)
    #[clap(short, long)]
    server: Option<String>,

    /// Room to join
    #[clap(short, long)]
    room: Option<String>,

    /// Play against bots without a server
    #[clap(long)]
    offline: bool,

    /// Paddle to control in offline play: left, right, top or bottom
    #[clap(long, default_value = "left", value_parser = parse_side)]
    side: Side,

    /// Write debug logs to a file
    #[clap(short, long)]
    debug: bool,

    /// Log file used with --debug
    #[clap(long)]
    log_file: Option<PathBuf>,

    /// Configuration file (defaults to the user config directory)
    #[clap(short, long)]
    config: Option<PathBuf>,
}

fn parse_side(value: &str) -> Result<Side, String> {
    match value.to_ascii_lowercase().as_str() {
        "left" | "l" => Ok(Side::Left),
        "right" | "r" => Ok(Side::Right),
        "top" | "t" => Ok(Side::Top),
        "bottom" | "b" => Ok(Side::Bottom),
        other => Err(format!("unknown side '{}'", other)),
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    debug::init(args.debug, args.log_file.as_deref()).context("initializing debug log")?;
    let config = load_config(args.config.as_deref())?;

    // Connection manager starts before the terminal so a spawn failure prints normally
    let online = if args.offline {
        None
    } else {
        let player_id = generate_player_id();
        let room = args.room.unwrap_or_else(|| config.network.room.clone());
        let url = args
            .server
            .unwrap_or_else(|| config.network.default_endpoint().to_string());
        info!(%player_id, %room, %url, "starting network");
        let client = network::start_network(&config.network, &url, &player_id, &room)
            .context("starting network thread")?;
        Some((client, player_id, room))
    };

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run(&mut terminal, &config, online, args.side);

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    if let Err(e) = &result {
        error!(error = %e, "game exited with error");
    }
    result
}

fn run(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    config: &Config,
    online: Option<(network::NetworkClient, String, String)>,
    side: Side,
) -> Result<()> {
    match online {
        Some((client, player_id, room)) => {
            game_modes::run_game_network(terminal, config, client, &player_id, &room)
        }
        None => game_modes::run_game_local(terminal, config, side),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_side() {
        assert_eq!(parse_side("Top"), Ok(Side::Top));
        assert_eq!(parse_side("b"), Ok(Side::Bottom));
        assert!(parse_side("middle").is_err());
    }

    #[test]
    fn test_args_offline_with_side() {
        let args = Args::parse_from(["pong404", "--offline", "--side", "right"]);
        assert!(args.offline);
        assert_eq!(args.side, Side::Right);
        assert!(args.server.is_none());
    }
}
