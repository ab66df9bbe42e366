// Online game mode: the frame loop that ties the connection manager to the state store
// Each tick drains inbound messages, samples the local paddle, then merges the render state

use std::ops::ControlFlow;
use std::time::{Duration, Instant};

use anyhow::Result;
use ratatui::backend::Backend;
use ratatui::Terminal;
use tracing::{debug, info};

use crate::config::Config;
use crate::game::{
    ControlIntent, FieldViewport, FrameTiming, InputAction, InputSampler, InputState, Session,
    Side, SimulationClock,
};
use crate::network::{
    ClientMessage, ConnectionPhase, ConnectionStatus, MessageRouter, NetworkClient, NetworkEvent,
};
use crate::sync::{ReconciliationStore, SyncEvent};
use crate::ui::{self, connection_overlay, Hud};

use super::common::{controls_hint, limit_frame_rate};

/// Everything the online frame loop owns besides the terminal and the network handle
pub struct OnlineGame {
    store: ReconciliationStore,
    sampler: InputSampler,
    router: MessageRouter,
    status: ConnectionStatus,
    rtt: Option<Duration>,

    /// Side the sampler's send reference belongs to
    sampled_side: Option<Side>,
    viewport: Option<FieldViewport>,
}

impl OnlineGame {
    pub fn new(config: &Config, player_id: &str, room_id: &str, nominal: Duration) -> Self {
        Self {
            store: ReconciliationStore::new(
                Session::new(player_id, room_id),
                config.physics.clone(),
                config.sync.clone(),
                nominal,
            ),
            sampler: InputSampler::new(&config.physics),
            router: MessageRouter::new(player_id),
            status: ConnectionStatus::default(),
            rtt: None,
            sampled_side: None,
            viewport: None,
        }
    }

    pub fn store(&self) -> &ReconciliationStore {
        &self.store
    }

    pub fn status(&self) -> &ConnectionStatus {
        &self.status
    }

    pub fn rtt(&self) -> Option<Duration> {
        self.rtt
    }

    /// Mirror the connection manager's status into the session
    pub fn set_status(&mut self, status: ConnectionStatus) {
        if status.phase != self.status.phase {
            info!(from = ?self.status.phase, to = ?status.phase, "connection phase changed");
        }
        self.store.session_mut().phase = status.phase;
        self.status = status;
    }

    pub fn handle_event(&mut self, event: NetworkEvent, received_at: Instant, now_ms: u64) {
        match event {
            NetworkEvent::Message(message) => {
                self.store.apply_message(message, received_at, now_ms)
            }
            NetworkEvent::RoundTrip(rtt) => self.rtt = Some(rtt),
        }
    }

    /// Move the owned paddle from this frame's intent.
    /// Returns the update to send, only while connected and holding a seat.
    pub fn step_local(
        &mut self,
        intent: &ControlIntent,
        timing: &FrameTiming,
    ) -> Option<ClientMessage> {
        let side = self.store.local_side();
        if side != self.sampled_side {
            debug!(from = ?self.sampled_side, to = ?side, "owned side changed");
            self.sampler.reset_reference();
            self.sampled_side = side;
        }
        let side = side?;

        let frozen = self.store.is_local_frozen(timing.wall_ms);
        let field = self.store.working().field;
        let paddle = &mut self.store.working_mut().paddles[side];
        let update = self.sampler.sample(
            paddle,
            side,
            intent,
            frozen,
            &field,
            timing.multiplier,
            timing.wall_ms,
        )?;

        if self.status.phase != ConnectionPhase::Connected {
            return None;
        }
        Some(self.router.update_paddle(update))
    }

    /// Fold the staged inbound state and local prediction into the render state
    pub fn finish_frame(&mut self, timing: &FrameTiming) -> Vec<SyncEvent> {
        let events = self.store.merge(timing);
        for event in &events {
            debug!(?event, frame = timing.frame, "sync event");
        }
        events
    }

    /// Left side of the status bar
    pub fn status_line(&self) -> String {
        let session = self.store.session();
        let seat = match session.role {
            Some(role) => match role.side() {
                Some(side) => side.name().to_string(),
                None => "spectating".to_string(),
            },
            None => "no seat".to_string(),
        };
        format!(
            "room {} | {} | {} players",
            session.room_id, seat, session.player_count
        )
    }
}

/// Run the online game until the player quits. Connects on entry and tears down on exit.
pub fn run_game_network<B: Backend>(
    terminal: &mut Terminal<B>,
    config: &Config,
    mut client: NetworkClient,
    player_id: &str,
    room_id: &str,
) -> Result<()> {
    info!(player_id, room_id, "starting online game");

    let mut clock = SimulationClock::new(config.display.target_fps, config.display.max_delta_factor);
    let mut input = InputState::new(&config.keybindings);
    let mut game = OnlineGame::new(config, player_id, room_id, clock.nominal_interval());
    let reconnect_key = config.keybindings.reconnect.as_str();
    let controls = controls_hint(&config.keybindings, Some((reconnect_key, "Reconnect")));

    client.connect();

    loop {
        let frame_start = Instant::now();
        let mut viewport = game.viewport;

        let ran = clock.run_frame(
            frame_start,
            &mut game,
            |game: &mut OnlineGame, timing: &FrameTiming| -> Result<ControlFlow<()>> {
                for action in input.poll(game.viewport.as_ref(), timing.now)? {
                    match action {
                        InputAction::Quit => return Ok(ControlFlow::Break(())),
                        InputAction::Reconnect => {
                            info!("manual reconnect requested");
                            client.connect();
                        }
                    }
                }

                game.set_status(client.status());
                while let Some(event) = client.try_recv_event() {
                    game.handle_event(event, Instant::now(), timing.wall_ms);
                }

                if let Some(update) = game.step_local(&input.intent(timing.now), timing) {
                    client.send(update);
                }
                game.finish_frame(timing);
                Ok(ControlFlow::Continue(()))
            },
            |game: &OnlineGame, timing: &FrameTiming| -> Result<()> {
                let overlay = connection_overlay(game.status(), reconnect_key);
                let status = game.status_line();
                let hud = Hud {
                    local_side: game.store().local_side(),
                    status: &status,
                    controls: &controls,
                    rtt: game.rtt(),
                    overlay: overlay.as_ref(),
                    now_ms: timing.wall_ms,
                };
                terminal.draw(|f| {
                    viewport = Some(ui::render(f, game.store().render(), &hud, &config.display))
                })?;
                Ok(())
            },
        )?;

        if ran.is_none() {
            break;
        }
        game.viewport = viewport;
        limit_frame_rate(&clock, frame_start);
    }

    info!("leaving online game");
    client.teardown();
    Ok(())
}
