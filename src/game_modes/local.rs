// Offline game mode: one local paddle against three bots, no server involved
// The working state is authoritative here, so physics runs on it directly before the merge

use std::ops::ControlFlow;
use std::time::{Duration, Instant};

use anyhow::Result;
use rand::rngs::StdRng;
use rand::SeedableRng;
use ratatui::backend::Backend;
use ratatui::Terminal;
use tracing::{debug, info};

use crate::ai::{self, steer, Bot};
use crate::config::{Config, PhysicsConfig};
use crate::game::physics::{self, PhysicsEvents};
use crate::game::{
    ControlIntent, FieldViewport, FrameTiming, GamePhase, InputAction, InputSampler, InputState,
    Session, Side, SimulationClock,
};
use crate::sync::ReconciliationStore;
use crate::ui::{self, Hud};

use super::common::{controls_hint, limit_frame_rate};

pub struct OfflineGame {
    store: ReconciliationStore,
    sampler: InputSampler,
    bots: Vec<(Side, Box<dyn Bot>)>,
    rng: StdRng,
    physics: PhysicsConfig,
    serve_pause_ms: u64,
    viewport: Option<FieldViewport>,
}

impl OfflineGame {
    pub fn new(config: &Config, side: Side, nominal: Duration, now_ms: u64) -> Self {
        Self::with_rng(config, side, nominal, now_ms, StdRng::from_entropy())
    }

    pub fn with_rng(
        config: &Config,
        side: Side,
        nominal: Duration,
        now_ms: u64,
        rng: StdRng,
    ) -> Self {
        let mut store = ReconciliationStore::new(
            Session::offline(side),
            config.physics.clone(),
            config.sync.clone(),
            nominal,
        );
        store
            .working_mut()
            .pause_for_serve(now_ms + config.sync.serve_pause_ms);

        Self {
            store,
            sampler: InputSampler::new(&config.physics),
            bots: ai::bots_for(Some(side)),
            rng,
            physics: config.physics.clone(),
            serve_pause_ms: config.sync.serve_pause_ms,
            viewport: None,
        }
    }

    pub fn store(&self) -> &ReconciliationStore {
        &self.store
    }

    /// Start over after a finished game; ignored while a game is running
    pub fn rematch(&mut self, now_ms: u64) -> bool {
        let state = self.store.working_mut();
        if !matches!(state.phase, GamePhase::Ended { .. }) {
            return false;
        }
        info!("rematch");
        state.score.reset();
        state.clear_transient();
        state.pause_for_serve(now_ms + self.serve_pause_ms);
        for (_, bot) in &mut self.bots {
            bot.reset();
        }
        true
    }

    /// Advance one frame: the local paddle, every bot, then the ball
    pub fn step(&mut self, intent: &ControlIntent, timing: &FrameTiming) -> PhysicsEvents {
        let now_ms = timing.wall_ms;

        if let Some(side) = self.store.local_side() {
            let frozen = self.store.is_local_frozen(now_ms);
            let field = self.store.working().field;
            // No server to send to; the sampler only moves the paddle
            let _ = self.sampler.sample(
                &mut self.store.working_mut().paddles[side],
                side,
                intent,
                frozen,
                &field,
                timing.multiplier,
                now_ms,
            );
        }

        let state = self.store.working_mut();
        let ball = state.ball.clone();
        let field = state.field;
        for (side, bot) in &mut self.bots {
            let paddle = &mut state.paddles[*side];
            paddle.target = bot.target(&ball, *side, paddle, &field, now_ms);
            steer(
                paddle,
                *side,
                self.physics.paddle_max_speed,
                &field,
                timing.multiplier,
            );
        }

        let events = physics::step(
            state,
            &self.physics,
            self.serve_pause_ms,
            timing.multiplier,
            now_ms,
            &mut self.rng,
        );

        if events.served {
            for (_, bot) in &mut self.bots {
                bot.reset();
            }
        }
        if let Some(wall) = events.goal {
            info!(?wall, scorer = ?events.scorer, score = ?state.score, "goal");
        }
        if let GamePhase::Ended { winner } = state.phase {
            if events.goal.is_some() {
                info!(?winner, "game over");
            }
        }

        for event in self.store.merge(timing) {
            debug!(?event, frame = timing.frame, "sync event");
        }
        events
    }

    pub fn status_line(&self) -> String {
        match self.store.local_side() {
            Some(side) => format!("offline | {} vs {} bots", side.name(), self.bots.len()),
            None => "offline".to_string(),
        }
    }
}

/// Run an offline game until the player quits
pub fn run_game_local<B: Backend>(
    terminal: &mut Terminal<B>,
    config: &Config,
    side: Side,
) -> Result<()> {
    info!(side = side.name(), "starting offline game");

    let mut clock = SimulationClock::new(config.display.target_fps, config.display.max_delta_factor);
    let mut input = InputState::new(&config.keybindings);
    let mut game = OfflineGame::new(
        config,
        side,
        clock.nominal_interval(),
        crate::game::clock::wall_clock_ms(),
    );
    let controls = controls_hint(
        &config.keybindings,
        Some((config.keybindings.reconnect.as_str(), "Rematch")),
    );

    loop {
        let frame_start = Instant::now();
        let mut viewport = game.viewport;

        let ran = clock.run_frame(
            frame_start,
            &mut game,
            |game: &mut OfflineGame, timing: &FrameTiming| -> Result<ControlFlow<()>> {
                for action in input.poll(game.viewport.as_ref(), timing.now)? {
                    match action {
                        InputAction::Quit => return Ok(ControlFlow::Break(())),
                        InputAction::Reconnect => {
                            game.rematch(timing.wall_ms);
                        }
                    }
                }
                game.step(&input.intent(timing.now), timing);
                Ok(ControlFlow::Continue(()))
            },
            |game: &OfflineGame, timing: &FrameTiming| -> Result<()> {
                let status = game.status_line();
                let hud = Hud {
                    local_side: game.store().local_side(),
                    status: &status,
                    controls: &controls,
                    rtt: None,
                    overlay: None,
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

    info!("leaving offline game");
    Ok(())
}
