// Reconciliation of local and network state
// Network callbacks only stage into the snapshot; once per frame `merge` builds
// the render state from the snapshot, the locally simulated paddle and prediction

use std::mem;
use std::time::{Duration, Instant};

use tracing::{debug, info, trace};

use crate::config::{PhysicsConfig, SyncConfig};
use crate::game::clock::FrameTiming;
use crate::game::session::Session;
use crate::game::state::{GamePhase, SimulationState, Trails};
use crate::game::Side;
use crate::network::protocol::{
    PaddleUpdated, PeerChange, RoleSwitched, RoomJoined, ServerMessage, StatePayload,
};
use crate::network::router::{dispatch, InboundHandler};

use super::prediction::PredictionEngine;
use super::snapshot::NetworkSnapshot;

/// One-shot cue produced by a merge, for sound and other fire-once reactions
#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    Scored { side: Side },
    BallBounced,
    EffectStarted { kind: String },
    PhaseChanged { from: GamePhase, to: GamePhase },
}

pub struct ReconciliationStore {
    session: Session,
    physics: PhysicsConfig,
    sync: SyncConfig,

    /// Locally simulated state; in online play only the local paddle of it is used
    working: SimulationState,
    snapshot: Option<NetworkSnapshot>,
    render: SimulationState,
    prediction: PredictionEngine,

    /// Snapshot revision the last merge consumed
    merged_revision: Option<u64>,
    peer_sequences: [Option<u64>; 4],

    // Receipt time of the message being applied
    staged_at: Instant,
    staged_ms: u64,
}

impl ReconciliationStore {
    pub fn new(
        session: Session,
        physics: PhysicsConfig,
        sync: SyncConfig,
        nominal: Duration,
    ) -> Self {
        let working = SimulationState::new(&physics, &sync);
        let render = working.clone();
        let prediction = PredictionEngine::new(&sync, nominal);
        Self {
            session,
            physics,
            sync,
            working,
            snapshot: None,
            render,
            prediction,
            merged_revision: None,
            peer_sequences: [None; 4],
            staged_at: Instant::now(),
            staged_ms: 0,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }

    pub fn local_side(&self) -> Option<Side> {
        self.session.local_side()
    }

    /// State to draw; only changes in `merge`
    pub fn render(&self) -> &SimulationState {
        &self.render
    }

    pub fn working(&self) -> &SimulationState {
        &self.working
    }

    pub fn working_mut(&mut self) -> &mut SimulationState {
        &mut self.working
    }

    pub fn snapshot(&self) -> Option<&NetworkSnapshot> {
        self.snapshot.as_ref()
    }

    /// State that decides score, effects and phase: the snapshot once one exists
    pub fn authoritative(&self) -> &SimulationState {
        self.snapshot
            .as_ref()
            .map(|s| &s.state)
            .unwrap_or(&self.working)
    }

    pub fn is_local_frozen(&self, now_ms: u64) -> bool {
        self.local_side()
            .is_some_and(|side| self.authoritative().is_frozen(side, now_ms))
    }

    /// Stage one decoded message. Never touches the render state.
    pub fn apply_message(&mut self, message: ServerMessage, received_at: Instant, now_ms: u64) {
        self.staged_at = received_at;
        self.staged_ms = now_ms;
        dispatch(message, self);
    }

    fn snapshot_mut(&mut self) -> &mut NetworkSnapshot {
        let (physics, sync, now) = (&self.physics, &self.sync, self.staged_at);
        self.snapshot
            .get_or_insert_with(|| NetworkSnapshot::new(SimulationState::new(physics, sync), now))
    }

    fn patch(&mut self, payload: &StatePayload) {
        let (now, now_ms, pause) = (self.staged_at, self.staged_ms, self.sync.serve_pause_ms);
        let physics = self.physics.clone();
        self.snapshot_mut().patch(payload, &physics, now, now_ms, pause);
    }

    /// Build this frame's render state. Exactly one call per frame, before drawing.
    pub fn merge(&mut self, timing: &FrameTiming) -> Vec<SyncEvent> {
        let local = self.local_side();
        let now_ms = timing.wall_ms;

        let Some(snapshot) = self.snapshot.as_ref() else {
            // No server data: the working state is the whole truth
            let mut next = self.working.clone();
            next.trails = mem::replace(&mut self.render.trails, Trails::new(&self.sync));
            next.trails.record(&next.ball, &next.paddles, timing.now);
            let events = diff_events(&self.render, &next);
            self.render = next;
            log_events(&events);
            return events;
        };

        let mut next = snapshot.state.clone();
        next.ball = self.prediction.ball(snapshot, timing.now, now_ms);

        for side in Side::ALL {
            if Some(side) == local {
                continue;
            }
            let position = self
                .prediction
                .paddle(side, snapshot, timing.now, now_ms, timing);
            next.paddles[side].set_position(side, position);
        }

        if let Some(side) = local {
            let remote = &snapshot.state.paddles[side];
            let own = &mut self.working.paddles[side];
            own.width = remote.width;
            own.height = remote.height;
            let max = own.max_position(side, &next.field);
            let clamped = own.position(side).clamp(0.0, max);
            own.set_position(side, clamped);
            next.paddles[side] = own.clone();
        }

        let revision = snapshot.revision;
        next.trails = mem::replace(&mut self.render.trails, Trails::new(&self.sync));
        next.trails.record(&next.ball, &next.paddles, timing.now);

        let events = if self.merged_revision != Some(revision) {
            diff_events(&self.render, &next)
        } else {
            Vec::new()
        };
        self.merged_revision = Some(revision);
        self.render = next;
        log_events(&events);
        events
    }
}

impl InboundHandler for ReconciliationStore {
    fn on_room_joined(&mut self, msg: RoomJoined) {
        info!(role = ?msg.role, players = msg.player_count, "joined room");
        self.session.role = Some(msg.role);
        self.session.player_count = msg.player_count;

        if let Some(payload) = &msg.snapshot {
            self.patch(payload);
        }
        let snapshot = self.snapshot_mut();
        snapshot.state.phase = GamePhase::Playing;
        snapshot.revision += 1;

        self.peer_sequences = [None; 4];
        self.prediction.reset();
        self.reseed_local();
    }

    fn on_peer_joined(&mut self, msg: PeerChange) {
        info!(role = ?msg.role, players = msg.player_count, "peer joined");
        self.peer_changed(&msg);
    }

    fn on_peer_left(&mut self, msg: PeerChange) {
        info!(
            role = ?msg.role,
            players = msg.player_count,
            replacement = ?msg.replacement_type,
            "peer left"
        );
        self.peer_changed(&msg);
    }

    fn on_role_switched(&mut self, msg: RoleSwitched) {
        info!(from = ?self.session.role, to = ?msg.role, "role switched");
        if let Some(old) = self.local_side() {
            self.prediction.forget(old);
        }
        self.session.role = Some(msg.role);
        if let Some(new) = msg.role.side() {
            self.peer_sequences[new.index()] = None;
        }
        self.reseed_local();
    }

    fn on_paddle_updated(&mut self, msg: PaddleUpdated) {
        let side = msg.side;
        if Some(side) == self.local_side() {
            trace!(side = side.name(), "ignoring update for own paddle");
            return;
        }

        if let Some(seq) = msg.seq {
            let last = &mut self.peer_sequences[side.index()];
            if last.is_some_and(|applied| seq <= applied) {
                trace!(side = side.name(), seq, last = ?last, "dropping stale paddle update");
                return;
            }
            *last = Some(seq);
        }

        let now = self.staged_at;
        let snapshot = self.snapshot_mut();
        let paddle = &mut snapshot.state.paddles[side];
        if let Some(position) = msg.position().filter(|p| p.is_finite()) {
            paddle.set_position(side, position);
        }
        if msg.velocity.is_finite() {
            paddle.velocity = msg.velocity;
        }
        if msg.target.is_some() {
            paddle.target = msg.target;
        }
        snapshot.paddle_received_at[side.index()] = now;
        snapshot.revision += 1;
    }

    fn on_full_state(&mut self, payload: StatePayload) {
        debug!("full state received");
        self.patch(&payload);
    }

    fn on_delta_state(&mut self, payload: StatePayload) {
        self.patch(&payload);
    }

    fn on_reset(&mut self, payload: StatePayload) {
        info!("game reset");
        // Score survives a reset, transient entities do not
        let gameplay = StatePayload {
            ball: payload.ball,
            paddles: payload.paddles,
            is_playing: payload.is_playing,
            is_paused: payload.is_paused,
            pause_end_time: payload.pause_end_time,
            game_ended: payload.game_ended,
            winner: payload.winner,
            ..Default::default()
        };
        self.patch(&gameplay);
        self.snapshot_mut().state.clear_transient();
        self.prediction.reset();
    }
}

impl ReconciliationStore {
    // Start the owned paddle from the server's copy, before the next input sample
    fn reseed_local(&mut self) {
        let Some(side) = self.local_side() else {
            return;
        };
        let Some(snapshot) = self.snapshot.as_ref() else {
            return;
        };
        let own = &mut self.working.paddles[side];
        *own = snapshot.state.paddles[side].clone();
        own.velocity = 0.0;
    }

    fn peer_changed(&mut self, msg: &PeerChange) {
        self.session.player_count = msg.player_count;

        let Some(side) = msg.role.and_then(|r| r.side()) else {
            return;
        };
        self.peer_sequences[side.index()] = None;
        self.prediction.forget(side);

        // A new line-up starts a fresh game after the serve pause
        let until_ms = self.staged_ms + self.sync.serve_pause_ms;
        let snapshot = self.snapshot_mut();
        snapshot.state.score.reset();
        snapshot.state.pause_for_serve(until_ms);
        snapshot.revision += 1;
    }
}

/// Cues implied by the change from `prev` to `next`
pub fn diff_events(prev: &SimulationState, next: &SimulationState) -> Vec<SyncEvent> {
    let mut events = Vec::new();

    for side in Side::ALL {
        if next.score[side] > prev.score[side] {
            events.push(SyncEvent::Scored { side });
        }
    }

    let (a, b) = (&prev.ball, &next.ball);
    if a.vx * b.vx < 0.0 || a.vy * b.vy < 0.0 {
        events.push(SyncEvent::BallBounced);
    }

    for effect in &next.effects {
        let known = prev
            .effects
            .iter()
            .any(|e| e.kind == effect.kind && e.start_ms == effect.start_ms);
        if !known {
            events.push(SyncEvent::EffectStarted {
                kind: effect.kind.clone(),
            });
        }
    }

    if mem::discriminant(&prev.phase) != mem::discriminant(&next.phase) {
        events.push(SyncEvent::PhaseChanged {
            from: prev.phase,
            to: next.phase,
        });
    }

    events
}

fn log_events(events: &[SyncEvent]) {
    for event in events {
        debug!(?event, "sync event");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::state::Role;
    use crate::network::router::decode;

    const NOMINAL: Duration = Duration::from_micros(16_667);

    fn store() -> ReconciliationStore {
        ReconciliationStore::new(
            Session::new("p-test", "main"),
            PhysicsConfig::default(),
            SyncConfig::default(),
            NOMINAL,
        )
    }

    fn timing(frame: u64, now: Instant) -> FrameTiming {
        FrameTiming {
            frame,
            now,
            delta: NOMINAL,
            multiplier: 1.0,
            wall_ms: 0,
        }
    }

    fn apply(store: &mut ReconciliationStore, raw: &str, now: Instant) {
        let message = decode(raw).unwrap();
        store.apply_message(message, now, 0);
    }

    #[test]
    fn test_room_joined_assigns_role_and_starts_play() {
        let now = Instant::now();
        let mut store = store();

        apply(
            &mut store,
            r#"{"kind":"room-joined","data":{"role":"left","playerCount":2}}"#,
            now,
        );
        store.merge(&timing(1, now));

        assert_eq!(store.session().role, Some(Role::Left));
        assert_eq!(store.session().player_count, 2);
        assert_eq!(store.local_side(), Some(Side::Left));
        assert_eq!(store.render().phase, GamePhase::Playing);
    }

    #[test]
    fn test_local_paddle_keeps_local_position_but_takes_dimensions() {
        let now = Instant::now();
        let mut store = store();
        apply(&mut store, r#"{"kind":"rj","data":{"r":"left","pc":2}}"#, now);
        store.merge(&timing(1, now));

        store.working_mut().paddles[Side::Left].y = 100.0;
        store.working_mut().paddles[Side::Left].velocity = 4.0;
        apply(
            &mut store,
            r#"{"kind":"delta-state","data":{"paddles":{"left":{"y":500.0,"velocity":-2.0,"height":80.0}}}}"#,
            now,
        );
        store.merge(&timing(2, now));

        let left = &store.render().paddles[Side::Left];
        assert_eq!(left.y, 100.0);
        assert_eq!(left.velocity, 4.0);
        assert_eq!(left.height, 80.0);
        assert_eq!(store.working().paddles[Side::Left].height, 80.0);
    }

    #[test]
    fn test_own_paddle_update_ignored() {
        let now = Instant::now();
        let mut store = store();
        apply(&mut store, r#"{"kind":"rj","data":{"r":"top","pc":2}}"#, now);
        store.merge(&timing(1, now));
        store.working_mut().paddles[Side::Top].x = 200.0;

        apply(
            &mut store,
            r#"{"kind":"paddle-updated","data":{"side":"top","x":600.0,"velocity":0}}"#,
            now,
        );
        store.merge(&timing(2, now));

        assert_eq!(store.render().paddles[Side::Top].x, 200.0);
    }

    #[test]
    fn test_stale_peer_update_discarded() {
        let now = Instant::now();
        let mut store = store();
        apply(&mut store, r#"{"kind":"rj","data":{"r":"left","pc":2}}"#, now);

        apply(
            &mut store,
            r#"{"kind":"paddle-updated","data":{"side":"right","y":120.0,"velocity":0,"seq":5}}"#,
            now,
        );
        apply(
            &mut store,
            r#"{"kind":"paddle-updated","data":{"side":"right","y":100.0,"velocity":0,"seq":3}}"#,
            now,
        );
        store.merge(&timing(1, now));

        let snapshot = store.snapshot().unwrap();
        assert_eq!(snapshot.state.paddles[Side::Right].y, 120.0);
        assert_eq!(store.render().paddles[Side::Right].y, 120.0);
    }

    #[test]
    fn test_peer_updates_out_of_order_keep_highest() {
        let now = Instant::now();
        let mut store = store();
        apply(&mut store, r#"{"kind":"rj","data":{"r":"left","pc":3}}"#, now);

        for (seq, y) in [(2, 200.0), (4, 400.0), (1, 100.0), (3, 300.0), (4, 450.0)] {
            let raw = format!(
                r#"{{"kind":"pu","data":{{"s":"b","x":{},"v":0,"q":{}}}}}"#,
                y, seq
            );
            apply(&mut store, &raw, now);
        }

        assert_eq!(store.snapshot().unwrap().state.paddles[Side::Bottom].x, 400.0);
    }

    #[test]
    fn test_repeated_snapshot_is_idempotent() {
        let now = Instant::now();
        let mut store = store();
        let raw = r#"{"kind":"full-state","data":{"ball":{"x":300.0,"y":300.0,"vx":0,"vy":0},"score":{"left":1},"isPlaying":true}}"#;

        apply(&mut store, raw, now);
        let first = store.merge(&timing(1, now));
        let render = store.render().clone();

        apply(&mut store, raw, now);
        let second = store.merge(&timing(2, now));

        assert!(first.contains(&SyncEvent::Scored { side: Side::Left }));
        assert!(second.is_empty());
        assert_eq!(store.render().ball, render.ball);
        assert_eq!(store.render().paddles, render.paddles);
        assert_eq!(store.render().score, render.score);

        // No new data at all: still nothing fires
        assert!(store.merge(&timing(3, now)).is_empty());
    }

    #[test]
    fn test_effect_and_bounce_cues() {
        let now = Instant::now();
        let mut store = store();
        apply(
            &mut store,
            r#"{"kind":"fs","data":{"b":{"x":400,"y":400,"dx":3,"dy":1},"ip":true}}"#,
            now,
        );
        store.merge(&timing(1, now));

        apply(
            &mut store,
            r#"{"kind":"ds","data":{"b":{"dx":-3},"fx":[{"kind":"freeze","st":0,"d":5000,"s":"left"}]}}"#,
            now,
        );
        let events = store.merge(&timing(2, now));

        assert!(events.contains(&SyncEvent::BallBounced));
        assert!(events.contains(&SyncEvent::EffectStarted {
            kind: "freeze".to_string()
        }));
    }

    #[test]
    fn test_unbounded_effect_duration_freezes_without_panicking() {
        let now = Instant::now();
        let mut store = store();
        apply(&mut store, r#"{"kind":"rj","data":{"r":"left","pc":2}}"#, now);
        apply(
            &mut store,
            r#"{"kind":"ds","data":{"fx":[{"kind":"freeze","st":1700000000000,"d":18446744073709551615}]}}"#,
            now,
        );

        assert!(store.is_local_frozen(1_700_000_000_500));
        assert!(!store.is_local_frozen(1_699_999_999_000));
        store.merge(&timing(1, now));
    }

    #[test]
    fn test_peer_change_resets_score_and_pauses() {
        let now = Instant::now();
        let mut store = store();
        apply(
            &mut store,
            r#"{"kind":"fs","data":{"score":{"left":3,"right":2},"ip":true}}"#,
            now,
        );
        store.apply_message(
            decode(r#"{"kind":"peer-joined","data":{"playerCount":3,"role":"top"}}"#).unwrap(),
            now,
            10_000,
        );
        store.merge(&timing(1, now));

        let state = store.render();
        assert_eq!(store.session().player_count, 3);
        assert_eq!(state.score[Side::Left], 0);
        assert_eq!(state.phase, GamePhase::Paused { until_ms: 13_000 });
    }

    #[test]
    fn test_spectator_change_keeps_score() {
        let now = Instant::now();
        let mut store = store();
        apply(&mut store, r#"{"kind":"fs","data":{"score":{"left":3}}}"#, now);
        apply(
            &mut store,
            r#"{"kind":"peer-left","data":{"playerCount":2,"role":"spectator"}}"#,
            now,
        );

        assert_eq!(store.snapshot().unwrap().state.score[Side::Left], 3);
        assert_eq!(store.session().player_count, 2);
    }

    #[test]
    fn test_reset_keeps_score_and_role() {
        let now = Instant::now();
        let mut store = store();
        apply(&mut store, r#"{"kind":"rj","data":{"r":"right","pc":2}}"#, now);
        apply(
            &mut store,
            r#"{"kind":"fs","data":{"sc":{"r":4},"c":[{"x":1,"y":2}],"pk":[{"kind":"grow","x":5,"y":5}]}}"#,
            now,
        );
        apply(
            &mut store,
            r#"{"kind":"reset","data":{"ball":{"x":400,"y":400,"vx":0,"vy":0},"score":{"right":0}}}"#,
            now,
        );

        let state = &store.snapshot().unwrap().state;
        assert_eq!(state.score[Side::Right], 4);
        assert!(state.coins.is_empty());
        assert!(state.pickups.is_empty());
        assert_eq!(store.session().role, Some(Role::Right));
    }

    #[test]
    fn test_role_switch_reseeds_local_paddle() {
        let now = Instant::now();
        let mut store = store();
        apply(&mut store, r#"{"kind":"rj","data":{"r":"left","pc":2}}"#, now);
        apply(
            &mut store,
            r#"{"kind":"ds","data":{"p":{"b":{"x":123.0}}}}"#,
            now,
        );
        apply(&mut store, r#"{"kind":"role-switched","data":{"role":"bottom"}}"#, now);

        // Seeded as soon as the switch is handled, ahead of any merge
        assert_eq!(store.local_side(), Some(Side::Bottom));
        assert_eq!(store.working().paddles[Side::Bottom].x, 123.0);

        store.merge(&timing(1, now));
        assert_eq!(store.render().paddles[Side::Bottom].x, 123.0);
    }

    #[test]
    fn test_offline_merge_copies_working_state() {
        let now = Instant::now();
        let mut store = ReconciliationStore::new(
            Session::offline(Side::Left),
            PhysicsConfig::default(),
            SyncConfig::default(),
            NOMINAL,
        );
        store.working_mut().ball.x = 250.0;
        store.working_mut().score[Side::Top] = 1;

        let events = store.merge(&timing(1, now));

        assert_eq!(store.render().ball.x, 250.0);
        assert_eq!(events, vec![SyncEvent::Scored { side: Side::Top }]);
        assert_eq!(store.render().trails.ball.len(), 1);
    }

    #[test]
    fn test_trails_accumulate_across_merges() {
        let start = Instant::now();
        let mut store = store();
        apply(&mut store, r#"{"kind":"fs","data":{"b":{"x":100,"y":100}}}"#, start);

        store.merge(&timing(1, start));
        store.merge(&timing(2, start + Duration::from_millis(16)));
        store.merge(&timing(3, start + Duration::from_millis(1_000)));

        // Ball trail retains 750ms, so only the latest point survives the gap
        assert_eq!(store.render().trails.ball.len(), 1);
        assert_eq!(store.render().trails.paddle(Side::Left).len(), 1);
    }
}
