// Terminal input for Pong404
// Reads crossterm key and mouse events and keeps track of which directions are held

use std::io;
use std::time::{Duration, Instant};

use crossterm::event::{
    self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers, MouseEvent, MouseEventKind,
};
use ratatui::layout::Rect;

use super::sampler::ControlIntent;
use super::state::Field;
use crate::config::KeyBindings;

/// Most terminals never report key release, so a held key is one that was
/// pressed or auto-repeated within this window
const HOLD_WINDOW: Duration = Duration::from_millis(180);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InputAction {
    Quit,
    Reconnect,
}

/// Where the playfield sits on screen, for mapping mouse cells to field units
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FieldViewport {
    pub area: Rect,
    pub field: Field,
}

impl FieldViewport {
    /// Field coordinates of the center of a terminal cell, if the cell is on the field
    pub fn to_field(&self, column: u16, row: u16) -> Option<(f32, f32)> {
        let area = self.area;
        if area.width == 0 || area.height == 0 {
            return None;
        }
        if column < area.x || column >= area.x + area.width {
            return None;
        }
        if row < area.y || row >= area.y + area.height {
            return None;
        }

        let fx = (column - area.x) as f32 + 0.5;
        let fy = (row - area.y) as f32 + 0.5;
        Some((
            fx / area.width as f32 * self.field.width,
            fy / area.height as f32 * self.field.height,
        ))
    }
}

/// Parse a binding name like "W", "Up" or "Space"
pub fn parse_key(name: &str) -> Option<KeyCode> {
    let code = match name.to_ascii_lowercase().as_str() {
        "up" => KeyCode::Up,
        "down" => KeyCode::Down,
        "left" => KeyCode::Left,
        "right" => KeyCode::Right,
        "space" => KeyCode::Char(' '),
        "enter" => KeyCode::Enter,
        "esc" | "escape" => KeyCode::Esc,
        "tab" => KeyCode::Tab,
        other => {
            let mut chars = other.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => KeyCode::Char(c),
                _ => return None,
            }
        }
    };
    Some(code)
}

fn normalize(code: KeyCode) -> KeyCode {
    match code {
        KeyCode::Char(c) => KeyCode::Char(c.to_ascii_lowercase()),
        other => other,
    }
}

fn parse_all(names: &[&str]) -> Vec<KeyCode> {
    names.iter().filter_map(|n| parse_key(n)).collect()
}

pub struct InputState {
    negative_keys: Vec<KeyCode>,
    positive_keys: Vec<KeyCode>,
    quit_keys: Vec<KeyCode>,
    reconnect_keys: Vec<KeyCode>,

    negative_until: Option<Instant>,
    positive_until: Option<Instant>,
    pointer: Option<(f32, f32)>,
}

impl InputState {
    pub fn new(bindings: &KeyBindings) -> Self {
        // Arrow keys along the horizontal axis always work, for top and bottom seats
        let mut negative_keys = parse_all(&[
            bindings.paddle_negative.as_str(),
            bindings.paddle_negative_alt.as_str(),
        ]);
        negative_keys.push(KeyCode::Left);
        let mut positive_keys = parse_all(&[
            bindings.paddle_positive.as_str(),
            bindings.paddle_positive_alt.as_str(),
        ]);
        positive_keys.push(KeyCode::Right);

        let mut quit_keys = parse_all(&[bindings.quit.as_str()]);
        quit_keys.push(KeyCode::Esc);

        Self {
            negative_keys,
            positive_keys,
            quit_keys,
            reconnect_keys: parse_all(&[bindings.reconnect.as_str()]),
            negative_until: None,
            positive_until: None,
            pointer: None,
        }
    }

    /// Drain every pending terminal event without blocking
    pub fn poll(
        &mut self,
        viewport: Option<&FieldViewport>,
        now: Instant,
    ) -> io::Result<Vec<InputAction>> {
        let mut actions = Vec::new();
        while event::poll(Duration::from_millis(0))? {
            let event = event::read()?;
            if let Some(action) = self.handle_event(&event, viewport, now) {
                actions.push(action);
            }
        }
        Ok(actions)
    }

    pub fn handle_event(
        &mut self,
        event: &Event,
        viewport: Option<&FieldViewport>,
        now: Instant,
    ) -> Option<InputAction> {
        match event {
            Event::Key(key) => self.handle_key(key, now),
            Event::Mouse(mouse) => {
                self.handle_mouse(mouse, viewport);
                None
            }
            Event::FocusLost => {
                self.release_all();
                None
            }
            _ => None,
        }
    }

    fn handle_key(&mut self, key: &KeyEvent, now: Instant) -> Option<InputAction> {
        let code = normalize(key.code);

        if key.kind == KeyEventKind::Release {
            if self.negative_keys.contains(&code) {
                self.negative_until = None;
            }
            if self.positive_keys.contains(&code) {
                self.positive_until = None;
            }
            return None;
        }

        if key.modifiers.contains(KeyModifiers::CONTROL) && code == KeyCode::Char('c') {
            return Some(InputAction::Quit);
        }

        if self.negative_keys.contains(&code) {
            // Keyboard takes over from a parked mouse
            self.pointer = None;
            self.negative_until = Some(now + HOLD_WINDOW);
            self.positive_until = None;
            return None;
        }
        if self.positive_keys.contains(&code) {
            self.pointer = None;
            self.positive_until = Some(now + HOLD_WINDOW);
            self.negative_until = None;
            return None;
        }

        if key.kind != KeyEventKind::Press {
            return None;
        }
        if self.quit_keys.contains(&code) {
            return Some(InputAction::Quit);
        }
        if self.reconnect_keys.contains(&code) {
            return Some(InputAction::Reconnect);
        }
        None
    }

    fn handle_mouse(&mut self, mouse: &MouseEvent, viewport: Option<&FieldViewport>) {
        match mouse.kind {
            MouseEventKind::Moved | MouseEventKind::Drag(_) | MouseEventKind::Down(_) => {
                self.pointer = viewport.and_then(|v| v.to_field(mouse.column, mouse.row));
            }
            _ => {}
        }
    }

    fn release_all(&mut self) {
        self.negative_until = None;
        self.positive_until = None;
        self.pointer = None;
    }

    /// Signals held at `now`
    pub fn intent(&self, now: Instant) -> ControlIntent {
        ControlIntent {
            negative: self.negative_until.is_some_and(|until| now < until),
            positive: self.positive_until.is_some_and(|until| now < until),
            pointer: self.pointer,
        }
    }
}
