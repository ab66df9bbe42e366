//! Common utilities shared by the online and offline game modes

use std::time::Instant;

use crate::config::KeyBindings;
use crate::game::clock::SimulationClock;

/// Sleep out whatever is left of the current frame.
///
/// Called at the end of each loop iteration with the `Instant` the frame began,
/// so both modes run at the clock's nominal cadence.
pub fn limit_frame_rate(clock: &SimulationClock, frame_start: Instant) {
    let remaining = clock.remaining(frame_start, Instant::now());
    if !remaining.is_zero() {
        std::thread::sleep(remaining);
    }
}

/// Short controls hint for the status bar
pub fn controls_hint(bindings: &KeyBindings, extra: Option<(&str, &str)>) -> String {
    let mut hint = format!(
        "{}/{}: Move  {}: Quit",
        bindings.paddle_negative, bindings.paddle_positive, bindings.quit
    );
    if let Some((key, label)) = extra {
        hint.push_str(&format!("  {}: {}", key, label));
    }
    hint
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_controls_hint_uses_bindings() {
        let bindings = KeyBindings::default();

        assert_eq!(controls_hint(&bindings, None), "W/S: Move  Q: Quit");
        assert_eq!(
            controls_hint(&bindings, Some(("R", "Reconnect"))),
            "W/S: Move  Q: Quit  R: Reconnect"
        );
    }

    #[test]
    fn test_limit_frame_rate_returns_when_frame_overran() {
        let clock = SimulationClock::new(60, 2.0);
        let start = Instant::now() - std::time::Duration::from_millis(100);

        let before = Instant::now();
        limit_frame_rate(&clock, start);
        assert!(before.elapsed() < std::time::Duration::from_millis(10));
    }
}
