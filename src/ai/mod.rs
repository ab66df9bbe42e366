// AI module for the paddles nobody owns in offline play

mod bot;
mod prediction;

pub use bot::{steer, Bot, TrackingBot, TrackingBotConfig};
pub use prediction::{paddle_plane, predict_intercept};

use crate::game::Side;

/// One casual bot for every side except `owned`
pub fn bots_for(owned: Option<Side>) -> Vec<(Side, Box<dyn Bot>)> {
    Side::ALL
        .into_iter()
        .filter(|side| Some(*side) != owned)
        .map(|side| (side, Box::new(TrackingBot::casual()) as Box<dyn Bot>))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bots_fill_unowned_seats() {
        let bots = bots_for(Some(Side::Top));
        let sides: Vec<Side> = bots.iter().map(|(side, _)| *side).collect();

        assert_eq!(sides, vec![Side::Left, Side::Right, Side::Bottom]);
        assert_eq!(bots[0].1.name(), "Casual");
        assert_eq!(bots_for(None).len(), 4);
    }
}
