use std::collections::HashMap;

use crate::games_dataset::GameMeta;

/// Result of a team's next game. `Unknown` marks the last game a team has in
/// the dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Outcome {
    Lost,
    Won,
    Unknown,
}

impl Outcome {
    pub fn from_won(won: bool) -> Self {
        if won { Outcome::Won } else { Outcome::Lost }
    }

    /// Integer code used in the persisted label space (0, 1, 2).
    pub fn code(self) -> u8 {
        match self {
            Outcome::Lost => 0,
            Outcome::Won => 1,
            Outcome::Unknown => 2,
        }
    }

    pub fn is_known(self) -> bool {
        self != Outcome::Unknown
    }
}

/// Next-game outcome per row. `games` must already be in chronological order;
/// each team only looks at its own later rows.
pub fn next_game_targets(games: &[GameMeta]) -> Vec<Outcome> {
    let mut targets = vec![Outcome::Unknown; games.len()];
    let mut last_seen: HashMap<&str, usize> = HashMap::new();
    for (idx, game) in games.iter().enumerate() {
        if let Some(prev) = last_seen.insert(game.team.as_str(), idx) {
            targets[prev] = Outcome::from_won(game.won);
        }
    }
    targets
}
