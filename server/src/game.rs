//! Authoritative round and score bookkeeping for the single game room
//!
//! `GameState` holds the roster of connected players together with the
//! round counter and the active flag. It performs no I/O; the coordinator
//! drives it and turns its transitions into broadcast events.
//!
//! Once a game is started `current_round` runs from 1 up to
//! `total_rounds + 1`, and the game is over exactly when it passes
//! `total_rounds`.

use log::info;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use shared::{Player, MIN_PLAYERS, ROUND_DURATION_SECS, TOTAL_ROUNDS};
use std::collections::BTreeMap;
use std::time::Duration;

/// Tunable game rules
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameConfig {
    /// Players required before a game may start
    pub min_players: usize,
    /// Rounds played per game
    pub total_rounds: u32,
    /// How long each round spins before a winner is drawn
    pub round_duration: Duration,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            min_players: MIN_PLAYERS,
            total_rounds: TOTAL_ROUNDS,
            round_duration: Duration::from_secs(ROUND_DURATION_SECS),
        }
    }
}

/// Result of resolving a single round
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundOutcome {
    pub winner: Player,
    pub standings: Vec<Player>,
}

/// Final standings of a finished game
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameResult {
    pub standings: Vec<Player>,
    pub winners: Vec<Player>,
}

#[derive(Debug, Clone)]
pub struct GameState<R = StdRng> {
    players: BTreeMap<u32, Player>,
    current_round: u32,
    active: bool,
    config: GameConfig,
    rng: R,
}

impl GameState<StdRng> {
    pub fn new(config: GameConfig) -> Self {
        Self::with_rng(config, StdRng::from_entropy())
    }

    /// Creates a state whose winner draws are reproducible.
    pub fn seeded(config: GameConfig, seed: u64) -> Self {
        Self::with_rng(config, StdRng::seed_from_u64(seed))
    }
}

impl<R: Rng> GameState<R> {
    pub fn with_rng(config: GameConfig, rng: R) -> Self {
        Self {
            players: BTreeMap::new(),
            current_round: 0,
            active: false,
            config,
            rng,
        }
    }

    /// Inserts a player with a zero score, replacing any entry with the same id.
    pub fn add_player(&mut self, id: u32, name: impl Into<String>) -> u32 {
        let player = Player::new(id, name);
        info!("Added player {} ({})", id, player.name);
        self.players.insert(id, player);
        id
    }

    pub fn remove_player(&mut self, id: &u32) -> Option<Player> {
        let removed = self.players.remove(id);
        if let Some(player) = &removed {
            info!("Removed player {} ({})", id, player.name);
        }
        removed
    }

    pub fn get_player(&self, id: &u32) -> Option<&Player> {
        self.players.get(id)
    }

    pub fn list_players(&self) -> Vec<Player> {
        self.players.values().cloned().collect()
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn can_start(&self) -> bool {
        self.players.len() >= self.config.min_players && !self.active
    }

    pub fn start(&mut self) {
        debug_assert!(self.can_start(), "start() called while not eligible");
        self.active = true;
        self.current_round = 1;
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn current_round(&self) -> u32 {
        self.current_round
    }

    pub fn total_rounds(&self) -> u32 {
        self.config.total_rounds
    }

    pub fn min_players(&self) -> usize {
        self.config.min_players
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    /// Draws a uniformly random winner, awards one point and advances the round.
    ///
    /// Returns `None` without touching any state when nobody is connected.
    pub fn resolve_round(&mut self) -> Option<RoundOutcome> {
        if self.players.is_empty() {
            return None;
        }

        let index = self.rng.gen_range(0..self.players.len());
        let winner = self.players.values_mut().nth(index)?;
        winner.score += 1;
        let winner = winner.clone();

        self.current_round += 1;

        Some(RoundOutcome {
            winner,
            standings: self.list_players(),
        })
    }

    pub fn is_game_over(&self) -> bool {
        self.current_round > self.config.total_rounds
    }

    /// Collects every player tied at the top score and ends the game.
    ///
    /// Returns `None` without touching any state when nobody is connected.
    pub fn finalize(&mut self) -> Option<GameResult> {
        let max_score = self.players.values().map(|p| p.score).max()?;

        let standings = self.list_players();
        let winners = standings
            .iter()
            .filter(|p| p.score == max_score)
            .cloned()
            .collect();

        self.active = false;
        self.current_round = 0;

        Some(GameResult { standings, winners })
    }

    /// Zeroes every score and returns to the not-started state. Players stay.
    pub fn reset(&mut self) {
        for player in self.players.values_mut() {
            player.score = 0;
        }
        self.current_round = 0;
        self.active = false;
    }
}
