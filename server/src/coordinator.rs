//! Round lifecycle state machine for the game room
//!
//! The coordinator owns the `GameState` and is the only place it is mutated.
//! It validates client commands, runs the round timer and turns every state
//! transition into a `GameEvent` handed to a `Broadcaster`.
//!
//! Round timers are spawned tasks that sleep for the round duration and then
//! post a `RoundElapsed` message back to the coordinator. Each timer carries
//! the generation it was armed under; restarts and game-over bump the
//! generation so a timer from an earlier game is discarded on arrival.

use crate::game::GameState;
use log::{debug, error, info, warn};
use rand::rngs::StdRng;
use rand::Rng;
use shared::{
    display_name, ClientCommand, CommandAck, GameEvent, Player, GAME_IN_PROGRESS,
    NOT_ENOUGH_PLAYERS, WAITING_FOR_PLAYERS,
};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::sleep;

/// Delivery of lifecycle events to every connected client
pub trait Broadcaster {
    fn emit(&self, event: GameEvent);
}

impl Broadcaster for mpsc::UnboundedSender<GameEvent> {
    fn emit(&self, event: GameEvent) {
        if let Err(e) = self.send(event) {
            error!("Failed to queue {} event: receiver dropped", e.0.name());
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    RoundInProgress,
    GameOver,
}

/// Posted by a round timer once its round has run its course
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundElapsed {
    pub generation: u64,
}

pub struct RoundCoordinator<B, R = StdRng> {
    state: GameState<R>,
    broadcaster: B,
    phase: Phase,
    generation: u64,
    pending_timer: Option<JoinHandle<()>>,
    timer_tx: mpsc::UnboundedSender<RoundElapsed>,
    timer_rx: mpsc::UnboundedReceiver<RoundElapsed>,
}

impl<B: Broadcaster, R: Rng> RoundCoordinator<B, R> {
    pub fn new(state: GameState<R>, broadcaster: B) -> Self {
        let (timer_tx, timer_rx) = mpsc::unbounded_channel();

        Self {
            state,
            broadcaster,
            phase: Phase::Idle,
            generation: 0,
            pending_timer: None,
            timer_tx,
            timer_rx,
        }
    }

    pub fn state(&self) -> &GameState<R> {
        &self.state
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Registers a new connection and announces it to the room.
    pub fn player_connected(&mut self, id: u32, name: Option<&str>) -> u32 {
        let name = display_name(id, name);
        self.state.add_player(id, name.clone());

        self.broadcast_player_update();
        self.broadcaster.emit(GameEvent::PlayerJoined { name });
        id
    }

    /// Drops a connection from the roster. A pending round timer keeps running.
    pub fn player_disconnected(&mut self, id: u32) -> Option<Player> {
        let removed = self.state.remove_player(&id);

        self.broadcast_player_update();
        if let Some(player) = &removed {
            self.broadcaster.emit(GameEvent::PlayerLeft {
                name: player.name.clone(),
            });
        }
        removed
    }

    pub fn handle_command(&mut self, command: ClientCommand) -> CommandAck {
        match command {
            ClientCommand::StartGame => self.start_game(),
            ClientCommand::RestartGame => self.restart_game(),
        }
    }

    pub fn start_game(&mut self) -> CommandAck {
        if self.state.can_start() {
            self.begin_game();
            CommandAck::ok()
        } else if self.state.is_active() {
            CommandAck::rejected(GAME_IN_PROGRESS)
        } else {
            CommandAck::rejected(NOT_ENOUGH_PLAYERS)
        }
    }

    /// Resets the room and starts over if enough players are connected.
    pub fn restart_game(&mut self) -> CommandAck {
        self.cancel_round_timer();
        self.state.reset();
        self.phase = Phase::Idle;
        info!("Game reset");

        if self.state.can_start() {
            self.begin_game();
            CommandAck::ok()
        } else {
            self.broadcast_player_update();
            CommandAck::ok_with(WAITING_FOR_PLAYERS)
        }
    }

    /// Waits for the next round timer to fire.
    pub async fn next_round_elapsed(&mut self) -> Option<RoundElapsed> {
        self.timer_rx.recv().await
    }

    /// Resolves the current round, then either finishes the game or moves on.
    pub fn on_round_elapsed(&mut self, elapsed: RoundElapsed) {
        if elapsed.generation != self.generation || self.phase != Phase::RoundInProgress {
            debug!(
                "Discarding stale round timer (generation {}, current {})",
                elapsed.generation, self.generation
            );
            return;
        }
        self.pending_timer = None;

        let round = self.state.current_round();
        let Some(outcome) = self.state.resolve_round() else {
            // Nobody is left to receive an event, so the room just goes idle
            warn!("Round {} ended with nobody connected, abandoning game", round);
            self.cancel_round_timer();
            self.state.reset();
            self.phase = Phase::Idle;
            return;
        };

        info!(
            "Round {}/{} won by {} ({})",
            round,
            self.state.total_rounds(),
            outcome.winner.name,
            outcome.winner.id
        );
        self.broadcaster.emit(GameEvent::RoundResult {
            winner: outcome.winner,
            players: outcome.standings,
        });

        if self.state.is_game_over() {
            self.phase = Phase::GameOver;
            self.cancel_round_timer();

            if let Some(result) = self.state.finalize() {
                let names: Vec<&str> = result.winners.iter().map(|w| w.name.as_str()).collect();
                info!("Game over, winners: {}", names.join(", "));
                self.broadcaster.emit(GameEvent::GameOver {
                    players: result.standings,
                    winners: result.winners,
                });
            }
            self.phase = Phase::Idle;
        } else {
            self.begin_round();
        }
    }

    fn begin_game(&mut self) {
        self.state.start();
        info!(
            "Game started with {} players, {} rounds",
            self.state.player_count(),
            self.state.total_rounds()
        );

        self.broadcaster.emit(GameEvent::GameStart {
            total_rounds: self.state.total_rounds(),
        });
        self.begin_round();
    }

    fn begin_round(&mut self) {
        self.phase = Phase::RoundInProgress;
        self.broadcaster.emit(GameEvent::NewRound {
            round: self.state.current_round(),
            total_rounds: self.state.total_rounds(),
        });
        self.schedule_round_timer();
    }

    fn schedule_round_timer(&mut self) {
        let generation = self.generation;
        let duration = self.state.config().round_duration;
        let timer_tx = self.timer_tx.clone();

        debug!(
            "Round {} timer armed for {:?} (generation {})",
            self.state.current_round(),
            duration,
            generation
        );

        self.pending_timer = Some(tokio::spawn(async move {
            sleep(duration).await;
            let _ = timer_tx.send(RoundElapsed { generation });
        }));
    }

    fn cancel_round_timer(&mut self) {
        self.generation += 1;
        if let Some(timer) = self.pending_timer.take() {
            timer.abort();
        }
    }

    fn broadcast_player_update(&self) {
        self.broadcaster.emit(GameEvent::PlayerUpdate {
            players: self.state.list_players(),
        });
    }
}

impl<B, R> Drop for RoundCoordinator<B, R> {
    fn drop(&mut self) {
        if let Some(timer) = self.pending_timer.take() {
            timer.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::GameConfig;
    use std::time::Duration;
    use tokio::sync::mpsc::UnboundedReceiver;

    type TestCoordinator = RoundCoordinator<mpsc::UnboundedSender<GameEvent>>;

    fn create_coordinator(seed: u64) -> (TestCoordinator, UnboundedReceiver<GameEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let state = GameState::seeded(GameConfig::default(), seed);
        (RoundCoordinator::new(state, tx), rx)
    }

    fn connect_players(coordinator: &mut TestCoordinator, count: u32) {
        for id in 1..=count {
            let name = format!("P{}", id);
            coordinator.player_connected(id, Some(&name));
        }
    }

    fn drain(rx: &mut UnboundedReceiver<GameEvent>) -> Vec<GameEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    fn names(events: &[GameEvent]) -> Vec<&'static str> {
        events.iter().map(|e| e.name()).collect()
    }

    async fn run_round(coordinator: &mut TestCoordinator) {
        let elapsed = coordinator.next_round_elapsed().await.unwrap();
        coordinator.on_round_elapsed(elapsed);
    }

    #[test]
    fn test_connect_announces_player() {
        let (mut coordinator, mut rx) = create_coordinator(1);

        coordinator.player_connected(3, None);
        let events = drain(&mut rx);

        assert_eq!(names(&events), vec!["player_update", "player_joined"]);
        match &events[0] {
            GameEvent::PlayerUpdate { players } => {
                assert_eq!(players.len(), 1);
                assert_eq!(players[0].id, 3);
                assert_eq!(players[0].score, 0);
            }
            _ => panic!("Expected player_update"),
        }
        assert_eq!(
            events[1],
            GameEvent::PlayerJoined {
                name: "Player 3".to_string()
            }
        );
    }

    #[test]
    fn test_disconnect_announces_departure() {
        let (mut coordinator, mut rx) = create_coordinator(1);
        connect_players(&mut coordinator, 2);
        drain(&mut rx);

        let removed = coordinator.player_disconnected(1).unwrap();
        assert_eq!(removed.name, "P1");

        let events = drain(&mut rx);
        assert_eq!(names(&events), vec!["player_update", "player_left"]);
        assert_eq!(
            events[1],
            GameEvent::PlayerLeft {
                name: "P1".to_string()
            }
        );
    }

    #[test]
    fn test_disconnect_unknown_player_only_updates_roster() {
        let (mut coordinator, mut rx) = create_coordinator(1);
        connect_players(&mut coordinator, 1);
        drain(&mut rx);

        assert!(coordinator.player_disconnected(42).is_none());
        assert_eq!(names(&drain(&mut rx)), vec!["player_update"]);
    }

    #[test]
    fn test_start_rejected_with_too_few_players() {
        let (mut coordinator, mut rx) = create_coordinator(1);
        connect_players(&mut coordinator, 3);
        drain(&mut rx);

        let ack = coordinator.handle_command(ClientCommand::StartGame);

        assert_eq!(ack, CommandAck::rejected(NOT_ENOUGH_PLAYERS));
        assert_eq!(
            ack.message.as_deref(),
            Some("Not enough players to start the game")
        );
        assert_eq!(coordinator.phase(), Phase::Idle);
        assert!(!coordinator.state().is_active());
        assert!(drain(&mut rx).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_rejected_while_game_running() {
        let (mut coordinator, mut rx) = create_coordinator(1);
        connect_players(&mut coordinator, 4);

        assert!(coordinator.start_game().success);
        drain(&mut rx);

        let ack = coordinator.start_game();
        assert_eq!(ack, CommandAck::rejected(GAME_IN_PROGRESS));
        assert!(drain(&mut rx).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_game_event_order() {
        let (mut coordinator, mut rx) = create_coordinator(7);
        connect_players(&mut coordinator, 4);
        drain(&mut rx);

        let ack = coordinator.start_game();
        assert_eq!(ack, CommandAck::ok());
        assert_eq!(coordinator.phase(), Phase::RoundInProgress);

        for _ in 0..shared::TOTAL_ROUNDS {
            run_round(&mut coordinator).await;
        }

        let events = drain(&mut rx);
        assert_eq!(
            names(&events),
            vec![
                "game_start",
                "new_round",
                "round_result",
                "new_round",
                "round_result",
                "new_round",
                "round_result",
                "new_round",
                "round_result",
                "new_round",
                "round_result",
                "game_over",
            ]
        );

        assert_eq!(events[0], GameEvent::GameStart { total_rounds: 5 });
        let rounds: Vec<u32> = events
            .iter()
            .filter_map(|e| match e {
                GameEvent::NewRound {
                    round,
                    total_rounds,
                } => {
                    assert_eq!(*total_rounds, 5);
                    Some(*round)
                }
                _ => None,
            })
            .collect();
        assert_eq!(rounds, vec![1, 2, 3, 4, 5]);

        match events.last().unwrap() {
            GameEvent::GameOver { players, winners } => {
                let total: u32 = players.iter().map(|p| p.score).sum();
                assert_eq!(total, 5);

                let max = players.iter().map(|p| p.score).max().unwrap();
                let expected: Vec<&Player> = players.iter().filter(|p| p.score == max).collect();
                assert_eq!(winners.len(), expected.len());
                assert!(winners.iter().all(|w| w.score == max));
            }
            _ => panic!("Expected game_over"),
        }

        assert_eq!(coordinator.phase(), Phase::Idle);
        assert!(!coordinator.state().is_active());
        assert_eq!(coordinator.state().current_round(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_round_waits_for_round_duration() {
        let (mut coordinator, _rx) = create_coordinator(1);
        connect_players(&mut coordinator, 4);

        let started = tokio::time::Instant::now();
        coordinator.start_game();
        coordinator.next_round_elapsed().await.unwrap();

        assert!(started.elapsed() >= Duration::from_secs(shared::ROUND_DURATION_SECS));
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnect_mid_round_excludes_departed_player() {
        let (mut coordinator, mut rx) = create_coordinator(3);
        connect_players(&mut coordinator, 4);
        coordinator.start_game();
        drain(&mut rx);

        coordinator.player_disconnected(4);
        let events = drain(&mut rx);
        assert_eq!(names(&events), vec!["player_update", "player_left"]);
        assert_eq!(coordinator.phase(), Phase::RoundInProgress);

        run_round(&mut coordinator).await;

        let events = drain(&mut rx);
        assert_eq!(names(&events), vec!["round_result", "new_round"]);
        match &events[0] {
            GameEvent::RoundResult { winner, players } => {
                assert_ne!(winner.id, 4);
                assert_eq!(players.len(), 3);
                assert!(players.iter().all(|p| p.id != 4));
            }
            _ => panic!("Expected round_result"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_roster_abandons_game() {
        let (mut coordinator, mut rx) = create_coordinator(1);
        connect_players(&mut coordinator, 4);
        coordinator.start_game();

        for id in 1..=4 {
            coordinator.player_disconnected(id);
        }
        drain(&mut rx);

        run_round(&mut coordinator).await;

        assert!(drain(&mut rx).is_empty());
        assert_eq!(coordinator.phase(), Phase::Idle);
        assert!(!coordinator.state().is_active());
        assert_eq!(coordinator.state().current_round(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_discards_pending_timer() {
        let (mut coordinator, mut rx) = create_coordinator(5);
        connect_players(&mut coordinator, 4);
        coordinator.start_game();
        run_round(&mut coordinator).await;
        let stale_generation = coordinator.generation();

        let ack = coordinator.restart_game();
        assert_eq!(ack, CommandAck::ok());
        assert!(coordinator.generation() > stale_generation);

        let events = drain(&mut rx);
        let tail = &events[events.len() - 2..];
        assert_eq!(tail[0], GameEvent::GameStart { total_rounds: 5 });
        assert_eq!(
            tail[1],
            GameEvent::NewRound {
                round: 1,
                total_rounds: 5
            }
        );
        assert!(coordinator
            .state()
            .list_players()
            .iter()
            .all(|p| p.score == 0));

        coordinator.on_round_elapsed(RoundElapsed {
            generation: stale_generation,
        });
        assert!(drain(&mut rx).is_empty());
        assert_eq!(coordinator.state().current_round(), 1);

        run_round(&mut coordinator).await;
        let events = drain(&mut rx);
        assert_eq!(names(&events), vec!["round_result", "new_round"]);
        assert_eq!(coordinator.state().current_round(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_without_enough_players_waits() {
        let (mut coordinator, mut rx) = create_coordinator(1);
        connect_players(&mut coordinator, 4);
        coordinator.start_game();
        coordinator.player_disconnected(4);
        drain(&mut rx);

        let ack = coordinator.restart_game();

        assert_eq!(ack, CommandAck::ok_with(WAITING_FOR_PLAYERS));
        assert_eq!(coordinator.phase(), Phase::Idle);
        assert!(!coordinator.state().is_active());
        assert_eq!(names(&drain(&mut rx)), vec!["player_update"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_scores_carry_over_into_next_game() {
        let (mut coordinator, mut rx) = create_coordinator(11);
        connect_players(&mut coordinator, 4);
        coordinator.start_game();
        for _ in 0..shared::TOTAL_ROUNDS {
            run_round(&mut coordinator).await;
        }
        assert_eq!(coordinator.phase(), Phase::Idle);
        let final_scores: Vec<u32> = coordinator
            .state()
            .list_players()
            .iter()
            .map(|p| p.score)
            .collect();
        assert_eq!(final_scores.iter().sum::<u32>(), shared::TOTAL_ROUNDS);
        drain(&mut rx);

        let ack = coordinator.start_game();
        assert!(ack.success);
        assert_eq!(coordinator.state().current_round(), 1);
        let scores: Vec<u32> = coordinator
            .state()
            .list_players()
            .iter()
            .map(|p| p.score)
            .collect();
        assert_eq!(scores, final_scores);

        run_round(&mut coordinator).await;
        let total: u32 = coordinator
            .state()
            .list_players()
            .iter()
            .map(|p| p.score)
            .sum();
        assert_eq!(total, shared::TOTAL_ROUNDS + 1);
    }
}
