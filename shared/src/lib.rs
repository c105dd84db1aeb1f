use serde::{Deserialize, Serialize};

pub const PROTOCOL_VERSION: u32 = 1;
pub const MIN_PLAYERS: usize = 4;
pub const TOTAL_ROUNDS: u32 = 5;
pub const ROUND_DURATION_SECS: u64 = 9;
pub const CLIENT_TIMEOUT_SECS: u64 = 5;
pub const MAX_NAME_LEN: usize = 24;
pub const MAX_PACKET_SIZE: usize = 8192;

pub const NOT_ENOUGH_PLAYERS: &str = "Not enough players to start the game";
pub const GAME_IN_PROGRESS: &str = "A game is already in progress";
pub const WAITING_FOR_PLAYERS: &str = "Waiting for more players";

#[derive(Debug, Serialize, Deserialize, Clone)]
pub enum Packet {
    Connect {
        client_version: u32,
        name: Option<String>,
    },
    Command(ClientCommand),
    Heartbeat,
    Disconnect,

    Connected {
        client_id: u32,
    },
    Ack {
        command: ClientCommand,
        ack: CommandAck,
    },
    Event(GameEvent),
    Disconnected {
        reason: String,
    },
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum ClientCommand {
    StartGame,
    RestartGame,
}

impl ClientCommand {
    pub fn name(&self) -> &'static str {
        match self {
            ClientCommand::StartGame => "start_game",
            ClientCommand::RestartGame => "restart_game",
        }
    }
}

/// Synchronous reply to a client command.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct CommandAck {
    pub success: bool,
    pub message: Option<String>,
}

impl CommandAck {
    pub fn ok() -> Self {
        Self {
            success: true,
            message: None,
        }
    }

    pub fn ok_with(message: &str) -> Self {
        Self {
            success: true,
            message: Some(message.to_string()),
        }
    }

    pub fn rejected(message: &str) -> Self {
        Self {
            success: false,
            message: Some(message.to_string()),
        }
    }
}

/// Lifecycle events broadcast to every connected client.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub enum GameEvent {
    PlayerJoined { name: String },
    PlayerLeft { name: String },
    PlayerUpdate { players: Vec<Player> },
    GameStart { total_rounds: u32 },
    NewRound { round: u32, total_rounds: u32 },
    RoundResult { winner: Player, players: Vec<Player> },
    GameOver { players: Vec<Player>, winners: Vec<Player> },
}

impl GameEvent {
    /// Event name as seen by clients.
    pub fn name(&self) -> &'static str {
        match self {
            GameEvent::PlayerJoined { .. } => "player_joined",
            GameEvent::PlayerLeft { .. } => "player_left",
            GameEvent::PlayerUpdate { .. } => "player_update",
            GameEvent::GameStart { .. } => "game_start",
            GameEvent::NewRound { .. } => "new_round",
            GameEvent::RoundResult { .. } => "round_result",
            GameEvent::GameOver { .. } => "game_over",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Player {
    pub id: u32,
    pub name: String,
    pub score: u32,
}

impl Player {
    pub fn new(id: u32, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            score: 0,
        }
    }
}

/// Cleans up a requested display name, falling back to `Player <id>`.
pub fn display_name(id: u32, requested: Option<&str>) -> String {
    match requested.map(str::trim) {
        Some(name) if !name.is_empty() => name.chars().take(MAX_NAME_LEN).collect(),
        _ => format!("Player {}", id),
    }
}
