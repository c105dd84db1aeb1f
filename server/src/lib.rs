//! # Game Room Server Library
//!
//! This library provides the authoritative server for the round-based party
//! game. Players join a single shared room, the server runs a fixed number of
//! timed rounds, each round awards a point to a randomly drawn player, and
//! the final standings are broadcast to everyone.
//!
//! ## Core Responsibilities
//!
//! ### Authoritative Game State
//! The server owns the roster and every score. Clients only send commands
//! (`start_game`, `restart_game`) and receive lifecycle events; all winner
//! selection happens here.
//!
//! ### Round Lifecycle
//! A game moves through `Idle`, `RoundInProgress` and `GameOver`. Each round
//! is announced, runs for a fixed duration, then resolves to a winner. After
//! the last round the players tied at the top score are declared winners and
//! the room returns to `Idle`.
//!
//! ### Client Management
//! Handles the lifecycle of client connections including:
//! - Connection establishment and player id assignment
//! - Heartbeat tracking and timeout cleanup
//! - Disconnection handling
//!
//! ## Architecture Design
//!
//! ### Single-Threaded Event Loop
//! Every mutation of the room happens on one task: incoming packets, client
//! timeouts and round timer expiries are all messages into the same
//! `tokio::select!` loop. Round timers are separate tasks that only post a
//! message when they elapse, so a pending round never races with a join or
//! leave.
//!
//! ### UDP-Based Communication
//! Clients talk to the server over UDP with bincode-encoded `shared::Packet`
//! values. Events are broadcast fire-and-forget to every connected client.
//!
//! ## Module Organization
//!
//! ### Game Module (`game`)
//! Pure roster and score bookkeeping with an injectable random source.
//!
//! ### Coordinator Module (`coordinator`)
//! The round state machine: command validation, round timers and event
//! emission through the `Broadcaster` trait.
//!
//! ### Client Manager Module (`client_manager`)
//! Connection tracking, id assignment and timeout detection.
//!
//! ### Network Module (`network`)
//! UDP socket management, packet handling and the main server loop.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::game::GameConfig;
//! use server::network::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Bind to an address, allow up to 32 clients, use an entropy-seeded RNG
//!     let mut server = Server::new("127.0.0.1:8080", GameConfig::default(), 32, None).await?;
//!
//!     // Runs until the process is stopped:
//!     // - Accepts connections and maintains the room roster
//!     // - Handles start/restart commands
//!     // - Runs timed rounds and broadcasts results
//!     server.run().await?;
//!
//!     Ok(())
//! }
//! ```

pub mod client_manager;
pub mod coordinator;
pub mod game;
pub mod network;
