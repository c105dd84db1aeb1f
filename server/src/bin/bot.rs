//! Headless player that joins a room and logs everything it hears.

use bincode::{deserialize, serialize};
use clap::Parser;
use log::{error, info, warn};
use shared::{ClientCommand, GameEvent, Packet, MAX_PACKET_SIZE, PROTOCOL_VERSION};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::interval;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value = "127.0.0.1:8080")]
    server: String,

    /// Display name in the room
    #[arg(short = 'n', long)]
    name: Option<String>,

    /// Ask the server to start a game whenever the roster changes
    #[arg(long)]
    auto_start: bool,

    /// Ask for a restart after every game
    #[arg(long)]
    replay: bool,
}

struct Bot {
    socket: UdpSocket,
    server_addr: SocketAddr,
    name: Option<String>,
    client_id: Option<u32>,
    auto_start: bool,
    replay: bool,
    game_active: bool,
    /// Reason the server gave for dropping us
    rejection: Option<String>,
}

impl Bot {
    async fn new(args: Args) -> Result<Self, Box<dyn std::error::Error>> {
        let socket = UdpSocket::bind("0.0.0.0:0").await?;
        let server_addr = args.server.parse()?;

        Ok(Bot {
            socket,
            server_addr,
            name: args.name,
            client_id: None,
            auto_start: args.auto_start,
            replay: args.replay,
            game_active: false,
            rejection: None,
        })
    }

    async fn send_packet(&self, packet: &Packet) -> Result<(), Box<dyn std::error::Error>> {
        let data = serialize(packet)?;
        self.socket.send_to(&data, self.server_addr).await?;
        Ok(())
    }

    async fn send_command(&self, command: ClientCommand) -> Result<(), Box<dyn std::error::Error>> {
        info!("Sending {}", command.name());
        self.send_packet(&Packet::Command(command)).await
    }

    async fn handle_packet(&mut self, packet: Packet) -> Result<(), Box<dyn std::error::Error>> {
        match packet {
            Packet::Connected { client_id } => {
                info!("Connected! Client ID: {}", client_id);
                self.client_id = Some(client_id);
            }

            Packet::Ack { command, ack } => match ack.message {
                Some(message) => info!(
                    "{} -> success={} ({})",
                    command.name(),
                    ack.success,
                    message
                ),
                None => info!("{} -> success={}", command.name(), ack.success),
            },

            Packet::Event(event) => self.handle_event(event).await?,

            Packet::Disconnected { reason } => {
                warn!("Disconnected: {}", reason);
                self.client_id = None;
                self.rejection = Some(reason);
            }

            _ => {
                warn!("Unexpected packet type");
            }
        }

        Ok(())
    }

    async fn handle_event(&mut self, event: GameEvent) -> Result<(), Box<dyn std::error::Error>> {
        match &event {
            GameEvent::PlayerJoined { name } => info!("{} joined", name),
            GameEvent::PlayerLeft { name } => info!("{} left", name),
            GameEvent::PlayerUpdate { players } => {
                info!("{} players in the room", players.len());
                if self.auto_start && !self.game_active {
                    self.send_command(ClientCommand::StartGame).await?;
                }
            }
            GameEvent::GameStart { total_rounds } => {
                self.game_active = true;
                info!("Game started: {} rounds", total_rounds);
            }
            GameEvent::NewRound {
                round,
                total_rounds,
            } => info!("Round {}/{} spinning...", round, total_rounds),
            GameEvent::RoundResult { winner, .. } => {
                let me = Some(winner.id) == self.client_id;
                info!(
                    "Round won by {}{}",
                    winner.name,
                    if me { " (me!)" } else { "" }
                );
            }
            GameEvent::GameOver { players, winners } => {
                self.game_active = false;
                for player in players {
                    info!("  {:<24} {}", player.name, player.score);
                }
                let names: Vec<&str> = winners.iter().map(|w| w.name.as_str()).collect();
                info!("Game over! Winners: {}", names.join(", "));

                if self.replay {
                    self.send_command(ClientCommand::RestartGame).await?;
                }
            }
        }

        Ok(())
    }

    async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        info!("Connecting to {}...", self.server_addr);
        self.send_packet(&Packet::Connect {
            client_version: PROTOCOL_VERSION,
            name: self.name.clone(),
        })
        .await?;

        let mut heartbeat = interval(Duration::from_secs(1));
        let mut buffer = vec![0u8; MAX_PACKET_SIZE];

        loop {
            tokio::select! {
                result = self.socket.recv_from(&mut buffer) => {
                    match result {
                        Ok((len, _)) => match deserialize::<Packet>(&buffer[0..len]) {
                            Ok(packet) => {
                                self.handle_packet(packet).await?;
                                if let Some(reason) = self.rejection.take() {
                                    return Err(format!("Server dropped the connection: {}", reason).into());
                                }
                            }
                            Err(e) => warn!("Failed to deserialize packet: {}", e),
                        },
                        Err(e) => error!("Error receiving packet: {}", e),
                    }
                },

                _ = heartbeat.tick() => {
                    if self.client_id.is_some() {
                        self.send_packet(&Packet::Heartbeat).await?;
                    }
                },

                _ = tokio::signal::ctrl_c() => {
                    info!("Leaving the room");
                    break;
                }
            }
        }

        if self.client_id.is_some() {
            let _ = self.send_packet(&Packet::Disconnect).await;
        }

        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();
    let mut bot = Bot::new(args).await?;
    bot.run().await
}
