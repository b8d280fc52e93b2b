//! Server network layer: UDP transport around the game loop.

use crate::clock::{SharedClock, SystemClock};
use crate::config::ServerConfig;
use crate::game::GameState;
use crate::game_loop::{GameLoop, Outbound};
use log::{debug, error, info, warn};
use shared::{decode_client, encode_server, ClientMessage, ServerMessage, MAX_DATAGRAM_SIZE};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::time::{interval, MissedTickBehavior};

/// Events forwarded from network tasks to the main server loop
#[derive(Debug)]
pub enum ServerEvent {
    MessageReceived {
        message: ClientMessage,
        addr: SocketAddr,
    },
    Shutdown,
}

/// Owns the socket and the game loop; every mutation happens on the `run` task.
pub struct Server {
    socket: Arc<UdpSocket>,
    game: GameLoop,
    tick_duration: Duration,
    event_tx: mpsc::UnboundedSender<ServerEvent>,
    event_rx: mpsc::UnboundedReceiver<ServerEvent>,
}

impl Server {
    /// Binds the configured address and builds a fresh world.
    pub async fn new(config: &ServerConfig) -> Result<Self, Box<dyn std::error::Error>> {
        config.validate()?;

        let clock: SharedClock = Arc::new(SystemClock);
        let state = GameState::new(config.game_config(), clock.clone(), config.rng());
        let mut game = GameLoop::new(state, clock, config.broadcast_ms);
        if config.ai_players > 0 {
            let bots = game.spawn_ai_players(config.ai_players);
            info!("Spawned {} AI players", bots.len());
        }

        Self::bind(&config.bind_addr(), game, config.tick_duration()).await
    }

    /// Binds `addr` around an existing game loop.
    pub async fn bind(
        addr: &str,
        game: GameLoop,
        tick_duration: Duration,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let socket = Arc::new(UdpSocket::bind(addr).await?);
        info!("Server listening on {}", socket.local_addr()?);

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        Ok(Server {
            socket,
            game,
            tick_duration,
            event_tx,
            event_rx,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Sender that can stop the server from another task.
    pub fn handle(&self) -> mpsc::UnboundedSender<ServerEvent> {
        self.event_tx.clone()
    }

    pub fn game(&self) -> &GameLoop {
        &self.game
    }

    /// Spawns task that continuously listens for incoming datagrams
    fn spawn_network_receiver(&self) {
        let socket = Arc::clone(&self.socket);
        let event_tx = self.event_tx.clone();

        tokio::spawn(async move {
            let mut buffer = vec![0u8; MAX_DATAGRAM_SIZE];

            loop {
                match socket.recv_from(&mut buffer).await {
                    Ok((len, addr)) => match decode_client(&buffer[..len]) {
                        Ok(message) => {
                            if event_tx
                                .send(ServerEvent::MessageReceived { message, addr })
                                .is_err()
                            {
                                debug!("Server loop gone, stopping receiver");
                                break;
                            }
                        }
                        Err(e) => warn!("Dropped datagram from {}: {}", addr, e),
                    },
                    Err(e) => {
                        error!("Error receiving datagram: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
        });
    }

    async fn send_to(&self, message: &ServerMessage, addr: SocketAddr) {
        match encode_server(message) {
            Ok(bytes) => {
                if let Err(e) = self.socket.send_to(&bytes, addr).await {
                    error!("Failed to send {} to {}: {}", message.event_name(), addr, e);
                }
            }
            Err(e) => error!("Failed to encode {}: {}", message.event_name(), e),
        }
    }

    async fn deliver(&self, outbound: Vec<Outbound>) {
        for item in outbound {
            match item {
                Outbound::Send { addr, message } => self.send_to(&message, addr).await,
                Outbound::Broadcast(message) => {
                    let bytes = match encode_server(&message) {
                        Ok(bytes) => bytes,
                        Err(e) => {
                            error!("Failed to encode {}: {}", message.event_name(), e);
                            continue;
                        }
                    };
                    for addr in self.game.client_addrs() {
                        if let Err(e) = self.socket.send_to(&bytes, addr).await {
                            error!("Failed to broadcast to {}: {}", addr, e);
                        }
                    }
                }
            }
        }
    }

    /// Main server loop: interleaves datagram handling with fixed ticks.
    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.spawn_network_receiver();

        let mut tick_interval = interval(self.tick_duration);
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!("Server started successfully");

        loop {
            tokio::select! {
                event = self.event_rx.recv() => {
                    match event {
                        Some(ServerEvent::MessageReceived { message, addr }) => {
                            let out = self.game.handle_message(addr, message);
                            self.deliver(out).await;
                        }
                        Some(ServerEvent::Shutdown) | None => {
                            info!("Server shutting down");
                            break;
                        }
                    }
                },

                _ = tick_interval.tick() => {
                    let out = self.game.tick();
                    self.deliver(out).await;
                },
            }
        }

        Ok(())
    }
}
