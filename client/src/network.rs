//! UDP connection to the game server.
//!
//! macroquad owns the main thread, so the socket lives on a dedicated thread
//! with its own tokio runtime. The render loop talks to it through channels:
//! outgoing client messages in, decoded server messages out.

use log::{debug, error, info, warn};
use shared::{decode_server, encode_client, ClientMessage, ServerMessage, MAX_DATAGRAM_SIZE};
use std::net::SocketAddr;
use std::sync::mpsc as std_mpsc;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;

/// Render-side end of the connection
pub struct NetworkHandle {
    outgoing: mpsc::UnboundedSender<ClientMessage>,
    incoming: std_mpsc::Receiver<ServerMessage>,
}

impl NetworkHandle {
    pub fn send(&self, message: ClientMessage) -> bool {
        self.outgoing.send(message).is_ok()
    }

    /// Every message received since the last call, oldest first
    pub fn drain(&self) -> Vec<ServerMessage> {
        self.incoming.try_iter().collect()
    }
}

/// Spawns the network thread and queues the join request.
pub fn connect(server_addr: &str, name: &str) -> Result<NetworkHandle, Box<dyn std::error::Error>> {
    let server_addr: SocketAddr = server_addr.parse()?;
    let (outgoing_tx, outgoing_rx) = mpsc::unbounded_channel();
    let (incoming_tx, incoming_rx) = std_mpsc::channel();

    outgoing_tx.send(ClientMessage::PlayerJoin {
        name: name.to_string(),
    })?;

    std::thread::Builder::new()
        .name("network".into())
        .spawn(move || {
            let runtime = match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(runtime) => runtime,
                Err(e) => {
                    error!("Failed to create network runtime: {}", e);
                    return;
                }
            };

            runtime.block_on(async move {
                match UdpSocket::bind("0.0.0.0:0").await {
                    Ok(socket) => {
                        if let Err(e) = run_connection(socket, server_addr, outgoing_rx, incoming_tx).await {
                            error!("Network connection failed: {}", e);
                        }
                    }
                    Err(e) => error!("Failed to bind client socket: {}", e),
                }
            });
        })?;

    Ok(NetworkHandle {
        outgoing: outgoing_tx,
        incoming: incoming_rx,
    })
}

/// Pumps datagrams until the render side hangs up.
///
/// A `PlayerLeave` is sent on the way out so the server frees the slot
/// without waiting for the silence timeout.
pub async fn run_connection(
    socket: UdpSocket,
    server_addr: SocketAddr,
    mut outgoing: mpsc::UnboundedReceiver<ClientMessage>,
    incoming: std_mpsc::Sender<ServerMessage>,
) -> Result<(), Box<dyn std::error::Error>> {
    socket.connect(server_addr).await?;
    info!("Connected to {} from {}", server_addr, socket.local_addr()?);

    let mut buffer = vec![0u8; MAX_DATAGRAM_SIZE];
    let mut joined = false;

    loop {
        tokio::select! {
            result = socket.recv(&mut buffer) => {
                match result {
                    Ok(len) => match decode_server(&buffer[..len]) {
                        Ok(message) => {
                            if incoming.send(message).is_err() {
                                debug!("Render loop gone");
                                break;
                            }
                        }
                        Err(e) => warn!("Dropped server datagram: {}", e),
                    },
                    // ICMP unreachable surfaces here while the server is down
                    Err(e) => debug!("Error receiving datagram: {}", e),
                }
            },

            message = outgoing.recv() => {
                match message {
                    Some(message) => {
                        if matches!(message, ClientMessage::PlayerJoin { .. }) {
                            joined = true;
                        }
                        let is_leave = message == ClientMessage::PlayerLeave;
                        send(&socket, &message).await;
                        if is_leave {
                            joined = false;
                            break;
                        }
                    }
                    None => break,
                }
            },
        }
    }

    if joined {
        send(&socket, &ClientMessage::PlayerLeave).await;
    }
    info!("Network connection closed");
    Ok(())
}

async fn send(socket: &UdpSocket, message: &ClientMessage) {
    match encode_client(message) {
        Ok(bytes) => {
            if let Err(e) = socket.send(&bytes).await {
                debug!("Failed to send datagram: {}", e);
            }
        }
        Err(e) => error!("Failed to encode client message: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{decode_client, encode_server};
    use std::time::Duration;

    #[tokio::test]
    async fn test_connection_forwards_both_ways() {
        let server = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let server_addr = server.local_addr().unwrap();
        let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();

        let (outgoing_tx, outgoing_rx) = mpsc::unbounded_channel();
        let (incoming_tx, incoming_rx) = std_mpsc::channel();
        let task = tokio::spawn(async move {
            let _ = run_connection(client, server_addr, outgoing_rx, incoming_tx).await;
        });

        outgoing_tx
            .send(ClientMessage::PlayerJoin { name: "alice".into() })
            .unwrap();

        let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];
        let (len, client_addr) = tokio::time::timeout(Duration::from_secs(2), server.recv_from(&mut buf))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            decode_client(&buf[..len]).unwrap(),
            ClientMessage::PlayerJoin { name: "alice".into() }
        );

        let reply = encode_server(&ServerMessage::JoinError {
            message: "Game is full".into(),
        })
        .unwrap();
        server.send_to(&reply, client_addr).await.unwrap();

        let received = tokio::task::spawn_blocking(move || {
            incoming_rx.recv_timeout(Duration::from_secs(2))
        })
        .await
        .unwrap()
        .unwrap();
        assert_eq!(
            received,
            ServerMessage::JoinError {
                message: "Game is full".into()
            }
        );

        // Dropping the sender closes the connection with a leave
        drop(outgoing_tx);
        let (len, _) = tokio::time::timeout(Duration::from_secs(2), server.recv_from(&mut buf))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(decode_client(&buf[..len]).unwrap(), ClientMessage::PlayerLeave);
        task.await.unwrap();
    }

    #[test]
    fn test_connect_rejects_bad_address() {
        assert!(connect("not an address", "alice").is_err());
    }
}
