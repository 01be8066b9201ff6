use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use tdoacore::events::DetectionEvent;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;

/// UDP listener for detection events, one JSON line per datagram.
///
/// Undecodable datagrams are dropped with a diagnostic; nothing a client
/// sends can take the listener down.
pub struct UdpIngest {
    socket: Arc<UdpSocket>,
    shutdown_tx: mpsc::Sender<()>,
}

impl UdpIngest {
    pub async fn start(
        addr: SocketAddr,
        events: mpsc::Sender<DetectionEvent>,
    ) -> io::Result<Self> {
        let socket = Arc::new(UdpSocket::bind(addr).await?);
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel(1);

        let recv_socket = socket.clone();
        tokio::spawn(async move {
            let mut buf = [0u8; 2048];
            loop {
                tokio::select! {
                    result = recv_socket.recv_from(&mut buf) => {
                        match result {
                            Ok((size, peer)) => {
                                let parsed = std::str::from_utf8(&buf[..size])
                                    .ok()
                                    .and_then(|text| DetectionEvent::from_json_line(text).ok());
                                match parsed {
                                    Some(event) => {
                                        if events.send(event).await.is_err() {
                                            break;
                                        }
                                    }
                                    None => log::debug!("undecodable datagram from {peer}, dropping"),
                                }
                            }
                            Err(err) => log::error!("udp receive error: {err}"),
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        log::info!("ingest shutting down");
                        break;
                    }
                }
            }
        });

        log::info!("listening for detection events on {addr}");
        Ok(Self {
            socket,
            shutdown_tx,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(()).await;
    }
}
