use anyhow::Context;
use tdoacore::events::DetectionEvent;
use tokio::net::UdpSocket;

/// Ships detection events to the correlation server, one JSON line per
/// datagram. Delivery is at-least-once; the server deduplicates.
pub struct EventSender {
    socket: UdpSocket,
}

impl EventSender {
    pub async fn connect(server_addr: &str) -> anyhow::Result<Self> {
        let socket = UdpSocket::bind("0.0.0.0:0")
            .await
            .context("binding event socket")?;
        socket
            .connect(server_addr)
            .await
            .with_context(|| format!("connecting event socket to {server_addr}"))?;
        Ok(Self { socket })
    }

    pub async fn send(&self, event: &DetectionEvent) -> anyhow::Result<()> {
        let line = event.to_json_line().context("encoding detection event")?;
        self.socket
            .send(line.as_bytes())
            .await
            .context("sending detection event")?;
        log::info!(
            "sent event #{} from {} at {}",
            event.sequence,
            event.receiver_id,
            event.arrival_time
        );
        Ok(())
    }
}
