//! Websocket transport to the authoritative peer

use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};

use super::channel::ChannelHandle;
use super::protocol::{ClientEvent, ServerEvent};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Outbound events buffered while the socket is busy; emits past this are dropped
pub const OUTBOUND_CAPACITY: usize = 256;
/// Decoded events waiting for the session; the reader stops reading when full
pub const INBOUND_CAPACITY: usize = 256;

/// A live connection split into its two pump tasks
pub struct Connection {
    /// Outbound handle; clone it into the session
    pub channel: ChannelHandle,
    /// Decoded inbound events in arrival order
    pub inbound_rx: mpsc::Receiver<ServerEvent>,
    pub reader: JoinHandle<()>,
    pub writer: JoinHandle<()>,
}

/// Open the socket and start the reader and writer tasks
pub async fn connect(url: &str) -> Result<Connection, TransportError> {
    let (socket, response) = connect_async(url)
        .await
        .map_err(|source| TransportError::Connect {
            url: url.to_string(),
            source: Box::new(source),
        })?;
    info!(url, status = %response.status(), "Websocket connected");

    let (sink, stream) = socket.split();
    let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_CAPACITY);
    let (inbound_tx, inbound_rx) = mpsc::channel(INBOUND_CAPACITY);

    let writer = tokio::spawn(write_loop(sink, outbound_rx));
    let reader = tokio::spawn(read_loop(stream, inbound_tx));

    Ok(Connection {
        channel: ChannelHandle::attached(outbound_tx),
        inbound_rx,
        reader,
        writer,
    })
}

/// Outbound queue -> socket. Ends when every channel handle is closed.
async fn write_loop(
    mut sink: SplitSink<Socket, Message>,
    mut outbound_rx: mpsc::Receiver<ClientEvent>,
) {
    while let Some(event) = outbound_rx.recv().await {
        let text = match event.encode() {
            Ok(text) => text,
            Err(e) => {
                error!(event = event.name(), error = %e, "Failed to encode event");
                continue;
            }
        };

        if let Err(e) = sink.send(Message::Text(text)).await {
            debug!(error = %e, "Websocket send failed");
            return;
        }
    }

    debug!("Outbound queue closed, closing socket");
    let _ = sink.close().await;
}

/// Socket -> inbound queue. Dropping `inbound_tx` on exit tells the session
/// the transport is gone.
async fn read_loop(
    mut stream: SplitStream<Socket>,
    inbound_tx: mpsc::Sender<ServerEvent>,
) {
    while let Some(result) = stream.next().await {
        match result {
            Ok(Message::Text(text)) => match ServerEvent::decode(&text) {
                Ok(event) => {
                    if inbound_tx.send(event).await.is_err() {
                        debug!("Session gone, stopping reader");
                        return;
                    }
                }
                Err(e) => {
                    warn!(error = %e, "Failed to decode server event");
                }
            },
            Ok(Message::Binary(_)) => {
                warn!("Received binary message, ignoring");
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) | Ok(Message::Frame(_)) => {}
            Ok(Message::Close(frame)) => {
                info!(?frame, "Server closed connection");
                return;
            }
            Err(e) => {
                error!(error = %e, "Websocket error");
                return;
            }
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("failed to connect to {url}: {source}")]
    Connect {
        url: String,
        #[source]
        source: Box<tungstenite::Error>,
    },
}
