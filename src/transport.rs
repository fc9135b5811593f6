use crate::types::{CLOSE_NO_STATUS, CloseInfo, SessionEvent};
use crate::utils::lossy_text;
use futures::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::{self, Message, error::ProtocolError, protocol::CloseFrame};
use tracing::{debug, info, warn};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("connection is no longer accepting data")]
    Closed,
}

/// Sending half of a duplex connection owned by a stream session.
pub trait Outbound {
    /// Queue `data` for the peer. Data sent before the connection is open is
    /// delivered, in order, once it is.
    fn send(&mut self, data: Vec<u8>) -> Result<(), TransportError>;
}

/// Something that can open duplex connections.
///
/// Connection activity is reported asynchronously as [`SessionEvent`]s; the
/// returned handle only carries outbound data.
pub trait Connector {
    type Handle: Outbound;

    /// Whether this environment can open a duplex connection at all.
    fn is_supported(&self) -> bool;

    fn connect(&mut self, url: &str) -> Self::Handle;
}

/// WebSocket connections driven by a background tokio task.
pub struct WsConnector {
    events: mpsc::Sender<SessionEvent>,
}

impl WsConnector {
    pub fn new(events: mpsc::Sender<SessionEvent>) -> Self {
        Self { events }
    }
}

pub struct WsHandle {
    tx: mpsc::UnboundedSender<Vec<u8>>,
}

impl Outbound for WsHandle {
    fn send(&mut self, data: Vec<u8>) -> Result<(), TransportError> {
        self.tx.send(data).map_err(|_| TransportError::Closed)
    }
}

impl Connector for WsConnector {
    type Handle = WsHandle;

    fn is_supported(&self) -> bool {
        // The connection lives on a spawned task, so a runtime is required.
        tokio::runtime::Handle::try_current().is_ok()
    }

    fn connect(&mut self, url: &str) -> WsHandle {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run_connection(url.to_string(), rx, self.events.clone()));
        WsHandle { tx }
    }
}

async fn run_connection(
    url: String,
    mut outbound: mpsc::UnboundedReceiver<Vec<u8>>,
    events: mpsc::Sender<SessionEvent>,
) {
    let ws_stream = match connect_async(url.as_str()).await {
        Ok((ws_stream, response)) => {
            debug!("[{}] handshake complete: {}", url, response.status());
            ws_stream
        }
        Err(e) => {
            warn!("[{}] connection failed: {}", url, e);
            let _ = events.send(SessionEvent::Error(e.to_string())).await;
            return;
        }
    };

    if events.send(SessionEvent::Open).await.is_err() {
        return;
    }

    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    loop {
        tokio::select! {
            inbound = ws_receiver.next() => {
                let event = match inbound {
                    Some(Ok(Message::Text(text))) => SessionEvent::Message(text),
                    Some(Ok(Message::Binary(data))) => SessionEvent::Message(lossy_text(&data)),
                    Some(Ok(Message::Close(frame))) => SessionEvent::Close(close_info(frame)),
                    // Ping/pong replies are handled by tungstenite.
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => classify_error(e),
                    None => SessionEvent::Close(CloseInfo::unclean()),
                };
                let finished = matches!(event, SessionEvent::Close(_) | SessionEvent::Error(_));
                if finished {
                    // Flushes our reply to a peer-initiated close.
                    let _ = ws_sender.close().await;
                }
                if events.send(event).await.is_err() || finished {
                    break;
                }
            }
            data = outbound.recv() => {
                match data {
                    Some(data) => {
                        if let Err(e) = ws_sender.send(Message::Text(lossy_text(&data))).await {
                            let event = classify_error(e);
                            let _ = events.send(event).await;
                            break;
                        }
                    }
                    None => {
                        info!("[{}] session dropped the connection, closing", url);
                        let _ = ws_sender.close().await;
                        break;
                    }
                }
            }
        }
    }
    debug!("[{}] connection task finished", url);
}

fn close_info(frame: Option<CloseFrame<'static>>) -> CloseInfo {
    match frame {
        Some(frame) => CloseInfo::clean(u16::from(frame.code), frame.reason.to_string()),
        None => CloseInfo::clean(CLOSE_NO_STATUS, ""),
    }
}

/// Abrupt loss of the peer is an unclean close; anything else is an error.
fn classify_error(e: tungstenite::Error) -> SessionEvent {
    match e {
        tungstenite::Error::Protocol(ProtocolError::ResetWithoutClosingHandshake)
        | tungstenite::Error::ConnectionClosed
        | tungstenite::Error::AlreadyClosed
        | tungstenite::Error::Io(_) => {
            debug!("connection lost: {}", e);
            SessionEvent::Close(CloseInfo::unclean())
        }
        e => SessionEvent::Error(e.to_string()),
    }
}
