//! WebSocket connector for the Baileys sidecar.
//!
//! Each session gets its own socket. The first frame is `connect` with the
//! binding's phone number and the decrypted credential blob; the sidecar then
//! streams `open`, `creds_update`, `message` and `closed` frames for that
//! session.

use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use {
    async_trait::async_trait,
    futures::{SinkExt, StreamExt},
    tokio::sync::mpsc,
    tokio_tungstenite::{connect_async, tungstenite::Message as WsMessage},
    tracing::{debug, info, warn},
};

use crate::{
    error::{Result, SessionError},
    transport::{ConnectRequest, Connection, SessionConnector, SessionLink},
    types::{CloseReason, GatewayMessage, SessionEvent, SessionKey, SidecarMessage},
};

const EVENT_BUFFER: usize = 64;
const OUTBOUND_BUFFER: usize = 32;

pub struct SidecarConnector {
    url: String,
    /// Bound on the WebSocket upgrade plus the `connect` frame.
    connect_timeout: Duration,
}

impl SidecarConnector {
    pub fn new(url: impl Into<String>, connect_timeout: Duration) -> Self {
        Self {
            url: url.into(),
            connect_timeout,
        }
    }
}

#[async_trait]
impl SessionConnector for SidecarConnector {
    async fn connect(&self, key: &SessionKey, request: ConnectRequest) -> Result<Connection> {
        let session_id = key.session_id();
        let resumed = request.creds.is_some();
        let hello = serde_json::to_string(&GatewayMessage::Connect {
            session_id: session_id.clone(),
            phone: request.phone,
            creds: request.creds,
        })?;

        let handshake = async {
            let (mut stream, _response) = connect_async(self.url.as_str()).await?;
            stream.send(WsMessage::Text(hello.into())).await?;
            Ok::<_, SessionError>(stream)
        };
        let stream = tokio::time::timeout(self.connect_timeout, handshake)
            .await
            .map_err(|_| SessionError::Timeout(self.connect_timeout))??;
        let (mut sink, mut source) = stream.split();
        info!(session = %key, url = %self.url, resumed, "connected to whatsapp sidecar");

        let (out_tx, mut out_rx) = mpsc::channel::<WsMessage>(OUTBOUND_BUFFER);
        let (event_tx, event_rx) = mpsc::channel(EVENT_BUFFER);

        tokio::spawn(async move {
            while let Some(frame) = out_rx.recv().await {
                let closing = matches!(frame, WsMessage::Close(_));
                if let Err(e) = sink.send(frame).await {
                    debug!(error = %e, "sidecar write failed");
                    break;
                }
                if closing {
                    break;
                }
            }
        });

        let reader_session = session_id.clone();
        tokio::spawn(async move {
            let reason = loop {
                let Some(frame) = source.next().await else {
                    break "sidecar stream ended".to_string();
                };
                let text = match frame {
                    Ok(WsMessage::Text(text)) => text,
                    Ok(WsMessage::Close(_)) => break "sidecar closed the socket".to_string(),
                    Ok(_) => continue,
                    Err(e) => break format!("sidecar read failed: {e}"),
                };
                let msg: SidecarMessage = match serde_json::from_str(text.as_str()) {
                    Ok(msg) => msg,
                    Err(e) => {
                        warn!(error = %e, "unparseable sidecar frame");
                        continue;
                    },
                };
                if let SidecarMessage::Error { error, .. } = &msg {
                    warn!(session_id = %reader_session, error, "sidecar error");
                }
                if !frame_targets(&msg, &reader_session) {
                    continue;
                }
                if let Some(event) = msg.into_event()
                    && event_tx.send(event).await.is_err()
                {
                    return;
                }
            };
            let _ = event_tx
                .send(SessionEvent::Closed(CloseReason::ConnectionLost(reason)))
                .await;
        });

        Ok(Connection {
            link: Arc::new(SidecarLink {
                session_id,
                tx: out_tx,
                next_request: AtomicU64::new(1),
            }),
            events: event_rx,
        })
    }
}

fn frame_targets(msg: &SidecarMessage, session_id: &str) -> bool {
    let target = match msg {
        SidecarMessage::Open { session_id, .. }
        | SidecarMessage::CredsUpdate { session_id, .. }
        | SidecarMessage::Message { session_id, .. }
        | SidecarMessage::Closed { session_id, .. } => Some(session_id.as_str()),
        SidecarMessage::Error { session_id, .. } => session_id.as_deref(),
    };
    target.is_none_or(|t| t == session_id)
}

struct SidecarLink {
    session_id: String,
    tx: mpsc::Sender<WsMessage>,
    next_request: AtomicU64,
}

#[async_trait]
impl SessionLink for SidecarLink {
    async fn send_text(&self, to: &str, text: &str) -> Result<()> {
        let frame = serde_json::to_string(&GatewayMessage::Send {
            session_id: self.session_id.clone(),
            request_id: self.next_request.fetch_add(1, Ordering::Relaxed),
            to: to.to_string(),
            text: text.to_string(),
        })?;
        self.tx
            .send(WsMessage::Text(frame.into()))
            .await
            .map_err(|_| SessionError::transport("sidecar connection closed"))
    }

    async fn close(&self) {
        let _ = self.tx.send(WsMessage::Close(None)).await;
    }
}
