//! Session table and per-session supervisor.
//!
//! The table is the only place sessions live. Creating, replacing and
//! removing an entry all happen under one lock, so a key never has two
//! supervisors. Each supervisor owns its connection and drives the
//! `connecting -> open -> closed_retryable | terminal` state machine.
//!
//! Terminal cleanup also runs under the table lock. A [`ChannelEventSink`]
//! must therefore not call back into the manager from `emit`.

use std::{collections::HashMap, sync::Arc, time::Duration};

use {
    secrecy::ExposeSecret,
    therra_channels::{BindingCredentials, ChannelEvent, ChannelEventSink, InboundMessage},
    therra_config::SessionsConfig,
    tokio::{
        sync::{Mutex, RwLock, watch},
        task::JoinHandle,
        time::Instant,
    },
    tokio_util::sync::CancellationToken,
    tracing::{debug, info, warn},
};

#[cfg(feature = "metrics")]
use therra_metrics::{counter, gauge, labels, sessions as session_metrics};

use crate::{
    auth_store::FileSessionStore,
    error::{Result, SessionError},
    transport::{ConnectRequest, Connection, SessionConnector, SessionLink},
    types::{CloseReason, SessionEvent, SessionKey, SessionState},
};

/// Reconnect delays: exponential from `min` to `max`, back to `min` once a
/// connection has stayed open for `healthy_after`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub min: Duration,
    pub max: Duration,
    pub healthy_after: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            min: Duration::from_secs(2),
            max: Duration::from_secs(60),
            healthy_after: Duration::from_secs(120),
        }
    }
}

impl From<&SessionsConfig> for BackoffPolicy {
    fn from(cfg: &SessionsConfig) -> Self {
        Self {
            min: Duration::from_secs(cfg.backoff_min_secs),
            max: Duration::from_secs(cfg.backoff_max_secs),
            healthy_after: Duration::from_secs(cfg.healthy_after_secs),
        }
    }
}

impl BackoffPolicy {
    #[must_use]
    pub fn next(&self, current: Duration) -> Duration {
        current.saturating_mul(2).min(self.max)
    }
}

/// Caller's view of a session.
#[derive(Clone)]
pub struct SessionHandle {
    pub key: SessionKey,
    state: watch::Receiver<SessionState>,
}

impl SessionHandle {
    #[must_use]
    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Wait until the session reaches `target`. Returns `false` if the
    /// session was stopped first.
    pub async fn wait_for(&mut self, target: SessionState) -> bool {
        self.state.wait_for(|s| *s == target).await.is_ok()
    }
}

struct SessionShared {
    state: watch::Sender<SessionState>,
    link: RwLock<Option<Arc<dyn SessionLink>>>,
}

struct Entry {
    shared: Arc<SessionShared>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl Entry {
    /// Cancel the supervisor and wait for it to finish.
    async fn shut_down(self, key: &SessionKey) {
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            warn!(session = %key, error = %e, "session supervisor panicked");
        }
    }
}

struct Inner {
    connector: Arc<dyn SessionConnector>,
    store: Arc<FileSessionStore>,
    /// Source of the phone number each binding was provisioned with.
    credentials: Arc<dyn BindingCredentials>,
    sink: Arc<dyn ChannelEventSink>,
    backoff: BackoffPolicy,
    sessions: Mutex<HashMap<SessionKey, Entry>>,
}

/// Owns every persistent session in the process.
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<Inner>,
}

impl SessionManager {
    pub fn new(
        connector: Arc<dyn SessionConnector>,
        store: Arc<FileSessionStore>,
        credentials: Arc<dyn BindingCredentials>,
        sink: Arc<dyn ChannelEventSink>,
        backoff: BackoffPolicy,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                connector,
                store,
                credentials,
                sink,
                backoff,
                sessions: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Start the session for `key`, or return the live one.
    ///
    /// A terminal session is torn down and replaced; anything else is reused.
    pub async fn start_session(&self, key: SessionKey) -> Result<SessionHandle> {
        self.inner.store.path_for(&key)?;
        let mut sessions = self.inner.sessions.lock().await;

        if let Some(entry) = sessions.get(&key) {
            if !entry.shared.state.borrow().is_terminal() {
                debug!(session = %key, "reusing live session");
                return Ok(SessionHandle {
                    key,
                    state: entry.shared.state.subscribe(),
                });
            }
            if let Some(old) = sessions.remove(&key) {
                old.cancel.cancel();
                info!(session = %key, "replacing terminal session");
            }
        }

        let (state_tx, state_rx) = watch::channel(SessionState::Connecting);
        let shared = Arc::new(SessionShared {
            state: state_tx,
            link: RwLock::new(None),
        });
        let cancel = CancellationToken::new();
        let task = tokio::spawn(supervise(
            Arc::clone(&self.inner),
            key.clone(),
            Arc::clone(&shared),
            cancel.clone(),
        ));
        sessions.insert(key.clone(), Entry {
            shared,
            cancel,
            task,
        });
        #[cfg(feature = "metrics")]
        gauge!(session_metrics::ACTIVE).set(sessions.len() as f64);
        drop(sessions);
        info!(session = %key, "starting session");

        Ok(SessionHandle {
            key,
            state: state_rx,
        })
    }

    /// Stop and forget the session. Cancels a pending reconnect and waits
    /// for the supervisor to exit. The stored blob is kept, so a later start
    /// resumes the paired device. Returns whether a session existed.
    pub async fn stop_session(&self, key: &SessionKey) -> bool {
        let Some(entry) = self.take_entry(key).await else {
            return false;
        };
        entry.shut_down(key).await;
        info!(session = %key, "session stopped");
        true
    }

    /// Stop the session and delete its stored blob, so the next start pairs
    /// from scratch. Used when a binding is re-provisioned.
    pub async fn discard_session(&self, key: &SessionKey) -> Result<bool> {
        let existed = match self.take_entry(key).await {
            Some(entry) => {
                entry.shut_down(key).await;
                true
            },
            None => false,
        };
        // The supervisor has exited, so nothing can write the blob back.
        self.inner.store.remove(key).await?;
        info!(session = %key, existed, "session discarded");
        Ok(existed)
    }

    /// Stop every session (shutdown).
    pub async fn stop_all(&self) {
        let drained: Vec<_> = self.inner.sessions.lock().await.drain().collect();
        #[cfg(feature = "metrics")]
        gauge!(session_metrics::ACTIVE).set(0.0);
        for (key, entry) in drained {
            entry.shut_down(&key).await;
            debug!(session = %key, "session stopped for shutdown");
        }
    }

    async fn take_entry(&self, key: &SessionKey) -> Option<Entry> {
        let mut sessions = self.inner.sessions.lock().await;
        let entry = sessions.remove(key)?;
        #[cfg(feature = "metrics")]
        gauge!(session_metrics::ACTIVE).set(sessions.len() as f64);
        Some(entry)
    }

    pub async fn state(&self, key: &SessionKey) -> Option<SessionState> {
        let sessions = self.inner.sessions.lock().await;
        sessions.get(key).map(|e| *e.shared.state.borrow())
    }

    /// Send through the session's live connection.
    pub async fn send_text(&self, key: &SessionKey, to: &str, text: &str) -> Result<()> {
        let shared = {
            let sessions = self.inner.sessions.lock().await;
            sessions.get(key).map(|e| Arc::clone(&e.shared))
        };
        let Some(shared) = shared else {
            return Err(SessionError::NotConnected(key.clone()));
        };
        if *shared.state.borrow() != SessionState::Open {
            return Err(SessionError::NotConnected(key.clone()));
        }
        let link = shared.link.read().await.clone();
        match link {
            Some(link) => link.send_text(to, text).await,
            None => Err(SessionError::NotConnected(key.clone())),
        }
    }
}

enum RunOutcome {
    Cancelled,
    Closed {
        reason: CloseReason,
        open_for: Option<Duration>,
    },
}

async fn supervise(
    inner: Arc<Inner>,
    key: SessionKey,
    shared: Arc<SessionShared>,
    cancel: CancellationToken,
) {
    let mut delay = inner.backoff.min;
    let mut attempt: u32 = 0;

    // The watch channel starts out as `connecting`, so announce it directly.
    announce(&inner, &key, SessionState::Connecting).await;

    loop {
        transition(&inner, &key, &shared, SessionState::Connecting).await;

        let connected = tokio::select! {
            _ = cancel.cancelled() => break,
            result = connect_once(&inner, &key) => result,
        };

        let outcome = match connected {
            Ok(conn) => run_connection(&inner, &key, &shared, &cancel, conn).await,
            Err(SessionError::Unauthorized(message)) => {
                warn!(session = %key, message, "sidecar rejected session credentials");
                RunOutcome::Closed {
                    reason: CloseReason::Unauthorized,
                    open_for: None,
                }
            },
            Err(e) => RunOutcome::Closed {
                reason: CloseReason::ConnectionLost(e.to_string()),
                open_for: None,
            },
        };

        let (reason, open_for) = match outcome {
            RunOutcome::Cancelled => break,
            RunOutcome::Closed { reason, open_for } => (reason, open_for),
        };

        if reason.is_terminal() {
            finish_terminal(&inner, &key, &shared, &cancel, &reason).await;
            return;
        }

        transition(&inner, &key, &shared, SessionState::ClosedRetryable).await;
        if open_for.is_some_and(|d| d >= inner.backoff.healthy_after) {
            delay = inner.backoff.min;
            attempt = 0;
        }
        attempt += 1;
        info!(
            session = %key,
            reason = reason.as_str(),
            attempt,
            delay_ms = delay.as_millis() as u64,
            "session closed, reconnecting"
        );
        #[cfg(feature = "metrics")]
        counter!(session_metrics::RECONNECTS_TOTAL).increment(1);

        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(delay) => {},
        }
        delay = inner.backoff.next(delay);
    }

    debug!(session = %key, "session supervisor exited");
}

async fn connect_once(inner: &Inner, key: &SessionKey) -> Result<Connection> {
    let phone = inner.credentials.credential(&key.tenant_id, key.channel).await?;
    let creds = match inner.store.load(key).await {
        Ok(creds) => creds,
        Err(e) => {
            warn!(session = %key, error = %e, "stored session unreadable, starting fresh");
            None
        },
    };
    inner
        .connector
        .connect(key, ConnectRequest {
            phone: phone.expose_secret().clone(),
            creds,
        })
        .await
}

/// Remove the revoked blob, report the revocation, then publish `terminal`.
///
/// Holds the table lock throughout, so a restart of the same key only sees
/// the entry once cleanup is done. An entry that was stopped or replaced
/// meanwhile is left alone.
async fn finish_terminal(
    inner: &Inner,
    key: &SessionKey,
    shared: &Arc<SessionShared>,
    cancel: &CancellationToken,
    reason: &CloseReason,
) {
    let sessions = inner.sessions.lock().await;
    let owned = !cancel.is_cancelled()
        && sessions
            .get(key)
            .is_some_and(|entry| Arc::ptr_eq(&entry.shared, shared));
    if !owned {
        debug!(session = %key, "session replaced before terminal cleanup");
        return;
    }

    warn!(session = %key, reason = reason.as_str(), "session terminated by remote, re-provisioning required");
    #[cfg(feature = "metrics")]
    counter!(session_metrics::TERMINAL_TOTAL, labels::REASON => reason.as_str().to_string())
        .increment(1);
    if let Err(e) = inner.store.remove(key).await {
        warn!(session = %key, error = %e, "failed to remove revoked session blob");
    }
    inner
        .sink
        .emit(ChannelEvent::SessionTerminal {
            tenant_id: key.tenant_id.clone(),
            channel: key.channel,
            reason: reason.as_str().to_string(),
        })
        .await;
    transition(inner, key, shared, SessionState::Terminal).await;
    drop(sessions);
}

async fn run_connection(
    inner: &Inner,
    key: &SessionKey,
    shared: &SessionShared,
    cancel: &CancellationToken,
    conn: Connection,
) -> RunOutcome {
    let Connection { link, mut events } = conn;
    let mut opened_at: Option<Instant> = None;

    let reason = loop {
        let event = tokio::select! {
            _ = cancel.cancelled() => {
                link.close().await;
                *shared.link.write().await = None;
                return RunOutcome::Cancelled;
            },
            event = events.recv() => event,
        };

        match event {
            Some(SessionEvent::Open) => {
                *shared.link.write().await = Some(Arc::clone(&link));
                opened_at = Some(Instant::now());
                transition(inner, key, shared, SessionState::Open).await;
            },
            Some(SessionEvent::CredsUpdate(creds)) => {
                // Awaited so the next event never sees unsaved credentials.
                if let Err(e) = inner.store.save(key, &creds).await {
                    warn!(session = %key, error = %e, "failed to persist session credentials");
                    #[cfg(feature = "metrics")]
                    counter!(session_metrics::CREDS_SAVE_FAILURES_TOTAL).increment(1);
                }
            },
            Some(SessionEvent::Inbound { from, name, text }) => {
                let message = InboundMessage {
                    tenant_id: key.tenant_id.clone(),
                    channel: key.channel,
                    customer_name: name.unwrap_or_else(|| from.clone()),
                    customer_id: from,
                    text,
                };
                inner.sink.dispatch_inbound(message).await;
            },
            Some(SessionEvent::Closed(reason)) => break reason,
            None => break CloseReason::ConnectionLost("event stream ended".into()),
        }
    };

    *shared.link.write().await = None;
    link.close().await;
    RunOutcome::Closed {
        reason,
        open_for: opened_at.map(|t| t.elapsed()),
    }
}

async fn transition(inner: &Inner, key: &SessionKey, shared: &SessionShared, state: SessionState) {
    let previous = shared.state.send_replace(state);
    if previous != state {
        announce(inner, key, state).await;
    }
}

async fn announce(inner: &Inner, key: &SessionKey, state: SessionState) {
    debug!(session = %key, %state, "session state changed");
    #[cfg(feature = "metrics")]
    counter!(session_metrics::TRANSITIONS_TOTAL, labels::STATE => state.as_str()).increment(1);
    inner
        .sink
        .emit(ChannelEvent::SessionStateChanged {
            tenant_id: key.tenant_id.clone(),
            channel: key.channel,
            state: state.as_str().to_string(),
        })
        .await;
}
