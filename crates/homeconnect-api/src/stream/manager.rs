// Event stream manager
//
// One background read task per appliance with at least one listener. The
// listener map is the single source of truth: tasks snapshot it per frame,
// and a task only ever sees the registrations of its own generation, so a
// task that is still winding down never dispatches to a newer subscription
// for the same appliance.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use futures_util::StreamExt;
use reqwest::StatusCode;
use reqwest::header::ACCEPT;
use thiserror::Error;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};
use url::Url;

use super::sse::SseDecoder;
use super::{EventListener, StreamConfig, StreamState, calculate_backoff, decode_frame};
use crate::auth::TokenManager;
use crate::credentials::AccessToken;
use crate::error::Error;
use crate::models::Event;

const EVENT_STREAM_MEDIA_TYPE: &str = "text/event-stream";

/// Handle for one listener registration, returned by
/// [`EventStreamManager::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

#[derive(Clone)]
struct Registration {
    id: ListenerId,
    listener: Arc<dyn EventListener>,
}

struct Subscription {
    generation: u64,
    listeners: Vec<Registration>,
    cancel: CancellationToken,
    state: watch::Receiver<StreamState>,
}

// ── EventStreamManager ───────────────────────────────────────────────

/// Shares one event stream per appliance among any number of listeners.
///
/// Cheaply cloneable via `Arc<ManagerInner>`.
#[derive(Clone)]
pub struct EventStreamManager {
    inner: Arc<ManagerInner>,
}

struct ManagerInner {
    http: reqwest::Client,
    base_url: Url,
    tokens: Arc<TokenManager>,
    config: StreamConfig,
    subscriptions: Mutex<HashMap<String, Subscription>>,
    tasks: TaskTracker,
    shutdown: CancellationToken,
    next_id: AtomicU64,
    /// Bumped by every `dispose_all`, under the subscriptions lock.
    disposals: AtomicU64,
}

impl Drop for ManagerInner {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

impl ManagerInner {
    fn subscriptions(&self) -> MutexGuard<'_, HashMap<String, Subscription>> {
        self.subscriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }
}

impl EventStreamManager {
    /// `http` should have no total request timeout; see
    /// [`TransportConfig::build_stream_client`](crate::TransportConfig::build_stream_client).
    pub fn new(
        http: reqwest::Client,
        base_url: Url,
        tokens: Arc<TokenManager>,
        config: StreamConfig,
    ) -> Self {
        Self {
            inner: Arc::new(ManagerInner {
                http,
                base_url,
                tokens,
                config,
                subscriptions: Mutex::new(HashMap::new()),
                tasks: TaskTracker::new(),
                shutdown: CancellationToken::new(),
                next_id: AtomicU64::new(1),
                disposals: AtomicU64::new(0),
            }),
        }
    }

    /// Register `listener` for events of appliance `ha_id`.
    ///
    /// The first registration for an appliance makes sure credentials are
    /// valid and opens its stream; later ones join the existing stream.
    ///
    /// Fails with [`Error::Disposed`] when [`dispose_all`](Self::dispose_all)
    /// ran while this call was waiting for credentials; nothing is registered
    /// in that case.
    pub async fn subscribe(
        &self,
        ha_id: &str,
        listener: Arc<dyn EventListener>,
    ) -> Result<ListenerId, Error> {
        let disposals = self.inner.disposals.load(Ordering::Acquire);
        if !self.is_subscribed(ha_id) {
            self.inner.tokens.ensure_valid_credentials().await?;
        }

        let url = self
            .inner
            .base_url
            .join(&format!("api/homeappliances/{ha_id}/events"))?;
        let id = ListenerId(self.inner.next_id());
        let registration = Registration { id, listener };

        let mut subscriptions = self.inner.subscriptions();
        if self.inner.disposals.load(Ordering::Acquire) != disposals {
            debug!(ha_id, "streams disposed while subscribing, not registering");
            return Err(Error::Disposed);
        }
        match subscriptions.entry(ha_id.to_owned()) {
            Entry::Occupied(mut entry) => {
                let subscription = entry.get_mut();
                subscription.listeners.push(registration);
                debug!(
                    ha_id,
                    listeners = subscription.listeners.len(),
                    "joined existing event stream"
                );
            }
            Entry::Vacant(entry) => {
                let mut subscription = self.spawn_stream(ha_id, url);
                subscription.listeners.push(registration);
                entry.insert(subscription);
                info!(ha_id, "event stream opened");
            }
        }

        Ok(id)
    }

    /// Remove exactly one registration. When it was the last one for its
    /// appliance, that appliance's stream is closed.
    ///
    /// Returns `false` if `id` was not registered.
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut subscriptions = self.inner.subscriptions();

        let Some(ha_id) = subscriptions
            .iter()
            .find(|(_, s)| s.listeners.iter().any(|r| r.id == id))
            .map(|(ha_id, _)| ha_id.clone())
        else {
            return false;
        };

        let now_empty = subscriptions.get_mut(&ha_id).is_some_and(|s| {
            s.listeners.retain(|r| r.id != id);
            s.listeners.is_empty()
        });

        if now_empty {
            if let Some(subscription) = subscriptions.remove(&ha_id) {
                subscription.cancel.cancel();
                info!(ha_id, "last listener removed, event stream closed");
            }
        }
        true
    }

    /// Drop every registration, close every stream, and wait until all read
    /// tasks have exited. Idempotent.
    ///
    /// Must not be awaited from inside a listener callback.
    pub async fn dispose_all(&self) {
        let drained: Vec<(String, Subscription)> = {
            let mut subscriptions = self.inner.subscriptions();
            self.inner.disposals.fetch_add(1, Ordering::AcqRel);
            subscriptions.drain().collect()
        };
        for (ha_id, subscription) in drained {
            subscription.cancel.cancel();
            debug!(ha_id, "event stream disposed");
        }

        self.inner.tasks.close();
        self.inner.tasks.wait().await;
        self.inner.tasks.reopen();
    }

    pub fn is_subscribed(&self, ha_id: &str) -> bool {
        self.inner.subscriptions().contains_key(ha_id)
    }

    pub fn listener_count(&self, ha_id: &str) -> usize {
        self.inner
            .subscriptions()
            .get(ha_id)
            .map_or(0, |s| s.listeners.len())
    }

    /// Appliances that currently have an open (or reconnecting) stream.
    pub fn subscribed_appliances(&self) -> Vec<String> {
        self.inner.subscriptions().keys().cloned().collect()
    }

    /// Watch the connection state of an appliance's stream.
    pub fn state(&self, ha_id: &str) -> Option<watch::Receiver<StreamState>> {
        self.inner
            .subscriptions()
            .get(ha_id)
            .map(|s| s.state.clone())
    }

    fn spawn_stream(&self, ha_id: &str, url: Url) -> Subscription {
        let generation = self.inner.next_id();
        let cancel = self.inner.shutdown.child_token();
        let (state_tx, state_rx) = watch::channel(StreamState::Connecting);

        let task = StreamTask {
            ha_id: ha_id.to_owned(),
            generation,
            url,
            http: self.inner.http.clone(),
            tokens: Arc::clone(&self.inner.tokens),
            config: self.inner.config.clone(),
            manager: Arc::downgrade(&self.inner),
            cancel: cancel.clone(),
            state: state_tx,
        };
        self.inner.tasks.spawn(task.run());

        Subscription {
            generation,
            listeners: Vec::new(),
            cancel,
            state: state_rx,
        }
    }
}

// ── Read task ────────────────────────────────────────────────────────

#[derive(Debug, Error)]
enum StreamFailure {
    #[error("event stream rejected the access token")]
    Unauthorized(Arc<AccessToken>),

    #[error("event stream answered HTTP {status}")]
    Status { status: u16 },

    #[error("event stream transport error: {0}")]
    Transport(String),

    #[error("no traffic on event stream for {0:?}")]
    Idle(Duration),

    #[error("credentials unavailable: {0}")]
    Credentials(Error),
}

struct StreamTask {
    ha_id: String,
    generation: u64,
    url: Url,
    http: reqwest::Client,
    tokens: Arc<TokenManager>,
    config: StreamConfig,
    manager: Weak<ManagerInner>,
    cancel: CancellationToken,
    state: watch::Sender<StreamState>,
}

impl StreamTask {
    /// Main loop: connect → read → on drop, notify listeners → reconnect.
    async fn run(self) {
        let mut attempt: u32 = 0;
        let mut reauthorized = false;
        let mut first = true;

        loop {
            if !first {
                self.notify_reconnect();
            }
            first = false;
            self.set_state(StreamState::Connecting);

            let mut opened = false;
            let result = tokio::select! {
                biased;
                () = self.cancel.cancelled() => break,
                result = self.connect_and_read(&mut opened) => result,
            };

            if opened {
                attempt = 0;
                reauthorized = false;
            }

            let delay = match result {
                // Server ended the stream cleanly.
                Ok(()) => {
                    info!(ha_id = %self.ha_id, "event stream ended, reconnecting");
                    self.config.reconnect.initial_delay
                }
                Err(StreamFailure::Unauthorized(token)) if !reauthorized => {
                    warn!(ha_id = %self.ha_id, "event stream rejected token, reauthorizing");
                    self.set_state(StreamState::Reauthorizing);
                    self.tokens.invalidate_if(&token);
                    reauthorized = true;

                    let acquired = tokio::select! {
                        biased;
                        () = self.cancel.cancelled() => break,
                        acquired = self.tokens.ensure_valid_credentials() => acquired,
                    };
                    match acquired {
                        Ok(_) => continue,
                        Err(e) if e.is_configuration() => {
                            error!(ha_id = %self.ha_id, error = %e, "cannot reauthorize event stream");
                            break;
                        }
                        Err(e) => {
                            warn!(ha_id = %self.ha_id, error = %e, "reauthorization failed");
                            match self.next_backoff(&mut attempt) {
                                Some(delay) => delay,
                                None => break,
                            }
                        }
                    }
                }
                Err(StreamFailure::Credentials(e)) if e.is_configuration() => {
                    error!(ha_id = %self.ha_id, error = %e, "event stream cannot authenticate");
                    break;
                }
                Err(failure) => {
                    if let StreamFailure::Unauthorized(ref token) = failure {
                        self.tokens.invalidate_if(token);
                    }
                    warn!(ha_id = %self.ha_id, error = %failure, attempt, "event stream error");
                    match self.next_backoff(&mut attempt) {
                        Some(delay) => delay,
                        None => break,
                    }
                }
            };

            debug!(
                ha_id = %self.ha_id,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                "waiting before reconnect"
            );
            tokio::select! {
                biased;
                () = self.cancel.cancelled() => break,
                () = tokio::time::sleep(delay) => {}
            }
        }

        if !self.cancel.is_cancelled() {
            self.forget_subscription();
        }
        self.set_state(StreamState::Closed);
        debug!(ha_id = %self.ha_id, "event stream task exiting");
    }

    /// The task gave up on its own; drop its registrations so the next
    /// `subscribe` for this appliance starts a fresh stream.
    fn forget_subscription(&self) {
        let Some(manager) = self.manager.upgrade() else {
            return;
        };
        let mut subscriptions = manager.subscriptions();
        if subscriptions
            .get(&self.ha_id)
            .is_some_and(|s| s.generation == self.generation)
        {
            subscriptions.remove(&self.ha_id);
            warn!(ha_id = %self.ha_id, "event stream abandoned, listeners dropped");
        }
    }

    /// Backoff for the current attempt, or `None` once retries are exhausted.
    fn next_backoff(&self, attempt: &mut u32) -> Option<Duration> {
        if let Some(max) = self.config.reconnect.max_retries {
            if *attempt >= max {
                error!(
                    ha_id = %self.ha_id,
                    max_retries = max,
                    "event stream reconnection limit reached, giving up"
                );
                return None;
            }
        }
        let delay = calculate_backoff(*attempt, &self.config.reconnect);
        *attempt = attempt.saturating_add(1);
        Some(delay)
    }

    /// Open one connection and read frames until it drops.
    async fn connect_and_read(&self, opened: &mut bool) -> Result<(), StreamFailure> {
        let token = self
            .tokens
            .ensure_valid_credentials()
            .await
            .map_err(StreamFailure::Credentials)?;

        debug!(ha_id = %self.ha_id, url = %self.url, "connecting event stream");
        let resp = self
            .http
            .get(self.url.clone())
            .bearer_auth(token.expose_secret())
            .header(ACCEPT, EVENT_STREAM_MEDIA_TYPE)
            .send()
            .await
            .map_err(|e| StreamFailure::Transport(e.to_string()))?;

        let status = resp.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(StreamFailure::Unauthorized(token));
        }
        if !status.is_success() {
            return Err(StreamFailure::Status {
                status: status.as_u16(),
            });
        }

        *opened = true;
        self.set_state(StreamState::Open);
        info!(ha_id = %self.ha_id, "event stream connected");

        let mut body = resp.bytes_stream();
        let mut decoder = SseDecoder::new();
        loop {
            let chunk = match tokio::time::timeout(self.config.idle_timeout, body.next()).await {
                Err(_) => return Err(StreamFailure::Idle(self.config.idle_timeout)),
                Ok(None) => return Ok(()),
                Ok(Some(Err(e))) => return Err(StreamFailure::Transport(e.to_string())),
                Ok(Some(Ok(chunk))) => chunk,
            };

            for frame in decoder.push(&chunk) {
                let events = decode_frame(&frame);
                if !events.is_empty() {
                    self.dispatch(&events);
                }
            }
        }
    }

    /// Current registrations of this task's generation; `None` once the
    /// subscription is gone.
    fn listeners(&self) -> Option<Vec<Registration>> {
        let manager = self.manager.upgrade()?;
        let subscriptions = manager.subscriptions();
        subscriptions
            .get(&self.ha_id)
            .filter(|s| s.generation == self.generation)
            .map(|s| s.listeners.clone())
    }

    /// Deliver one frame's events, in order, to every listener.
    fn dispatch(&self, events: &[Event]) {
        let Some(listeners) = self.listeners() else {
            return;
        };
        for event in events {
            for registration in &listeners {
                registration.listener.on_event(event);
            }
        }
    }

    fn notify_reconnect(&self) {
        let Some(listeners) = self.listeners() else {
            return;
        };
        debug!(ha_id = %self.ha_id, listeners = listeners.len(), "notifying listeners of reconnect");
        for registration in &listeners {
            registration.listener.on_reconnect();
        }
    }

    fn set_state(&self, state: StreamState) {
        self.state.send_replace(state);
    }
}
