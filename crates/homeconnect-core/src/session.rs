// ── Appliance session ──
//
// One consumer's view of one appliance: events arriving on the shared
// stream are routed by key through an `EventDispatcher`, and after every
// reconnect the registered property refreshers re-read the appliance so
// that values changed while the stream was down are not lost. Refreshed
// values flow through the same handlers as live events.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use homeconnect_api::{
    ApiClient, Data, Error, Event, EventListener, EventStreamManager, ListenerId,
};
use tokio::sync::Mutex;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use crate::registry::{EventDispatcher, RefreshRegistry};

/// Event routing and state resynchronization for one appliance.
///
/// Cheaply cloneable via `Arc<SessionInner>`.
#[derive(Clone)]
pub struct ApplianceSession {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    ha_id: String,
    api: ApiClient,
    events: EventStreamManager,
    dispatcher: EventDispatcher,
    refreshers: RefreshRegistry<Data>,
    listener: Mutex<Option<ListenerId>>,
    resync_pending: AtomicBool,
    tasks: TaskTracker,
}

impl ApplianceSession {
    pub fn new(ha_id: impl Into<String>, api: ApiClient, events: EventStreamManager) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                ha_id: ha_id.into(),
                api,
                events,
                dispatcher: EventDispatcher::new(),
                refreshers: RefreshRegistry::new(),
                listener: Mutex::new(None),
                resync_pending: AtomicBool::new(false),
                tasks: TaskTracker::new(),
            }),
        }
    }

    pub fn ha_id(&self) -> &str {
        &self.inner.ha_id
    }

    pub fn api(&self) -> &ApiClient {
        &self.inner.api
    }

    /// Handlers for live (and refreshed) values, keyed by event key.
    pub fn dispatcher(&self) -> &EventDispatcher {
        &self.inner.dispatcher
    }

    /// Refreshers run after every reconnect and by [`resync`](Self::resync).
    pub fn refreshers(&self) -> &RefreshRegistry<Data> {
        &self.inner.refreshers
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Subscribe to the appliance's event stream and schedule an initial
    /// [`resync`](Self::resync) so refreshers see the current state without
    /// waiting for a reconnect. No-op when already open.
    pub async fn open(&self) -> Result<(), Error> {
        let mut listener = self.inner.listener.lock().await;
        if listener.is_some() {
            return Ok(());
        }

        let id = self
            .inner
            .events
            .subscribe(
                &self.inner.ha_id,
                Arc::new(SessionListener {
                    session: Arc::downgrade(&self.inner),
                }),
            )
            .await?;
        *listener = Some(id);
        info!(ha_id = %self.inner.ha_id, "appliance session opened");

        self.inner.schedule_resync();
        Ok(())
    }

    /// Unsubscribe and wait for any scheduled resync to finish. Idempotent.
    pub async fn close(&self) {
        if let Some(id) = self.inner.listener.lock().await.take() {
            self.inner.events.unsubscribe(id);
            info!(ha_id = %self.inner.ha_id, "appliance session closed");
        }

        self.inner.tasks.close();
        self.inner.tasks.wait().await;
        self.inner.tasks.reopen();
    }

    pub async fn is_open(&self) -> bool {
        self.inner.listener.lock().await.is_some()
    }

    /// Run every refresher and dispatch the values it read.
    ///
    /// Returns how many refreshers succeeded; failures are logged.
    pub async fn resync(&self) -> usize {
        self.inner.resync().await
    }
}

impl SessionInner {
    async fn resync(&self) -> usize {
        let results = self.refreshers.refresh_all(&self.api).await;
        let mut refreshed = 0;
        for (id, result) in results {
            match result {
                Ok(data) => {
                    self.dispatcher.dispatch(&data);
                    refreshed += 1;
                }
                Err(e) => {
                    warn!(ha_id = %self.ha_id, property = %id, error = %e, "property refresh failed");
                }
            }
        }
        debug!(ha_id = %self.ha_id, refreshed, "resync finished");
        refreshed
    }

    /// Schedule a resync in the background, coalescing bursts of reconnects.
    fn schedule_resync(self: &Arc<Self>) {
        if self.refreshers.is_empty() || self.resync_pending.swap(true, Ordering::AcqRel) {
            return;
        }
        let session = Arc::clone(self);
        self.tasks.spawn(async move {
            session.resync_pending.store(false, Ordering::Release);
            session.resync().await;
        });
    }
}

// ── Stream listener ──────────────────────────────────────────────────

/// Registered with the stream manager; holds the session weakly so that a
/// dropped session is not kept alive by its subscription.
struct SessionListener {
    session: Weak<SessionInner>,
}

impl EventListener for SessionListener {
    fn on_event(&self, event: &Event) {
        if let Some(session) = self.session.upgrade() {
            session.dispatcher.dispatch(event);
        }
    }

    fn on_reconnect(&self) {
        if let Some(session) = self.session.upgrade() {
            debug!(ha_id = %session.ha_id, "stream reconnecting, scheduling resync");
            session.schedule_resync();
        }
    }
}
