// homeconnect-core: Consumer-facing layer between homeconnect-api and applications.

pub mod bridge;
pub mod config;
pub mod registry;
pub mod session;

// ── Primary re-exports ──────────────────────────────────────────────
pub use bridge::Bridge;
pub use config::BridgeConfig;
pub use registry::{EventDispatcher, EventHandler, HandlerRegistry, RefreshFn, RefreshRegistry};
pub use session::ApplianceSession;

// Re-export the API types consumers need alongside the core ones.
pub use homeconnect_api::{
    ApiClient, Data, Error, Event, EventListener, EventStreamManager, HomeAppliance, ListenerId,
    OAuthConfig, Program, ReconnectConfig, StreamConfig, StreamState, keys,
};
