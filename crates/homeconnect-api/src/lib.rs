// homeconnect-api: Async Rust client for the Home Connect appliance API

mod appliances;
pub mod auth;
pub mod client;
pub mod credentials;
pub mod error;
pub mod keys;
pub mod models;
pub mod stream;
pub mod transport;

pub use auth::{OAuthConfig, TokenManager};
pub use client::{ApiClient, ApiRequest, ApiResponse};
pub use credentials::{AccessToken, CredentialStore, Credentials};
pub use error::Error;
pub use models::{Data, Event, HomeAppliance, Program};
pub use stream::{
    EventListener, EventStreamManager, ListenerId, ReconnectConfig, StreamConfig, StreamState,
};
pub use transport::{PRODUCTION_URL, SIMULATOR_URL, TransportConfig};
