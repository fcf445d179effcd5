// Service modules (daemon functionality)
pub mod abuse_guard;
pub mod blobs;
pub mod coordinator;
pub mod database;
pub mod http_server;
pub mod models;
pub mod process;
pub mod service_config;
pub mod service_state;
pub mod sweeper;

// App state (configuration, paths)
pub mod state;

// Re-exports for consumers (CLI, integration tests)
pub use process::{spawn_service, start_service, ShutdownHandle};
pub use service_config::Config as ServiceConfig;
pub use service_state::State as ServiceState;
pub use state::{AppConfig, AppState, BlobStoreConfig, StateError};
