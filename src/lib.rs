pub mod config;
pub mod error;
pub mod gateway;
pub mod labels;
pub mod models;
pub mod notify;
pub mod pagination;
pub mod params;
pub mod state;
pub mod storage;
pub mod store;
pub mod utils;

pub use config::AppConfig;
pub use error::{GatewayError, StoreError, StoreResult};
pub use models::{Document, DocumentForm, DocumentView, FilePayload};
pub use params::{DocumentFilters, FetchCriteria};
pub use state::{Session, StoreContext};
pub use store::{DocumentStore, StoreEvent};

/// Installs the default tracing subscriber, honoring `RUST_LOG`.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
