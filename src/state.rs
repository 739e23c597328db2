use std::sync::{Arc, PoisonError, RwLock};

use anyhow::Result;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::gateway::{DocumentGateway, RestGateway};
use crate::labels::{LabelCatalog, LabelKind};
use crate::notify::{Notifier, TracingNotifier};
use crate::storage::{ObjectStorage, S3Storage};
use crate::store::DocumentStore;

/// Acting user for the session. Operations that write on the user's
/// behalf require a signed-in id.
#[derive(Debug, Default)]
pub struct Session {
    user: RwLock<Option<Uuid>>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sign_in(&self, user_id: Uuid) {
        *self.user.write().unwrap_or_else(PoisonError::into_inner) = Some(user_id);
    }

    pub fn sign_out(&self) {
        *self.user.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    pub fn user_id(&self) -> Option<Uuid> {
        *self.user.read().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Explicit per-session context handed to UI layers: one construction
/// at session start wires config, gateway, storage, notifier, and the
/// stores. No global instances.
pub struct StoreContext {
    pub config: Arc<AppConfig>,
    pub session: Arc<Session>,
    pub documents: Arc<DocumentStore>,
    pub tags: Arc<LabelCatalog>,
    pub categories: Arc<LabelCatalog>,
}

impl StoreContext {
    /// Builds the production wiring: REST gateway and S3 storage from
    /// the environment-driven config.
    pub async fn init(config: AppConfig) -> Result<Self> {
        let gateway: Arc<dyn DocumentGateway> = Arc::new(RestGateway::new(
            config.gateway_url.clone(),
            config.gateway_api_key.clone(),
        ));
        let storage: Arc<dyn ObjectStorage> = Arc::new(S3Storage::from_config(&config).await?);
        Ok(Self::with_parts(
            config,
            gateway,
            storage,
            Arc::new(TracingNotifier),
        ))
    }

    /// Wiring seam for alternate gateway/storage/notifier bindings.
    pub fn with_parts(
        config: AppConfig,
        gateway: Arc<dyn DocumentGateway>,
        storage: Arc<dyn ObjectStorage>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let session = Arc::new(Session::new());
        let tags = Arc::new(LabelCatalog::new(gateway.clone(), LabelKind::Tags));
        let categories = Arc::new(LabelCatalog::new(gateway.clone(), LabelKind::Categories));
        let documents = Arc::new(DocumentStore::new(
            gateway,
            storage,
            notifier,
            session.clone(),
            tags.clone(),
            categories.clone(),
            config.page_size,
        ));

        Self {
            config: Arc::new(config),
            session,
            documents,
            tags,
            categories,
        }
    }
}
