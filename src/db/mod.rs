//! Database module - AppState and database operations
//!
//! Split into submodules for separation of concerns:
//! - `certificate` - Certificate definition CRUD and course lookups
//! - `issue` - Postgres implementation of the issuance store

mod certificate;
mod issue;

pub use issue::PgIssueStore;

use dotenvy::dotenv;
use moka::future::Cache;
use sqlx::PgPool;
use std::env;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::assets::AssetCatalog;
use crate::certificate::models::CertificateDefinition;
use crate::content::ContentResolver;
use crate::delivery::DeliveryCoordinator;
use crate::grading::{GradingService, PgGradingService};
use crate::identity::{IdentityService, PgIdentityService};
use crate::issue::IssueLedger;
use crate::mail::{HttpMailGateway, MailGateway, Notifier, NoopMailGateway};
use crate::render::{TemplateRegistry, TypstEngine};
use crate::storage::{FilesystemStorage, ObjectStorage};

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub definition_cache: Cache<Uuid, CertificateDefinition>,
    pub identity: Arc<dyn IdentityService>,
    pub grading: Arc<dyn GradingService>,
    pub storage: Arc<dyn ObjectStorage>,
    pub ledger: Arc<IssueLedger>,
    pub resolver: Arc<ContentResolver>,
    pub templates: Arc<TemplateRegistry>,
    pub engine: Arc<TypstEngine>,
    pub coordinator: Arc<DeliveryCoordinator>,
    pub catalog: Arc<AssetCatalog>,
}

impl AppState {
    pub async fn new() -> Result<Self, Box<dyn std::error::Error>> {
        dotenv().ok();
        let database_url = env::var("DATABASE_URL").expect("DATABASE_URL must be set");

        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(50)
            .min_connections(5)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(900))
            .connect(&database_url)
            .await?;

        let storage: Arc<dyn ObjectStorage> = Arc::new(FilesystemStorage::from_env());
        Ok(Self::new_with_pool_and_storage(pool, storage))
    }

    pub fn new_with_pool_and_storage(pool: PgPool, storage: Arc<dyn ObjectStorage>) -> Self {
        let definition_cache = Cache::builder()
            .time_to_live(Duration::from_secs(10 * 60))
            .max_capacity(500)
            .build();

        let http_client = reqwest::Client::builder()
            .pool_idle_timeout(Duration::from_secs(900))
            .user_agent("certificate-server/0.3")
            .build()
            .expect("Failed to create reqwest client");

        let identity: Arc<dyn IdentityService> = Arc::new(PgIdentityService::new(pool.clone()));
        let grading: Arc<dyn GradingService> = Arc::new(PgGradingService::new(pool.clone()));

        let mailer: Arc<dyn MailGateway> = match HttpMailGateway::from_env(http_client) {
            Some(gateway) => Arc::new(gateway),
            None => Arc::new(NoopMailGateway),
        };

        let notifier = Arc::new(Notifier::new(mailer.clone(), identity.clone()));
        let store = Arc::new(PgIssueStore::new(pool.clone()));
        let ledger = Arc::new(IssueLedger::new(store, identity.clone(), notifier));
        let resolver = Arc::new(ContentResolver::new(grading.clone(), identity.clone()));
        let coordinator = Arc::new(DeliveryCoordinator::new(storage.clone(), mailer));

        AppState {
            pool,
            definition_cache,
            identity,
            grading,
            storage,
            ledger,
            resolver,
            templates: Arc::new(TemplateRegistry::with_builtin()),
            engine: Arc::new(TypstEngine::from_env()),
            coordinator,
            catalog: Arc::new(AssetCatalog::from_env()),
        }
    }
}
