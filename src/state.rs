use std::sync::Arc;

use crate::config::Config;
use crate::db::Store;
use crate::mail::{self, Mailer};
use crate::services::{AuthService, ReviewService, SeaOrmAuthService, SeaOrmReviewService};

#[derive(Clone)]
pub struct SharedState {
    pub config: Arc<Config>,

    pub store: Store,

    pub mailer: Arc<dyn Mailer>,

    pub auth_service: Arc<dyn AuthService>,

    pub review_service: Arc<dyn ReviewService>,
}

impl SharedState {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let mailer = mail::from_config(&config.mail);
        Self::with_mailer(config, mailer).await
    }

    pub async fn with_mailer(config: Config, mailer: Arc<dyn Mailer>) -> anyhow::Result<Self> {
        let store = Store::with_pool_options(
            &config.general.database_path,
            config.general.max_db_connections,
            config.general.min_db_connections,
        )
        .await?;

        Ok(Self::from_parts(Arc::new(config), store, mailer))
    }

    #[must_use]
    pub fn from_parts(config: Arc<Config>, store: Store, mailer: Arc<dyn Mailer>) -> Self {
        let auth_service = Arc::new(SeaOrmAuthService::new(
            store.clone(),
            mailer.clone(),
            config.clone(),
        )) as Arc<dyn AuthService>;

        let review_service = Arc::new(SeaOrmReviewService::new(store.clone())) as Arc<dyn ReviewService>;

        Self {
            config,
            store,
            mailer,
            auth_service,
            review_service,
        }
    }
}
