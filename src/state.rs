use std::sync::Arc;

use crate::auth::password::Hasher;
use crate::auth::repo::{PgUserRepo, UserRepo};
use crate::clock::{Clock, SystemClock};
use crate::config::AppConfig;
use crate::db;
use crate::mail::{self, Mailer};
use crate::tours::repo::{PgTourRepo, TourRepo};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub users: Arc<dyn UserRepo>,
    pub tours: Arc<dyn TourRepo>,
    pub mailer: Arc<dyn Mailer>,
    pub clock: Arc<dyn Clock>,
    pub hasher: Hasher,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);
        let pool = db::connect(&config.database_url).await?;
        let mailer: Arc<dyn Mailer> = Arc::from(mail::from_config(&config.mail)?);
        let hasher = Hasher::new(&config.hash)?;

        Ok(Self {
            users: Arc::new(PgUserRepo::new(pool.clone())),
            tours: Arc::new(PgTourRepo::new(pool)),
            mailer,
            clock: Arc::new(SystemClock),
            hasher,
            config,
        })
    }
}
