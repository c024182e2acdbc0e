use std::sync::Arc;

use crate::auth::{TokenError, TokenService};
use crate::config::AppConfig;
use crate::database::DocumentStore;
use crate::mail::Mailer;

/// Process-wide services shared by every handler
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn DocumentStore>,
    pub mailer: Arc<dyn Mailer>,
    pub tokens: TokenService,
}

impl AppState {
    pub fn new(config: AppConfig, store: Arc<dyn DocumentStore>, mailer: Arc<dyn Mailer>) -> Result<Self, TokenError> {
        let tokens = TokenService::new(&config.auth)?;
        Ok(Self { config: Arc::new(config), store, mailer, tokens })
    }

    pub fn store(&self) -> &dyn DocumentStore {
        self.store.as_ref()
    }
}
