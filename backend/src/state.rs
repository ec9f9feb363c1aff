use std::sync::Arc;

use crate::{
    config::Config,
    services::{
        credentials::CredentialVerifier, session_pool::SessionPool, session_store::SessionStore,
    },
    utils::jwt::TokenLifetimes,
};

#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<SessionPool>,
    pub store: SessionStore,
    pub credentials: Arc<dyn CredentialVerifier>,
    pub config: Config,
}

impl AppState {
    pub fn new(
        sessions: Arc<SessionPool>,
        store: SessionStore,
        credentials: Arc<dyn CredentialVerifier>,
        config: Config,
    ) -> Self {
        Self {
            sessions,
            store,
            credentials,
            config,
        }
    }

    pub fn jwt_secret(&self) -> &str {
        &self.config.jwt_secret
    }

    pub fn token_lifetimes(&self) -> TokenLifetimes {
        self.config.token_lifetimes()
    }
}
