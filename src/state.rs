use std::sync::Arc;

use tracing::info;

use crate::auth::{
    jwt::JwtKeys,
    verifier::{FirebaseVerifier, IdentityVerifier, JwtVerifier},
};
use crate::config::{AppConfig, IdentityProvider, StoreBackend};
use crate::store::{memory::MemoryStore, postgres::PgDocumentStore, DocumentStore};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn DocumentStore>,
    pub config: Arc<AppConfig>,
    pub verifier: Arc<dyn IdentityVerifier>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        let store = match config.store {
            StoreBackend::Postgres => {
                Arc::new(PgDocumentStore::connect(&config.database).await?) as Arc<dyn DocumentStore>
            }
            StoreBackend::Memory => {
                info!("using in-memory store; data is lost on restart");
                Arc::new(MemoryStore::new()) as Arc<dyn DocumentStore>
            }
        };

        let verifier = match &config.identity {
            IdentityProvider::Jwt => Arc::new(JwtVerifier::new(JwtKeys::new(
                &config.jwt.secret,
                config.jwt.ttl_minutes,
            ))) as Arc<dyn IdentityVerifier>,
            IdentityProvider::Firebase { project_id } => {
                Arc::new(FirebaseVerifier::new(project_id.clone())) as Arc<dyn IdentityVerifier>
            }
        };

        Ok(Self::from_parts(store, config, verifier))
    }

    pub fn from_parts(
        store: Arc<dyn DocumentStore>,
        config: Arc<AppConfig>,
        verifier: Arc<dyn IdentityVerifier>,
    ) -> Self {
        Self { store, config, verifier }
    }
}

#[cfg(test)]
impl AppState {
    pub const TEST_SECRET: &'static str = "test-secret";

    /// State over `store` with the default gate table and HS256 tokens.
    pub fn fake(store: Arc<MemoryStore>) -> Self {
        Self::fake_with(store, |_| {})
    }

    pub fn fake_with(store: Arc<MemoryStore>, tweak: impl FnOnce(&mut AppConfig)) -> Self {
        let mut config = AppConfig::from_lookup(|key| match key {
            "JWT_SECRET" => Some(Self::TEST_SECRET.to_string()),
            "STORE_BACKEND" => Some("memory".to_string()),
            _ => None,
        })
        .expect("test config");
        tweak(&mut config);

        let verifier = Arc::new(JwtVerifier::new(JwtKeys::new(
            &config.jwt.secret,
            config.jwt.ttl_minutes,
        )));
        Self::from_parts(store, Arc::new(config), verifier)
    }

    /// `Authorization` value for a token carrying `email`.
    pub fn bearer_for(&self, email: &str) -> String {
        let keys = JwtKeys::new(&self.config.jwt.secret, self.config.jwt.ttl_minutes);
        let mut claims = serde_json::Map::new();
        claims.insert("email".into(), email.into());
        format!("Bearer {}", keys.sign(claims).expect("sign test token"))
    }
}
