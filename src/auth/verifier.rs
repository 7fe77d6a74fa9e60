use std::time::{Duration, Instant};

use anyhow::Context;
use async_trait::async_trait;
use jsonwebtoken::{decode, decode_header, jwk::JwkSet, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::debug;

use super::jwt::JwtKeys;

const GOOGLE_JWKS_URL: &str =
    "https://www.googleapis.com/service_accounts/v1/jwk/securetoken@system.gserviceaccount.com";

/// Unknown key ids trigger at most one key fetch per interval.
const MIN_KEY_REFRESH: Duration = Duration::from_secs(60);

/// Authenticated caller, identified by email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subject {
    pub email: String,
}

/// Turns a bearer token into a verified subject.
#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> anyhow::Result<Subject>;
}

/// Accepts the HS256 tokens issued by `/getToken`.
pub struct JwtVerifier {
    keys: JwtKeys,
}

impl JwtVerifier {
    pub fn new(keys: JwtKeys) -> Self {
        Self { keys }
    }
}

#[async_trait]
impl IdentityVerifier for JwtVerifier {
    async fn verify(&self, token: &str) -> anyhow::Result<Subject> {
        let claims = self.keys.verify(token)?;
        let email = claims
            .get("email")
            .and_then(|v| v.as_str())
            .context("token has no email claim")?;
        Ok(Subject { email: email.to_string() })
    }
}

#[derive(Debug, Deserialize)]
struct FirebaseClaims {
    email: Option<String>,
}

/// Verifies Firebase ID tokens against Google's published signing keys.
pub struct FirebaseVerifier {
    project_id: String,
    jwks_url: String,
    http: reqwest::Client,
    keys: RwLock<KeyCache>,
}

#[derive(Default)]
struct KeyCache {
    set: Option<JwkSet>,
    fetched_at: Option<Instant>,
}

impl KeyCache {
    fn key(&self, kid: &str) -> anyhow::Result<Option<DecodingKey>> {
        let jwk = self.set.as_ref().and_then(|set| set.find(kid));
        Ok(jwk.map(DecodingKey::from_jwk).transpose()?)
    }

    fn fresh(&self) -> bool {
        self.fetched_at.is_some_and(|at| at.elapsed() < MIN_KEY_REFRESH)
    }
}

impl FirebaseVerifier {
    pub fn new(project_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            jwks_url: GOOGLE_JWKS_URL.to_string(),
            http: reqwest::Client::new(),
            keys: RwLock::new(KeyCache::default()),
        }
    }

    /// Cached key for `kid`. The set is refetched when the id is unknown,
    /// unless it was fetched less than `MIN_KEY_REFRESH` ago.
    async fn key_for(&self, kid: &str) -> anyhow::Result<DecodingKey> {
        {
            let cache = self.keys.read().await;
            if let Some(key) = cache.key(kid)? {
                return Ok(key);
            }
            anyhow::ensure!(!cache.fresh(), "unknown key id {kid}");
        }

        let mut cache = self.keys.write().await;
        // another request may have refreshed while we waited for the lock
        if let Some(key) = cache.key(kid)? {
            return Ok(key);
        }
        anyhow::ensure!(!cache.fresh(), "unknown key id {kid}");

        cache.fetched_at = Some(Instant::now());
        let fresh: JwkSet = self
            .http
            .get(&self.jwks_url)
            .send()
            .await
            .context("fetch signing keys")?
            .error_for_status()?
            .json()
            .await
            .context("decode signing keys")?;
        debug!(keys = fresh.keys.len(), "refreshed firebase signing keys");

        cache.set = Some(fresh);
        cache.key(kid)?.with_context(|| format!("unknown key id {kid}"))
    }
}

#[async_trait]
impl IdentityVerifier for FirebaseVerifier {
    async fn verify(&self, token: &str) -> anyhow::Result<Subject> {
        let header = decode_header(token)?;
        anyhow::ensure!(header.alg == Algorithm::RS256, "unexpected algorithm {:?}", header.alg);
        let kid = header.kid.context("token header has no kid")?;

        let key = self.key_for(&kid).await?;
        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(std::slice::from_ref(&self.project_id));
        validation.set_issuer(&[format!("https://securetoken.google.com/{}", self.project_id)]);

        let data = decode::<FirebaseClaims>(token, &key, &validation)?;
        let email = data.claims.email.context("token has no email claim")?;
        Ok(Subject { email })
    }
}
