use std::time::Duration;

use axum::extract::FromRef;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde_json::{Map, Value};
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::debug;

use crate::state::AppState;

/// Arbitrary claims; `iat`/`exp` are stamped on signing.
pub type Claims = Map<String, Value>;

#[derive(Clone)]
pub struct JwtKeys {
    pub encoding: EncodingKey,
    pub decoding: DecodingKey,
    pub ttl: Duration,
}

impl FromRef<AppState> for JwtKeys {
    fn from_ref(state: &AppState) -> Self {
        let jwt = &state.config.jwt;
        Self::new(&jwt.secret, jwt.ttl_minutes)
    }
}

impl JwtKeys {
    pub fn new(secret: &str, ttl_minutes: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl: Duration::from_secs(ttl_minutes.max(0).unsigned_abs() * 60),
        }
    }

    pub fn sign(&self, mut claims: Claims) -> anyhow::Result<String> {
        let now = OffsetDateTime::now_utc();
        let exp = now + TimeDuration::seconds(i64::try_from(self.ttl.as_secs())?);
        claims.insert("iat".into(), now.unix_timestamp().into());
        claims.insert("exp".into(), exp.unix_timestamp().into());

        let token = encode(&Header::default(), &claims, &self.encoding)?;
        debug!(email = ?claims.get("email"), "jwt signed");
        Ok(token)
    }

    pub fn verify(&self, token: &str) -> anyhow::Result<Claims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_aud = false;
        let data = decode::<Claims>(token, &self.decoding, &validation)?;
        debug!(email = ?data.claims.get("email"), "jwt verified");
        Ok(data.claims)
    }
}
