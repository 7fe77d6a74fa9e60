use std::collections::HashSet;

use anyhow::{bail, Context};
use sqlx::postgres::PgConnectOptions;

use crate::auth::gate::GatedRoute;

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: String,
    pub ttl_minutes: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres,
    Memory,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: Option<String>,
    pub host: String,
    pub port: u16,
    pub user: Option<String>,
    pub password: Option<String>,
    pub name: String,
    pub max_connections: u32,
}

impl DatabaseConfig {
    /// `DATABASE_URL` wins; otherwise the options are assembled from parts.
    pub fn connect_options(&self) -> anyhow::Result<PgConnectOptions> {
        if let Some(url) = &self.url {
            return url.parse().context("parse DATABASE_URL");
        }
        let mut opts = PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .database(&self.name);
        if let Some(user) = &self.user {
            opts = opts.username(user);
        }
        if let Some(password) = &self.password {
            opts = opts.password(password);
        }
        Ok(opts)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityProvider {
    /// HS256 tokens signed with `JWT_SECRET` (the ones `/getToken` hands out).
    Jwt,
    /// Firebase ID tokens for the given project.
    Firebase { project_id: String },
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub store: StoreBackend,
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
    pub token_issuance: bool,
    pub identity: IdentityProvider,
    pub gated_routes: HashSet<GatedRoute>,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(var: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let parsed = |key: &str, default: &str| var(key).unwrap_or_else(|| default.to_string());

        let store = match parsed("STORE_BACKEND", "postgres").as_str() {
            "postgres" => StoreBackend::Postgres,
            "memory" => StoreBackend::Memory,
            other => bail!("unknown STORE_BACKEND {other:?}"),
        };

        let database = DatabaseConfig {
            url: var("DATABASE_URL"),
            host: parsed("DB_HOST", "localhost"),
            port: parsed("DB_PORT", "5432").parse().context("DB_PORT")?,
            user: var("DB_USER"),
            password: var("DB_PASS"),
            name: parsed("DB_NAME", "smart_db"),
            max_connections: parsed("DB_MAX_CONNECTIONS", "10")
                .parse()
                .context("DB_MAX_CONNECTIONS")?,
        };

        let jwt = JwtConfig {
            secret: var("JWT_SECRET").context("JWT_SECRET must be set")?,
            ttl_minutes: parsed("TOKEN_TTL_MINUTES", "60")
                .parse()
                .context("TOKEN_TTL_MINUTES")?,
        };

        let identity = match parsed("IDENTITY_PROVIDER", "jwt").as_str() {
            "jwt" => IdentityProvider::Jwt,
            "firebase" => IdentityProvider::Firebase {
                project_id: var("FIREBASE_PROJECT_ID")
                    .context("FIREBASE_PROJECT_ID is required for IDENTITY_PROVIDER=firebase")?,
            },
            other => bail!("unknown IDENTITY_PROVIDER {other:?}"),
        };

        let gated_routes = parsed("GATED_ROUTES", "list_bids,product_bids")
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::parse)
            .collect::<anyhow::Result<HashSet<GatedRoute>>>()?;

        Ok(Self {
            host: parsed("APP_HOST", "0.0.0.0"),
            port: var("APP_PORT")
                .or_else(|| var("PORT"))
                .unwrap_or_else(|| "3000".into())
                .parse()
                .context("APP_PORT")?,
            store,
            database,
            jwt,
            token_issuance: parsed("TOKEN_ISSUANCE", "true").parse().context("TOKEN_ISSUANCE")?,
            identity,
            gated_routes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn defaults_when_only_secret_is_set() {
        let cfg = AppConfig::from_lookup(lookup(&[("JWT_SECRET", "s")])).unwrap();
        assert_eq!(cfg.port, 3000);
        assert_eq!(cfg.store, StoreBackend::Postgres);
        assert_eq!(cfg.database.name, "smart_db");
        assert_eq!(cfg.jwt.ttl_minutes, 60);
        assert!(cfg.token_issuance);
        assert_eq!(cfg.identity, IdentityProvider::Jwt);
        assert_eq!(
            cfg.gated_routes,
            HashSet::from([GatedRoute::ListBids, GatedRoute::ProductBids])
        );
    }

    #[test]
    fn missing_secret_is_an_error() {
        let err = AppConfig::from_lookup(lookup(&[])).unwrap_err();
        assert!(err.to_string().contains("JWT_SECRET"));
    }

    #[test]
    fn empty_gate_table_ungates_everything() {
        let cfg =
            AppConfig::from_lookup(lookup(&[("JWT_SECRET", "s"), ("GATED_ROUTES", "")])).unwrap();
        assert!(cfg.gated_routes.is_empty());
    }

    #[test]
    fn unknown_route_name_is_rejected() {
        let err = AppConfig::from_lookup(lookup(&[
            ("JWT_SECRET", "s"),
            ("GATED_ROUTES", "list_bids,nope"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("nope"));
    }

    #[test]
    fn firebase_needs_project_id() {
        let err = AppConfig::from_lookup(lookup(&[
            ("JWT_SECRET", "s"),
            ("IDENTITY_PROVIDER", "firebase"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("FIREBASE_PROJECT_ID"));

        let cfg = AppConfig::from_lookup(lookup(&[
            ("JWT_SECRET", "s"),
            ("IDENTITY_PROVIDER", "firebase"),
            ("FIREBASE_PROJECT_ID", "smart-deals"),
        ]))
        .unwrap();
        assert_eq!(
            cfg.identity,
            IdentityProvider::Firebase { project_id: "smart-deals".into() }
        );
    }

    #[test]
    fn port_falls_back_to_port_variable() {
        let cfg = AppConfig::from_lookup(lookup(&[("JWT_SECRET", "s"), ("PORT", "8081")])).unwrap();
        assert_eq!(cfg.port, 8081);
    }

    #[test]
    fn connect_options_from_components() {
        let cfg = AppConfig::from_lookup(lookup(&[
            ("JWT_SECRET", "s"),
            ("DB_HOST", "db.internal"),
            ("DB_USER", "smart"),
            ("DB_PASS", "p@ss:word"),
        ]))
        .unwrap();
        let opts = cfg.database.connect_options().unwrap();
        assert_eq!(opts.get_host(), "db.internal");
        assert_eq!(opts.get_port(), 5432);
        assert_eq!(opts.get_username(), "smart");
        assert_eq!(opts.get_database(), Some("smart_db"));
    }
}
