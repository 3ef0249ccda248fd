use anyhow::{Context, Result};

use super::config_model::{
    AuthSecret, Database, DotEnvyConfig, Reconciliation, Server, Stripe,
};

fn required(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("{key} is not set"))
}

fn optional_parsed<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(default)
}

pub fn load() -> Result<DotEnvyConfig> {
    dotenvy::dotenv().ok();

    let server = Server {
        port: required("SERVER_PORT")?
            .parse()
            .context("SERVER_PORT is invalid")?,
        body_limit: required("SERVER_BODY_LIMIT")?
            .parse()
            .context("SERVER_BODY_LIMIT is invalid")?,
        timeout: required("SERVER_TIMEOUT")?
            .parse()
            .context("SERVER_TIMEOUT is invalid")?,
    };

    let database = Database {
        url: required("DATABASE_URL")?,
    };

    let stripe = Stripe {
        secret_key: required("STRIPE_SECRET_KEY")?,
        currency: std::env::var("STRIPE_CURRENCY").unwrap_or_else(|_| "usd".to_string()),
    };

    let reconciliation = Reconciliation {
        interval_secs: optional_parsed("RECONCILE_INTERVAL_SECS", 300),
        lookback_hours: optional_parsed("RECONCILE_LOOKBACK_HOURS", 24),
    };

    Ok(DotEnvyConfig {
        server,
        database,
        stripe,
        reconciliation,
    })
}

pub fn get_auth_secret() -> Result<AuthSecret> {
    dotenvy::dotenv().ok();

    Ok(AuthSecret {
        jwt_secret: required("JWT_SECRET")?,
    })
}
