#[derive(Debug, Clone)]
pub struct DotEnvyConfig {
    pub server: Server,
    pub database: Database,
    pub stripe: Stripe,
    pub reconciliation: Reconciliation,
}

#[derive(Debug, Clone)]
pub struct Server {
    pub port: u16,
    pub body_limit: u64,
    pub timeout: u64,
}

#[derive(Debug, Clone)]
pub struct Database {
    pub url: String,
}

#[derive(Debug, Clone)]
pub struct AuthSecret {
    pub jwt_secret: String,
}

#[derive(Debug, Clone)]
pub struct Stripe {
    pub secret_key: String,
    pub currency: String,
}

#[derive(Debug, Clone)]
pub struct Reconciliation {
    pub interval_secs: u64,
    pub lookback_hours: i64,
}
