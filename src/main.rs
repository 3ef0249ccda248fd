use std::{sync::Arc, time::Duration};

use anyhow::Result;
use craftflow_backend::application::usecases::reconciliation::{
    ReconciliationUseCase, run_reconciliation_loop,
};
use craftflow_backend::config::config_loader;
use craftflow_backend::infrastructure::axum_http::http_serve;
use craftflow_backend::infrastructure::postgres::postgres_connection;
use craftflow_backend::infrastructure::postgres::repositories::payment_requests::PaymentRequestPostgres;
use craftflow_backend::observability::{
    self, events::AlertingPaymentEvents, notifier::OperatorNotifier,
};
use craftflow_backend::payments::stripe_client::StripeClient;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        error!("Backend exited with error: {}", error);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    dotenvy::dotenv().ok();
    observability::init_observability()?;

    let config = config_loader::load()?;
    info!("ENV has been loaded");

    let postgres_pool = postgres_connection::establish_connection(&config.database.url)?;
    info!("Postgres connection has been established");
    let db_pool = Arc::new(postgres_pool);

    let stripe = Arc::new(StripeClient::new(
        config.stripe.secret_key.clone(),
        config.stripe.currency.clone(),
    ));
    let events = Arc::new(AlertingPaymentEvents::new(OperatorNotifier::from_env()));

    let reconciliation_usecase = Arc::new(ReconciliationUseCase::new(
        Arc::new(PaymentRequestPostgres::new(Arc::clone(&db_pool))),
        Arc::clone(&stripe),
        Arc::clone(&events),
        config.reconciliation.lookback_hours,
    ));
    let reconcile_interval = Duration::from_secs(config.reconciliation.interval_secs);
    tokio::spawn(run_reconciliation_loop(
        reconciliation_usecase,
        reconcile_interval,
    ));
    info!(
        interval_secs = config.reconciliation.interval_secs,
        lookback_hours = config.reconciliation.lookback_hours,
        "Orphaned-charge reconciliation loop started"
    );

    http_serve::start(Arc::new(config), db_pool, stripe, events).await?;

    Ok(())
}
