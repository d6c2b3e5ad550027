use std::sync::Arc;

use actix_web::{web, App, HttpServer};
use clap::Parser;
use fx_server::{cli::Cli, rebalancer_task, routes, scheduler::TokioScheduler, state::AppState};
use fx_storage::{schema, PgFxRateStore, PgLedger, PgTransactionStore};
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&cli.rust_log).unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let bind_addr = cli.http_bind_addr.clone();
    let database_url = cli.database_url.clone();
    let config = Arc::new(cli.into_engine_config());

    let pool = PgPoolOptions::new().max_connections(10).connect(&database_url).await?;
    schema::init(&pool, &config).await?;
    tracing::info!(currencies = ?config.supported_currencies().collect::<Vec<_>>(), "schema ready");

    let fx_rates = Arc::new(PgFxRateStore::new(pool.clone()));
    let ledger = Arc::new(PgLedger::new(pool.clone(), fx_rates.clone()));
    let transactions = Arc::new(PgTransactionStore::new(pool.clone()));
    let scheduler = Arc::new(TokioScheduler::new(fx_rates.clone(), ledger.clone(), transactions.clone(), config.clone()));

    let state = AppState { fx_rates: fx_rates.clone(), ledger: ledger.clone(), transactions, scheduler, config: config.clone() };

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let rebalancer_handle = tokio::spawn(rebalancer_task::run(fx_rates, ledger, config, shutdown_rx));

    tracing::info!(%bind_addr, "starting HTTP server");
    let server_result = HttpServer::new(move || {
        App::new().app_data(web::Data::new(state.clone())).configure(routes::configure)
    })
    .bind(&bind_addr)?
    .run()
    .await;

    let _ = shutdown_tx.send(true);
    let _ = rebalancer_handle.await;

    server_result?;
    Ok(())
}
