use anyhow::Result;
use balance_reconciler::{api, config, service::BalanceService, telemetry};
use config::Config;
use telemetry::init_tracing;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let cfg = Config::load()?;
    init_tracing(&cfg.logging);

    let service = BalanceService::from_config(&cfg);
    let app = api::router(service.clone(), &cfg);

    let addr = cfg.server.socket_addr()?;

    if cfg.server.host == "0.0.0.0" {
        warn!("binding to 0.0.0.0; the balance API will be reachable from the network");
    }

    info!(
        %addr,
        solver = service.solver_name(),
        max_branching = cfg.search.max_branching,
        max_depth = cfg.search.max_depth,
        "starting balance reconciler"
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(telemetry::shutdown_signal())
        .await?;

    warn!("shutdown complete");
    Ok(())
}
