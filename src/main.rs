use energy_meter_aggregator::{
    config::AppConfig,
    energy_manager::EnergyManager,
    event_coordinator::EventCoordinator,
    http_api::{self, ApiState},
    sensor_poller::SensorPoller,
};
use std::net::SocketAddr;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    info!("Starting energy meter aggregator");
    let cfg = AppConfig::load()?;
    let socket_addr: SocketAddr = cfg
        .bind_addr
        .parse()
        .map_err(|e| anyhow::anyhow!("invalid bind_addr '{}': {e}", cfg.bind_addr))?;

    // Bad meters are dropped with a warning, startup carries on
    let (manager, warnings) = EnergyManager::new(&cfg.meters);
    if !warnings.is_empty() {
        warn!(count = warnings.len(), "Some meters could not be loaded");
    }
    let manager = manager.into_shared();

    let coordinator = EventCoordinator::start(manager.clone());

    if let Some(ha_cfg) = &cfg.home_assistant {
        let poller = SensorPoller::new(ha_cfg, coordinator.sender()).spawn();
        tokio::spawn(async move {
            let _ = SensorPoller::watch(poller).await;
        });
    }

    let state = ApiState {
        manager,
        events: coordinator.sender(),
    };
    http_api::serve(socket_addr, state).await
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("energy_meter_aggregator=info"));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}
