use metrics_exporter_prometheus::PrometheusHandle;
use propad::config::{PolicyConfig, RewardConfig};
use propad::error::AppError;
use propad::marketplace::{MarketplaceService, MemoryStore};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::info;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

pub(crate) type Marketplace = MarketplaceService<MemoryStore>;

/// In-memory marketplace with its reward pool created up front.
pub(crate) fn build_marketplace(
    policy: PolicyConfig,
    rewards: RewardConfig,
) -> Result<Arc<Marketplace>, AppError> {
    let store = Arc::new(MemoryStore::new());
    let service = MarketplaceService::new(store, policy, rewards);
    let pool = service.bootstrap()?;
    info!(
        pool_id = %pool.id,
        available = %pool.available_amount,
        "reward pool ready"
    );
    Ok(Arc::new(service))
}
