use crate::config::FleetConfig;
use crate::credential_store::CredentialStore;
use crate::health_monitor::{NodeLocks, SignalsStore};
use crate::provisioner::ProvisionerAdapter;
use common_events::EventProducer;
use sqlx::PgPool;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub credentials: Arc<CredentialStore>,
    pub provisioner: Arc<dyn ProvisionerAdapter>,
    pub node_locks: NodeLocks,
    pub signals: SignalsStore,
    pub events: Arc<EventProducer>,
    pub config: Arc<FleetConfig>,
}

impl AppState {
    pub fn new(pool: PgPool, credentials: CredentialStore, provisioner: Arc<dyn ProvisionerAdapter>, events: EventProducer, config: FleetConfig) -> Self {
        Self {
            pool,
            credentials: Arc::new(credentials),
            provisioner,
            node_locks: NodeLocks::new(),
            signals: SignalsStore::new(),
            events: Arc::new(events),
            config: Arc::new(config),
        }
    }
}
