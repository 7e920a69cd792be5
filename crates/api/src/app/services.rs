//! Service wiring: one datastore, shared by every application service.

use std::sync::Arc;

use identyflow_auth::Hs256TokenService;
use identyflow_billing::PlanCatalog;
use identyflow_infra::{
    Datastore, SchoolService, StatsService, StoreError, SubscriptionService, UserService,
};

use crate::config::AppConfig;

#[derive(Clone)]
pub struct AppServices {
    pub users: UserService,
    pub subscriptions: SubscriptionService,
    pub school: SchoolService,
    pub stats: StatsService,
    pub tokens: Arc<Hs256TokenService>,
    /// HMAC key for gateway webhooks; `None` refuses them all.
    pub webhook_secret: Option<Arc<[u8]>>,
}

impl AppServices {
    pub fn new(store: Datastore, config: &AppConfig) -> Self {
        let catalog = Arc::new(config.plan_catalog.clone());
        let tokens = Arc::new(Hs256TokenService::new(
            config.jwt_secret.as_bytes(),
            config.jwt_ttl,
        ));
        let subscriptions = SubscriptionService::new(
            store.clone(),
            Arc::clone(&catalog),
            config.subscription_auto_provision,
        );

        Self {
            users: UserService::new(store.clone(), subscriptions.clone(), Arc::clone(&tokens)),
            school: SchoolService::new(store.clone()),
            stats: StatsService::new(store, catalog),
            subscriptions,
            tokens,
            webhook_secret: config
                .webhook_secret
                .as_ref()
                .map(|s| Arc::from(s.as_bytes())),
        }
    }

    pub fn catalog(&self) -> &PlanCatalog {
        self.subscriptions.catalog()
    }
}

/// Open the configured datastore and build the services over it.
///
/// A datastore that is unreachable at startup is logged by
/// [`Datastore::open`]; the process keeps serving.
pub async fn build_services(config: &AppConfig) -> Result<AppServices, StoreError> {
    let store = Datastore::open(config.database_url.as_deref(), config.database_connect_timeout).await?;
    Ok(AppServices::new(store, config))
}
