//! Opens the catalog, snapshot store and service from configuration.

use std::sync::Arc;

use questdeck_core::{AdminPolicy, AnyAdmin, CatalogDb, ChallengeService, Config, LocalCache, StaticAdmins};

pub struct AppContext {
    pub config: Config,
    pub catalog: Arc<CatalogDb>,
    pub service: ChallengeService,
}

pub fn open() -> Result<AppContext, Box<dyn std::error::Error>> {
    let config = Config::load()?;
    let catalog = Arc::new(CatalogDb::open()?);
    let cache = LocalCache::new(config.storage.open_store()?);

    let configured: Arc<dyn AdminPolicy> =
        Arc::new(StaticAdmins::new(config.admins.user_ids.iter().cloned()));
    let flagged: Arc<dyn AdminPolicy> = catalog.clone();
    let admins = vec![configured, flagged];
    let service = ChallengeService::new(
        catalog.clone(),
        Arc::new(AnyAdmin::new(admins)),
        cache,
        config.rotation.clone(),
        config.propagation.clone(),
    );

    Ok(AppContext {
        config,
        catalog,
        service,
    })
}
