use std::sync::Arc;

use crate::clock::Clock;
use crate::geocoding::ReverseGeocoder;
use crate::home::engine::{HomeDynamicEngine, HomeEngineConfig};
use crate::store::MarketStore;
use crate::workers::matching::WorkerMatchingService;
use crate::workers::ranking::WorkerRankingService;
use crate::zones::classifier::GeoZoneClassifier;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn MarketStore>,
    /// Holds the 30-minute zone cache; shared with `home`.
    pub classifier: Arc<GeoZoneClassifier>,
    /// Holds the 5-minute feed cache.
    pub home: Arc<HomeDynamicEngine>,
    pub matching: Arc<WorkerMatchingService>,
    pub ranking: Arc<WorkerRankingService>,
}

impl AppState {
    /// Wires every service around one store, geocoder and clock.
    pub fn new(
        store: Arc<dyn MarketStore>,
        geocoder: Arc<dyn ReverseGeocoder>,
        clock: Arc<dyn Clock>,
        home_config: HomeEngineConfig,
    ) -> Self {
        let classifier = Arc::new(GeoZoneClassifier::new(
            geocoder,
            store.clone(),
            clock.clone(),
        ));
        let home = Arc::new(HomeDynamicEngine::new(
            store.clone(),
            classifier.clone(),
            clock.clone(),
            home_config,
        ));
        Self {
            matching: Arc::new(WorkerMatchingService::new(store.clone(), clock)),
            ranking: Arc::new(WorkerRankingService::new(store.clone())),
            store,
            classifier,
            home,
        }
    }
}
