//! Business logic services

pub mod catalog;
pub mod circulation;
pub mod fines;
pub mod policy;
pub mod reminders;
pub mod renewal;

use std::sync::Arc;

use crate::{config::CirculationConfig, repository::CirculationStore};

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub catalog: catalog::CatalogService,
    pub circulation: circulation::CirculationService,
    pub policy: policy::PolicyService,
    pub reminders: reminders::ReminderService,
}

impl Services {
    /// Create all services over one store and notifier
    pub fn new(
        store: Arc<dyn CirculationStore>,
        notifier: Arc<dyn reminders::Notifier>,
        circulation_config: &CirculationConfig,
    ) -> Self {
        Self {
            catalog: catalog::CatalogService::new(store.clone()),
            circulation: circulation::CirculationService::new(
                store.clone(),
                circulation_config.self_service,
            ),
            policy: policy::PolicyService::new(store.clone()),
            reminders: reminders::ReminderService::new(store, notifier),
        }
    }
}
