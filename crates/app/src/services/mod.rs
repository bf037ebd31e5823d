mod status;
mod usage;

use std::sync::Arc;

use usage_core::PricingTable;

use crate::app::AppConfig;

pub use status::{
    CostSource, StatusContextWindow, StatusCost, StatusInput, StatusModel, StatusService,
    StatusSnapshot,
};
pub use usage::{DailyUsage, GroupUsage, ModelUsage, UsageService, UsageSummary};

type SharedConfig = Arc<AppConfig>;
type SharedPricing = Arc<PricingTable>;

/// Service registry for app-level operations.
#[derive(Clone)]
pub struct AppServices {
    pub usage: UsageService,
    pub status: StatusService,
}

impl AppServices {
    pub fn new(config: &AppConfig, pricing: SharedPricing) -> Self {
        let shared = Arc::new(config.clone());
        Self {
            usage: UsageService::new(shared.clone(), pricing.clone()),
            status: StatusService::new(shared, pricing),
        }
    }
}
