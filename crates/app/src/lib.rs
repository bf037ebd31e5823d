pub mod app;
pub mod error;
pub mod pricing;
pub mod services;

pub use app::{AppConfig, AppState};
pub use error::{AppError, Result};
pub use pricing::{load_pricing_input, load_pricing_table, write_pricing_defaults};
pub use services::{
    AppServices, CostSource, DailyUsage, GroupUsage, ModelUsage, StatusContextWindow, StatusCost,
    StatusInput, StatusModel, StatusService, StatusSnapshot, UsageService, UsageSummary,
};
