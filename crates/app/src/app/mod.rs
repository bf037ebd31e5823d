use std::path::PathBuf;
use std::sync::Arc;

use crate::error::Result;
use crate::pricing;
use crate::services::AppServices;

/// Data root and pricing source for one run.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub base_dir: PathBuf,
    pub pricing_path: Option<PathBuf>,
}

/// Application state shared by frontends.
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub services: AppServices,
}

impl AppState {
    pub fn new(base_dir: PathBuf, pricing_path: Option<PathBuf>) -> Result<Self> {
        let config = AppConfig {
            base_dir,
            pricing_path,
        };
        let pricing = pricing::load_pricing_table(config.pricing_path.as_deref())?;
        let services = AppServices::new(&config, Arc::new(pricing));
        Ok(Self { config, services })
    }
}
