mod args;
mod config;
mod logging;
mod report;

use std::io::{self, Read};

use clap::Parser;
use tracing::debug;
use usage_app::{AppState, StatusInput};

use crate::args::CliArgs;
use crate::report::ReportOptions;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();
    let loaded = config::load().map_err(io::Error::other)?;
    let config = loaded.config;

    logging::init(config.log_level.as_deref().unwrap_or(config::DEFAULT_LOG_LEVEL));
    if loaded.found
        && let Some(file) = &loaded.file
    {
        debug!(path = %file.display(), "loaded config");
    }

    let base_dir = args
        .base_dir
        .clone()
        .or(config.base_dir)
        .unwrap_or_else(ingest::default_claude_home);
    let pricing_path = args.pricing.clone().or(config.pricing_path);
    let app_state = AppState::new(base_dir, pricing_path)?;

    if args.statusline {
        let mut raw = String::new();
        io::stdin().read_to_string(&mut raw)?;
        let input: StatusInput = serde_json::from_str(&raw)?;
        let snapshot = app_state.services.status.snapshot(&input);
        print!("{}", report::render_status(&snapshot));
        return Ok(());
    }

    let days = args.days.or(config.days).unwrap_or(0);
    let summary = app_state
        .services
        .usage
        .summary(days, args.project.as_deref())?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }
    if summary.records == 0 {
        println!("No usage data found.");
        return Ok(());
    }

    let options = ReportOptions {
        daily: args.show_daily(),
        projects: args.show_projects(),
        branches: args.show_branches(),
        top: args.top,
    };
    print!("{}", report::render_summary(&summary, options));
    Ok(())
}
