use std::path::PathBuf;

use clap::Parser;

/// Token usage and cost report for local assistant session logs.
#[derive(Debug, Parser)]
#[command(name = "usage-tracker", version)]
pub struct CliArgs {
    /// Only include the last N days, today counting as one (0 = all time)
    #[arg(short, long)]
    pub days: Option<u32>,

    /// Only include projects whose directory name contains this text
    #[arg(short, long)]
    pub project: Option<String>,

    /// Show the daily breakdown
    #[arg(long)]
    pub daily: bool,

    /// Show the per-project breakdown
    #[arg(long)]
    pub projects: bool,

    /// Show the per-branch breakdown
    #[arg(long)]
    pub branches: bool,

    /// Show every breakdown
    #[arg(long)]
    pub all: bool,

    /// Maximum rows per breakdown (0 = no limit)
    #[arg(short = 'n', long, default_value_t = 0)]
    pub top: usize,

    /// Data directory holding `projects/`
    #[arg(long)]
    pub base_dir: Option<PathBuf>,

    /// Pricing override file (JSON)
    #[arg(long)]
    pub pricing: Option<PathBuf>,

    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,

    /// Read a session document from stdin and print one status line
    #[arg(long)]
    pub statusline: bool,
}

impl CliArgs {
    pub fn show_daily(&self) -> bool {
        self.daily || self.all
    }

    pub fn show_projects(&self) -> bool {
        self.projects || self.all
    }

    pub fn show_branches(&self) -> bool {
        self.branches || self.all
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_flags() {
        let args = CliArgs::parse_from([
            "usage-tracker",
            "--days",
            "7",
            "-p",
            "web",
            "--all",
            "-n",
            "5",
            "--json",
        ]);
        assert_eq!(args.days, Some(7));
        assert_eq!(args.project.as_deref(), Some("web"));
        assert_eq!(args.top, 5);
        assert!(args.json);
        assert!(args.show_daily() && args.show_projects() && args.show_branches());
    }

    #[test]
    fn breakdowns_are_off_by_default() {
        let args = CliArgs::parse_from(["usage-tracker"]);
        assert!(args.days.is_none());
        assert!(!args.show_daily());
        assert!(!args.show_branches());
        assert_eq!(args.top, 0);
    }
}
