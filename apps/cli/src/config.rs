use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

const CONFIG_DIR_NAME: &str = "usage-tracker";
const CONFIG_FILE_NAME: &str = "config.toml";
pub const DEFAULT_LOG_LEVEL: &str = "warn";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    pub base_dir: Option<PathBuf>,
    pub days: Option<u32>,
    pub log_level: Option<String>,
    pub pricing_path: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct ConfigLoad {
    pub config: CliConfig,
    pub file: Option<PathBuf>,
    pub found: bool,
}

/// Reads the config file if there is one; a missing file yields defaults.
pub fn load() -> Result<ConfigLoad, String> {
    let Some(file) = config_file() else {
        return Ok(ConfigLoad {
            config: CliConfig::default(),
            file: None,
            found: false,
        });
    };
    if !file.exists() {
        return Ok(ConfigLoad {
            config: CliConfig::default(),
            file: Some(file),
            found: false,
        });
    }
    let config = load_from(&file)?;
    Ok(ConfigLoad {
        config,
        file: Some(file),
        found: true,
    })
}

pub fn load_from(path: &Path) -> Result<CliConfig, String> {
    let contents =
        fs::read_to_string(path).map_err(|err| format!("read config {}: {}", path.display(), err))?;
    toml::from_str(&contents).map_err(|err| format!("parse config {}: {}", path.display(), err))
}

fn config_file() -> Option<PathBuf> {
    let dir = match std::env::var("XDG_CONFIG_HOME") {
        Ok(dir) if !dir.is_empty() => PathBuf::from(dir),
        _ => PathBuf::from(std::env::var("HOME").ok()?).join(".config"),
    };
    Some(dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn reads_all_fields() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join(CONFIG_FILE_NAME);
        fs::write(
            &path,
            "base_dir = \"/data/claude\"\ndays = 7\nlog_level = \"debug\"\npricing_path = \"/etc/pricing.json\"\n",
        )
        .expect("write config");
        let config = load_from(&path).expect("config");
        assert_eq!(config.base_dir, Some(PathBuf::from("/data/claude")));
        assert_eq!(config.days, Some(7));
        assert_eq!(config.log_level.as_deref(), Some("debug"));
        assert_eq!(config.pricing_path, Some(PathBuf::from("/etc/pricing.json")));
    }

    #[test]
    fn missing_fields_default() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join(CONFIG_FILE_NAME);
        fs::write(&path, "days = 3\n").expect("write config");
        let config = load_from(&path).expect("config");
        assert_eq!(
            config,
            CliConfig {
                days: Some(3),
                ..CliConfig::default()
            }
        );
    }

    #[test]
    fn malformed_config_is_an_error() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join(CONFIG_FILE_NAME);
        fs::write(&path, "days = \"seven\"\n").expect("write config");
        let err = load_from(&path).unwrap_err();
        assert!(err.starts_with("parse config"));
    }
}
