use std::path::PathBuf;

/// Directory under the data root holding one directory per project.
pub const PROJECTS_DIR: &str = "projects";

pub fn default_claude_home() -> PathBuf {
    if let Ok(path) = std::env::var("CLAUDE_CONFIG_DIR")
        && !path.is_empty()
    {
        return PathBuf::from(path);
    }
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".claude");
    }
    PathBuf::from(".claude")
}
