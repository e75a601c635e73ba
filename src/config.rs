use std::path::PathBuf;

use crate::limits::MAX_LINE_LEN;

/// Process settings, read from `LABSCHED_*` environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// JSON file with equipment, analyst and sample directories.
    pub directory_path: Option<PathBuf>,
    pub strict_references: bool,
    pub metrics_port: Option<u16>,
    pub max_line_len: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            directory_path: None,
            strict_references: false,
            metrics_port: None,
            max_line_len: MAX_LINE_LEN,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup. Unparseable values fall back to the default.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Self {
            directory_path: lookup("LABSCHED_DIRECTORY")
                .filter(|s| !s.trim().is_empty())
                .map(PathBuf::from),
            strict_references: lookup("LABSCHED_STRICT_REFERENCES")
                .map(|s| {
                    matches!(
                        s.trim().to_ascii_lowercase().as_str(),
                        "1" | "true" | "yes" | "on"
                    )
                })
                .unwrap_or(defaults.strict_references),
            metrics_port: lookup("LABSCHED_METRICS_PORT").and_then(|s| s.trim().parse().ok()),
            max_line_len: lookup("LABSCHED_MAX_LINE_LEN")
                .and_then(|s| s.trim().parse().ok())
                .filter(|n| *n > 0)
                .unwrap_or(defaults.max_line_len),
        }
    }
}
