use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub resolve: ResolveConfig,
    #[serde(default)]
    pub export: ExportConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    5
}

/// Behaviour of the answer resolvers.
#[derive(Debug, Deserialize, Clone)]
pub struct ResolveConfig {
    /// Keep requested tokens that have no answers, with an empty list.
    #[serde(default = "default_true")]
    pub include_empty: bool,
    /// Abort a resolution on the first data-integrity issue.
    #[serde(default = "default_true")]
    pub strict: bool,
}

impl Default for ResolveConfig {
    fn default() -> Self {
        Self {
            include_empty: true,
            strict: true,
        }
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize, Clone)]
pub struct ExportConfig {
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
        }
    }
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("./out")
}

impl Config {
    /// Configuration used when no file is available.
    pub fn minimal() -> Self {
        Self {
            db: DbConfig {
                path: PathBuf::from("./data/dioe.sqlite"),
                max_connections: default_max_connections(),
            },
            resolve: ResolveConfig::default(),
            export: ExportConfig::default(),
        }
    }
}

pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;

    if config.db.path.as_os_str().is_empty() {
        anyhow::bail!("db.path must not be empty");
    }
    if config.db.max_connections == 0 {
        anyhow::bail!("db.max_connections must be >= 1");
    }
    if config.export.output_dir.as_os_str().is_empty() {
        anyhow::bail!("export.output_dir must not be empty");
    }

    Ok(config)
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config(&content)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_file_uses_defaults() {
        let cfg = parse_config("[db]\npath = \"/tmp/dioe.sqlite\"\n").unwrap();
        assert_eq!(cfg.db.max_connections, 5);
        assert!(cfg.resolve.include_empty);
        assert!(cfg.resolve.strict);
        assert_eq!(cfg.export.output_dir, PathBuf::from("./out"));
    }

    #[test]
    fn test_resolve_section_overrides() {
        let cfg = parse_config(
            r#"
[db]
path = "/tmp/dioe.sqlite"

[resolve]
include_empty = false
strict = false
"#,
        )
        .unwrap();
        assert!(!cfg.resolve.include_empty);
        assert!(!cfg.resolve.strict);
    }

    #[test]
    fn test_zero_connections_rejected() {
        let err = parse_config("[db]\npath = \"x.sqlite\"\nmax_connections = 0\n").unwrap_err();
        assert!(err.to_string().contains("max_connections"));
    }

    #[test]
    fn test_missing_db_section_rejected() {
        assert!(parse_config("[resolve]\nstrict = true\n").is_err());
    }
}
